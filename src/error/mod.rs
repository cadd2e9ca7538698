use std::any::Any;
use std::{error::Error, fmt, io};

const ERR_MSG_EXPIRED: &str = "queue reference expired";
const ERR_MSG_NO_INPUT: &str = "no input connected";
const ERR_MSG_UNREGISTERED: &str = "unregistered event tag";
const ERR_MSG_LAUNCH: &str = "worker launch failed";

/// Failure of a [`QueueReader`](crate::queue::QueueReader) accessor.
///
/// An unbound reader and a reader whose queue has been dropped are
/// indistinguishable; both report `Expired`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ReaderError {
    Expired,
}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderError::Expired => write!(f, "{ERR_MSG_EXPIRED}"),
        }
    }
}

impl Error for ReaderError {}

/// Failure of a pull-driven [`Device`](crate::device::Device) read.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ReadError {
    /// The device has no live input attached.
    NoInput,
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::NoInput => write!(f, "{ERR_MSG_NO_INPUT}"),
        }
    }
}

impl Error for ReadError {}

/// Failure of [`Event`](crate::device::Event) construction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum EventError {
    /// The tag was never registered for its type.
    UnregisteredTag,
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventError::UnregisteredTag => write!(f, "{ERR_MSG_UNREGISTERED}"),
        }
    }
}

impl Error for EventError {}

/// Failure to bring up a background worker at construction time.
#[derive(Debug)]
pub enum SpawnError {
    /// The supplied reader was already dead.
    ExpiredReader,
    /// The worker thread could not be spawned.
    Launch(io::Error),
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::ExpiredReader => write!(f, "{ERR_MSG_EXPIRED}"),
            SpawnError::Launch(e) => write!(f, "{ERR_MSG_LAUNCH}: {e}"),
        }
    }
}

impl Error for SpawnError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SpawnError::Launch(e) => Some(e),
            _ => None,
        }
    }
}

/// Fault captured by a [`QueuePoller`](crate::queue::QueuePoller) worker.
///
/// Either kind terminates the polling loop; the snapshot stays readable
/// through [`QueuePoller::error`](crate::queue::QueuePoller::error).
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum PollFault {
    /// The watched queue was dropped while polling.
    Expired,
    /// The handler panicked; the panic message is preserved.
    Panic(String),
}

impl PollFault {
    pub(crate) fn from_panic(cause: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = cause.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = cause.downcast_ref::<String>() {
            s.clone()
        } else {
            "opaque panic payload".to_string()
        };

        PollFault::Panic(message)
    }
}

impl fmt::Display for PollFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollFault::Expired => write!(f, "{ERR_MSG_EXPIRED}"),
            PollFault::Panic(msg) => write!(f, "handler panicked: {msg}"),
        }
    }
}

impl Error for PollFault {}
