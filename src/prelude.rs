pub use crate::device::{Device, Domain, EmitterFn, Event, Tag, emitter};
pub use crate::error::{EventError, PollFault, ReadError, ReaderError, SpawnError};
pub use crate::machine::{MachineConfig, NULL_STATE, StateMachine};
pub use crate::observer::{Observable, Observer};
pub use crate::queue::{Queue, QueueObserver, QueuePoller, QueueReader};
pub use crate::utils::ActiveFlag;
pub use crate::utils::logger::LoggerConfig;
