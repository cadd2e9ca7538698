pub use fifo::*;
pub use observer::*;
pub use poller::*;
pub use reader::*;

mod fifo;
mod observer;
mod poller;
mod reader;
