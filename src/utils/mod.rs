pub use flag::*;

mod flag;
pub mod logger;
