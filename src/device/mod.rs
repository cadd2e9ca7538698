pub use domain::*;
pub use event::*;
pub use generic::*;

mod domain;
mod event;
mod generic;
