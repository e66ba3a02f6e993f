mod batch;
mod event;
mod manufacturer;

pub use batch::*;
pub use event::*;
pub use manufacturer::*;
