//! Method bodies: instructions, labels, exception handlers, and ways of building them

mod builder;
mod instructions;
mod label;
mod listing;
mod method;

pub use builder::*;
pub use instructions::*;
pub use label::*;
pub use listing::*;
pub use method::*;
