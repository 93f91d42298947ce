//! Domain entities for the resource service broker

mod binding;
mod catalog;
mod identity;
mod instance;
mod operation;
mod requests;

pub use binding::*;
pub use catalog::*;
pub use identity::*;
pub use instance::*;
pub use operation::*;
pub use requests::*;
