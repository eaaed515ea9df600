//! Domain models for the vetpath system.

mod history;
mod record;
mod validation;

pub use history::*;
pub use record::*;
pub use validation::*;
