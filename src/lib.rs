pub mod analysis;
pub mod api;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod field;
pub mod ir;
pub mod lower;
pub mod rewrite;
pub mod span;

// Pipeline entry points live at `tapline::X`.
pub use api::*;
pub use config::{ConstraintMode, LowerConfig};
pub use error::LowerError;
