pub mod build;
pub mod error;
pub mod hierarchy;
pub mod io;
pub mod model;
pub mod reconcile;
pub mod sync;
pub mod tree;

pub use error::{Diagnostic, ParseError, Result, ToolError};
