//! The `utils` module holds definitions shared by every other module:
//! the error taxonomy and logging setup.

pub mod error;
pub mod logging;
