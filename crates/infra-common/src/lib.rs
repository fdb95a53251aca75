//! Common infrastructure for the framecast crates
//!
//! - `logging`: tracing subscriber setup shared by the binaries
//! - `errors`: error type for infrastructure failures

pub mod errors;
pub mod logging;

pub use errors::{Error, Result};
pub use logging::{parse_log_level, setup_logging, LoggingConfig};
