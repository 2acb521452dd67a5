pub mod constants;
pub mod error;
pub mod faults;
pub mod types;

pub use error::{Error, Result};
pub use faults::{FaultAggregator, FaultReport};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
