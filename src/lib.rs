// Library exports for reuse by tests and other tooling
pub mod cli;
pub mod config_file;
pub mod quantize;
pub mod utils;

// Re-export commonly used types
pub use quantize::{
    Availability, BatchOutcome, BatchRunner, CommandSpec, ProcessPolicy, QuantizeConfig,
    QuantizeEngine,
};
