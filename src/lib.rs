pub mod client;
pub mod commands;
pub mod error;
pub mod transport;
pub mod utils;

pub use client::{ClientConfig, ThetaClient};
pub use commands::{CommandDispatcher, CommandRequest, CommandResult, PollPolicy};
pub use error::ClassifiedError;

// Crate version exposed for runtime queries
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
