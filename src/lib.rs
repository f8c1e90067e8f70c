mod client;
mod config;
mod diff;
mod error;
mod logger;
mod protocol;
mod types;

pub use client::{ThermoPiClient, ThermoPiClientBuilder};
pub use config::{ThermoPiConfig, DEFAULT_DEVICE, DEFAULT_NAME, DEFAULT_PORT};
pub use error::{Error, ErrorKind, Result};
pub use logger::MessageLogMode;
pub use protocol::{COMMAND_TIMEOUT, READ_TIMEOUT};
pub use types::*;
