//! Simulation errors

use grouper_broker::BrokerError;
use grouper_core::{HostAddress, IntervalError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no host with address {0}")]
    UnknownHost(HostAddress),

    #[error("host {0} cannot contact itself")]
    SelfContact(HostAddress),

    #[error(transparent)]
    Interval(#[from] IntervalError),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("config encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

pub type SimResult<T> = Result<T, SimError>;
