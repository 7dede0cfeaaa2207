//! Key lifetime policy

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BrokerError, BrokerResult};

/// Lifetimes and sharing rules for every key a host manages
///
/// Durations are read and written as whole seconds so a policy can live in a
/// TOML file:
///
/// ```toml
/// pair_key_ttl = 600
/// group_key_ttl = 300
/// interest_ttl = 1800
/// share_pair_keys = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyPolicy {
    /// Pairwise keys are renegotiated once this old
    #[serde(with = "secs")]
    pub pair_key_ttl: Duration,
    /// Group-key cache entries are evicted once this old
    #[serde(with = "secs")]
    pub group_key_ttl: Duration,
    /// Submitted interest ranges expire after this long (None = never)
    #[serde(with = "opt_secs")]
    pub interest_ttl: Option<Duration>,
    /// Brokers union their pairwise keys when they meet
    pub share_pair_keys: bool,
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self {
            pair_key_ttl: Duration::from_secs(600),  // 10 min
            group_key_ttl: Duration::from_secs(300), // 5 min
            interest_ttl: None,
            share_pair_keys: true,
        }
    }
}

impl KeyPolicy {
    /// Aggressive rotation, useful to exercise renegotiation
    pub fn short_lived() -> Self {
        Self {
            pair_key_ttl: Duration::from_secs(30),
            group_key_ttl: Duration::from_secs(15),
            interest_ttl: Some(Duration::from_secs(120)),
            share_pair_keys: true,
        }
    }

    /// Keys that outlive a typical run
    pub fn long_lived() -> Self {
        Self {
            pair_key_ttl: Duration::from_secs(86400),
            group_key_ttl: Duration::from_secs(86400),
            interest_ttl: None,
            share_pair_keys: true,
        }
    }

    /// Parse a policy from TOML; missing fields take their defaults
    pub fn from_toml_str(input: &str) -> BrokerResult<Self> {
        toml::from_str(input).map_err(|e| BrokerError::InvalidPolicy(e.to_string()))
    }

    pub fn to_toml_string(&self) -> BrokerResult<String> {
        toml::to_string(self).map_err(|e| BrokerError::InvalidPolicy(e.to_string()))
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

mod opt_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|v| v.map(Duration::from_secs))
    }
}
