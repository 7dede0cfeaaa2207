//! Simulation configuration

use std::time::Duration;

use grouper_broker::KeyPolicy;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::interest_gen::{MAX_DISTINCT_EVENTS, MAX_DISTINCT_FILTERS};

/// Configuration for the simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of broker hosts
    pub brokers: usize,
    /// Number of publisher hosts
    pub publishers: usize,
    /// Number of subscriber hosts
    pub subscribers: usize,
    /// Probability that any given pair of hosts meets during a tick
    pub contact_probability: f64,
    /// Simulated seconds per tick
    pub tick_secs: u64,
    /// Ticks run by [`World::run`](crate::World::run)
    pub ticks: u64,
    /// Seed for contact selection and interest generation
    pub seed: u64,
    /// Distinct interest ranges generated per subscriber
    pub filters_per_host: usize,
    /// Distinct event points generated per publisher
    pub events_per_host: usize,
    /// Key lifetimes shared by every host
    pub policy: KeyPolicy,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            brokers: 2,
            publishers: 3,
            subscribers: 6,
            contact_probability: 0.1,
            tick_secs: 30,
            ticks: 200,
            seed: 42,
            filters_per_host: 5,
            events_per_host: 5,
            policy: KeyPolicy::default(),
        }
    }
}

impl SimConfig {
    /// Parse a TOML document; missing fields keep their defaults
    pub fn from_toml_str(input: &str) -> SimResult<Self> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> SimResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Length of one tick
    pub fn tick_length(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }

    pub fn total_hosts(&self) -> usize {
        self.brokers + self.publishers + self.subscribers
    }

    pub fn validate(&self) -> SimResult<()> {
        if !(0.0..=1.0).contains(&self.contact_probability) {
            return Err(SimError::InvalidConfig(format!(
                "contact_probability must be within [0, 1], got {}",
                self.contact_probability
            )));
        }
        if self.tick_secs == 0 {
            return Err(SimError::InvalidConfig("tick_secs must be positive".into()));
        }
        if self.filters_per_host > MAX_DISTINCT_FILTERS {
            return Err(SimError::InvalidConfig(format!(
                "filters_per_host exceeds the {} distinct ranges available",
                MAX_DISTINCT_FILTERS
            )));
        }
        if self.events_per_host > MAX_DISTINCT_EVENTS {
            return Err(SimError::InvalidConfig(format!(
                "events_per_host exceeds the {} distinct points available",
                MAX_DISTINCT_EVENTS
            )));
        }
        if u32::try_from(self.total_hosts()).is_err() {
            return Err(SimError::InvalidConfig("too many hosts".into()));
        }
        Ok(())
    }
}
