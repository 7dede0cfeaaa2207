//! # Grouper Simulation
//!
//! A discrete-time driver for the Grouper overlay.
//!
//! The overlay crates only react to hooks; they never decide who meets whom.
//! This crate plays that external role: it owns the clock, picks contacts
//! between hosts, moves payloads across each contact, and collects the
//! observability events into a report.
//!
//! ## Architecture
//!
//! - **Config** (`config.rs`): Host counts, contact rate, seed and key lifetimes
//! - **Interest generation** (`interest_gen.rs`): Random filters and events
//! - **World** (`world.rs`): The discrete-time contact engine
//! - **Stats** (`stats.rs`): [`KeyStats`] sink and the final [`KeyReport`]
//! - **Scenarios** (`scenarios.rs`): Pre-built walkthroughs
//!
//! ## Example
//!
//! ```rust
//! use grouper_simulation::{SimConfig, World};
//!
//! let mut world = World::new(SimConfig {
//!     ticks: 20,
//!     contact_probability: 0.3,
//!     ..Default::default()
//! })
//! .unwrap();
//!
//! let report = world.run().unwrap();
//! assert_eq!(world.tick(), 20);
//! assert_eq!(report.subscribers, 6);
//! ```

pub mod config;
pub mod error;
pub mod interest_gen;
pub mod scenarios;
pub mod stats;
pub mod world;

// Re-export main types
pub use config::SimConfig;
pub use error::{SimError, SimResult};
pub use stats::{KeyReport, KeyStats};
pub use world::{World, WorldStats};
