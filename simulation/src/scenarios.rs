//! Pre-defined simulation scenarios
//!
//! Each scenario drives a [`World`] by hand, prints what happens at every
//! step, and returns the world so callers (and tests) can inspect it.

use std::time::Duration;

use grouper_broker::KeyPolicy;
use grouper_core::{EventPoint, InterestRange};
use tracing::info;

use crate::config::SimConfig;
use crate::error::SimResult;
use crate::world::World;

fn topic_g(start: u8, end: u8) -> SimResult<InterestRange> {
    Ok(InterestRange::new(true, start, end)?)
}

fn event_g(value: u8) -> SimResult<EventPoint> {
    Ok(EventPoint::new(true, value)?)
}

/// Two subscribers with overlapping interest behind one broker:
///
/// ```text
/// h3 wants G+[0,10], h4 wants G+[5,15]
/// segments: [0,5) <h3>, [5,10) <h3,h4>, [10,15) <h4>
/// h2 publishes G+5 and G+12
/// h3 receives G+5, h4 receives G+5 and G+12
/// ```
pub fn run_overlap_scenario() -> SimResult<World> {
    info!("=== Running overlap scenario ===");
    let mut world = World::empty(SimConfig::default())?;

    let broker = world.add_broker();
    let publisher = world.add_publisher(vec![event_g(5)?, event_g(12)?]);
    let left = world.add_subscriber(vec![topic_g(0, 10)?]);
    let right = world.add_subscriber(vec![topic_g(5, 15)?]);

    println!("\n--- Step 1: Endpoints meet the broker ---");
    for peer in [publisher, left, right] {
        let outcome = world.contact(broker, peer)?;
        println!("  {} <-> {}: {:?}", broker, peer, outcome);
    }

    println!("\n--- Step 2: Broker groups interest and dispatches ---");
    world.maintain()?;
    if let Some(state) = world.host(broker).and_then(|h| h.as_broker()) {
        for segment in state.segments() {
            println!("  {}", segment);
        }
    }

    println!("\n--- Step 3: Subscribers collect the encrypted payload ---");
    world.advance(Duration::from_secs(10));
    for peer in [left, right] {
        world.contact(broker, peer)?;
    }
    println!("{}", world.state_summary());
    println!("\n{}", world.report());

    Ok(world)
}

/// A group key created by one broker is reused by another after they meet:
///
/// ```text
/// h3, h4 and publisher h5 meet h1; h1 creates group keys
/// h1 meets h2; caches and pairwise keys are unified
/// h3, h4, h5 meet h2 with their keys still fresh
/// h2 dispatches the same events without generating any key
/// ```
pub fn run_federation_scenario() -> SimResult<World> {
    info!("=== Running federation scenario ===");
    let mut world = World::empty(SimConfig::default())?;

    let first = world.add_broker();
    let second = world.add_broker();
    let left = world.add_subscriber(vec![topic_g(0, 10)?]);
    let right = world.add_subscriber(vec![topic_g(5, 15)?]);
    let publisher = world.add_publisher(vec![event_g(7)?, event_g(12)?]);

    println!("\n--- Step 1: Everyone meets {} ---", first);
    for peer in [publisher, left, right] {
        world.contact(first, peer)?;
    }
    world.maintain()?;
    println!("  {} group keys: {}", first, world.key_stats().group_keys_for(&first));

    println!("\n--- Step 2: {} meets {} ---", first, second);
    world.advance(Duration::from_secs(5));
    let outcome = world.contact(first, second)?;
    println!("  {:?}", outcome);

    println!("\n--- Step 3: Everyone meets {} ---", second);
    world.advance(Duration::from_secs(5));
    for peer in [left, right, publisher] {
        let outcome = world.contact(second, peer)?;
        println!("  {} <-> {}: {:?}", second, peer, outcome);
    }
    world.maintain()?;
    println!(
        "  {} group keys: {}",
        second,
        world.key_stats().group_keys_for(&second)
    );

    println!("\n--- Step 4: Subscribers collect from {} ---", second);
    for peer in [left, right] {
        world.contact(second, peer)?;
    }
    println!("{}", world.state_summary());
    println!("\n{}", world.report());

    Ok(world)
}

/// A pairwise key is renegotiated once its lifetime has passed
pub fn run_renegotiation_scenario() -> SimResult<World> {
    info!("=== Running renegotiation scenario ===");
    let config = SimConfig {
        policy: KeyPolicy::short_lived(),
        ..Default::default()
    };
    let ttl = config.policy.pair_key_ttl;
    let mut world = World::empty(config)?;

    let broker = world.add_broker();
    let sub = world.add_subscriber(vec![topic_g(0, 30)?]);

    for step in ["first contact", "within lifetime", "after lifetime"] {
        let outcome = world.contact(broker, sub)?;
        println!("  t={} {}: {:?}", world.now(), step, outcome);
        world.advance(ttl / 2 + Duration::from_secs(1));
    }
    println!("\n{}", world.report());

    Ok(world)
}

/// Random contacts between randomly interested hosts
pub fn run_random_scenario(config: SimConfig) -> SimResult<World> {
    info!(ticks = config.ticks, "=== Running random scenario ===");
    let mut world = World::new(config)?;
    let report = world.run()?;

    println!("{}", world.state_summary());
    println!("\n{}", report);
    Ok(world)
}
