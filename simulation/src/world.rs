//! Discrete-time contact simulation
//!
//! Each tick:
//! 1. Every pair of hosts meets with `contact_probability`
//! 2. A meeting runs the link-up hook, then both hosts hand each other
//!    whatever payloads they currently hold
//! 3. Every broker recomputes its groups and runs a dispatch pass
//! 4. The clock advances by one tick length

use std::sync::Arc;
use std::time::Duration;

use grouper_broker::{
    ContactOutcome, Host, KeyPolicy, PayloadOutcome, dispatch_pending, on_application_payload,
    on_connected, recompute_groups,
};
use grouper_core::{
    Clock, EventPoint, HostAddress, InterestRange, KeyEventSink, ManualClock, RoleKind, SimTime,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::interest_gen::{generate_events, generate_filters};
use crate::stats::{KeyReport, KeyStats};

type SimHost = Host<HostAddress>;

/// Counters kept by the driver itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorldStats {
    pub contacts: u64,
    pub handshakes: u64,
    pub fresh_contacts: u64,
    pub reconciliations: u64,
    pub ineligible_contacts: u64,
    pub filters_delivered: u64,
    pub events_delivered: u64,
    pub encrypted_delivered: u64,
    pub messages_opened: u64,
    pub dispatch_passes: u64,
    pub bundles_created: u64,
    pub dropped_segments: u64,
}

/// The simulation state
pub struct World {
    config: SimConfig,
    clock: ManualClock,
    hosts: Vec<SimHost>,
    key_stats: Arc<KeyStats>,
    rng: StdRng,
    tick: u64,
    stats: WorldStats,
}

impl World {
    /// A world with no hosts yet; add them with the `add_*` methods
    pub fn empty(config: SimConfig) -> SimResult<Self> {
        config.validate()?;
        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            clock: ManualClock::starting_at(SimTime::ZERO),
            hosts: Vec::new(),
            key_stats: Arc::new(KeyStats::new()),
            tick: 0,
            stats: WorldStats::default(),
        })
    }

    /// A world populated from the configured host counts
    ///
    /// Brokers take the lowest addresses, then publishers, then subscribers.
    pub fn new(config: SimConfig) -> SimResult<Self> {
        let mut world = Self::empty(config)?;

        for _ in 0..world.config.brokers {
            world.add_broker();
        }
        for _ in 0..world.config.publishers {
            let events = generate_events(&mut world.rng, world.config.events_per_host);
            world.add_publisher(events);
        }
        for _ in 0..world.config.subscribers {
            let filters = generate_filters(&mut world.rng, world.config.filters_per_host);
            world.add_subscriber(filters);
        }

        info!(
            brokers = world.config.brokers,
            publishers = world.config.publishers,
            subscribers = world.config.subscribers,
            seed = world.config.seed,
            "World initialized"
        );
        Ok(world)
    }

    pub fn add_broker(&mut self) -> HostAddress {
        self.add_host(|id, policy, sink| Host::broker(id, policy, sink))
    }

    pub fn add_publisher(&mut self, events: Vec<EventPoint>) -> HostAddress {
        self.add_host(|id, policy, sink| Host::publisher(id, events, policy, sink))
    }

    pub fn add_subscriber(&mut self, filters: Vec<InterestRange>) -> HostAddress {
        self.add_host(|id, policy, sink| Host::subscriber(id, filters, policy, sink))
    }

    fn add_host<F>(&mut self, build: F) -> HostAddress
    where
        F: FnOnce(HostAddress, KeyPolicy, Arc<dyn KeyEventSink<HostAddress>>) -> SimHost,
    {
        let id = HostAddress::new(self.hosts.len() as u32 + 1);
        let sink: Arc<dyn KeyEventSink<HostAddress>> = self.key_stats.clone();
        let host = build(id, self.config.policy.clone(), sink);
        self.key_stats.register(id, host.kind());
        trace!(host = %id, role = %host.kind(), "Host added");
        self.hosts.push(host);
        id
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn stats(&self) -> &WorldStats {
        &self.stats
    }

    pub fn key_stats(&self) -> &Arc<KeyStats> {
        &self.key_stats
    }

    pub fn report(&self) -> KeyReport {
        self.key_stats.report()
    }

    pub fn host(&self, id: HostAddress) -> Option<&SimHost> {
        self.index_of(id).ok().map(|i| &self.hosts[i])
    }

    pub fn hosts(&self) -> impl Iterator<Item = &SimHost> {
        self.hosts.iter()
    }

    /// Addresses of every host carrying `kind`
    pub fn addresses_of(&self, kind: RoleKind) -> Vec<HostAddress> {
        self.hosts
            .iter()
            .filter(|h| h.kind() == kind)
            .map(|h| *h.id())
            .collect()
    }

    /// Move the clock forward without running a tick
    pub fn advance(&mut self, step: Duration) -> SimTime {
        self.clock.advance(step)
    }

    /// Drop `subscriber`'s interest ranges at every broker
    pub fn retract(&mut self, subscriber: HostAddress) -> usize {
        self.hosts
            .iter_mut()
            .map(|h| h.retract_interest(&subscriber))
            .sum()
    }

    /// Bring two hosts into contact
    ///
    /// Runs the link-up hook, then hands each host the payloads the other
    /// currently offers.
    pub fn contact(&mut self, a: HostAddress, b: HostAddress) -> SimResult<ContactOutcome> {
        if a == b {
            return Err(SimError::SelfContact(a));
        }
        let (ia, ib) = (self.index_of(a)?, self.index_of(b)?);
        let now = self.now();
        let (first, second) = pair_mut(&mut self.hosts, ia, ib);

        let outcome = on_connected(first, second, now)?;
        self.stats.contacts += 1;
        match outcome {
            ContactOutcome::KeyExchanged => self.stats.handshakes += 1,
            ContactOutcome::KeyFresh => self.stats.fresh_contacts += 1,
            ContactOutcome::CachesReconciled { .. } => self.stats.reconciliations += 1,
            ContactOutcome::Ineligible => self.stats.ineligible_contacts += 1,
        }

        deliver(first, second, now, &mut self.stats)?;
        deliver(second, first, now, &mut self.stats)?;
        Ok(outcome)
    }

    /// Recompute groups and run a dispatch pass on every broker
    pub fn maintain(&mut self) -> SimResult<()> {
        let now = self.now();
        for host in self.hosts.iter_mut().filter(|h| h.kind().is_broker()) {
            recompute_groups(host, now);
            let outcome = dispatch_pending(host, now)?;
            if outcome.matched_segments > 0 {
                self.stats.dispatch_passes += 1;
                self.stats.bundles_created += outcome.bundles.len() as u64;
                self.stats.dropped_segments += outcome.dropped_segments as u64;
            }
        }
        Ok(())
    }

    /// Run a single simulation tick
    pub fn step(&mut self) -> SimResult<()> {
        self.tick += 1;
        trace!(tick = self.tick, now = %self.now(), "Tick");

        let n = self.hosts.len();
        let mut meetings = Vec::new();
        for i in 0..n {
            for j in i + 1..n {
                if self.rng.random_bool(self.config.contact_probability) {
                    meetings.push((*self.hosts[i].id(), *self.hosts[j].id()));
                }
            }
        }
        for (a, b) in meetings {
            self.contact(a, b)?;
        }

        self.maintain()?;
        self.clock.advance(self.config.tick_length());
        Ok(())
    }

    /// Run until the configured tick count
    pub fn run(&mut self) -> SimResult<KeyReport> {
        while self.tick < self.config.ticks {
            self.step()?;
        }

        info!(tick = self.tick, now = %self.now(), "Simulation complete");
        debug!(stats = ?self.stats, "Driver counters");
        Ok(self.report())
    }

    /// Run for a specific number of ticks
    pub fn run_ticks(&mut self, ticks: u64) -> SimResult<()> {
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(())
    }

    /// One line per host: role, keys held and what it has received
    pub fn state_summary(&self) -> String {
        self.hosts
            .iter()
            .map(|h| {
                let mut line = format!("{} {:<10} keys={}", h.id(), h.kind(), h.key_count());
                if let Some(broker) = h.as_broker() {
                    line.push_str(&format!(
                        " interests={} segments={} outbox={}",
                        broker.interests().len(),
                        broker.segments().len(),
                        broker.outbox().len()
                    ));
                }
                if h.as_subscriber().is_some() {
                    line.push_str(&format!(" received={}", h.received_events().len()));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn index_of(&self, id: HostAddress) -> SimResult<usize> {
        (id.addr() as usize)
            .checked_sub(1)
            .filter(|i| *i < self.hosts.len())
            .ok_or(SimError::UnknownHost(id))
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("tick", &self.tick)
            .field("now", &self.now())
            .field("hosts", &self.hosts.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Two distinct hosts, mutably
fn pair_mut(hosts: &mut [SimHost], a: usize, b: usize) -> (&mut SimHost, &mut SimHost) {
    if a < b {
        let (lo, hi) = hosts.split_at_mut(b);
        (&mut lo[a], &mut hi[0])
    } else {
        let (lo, hi) = hosts.split_at_mut(a);
        (&mut hi[0], &mut lo[b])
    }
}

/// Hand `to` every payload `from` currently offers
///
/// New interest at a broker triggers an immediate group recomputation.
fn deliver(
    from: &SimHost,
    to: &mut SimHost,
    now: SimTime,
    stats: &mut WorldStats,
) -> SimResult<()> {
    let offered = [from.publish(now), from.subscribe(now), from.outbox()];
    for payload in offered.into_iter().flatten() {
        match on_application_payload(to, &payload, from.id(), now)? {
            PayloadOutcome::InterestRecorded { added } => {
                stats.filters_delivered += 1;
                if added > 0 {
                    recompute_groups(to, now);
                }
            }
            PayloadOutcome::EventsQueued { .. } => stats.events_delivered += 1,
            PayloadOutcome::Opened { messages } => {
                stats.encrypted_delivered += 1;
                stats.messages_opened += messages as u64;
            }
            PayloadOutcome::Ignored => {}
        }
    }
    Ok(())
}
