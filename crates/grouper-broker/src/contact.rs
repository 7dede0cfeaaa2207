//! Hooks driven by the external transport
//!
//! - [`on_connected`]: a link came up between two hosts
//! - [`on_application_payload`]: a payload arrived at a host
//! - [`recompute_groups`]: the broker's interest data may have changed
//! - [`dispatch_pending`]: the broker should encrypt what it has queued
//!
//! Every call runs to completion; state changes are reported to each host's
//! sink at the point they happen.

use tracing::{debug, instrument, trace};

use grouper_core::{ApplicationPayload, KeyEvent, PeerIdentity, RoleKind, RolePair, SimTime};
use grouper_crypto::exchange;

use crate::dispatch::{DispatchContext, DispatchOutcome, dispatch, open_bundle};
use crate::error::{BrokerError, BrokerResult};
use crate::host::{Host, OpenedMessage, Role};
use crate::merge::merge;

/// What a contact did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactOutcome {
    /// A broker and an endpoint ran a fresh handshake
    KeyExchanged,
    /// Both sides already held a valid pairwise key
    KeyFresh,
    /// Two brokers unified their caches
    CachesReconciled {
        entries: usize,
        pair_keys_shared: usize,
    },
    /// The roles have nothing to exchange
    Ineligible,
}

/// What receiving a payload did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadOutcome {
    /// A broker stored interest ranges
    InterestRecorded { added: usize },
    /// A broker queued events for dispatch
    EventsQueued { added: usize },
    /// A subscriber decrypted this many new bundles
    Opened { messages: usize },
    /// The payload means nothing to this host
    Ignored,
}

/// Link-up hook
///
/// Broker/endpoint pairs renegotiate their pairwise key when either side
/// lacks a valid one or the two copies differ, as happens once the endpoint
/// has keyed with another broker since. Broker/broker pairs reconcile their
/// group-key caches and, if the policy allows, their pairwise keys. Every
/// other pair is a no-op.
#[instrument(skip_all, fields(local = %local.id, remote = %remote.id))]
pub fn on_connected<I: PeerIdentity>(
    local: &mut Host<I>,
    remote: &mut Host<I>,
    now: SimTime,
) -> BrokerResult<ContactOutcome> {
    let policy = local.policy.clone();

    match local.kind().pair_with(remote.kind()) {
        RolePair::BrokerPeer => {
            let (broker, endpoint) = if local.kind().is_broker() {
                (local, remote)
            } else {
                (remote, local)
            };
            handshake(broker, endpoint, now)
        }
        RolePair::BrokerBroker => {
            let (Role::Broker(ours), Role::Broker(theirs)) = (&mut local.role, &mut remote.role)
            else {
                return Ok(ContactOutcome::Ineligible);
            };

            let mut pair_keys_shared = 0;
            if policy.share_pair_keys {
                ours.pair_keys.evict_expired(now, policy.pair_key_ttl);
                theirs.pair_keys.evict_expired(now, policy.pair_key_ttl);
                pair_keys_shared += ours.pair_keys.merge_from(&theirs.pair_keys);
                pair_keys_shared += theirs.pair_keys.merge_from(&ours.pair_keys);
            }

            let entries = ours
                .cache
                .reconcile(&mut theirs.cache, now, policy.group_key_ttl);

            debug!(entries, pair_keys_shared, "Brokers reconciled");
            for (host, peer) in [(&*local, &*remote), (&*remote, &*local)] {
                host.sink.emit(KeyEvent::CachesReconciled {
                    local: host.id.clone(),
                    remote: peer.id.clone(),
                    entries,
                    at: now,
                });
            }
            Ok(ContactOutcome::CachesReconciled {
                entries,
                pair_keys_shared,
            })
        }
        RolePair::Ineligible => {
            trace!("Roles cannot share a key");
            Ok(ContactOutcome::Ineligible)
        }
    }
}

fn handshake<I: PeerIdentity>(
    broker: &mut Host<I>,
    endpoint: &mut Host<I>,
    now: SimTime,
) -> BrokerResult<ContactOutcome> {
    let ttl = broker.policy.pair_key_ttl;
    let broker_copy = broker
        .as_broker()
        .and_then(|b| b.pair_keys.get_fresh(&endpoint.id, now, ttl));
    let endpoint_copy = endpoint
        .endpoint_key()
        .filter(|k| !k.is_expired(now, ttl));

    match (broker_copy, endpoint_copy) {
        (Some(ours), Some(theirs)) if ours.key == theirs.key => {
            return Ok(ContactOutcome::KeyFresh);
        }
        (Some(_), Some(_)) => trace!("Pair key copies diverged"),
        _ => {}
    }

    let (Role::Broker(state), Some(slot)) = (&mut broker.role, endpoint.role.endpoint_slot())
    else {
        return Ok(ContactOutcome::Ineligible);
    };

    let (broker_copy, endpoint_copy) = exchange(&broker.id, &endpoint.id, now)?;
    debug!(
        broker = %broker.id,
        endpoint = %endpoint.id,
        fingerprint = %broker_copy.key.fingerprint(),
        "Pair key negotiated"
    );
    state.pair_keys.insert(broker_copy);
    *slot = Some(endpoint_copy);

    broker.sink.emit(KeyEvent::KeyPairCreated {
        host: broker.id.clone(),
        peer: endpoint.id.clone(),
        at: now,
    });
    endpoint.sink.emit(KeyEvent::KeyPairCreated {
        host: endpoint.id.clone(),
        peer: broker.id.clone(),
        at: now,
    });

    Ok(ContactOutcome::KeyExchanged)
}

/// Payload-arrival hook
///
/// Brokers record Filters and queue Events; subscribers try to open
/// Encrypted payloads. Any other combination is ignored.
#[instrument(skip_all, fields(host = %host.id, kind = ?payload.kind(), sender = %sender))]
pub fn on_application_payload<I: PeerIdentity>(
    host: &mut Host<I>,
    payload: &ApplicationPayload,
    sender: &I,
    now: SimTime,
) -> BrokerResult<PayloadOutcome> {
    match (&mut host.role, payload) {
        (Role::Broker(state), ApplicationPayload::Filters(ranges)) => {
            let added = state.interests.submit(sender, ranges, now);
            trace!(added, "Interest recorded");
            Ok(PayloadOutcome::InterestRecorded { added })
        }
        (Role::Broker(state), ApplicationPayload::Events(events)) => {
            let before = state.pending_events.len();
            state.pending_events.extend(events.iter().copied());
            let added = state.pending_events.len() - before;
            trace!(added, "Events queued");
            Ok(PayloadOutcome::EventsQueued { added })
        }
        (Role::Subscriber(state), ApplicationPayload::Encrypted(bundles)) => {
            let Some(pair_key) = state.pair_key.as_ref() else {
                trace!("No pair key yet");
                return Ok(PayloadOutcome::Ignored);
            };

            // A broker replaces its whole outbox on each dispatch, so only
            // ciphertexts still in this payload can come back from it
            let seen = state.seen_ciphertexts.entry(sender.clone()).or_default();
            seen.retain(|c| bundles.iter().any(|b| &b.ciphertext == c));

            let mut opened = Vec::new();
            for bundle in bundles {
                if seen.contains(&bundle.ciphertext) {
                    continue;
                }
                if let Some(events) = open_bundle(&pair_key.key, bundle) {
                    seen.insert(bundle.ciphertext.clone());
                    opened.push(events);
                }
            }

            let messages = opened.len();
            for events in opened {
                host.sink.emit(KeyEvent::MessageOpened {
                    subscriber: host.id.clone(),
                    events: events.clone(),
                    at: now,
                });
                state.opened.push(OpenedMessage { events, at: now });
            }
            if messages > 0 {
                debug!(messages, "Opened encrypted payload");
            }
            Ok(PayloadOutcome::Opened { messages })
        }
        _ => Ok(PayloadOutcome::Ignored),
    }
}

/// Rebuild a broker's segments from its current interest table
///
/// Returns the number of segments, or `None` for non-brokers.
#[instrument(skip_all, fields(host = %host.id))]
pub fn recompute_groups<I: PeerIdentity>(host: &mut Host<I>, now: SimTime) -> Option<usize> {
    let Role::Broker(state) = &mut host.role else {
        return None;
    };

    if let Some(ttl) = host.policy.interest_ttl {
        let expired = state.interests.evict_expired(now, ttl);
        if expired > 0 {
            debug!(expired, "Interest ranges expired");
        }
    }

    state.segments = merge(&state.interests.ranges());
    let segments = state.segments.len();
    trace!(segments, "Groups recomputed");

    host.sink.emit(KeyEvent::GroupsRecomputed {
        broker: host.id.clone(),
        segments,
        at: now,
    });
    Some(segments)
}

/// Drain a broker's pending events through one dispatch pass
///
/// Expired group keys are evicted first. A non-empty result replaces the
/// broker's outbox.
#[instrument(skip_all, fields(host = %host.id))]
pub fn dispatch_pending<I: PeerIdentity>(
    host: &mut Host<I>,
    now: SimTime,
) -> BrokerResult<DispatchOutcome> {
    let actual = host.kind();
    let Role::Broker(state) = &mut host.role else {
        return Err(BrokerError::WrongRole {
            expected: RoleKind::Broker,
            actual,
        });
    };

    let evicted = state.cache.evict_expired(now, host.policy.group_key_ttl);
    if evicted > 0 {
        trace!(evicted, "Group keys expired");
    }

    let events: Vec<_> = std::mem::take(&mut state.pending_events).into_iter().collect();
    if events.is_empty() {
        return Ok(DispatchOutcome::default());
    }

    let ctx = DispatchContext {
        broker: &host.id,
        now,
        pair_key_ttl: host.policy.pair_key_ttl,
        group_key_ttl: host.policy.group_key_ttl,
        sink: host.sink.as_ref(),
    };
    let outcome = dispatch(&state.segments, &events, &mut state.cache, &state.pair_keys, &ctx)?;

    if !outcome.bundles.is_empty() {
        state.outbox = outcome.bundles.clone();
    }
    debug!(
        events = events.len(),
        bundles = outcome.bundles.len(),
        dropped = outcome.dropped_segments,
        "Dispatch pass complete"
    );
    Ok(outcome)
}
