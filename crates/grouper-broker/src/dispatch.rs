//! Event Dispatch and the wrap/unwrap protocol
//!
//! Broker side: every segment matched by at least one pending event gets one
//! ciphertext under its group key, plus one wrapped copy of that key per
//! member the broker shares a valid pairwise key with. Segments whose members
//! hold no pairwise key yet are dropped.
//!
//! Subscriber side: each `(ciphertext, wrapped key)` candidate is tried
//! independently. Any cryptographic failure just means "not for me".

use std::time::Duration;

use tracing::{debug, trace};

use grouper_core::{
    CodecError, EncryptedBundle, EventPoint, KeyEvent, KeyEventSink, MemberSet, PeerIdentity,
    Segment, SimTime,
};
use grouper_crypto::{PairKeyStore, SymmetricKey, unwrap_key, wrap_key};

use crate::cache::GroupKeyCache;
use crate::error::BrokerResult;

/// Everything a dispatch pass reads besides its inputs
pub struct DispatchContext<'a, I: PeerIdentity> {
    pub broker: &'a I,
    pub now: SimTime,
    pub pair_key_ttl: Duration,
    pub group_key_ttl: Duration,
    pub sink: &'a dyn KeyEventSink<I>,
}

/// Result of one dispatch pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// One bundle per delivered segment
    pub bundles: Vec<EncryptedBundle>,
    /// Segments matched by at least one event
    pub matched_segments: usize,
    /// Matched segments with nobody to wrap the key for
    pub dropped_segments: usize,
    /// Group keys generated during the pass
    pub keys_created: usize,
}

/// Encrypt `events` for every segment they match
pub fn dispatch<I: PeerIdentity>(
    segments: &[Segment<I>],
    events: &[EventPoint],
    cache: &mut GroupKeyCache<I>,
    pair_keys: &PairKeyStore<I>,
    ctx: &DispatchContext<'_, I>,
) -> BrokerResult<DispatchOutcome> {
    let mut outcome = DispatchOutcome::default();

    for segment in segments {
        let matched: Vec<EventPoint> = events
            .iter()
            .filter(|e| segment.matches(e))
            .copied()
            .collect();
        if matched.is_empty() {
            continue;
        }
        outcome.matched_segments += 1;

        let group_key = group_key_for(cache, &segment.members, ctx, &mut outcome);

        let mut wrapped_keys = Vec::new();
        for member in &segment.members {
            if let Some(pair) = pair_keys.get_fresh(member, ctx.now, ctx.pair_key_ttl) {
                wrapped_keys.push(wrap_key(&pair.key, &group_key)?);
            }
        }

        if wrapped_keys.is_empty() {
            trace!(segment = %segment, "No member holds a pair key, dropping");
            outcome.dropped_segments += 1;
            continue;
        }

        let plaintext = postcard::to_allocvec(&matched)
            .map_err(|e| CodecError::Serialization(e.to_string()))?;
        let ciphertext = group_key.seal(&plaintext)?;

        debug!(
            segment = %segment,
            events = matched.len(),
            recipients = wrapped_keys.len(),
            "Segment dispatched"
        );
        outcome.bundles.push(EncryptedBundle {
            ciphertext,
            wrapped_keys,
        });
    }

    Ok(outcome)
}

/// Cached key for `members`, generating and caching one when absent or stale
fn group_key_for<I: PeerIdentity>(
    cache: &mut GroupKeyCache<I>,
    members: &MemberSet<I>,
    ctx: &DispatchContext<'_, I>,
    outcome: &mut DispatchOutcome,
) -> SymmetricKey {
    if let Some(entry) = cache.entry(members) {
        if !entry.is_expired(ctx.now, ctx.group_key_ttl) {
            return entry.key.clone();
        }
    }

    let key = SymmetricKey::generate();
    cache.insert_or_replace(members.clone(), key.clone(), ctx.now);
    outcome.keys_created += 1;
    ctx.sink.emit(KeyEvent::GroupKeyCreated {
        broker: ctx.broker.clone(),
        members: members.clone(),
        at: ctx.now,
    });
    key
}

/// Unwrap `wrapped` with `pair_key`, then open `ciphertext` with the result
pub fn try_open(pair_key: &SymmetricKey, ciphertext: &[u8], wrapped: &[u8]) -> Option<Vec<u8>> {
    let group_key = match unwrap_key(pair_key, wrapped) {
        Ok(key) => key,
        Err(e) => {
            trace!(error = %e, "Wrapped key not for us");
            return None;
        }
    };
    match group_key.open(ciphertext) {
        Ok(plaintext) => Some(plaintext),
        Err(e) => {
            trace!(error = %e, "Ciphertext did not open");
            None
        }
    }
}

/// Try every candidate in `bundle`, decoding the first that opens
pub fn open_bundle(pair_key: &SymmetricKey, bundle: &EncryptedBundle) -> Option<Vec<EventPoint>> {
    bundle.candidates().find_map(|(ciphertext, wrapped)| {
        let plaintext = try_open(pair_key, ciphertext, wrapped)?;
        postcard::from_bytes(&plaintext).ok()
    })
}
