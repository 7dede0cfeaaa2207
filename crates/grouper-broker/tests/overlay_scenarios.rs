//! End-to-end scenarios over the contact and payload hooks
//!
//! Hosts are wired by hand; the test plays the part of the external
//! transport and scheduler.

use std::sync::Arc;
use std::time::Duration;

use grouper_broker::{
    ContactOutcome, Host, KeyPolicy, PayloadOutcome, dispatch_pending, on_application_payload,
    on_connected, recompute_groups,
};
use grouper_core::{
    ApplicationPayload, EventPoint, HostAddress, InterestRange, KeyEvent, KeyEventSink,
    MemberSet, RecordingSink, SimTime,
};

struct Overlay {
    sink: Arc<RecordingSink<HostAddress>>,
    policy: KeyPolicy,
}

impl Overlay {
    fn new() -> Self {
        Self::with_policy(KeyPolicy {
            pair_key_ttl: Duration::from_secs(100),
            group_key_ttl: Duration::from_secs(50),
            interest_ttl: None,
            share_pair_keys: true,
        })
    }

    fn with_policy(policy: KeyPolicy) -> Self {
        Self {
            sink: Arc::new(RecordingSink::new()),
            policy,
        }
    }

    fn sink(&self) -> Arc<dyn KeyEventSink<HostAddress>> {
        self.sink.clone()
    }

    fn broker(&self, id: u32) -> Host<HostAddress> {
        Host::broker(HostAddress(id), self.policy.clone(), self.sink())
    }

    fn subscriber(&self, id: u32, ranges: &[(bool, u8, u8)]) -> Host<HostAddress> {
        let filters = ranges
            .iter()
            .map(|&(t, s, e)| InterestRange::new(t, s, e).unwrap())
            .collect();
        Host::subscriber(HostAddress(id), filters, self.policy.clone(), self.sink())
    }

    fn publisher(&self, id: u32, events: &[(bool, u8)]) -> Host<HostAddress> {
        let events = events
            .iter()
            .map(|&(t, v)| EventPoint::new(t, v).unwrap())
            .collect();
        Host::publisher(HostAddress(id), events, self.policy.clone(), self.sink())
    }
}

/// Handshake, then hand the subscriber's filters to the broker
fn enroll(broker: &mut Host<HostAddress>, sub: &mut Host<HostAddress>, now: SimTime) {
    on_connected(broker, sub, now).unwrap();
    let filters = sub.subscribe(now).unwrap();
    on_application_payload(broker, &filters, &sub.id().clone(), now).unwrap();
}

fn deliver_events(broker: &mut Host<HostAddress>, publisher: &mut Host<HostAddress>, now: SimTime) {
    on_connected(publisher, broker, now).unwrap();
    let events = publisher.publish(now).unwrap();
    on_application_payload(broker, &events, &publisher.id().clone(), now).unwrap();
}

fn point(value: u8) -> EventPoint {
    EventPoint::new(true, value).unwrap()
}

#[test]
fn test_handshake_gives_both_sides_identical_keys() {
    let overlay = Overlay::new();
    let mut broker = overlay.broker(1);
    let mut sub = overlay.subscriber(2, &[(true, 0, 10)]);

    let outcome = on_connected(&mut sub, &mut broker, SimTime::ZERO).unwrap();
    assert_eq!(outcome, ContactOutcome::KeyExchanged);

    let broker_copy = broker
        .as_broker()
        .unwrap()
        .pair_keys()
        .get(sub.id())
        .unwrap()
        .clone();
    let sub_copy = sub.endpoint_key().unwrap().clone();

    assert_eq!(broker_copy.key.as_bytes(), sub_copy.key.as_bytes());
    assert_eq!(broker_copy.peer, HostAddress(2));
    assert_eq!(sub_copy.peer, HostAddress(1));
    assert_eq!(
        overlay
            .sink
            .count(|e| matches!(e, KeyEvent::KeyPairCreated { .. })),
        2
    );
}

#[test]
fn test_key_is_renegotiated_only_after_ttl() {
    let overlay = Overlay::new();
    let mut broker = overlay.broker(1);
    let mut sub = overlay.subscriber(2, &[(true, 0, 10)]);

    on_connected(&mut broker, &mut sub, SimTime::ZERO).unwrap();
    let first = sub.endpoint_key().unwrap().key.clone();

    let again = on_connected(&mut broker, &mut sub, SimTime::from_secs(99)).unwrap();
    assert_eq!(again, ContactOutcome::KeyFresh);
    assert_eq!(sub.endpoint_key().unwrap().key, first);

    let renewed = on_connected(&mut broker, &mut sub, SimTime::from_secs(100)).unwrap();
    assert_eq!(renewed, ContactOutcome::KeyExchanged);
    let second = sub.endpoint_key().unwrap();
    assert_ne!(second.key, first);
    assert_eq!(second.created_at, SimTime::from_secs(100));
    assert_eq!(
        broker.as_broker().unwrap().pair_keys().get(sub.id()).unwrap().key,
        second.key
    );
}

#[test]
fn test_subscriber_enrolled_with_two_brokers_opens_both() {
    let overlay = Overlay::new();
    let mut b1 = overlay.broker(1);
    let mut b2 = overlay.broker(2);
    let mut sub = overlay.subscriber(11, &[(true, 0, 10)]);
    let mut p1 = overlay.publisher(21, &[(true, 3)]);
    let mut p2 = overlay.publisher(22, &[(true, 8)]);

    enroll(&mut b1, &mut sub, SimTime::ZERO);
    // The subscriber's single slot now holds b2's key; b1's copy is unexpired but stale
    enroll(&mut b2, &mut sub, SimTime::from_secs(1));
    recompute_groups(&mut b1, SimTime::from_secs(1));
    recompute_groups(&mut b2, SimTime::from_secs(1));
    deliver_events(&mut b1, &mut p1, SimTime::from_secs(1));
    deliver_events(&mut b2, &mut p2, SimTime::from_secs(1));

    for (broker, at) in [(&mut b1, 2), (&mut b2, 3)] {
        let now = SimTime::from_secs(at);
        let outcome = on_connected(broker, &mut sub, now).unwrap();
        assert_eq!(outcome, ContactOutcome::KeyExchanged);
        assert_eq!(
            broker.as_broker().unwrap().pair_keys().get(sub.id()).unwrap().key,
            sub.endpoint_key().unwrap().key
        );

        dispatch_pending(broker, now).unwrap();
        let encrypted = broker.outbox().unwrap();
        let sender = broker.id().clone();
        let result = on_application_payload(&mut sub, &encrypted, &sender, now).unwrap();
        assert_eq!(result, PayloadOutcome::Opened { messages: 1 });
    }

    assert!(sub.received_events().contains(&point(3)));
    assert!(sub.received_events().contains(&point(8)));

    // Matching copies are left alone
    let again = on_connected(&mut b2, &mut sub, SimTime::from_secs(4)).unwrap();
    assert_eq!(again, ContactOutcome::KeyFresh);
}

#[test]
fn test_duplicate_memory_follows_latest_outbox() {
    let overlay = Overlay::new();
    let now = SimTime::ZERO;
    let mut broker = overlay.broker(1);
    let mut sub = overlay.subscriber(11, &[(true, 0, 10)]);
    let mut early = overlay.publisher(20, &[(true, 2)]);
    let mut late = overlay.publisher(21, &[(true, 6)]);

    enroll(&mut broker, &mut sub, now);
    recompute_groups(&mut broker, now);

    deliver_events(&mut broker, &mut early, now);
    dispatch_pending(&mut broker, now).unwrap();
    let first = broker.outbox().unwrap();
    let result = on_application_payload(&mut sub, &first, &HostAddress(1), now).unwrap();
    assert_eq!(result, PayloadOutcome::Opened { messages: 1 });
    assert_eq!(sub.as_subscriber().unwrap().remembered_ciphertexts(), 1);

    deliver_events(&mut broker, &mut late, now);
    dispatch_pending(&mut broker, now).unwrap();
    let second = broker.outbox().unwrap();
    assert_ne!(first, second);
    let result = on_application_payload(&mut sub, &second, &HostAddress(1), now).unwrap();
    assert_eq!(result, PayloadOutcome::Opened { messages: 1 });
    // The replaced outbox is forgotten
    assert_eq!(sub.as_subscriber().unwrap().remembered_ciphertexts(), 1);

    let result = on_application_payload(&mut sub, &second, &HostAddress(1), now).unwrap();
    assert_eq!(result, PayloadOutcome::Opened { messages: 0 });
    assert_eq!(sub.received_events(), [point(2), point(6)].into());
}

#[test]
fn test_ineligible_pairs_are_noops() {
    let overlay = Overlay::new();
    let mut sub = overlay.subscriber(2, &[(true, 0, 10)]);
    let mut other = overlay.subscriber(3, &[(true, 0, 10)]);
    let mut publisher = overlay.publisher(4, &[(true, 5)]);

    assert_eq!(
        on_connected(&mut sub, &mut other, SimTime::ZERO).unwrap(),
        ContactOutcome::Ineligible
    );
    assert_eq!(
        on_connected(&mut publisher, &mut sub, SimTime::ZERO).unwrap(),
        ContactOutcome::Ineligible
    );
    assert!(sub.endpoint_key().is_none());
    assert!(overlay.sink.events().is_empty());
}

#[test]
fn test_overlap_scenario_end_to_end() {
    let overlay = Overlay::new();
    let now = SimTime::ZERO;
    let mut broker = overlay.broker(1);
    let mut s1 = overlay.subscriber(11, &[(true, 0, 10)]);
    let mut s2 = overlay.subscriber(12, &[(true, 5, 15)]);
    let mut publisher = overlay.publisher(20, &[(true, 7)]);

    enroll(&mut broker, &mut s1, now);
    enroll(&mut broker, &mut s2, now);
    assert_eq!(recompute_groups(&mut broker, now), Some(3));

    let both: MemberSet<HostAddress> = [HostAddress(11), HostAddress(12)].into();
    let segments = broker.as_broker().unwrap().segments().to_vec();
    assert_eq!((segments[1].start, segments[1].end), (5, 10));
    assert_eq!(segments[1].members, both);

    deliver_events(&mut broker, &mut publisher, now);
    let outcome = dispatch_pending(&mut broker, now).unwrap();
    assert_eq!(outcome.matched_segments, 1);
    assert_eq!(outcome.bundles.len(), 1);
    assert!(broker.as_broker().unwrap().cache().find(&both).is_some());
    assert!(broker.as_broker().unwrap().pending_events().is_empty());

    let encrypted = broker.outbox().unwrap();
    for sub in [&mut s1, &mut s2] {
        let result = on_application_payload(sub, &encrypted, &HostAddress(1), now).unwrap();
        assert_eq!(result, PayloadOutcome::Opened { messages: 1 });
        assert!(sub.received_events().contains(&point(7)));
    }

    // Re-delivery of the same payload is not opened twice
    let result = on_application_payload(&mut s1, &encrypted, &HostAddress(1), now).unwrap();
    assert_eq!(result, PayloadOutcome::Opened { messages: 0 });
    assert_eq!(
        overlay
            .sink
            .count(|e| matches!(e, KeyEvent::MessageOpened { .. })),
        2
    );
}

#[test]
fn test_non_member_cannot_open() {
    let overlay = Overlay::new();
    let now = SimTime::ZERO;
    let mut broker = overlay.broker(1);
    let mut member = overlay.subscriber(11, &[(true, 0, 4)]);
    let mut outsider = overlay.subscriber(12, &[(false, 20, 25)]);
    let mut publisher = overlay.publisher(20, &[(true, 2)]);

    enroll(&mut broker, &mut member, now);
    enroll(&mut broker, &mut outsider, now);
    recompute_groups(&mut broker, now);
    deliver_events(&mut broker, &mut publisher, now);
    dispatch_pending(&mut broker, now).unwrap();

    let encrypted = broker.outbox().unwrap();
    let result = on_application_payload(&mut outsider, &encrypted, &HostAddress(1), now).unwrap();
    assert_eq!(result, PayloadOutcome::Opened { messages: 0 });
    assert!(outsider.received_events().is_empty());
}

#[test]
fn test_subscriber_without_key_ignores_payloads() {
    let overlay = Overlay::new();
    let mut sub = overlay.subscriber(11, &[(true, 0, 4)]);
    let payload = ApplicationPayload::Encrypted(vec![]);

    let result = on_application_payload(&mut sub, &payload, &HostAddress(1), SimTime::ZERO);
    assert_eq!(result.unwrap(), PayloadOutcome::Ignored);
    assert!(sub.subscribe(SimTime::ZERO).is_none());
}

#[test]
fn test_unchanged_members_reuse_group_key() {
    let overlay = Overlay::new();
    let mut broker = overlay.broker(1);
    let mut sub = overlay.subscriber(11, &[(true, 0, 10)]);
    let mut publisher = overlay.publisher(20, &[(true, 3)]);

    enroll(&mut broker, &mut sub, SimTime::ZERO);
    recompute_groups(&mut broker, SimTime::ZERO);

    deliver_events(&mut broker, &mut publisher, SimTime::ZERO);
    let first = dispatch_pending(&mut broker, SimTime::ZERO).unwrap();
    deliver_events(&mut broker, &mut publisher, SimTime::from_secs(10));
    let second = dispatch_pending(&mut broker, SimTime::from_secs(10)).unwrap();

    assert_eq!(first.keys_created, 1);
    assert_eq!(second.keys_created, 0);
    assert_eq!(broker.as_broker().unwrap().cache().len(), 1);
}

#[test]
fn test_membership_change_creates_new_key() {
    let overlay = Overlay::new();
    let now = SimTime::ZERO;
    let mut broker = overlay.broker(1);
    let mut s1 = overlay.subscriber(11, &[(true, 0, 10)]);
    let mut s2 = overlay.subscriber(12, &[(true, 0, 10)]);
    let mut publisher = overlay.publisher(20, &[(true, 3)]);

    enroll(&mut broker, &mut s1, now);
    recompute_groups(&mut broker, now);
    deliver_events(&mut broker, &mut publisher, now);
    dispatch_pending(&mut broker, now).unwrap();

    enroll(&mut broker, &mut s2, now);
    recompute_groups(&mut broker, now);
    deliver_events(&mut broker, &mut publisher, now);
    let outcome = dispatch_pending(&mut broker, now).unwrap();

    assert_eq!(outcome.keys_created, 1);
    let cache = broker.as_broker().unwrap().cache();
    assert_eq!(cache.len(), 2);
    let single: MemberSet<HostAddress> = [HostAddress(11)].into();
    let pair: MemberSet<HostAddress> = [HostAddress(11), HostAddress(12)].into();
    assert_ne!(cache.find(&single), cache.find(&pair));
}

#[test]
fn test_brokers_reconcile_caches_and_pair_keys() {
    let overlay = Overlay::new();
    let now = SimTime::ZERO;
    let mut b1 = overlay.broker(1);
    let mut b2 = overlay.broker(2);
    let mut sub = overlay.subscriber(11, &[(true, 0, 10)]);
    let mut publisher = overlay.publisher(20, &[(true, 3)]);

    // Only b1 ever meets the subscriber
    enroll(&mut b1, &mut sub, now);
    recompute_groups(&mut b1, now);
    deliver_events(&mut b1, &mut publisher, now);
    dispatch_pending(&mut b1, now).unwrap();

    let outcome = on_connected(&mut b1, &mut b2, SimTime::from_secs(1)).unwrap();
    assert_eq!(
        outcome,
        ContactOutcome::CachesReconciled {
            entries: 1,
            pair_keys_shared: 2,
        }
    );
    assert_eq!(b1.as_broker().unwrap().cache(), b2.as_broker().unwrap().cache());

    // b2 learned the subscriber's interest and key through its own contacts
    let filters = sub.subscribe(SimTime::from_secs(1)).unwrap();
    on_application_payload(&mut b2, &filters, &HostAddress(11), SimTime::from_secs(1)).unwrap();
    recompute_groups(&mut b2, SimTime::from_secs(1));
    let events = ApplicationPayload::Events(vec![point(4)]);
    on_application_payload(&mut b2, &events, &HostAddress(20), SimTime::from_secs(1)).unwrap();
    let dispatched = dispatch_pending(&mut b2, SimTime::from_secs(1)).unwrap();

    assert_eq!(dispatched.keys_created, 0);
    assert_eq!(dispatched.bundles.len(), 1);

    let encrypted = b2.outbox().unwrap();
    on_application_payload(&mut sub, &encrypted, &HostAddress(2), SimTime::from_secs(1)).unwrap();
    assert!(sub.received_events().contains(&point(4)));
}

#[test]
fn test_pair_key_sharing_can_be_disabled() {
    let overlay = Overlay::with_policy(KeyPolicy {
        share_pair_keys: false,
        ..KeyPolicy::default()
    });
    let mut b1 = overlay.broker(1);
    let mut b2 = overlay.broker(2);
    let mut sub = overlay.subscriber(11, &[(true, 0, 10)]);

    on_connected(&mut b1, &mut sub, SimTime::ZERO).unwrap();
    let outcome = on_connected(&mut b1, &mut b2, SimTime::ZERO).unwrap();

    assert_eq!(
        outcome,
        ContactOutcome::CachesReconciled {
            entries: 0,
            pair_keys_shared: 0,
        }
    );
    assert!(b2.as_broker().unwrap().pair_keys().is_empty());
}

#[test]
fn test_reconcile_drops_expired_entries_on_both_sides() {
    let overlay = Overlay::new();
    let mut b1 = overlay.broker(1);
    let mut b2 = overlay.broker(2);
    let mut sub = overlay.subscriber(11, &[(true, 0, 10)]);
    let mut publisher = overlay.publisher(20, &[(true, 3)]);

    enroll(&mut b1, &mut sub, SimTime::ZERO);
    recompute_groups(&mut b1, SimTime::ZERO);
    deliver_events(&mut b1, &mut publisher, SimTime::ZERO);
    dispatch_pending(&mut b1, SimTime::ZERO).unwrap();
    on_connected(&mut b1, &mut b2, SimTime::ZERO).unwrap();
    assert_eq!(b2.as_broker().unwrap().cache().len(), 1);

    let outcome = on_connected(&mut b2, &mut b1, SimTime::from_secs(50)).unwrap();
    assert!(matches!(
        outcome,
        ContactOutcome::CachesReconciled { entries: 0, .. }
    ));
    assert!(b1.as_broker().unwrap().cache().is_empty());
    assert!(b2.as_broker().unwrap().cache().is_empty());
}

#[test]
fn test_interest_expiry_shrinks_groups() {
    let overlay = Overlay::with_policy(KeyPolicy {
        interest_ttl: Some(Duration::from_secs(30)),
        ..KeyPolicy::long_lived()
    });
    let mut broker = overlay.broker(1);
    let mut s1 = overlay.subscriber(11, &[(true, 0, 10)]);
    let mut s2 = overlay.subscriber(12, &[(true, 5, 15)]);

    enroll(&mut broker, &mut s1, SimTime::ZERO);
    enroll(&mut broker, &mut s2, SimTime::from_secs(20));
    assert_eq!(recompute_groups(&mut broker, SimTime::from_secs(20)), Some(3));

    // s1's ranges were submitted at t=0 and expire at t=30
    assert_eq!(recompute_groups(&mut broker, SimTime::from_secs(30)), Some(1));
    let remaining: MemberSet<HostAddress> = [HostAddress(12)].into();
    let segments = broker.as_broker().unwrap().segments();
    assert_eq!(segments[0].members, remaining);
    assert_eq!(
        overlay
            .sink
            .count(|e| matches!(e, KeyEvent::GroupsRecomputed { .. })),
        2
    );
}

#[test]
fn test_retracted_interest_leaves_groups() {
    let overlay = Overlay::new();
    let mut broker = overlay.broker(1);
    let mut s1 = overlay.subscriber(11, &[(true, 0, 10)]);
    let mut s2 = overlay.subscriber(12, &[(true, 5, 15)]);

    enroll(&mut broker, &mut s1, SimTime::ZERO);
    enroll(&mut broker, &mut s2, SimTime::ZERO);
    assert_eq!(broker.retract_interest(&HostAddress(11)), 1);
    assert_eq!(recompute_groups(&mut broker, SimTime::ZERO), Some(1));
}

#[test]
fn test_dispatch_requires_broker() {
    let overlay = Overlay::new();
    let mut sub = overlay.subscriber(11, &[(true, 0, 10)]);
    assert!(dispatch_pending(&mut sub, SimTime::ZERO).is_err());
    assert_eq!(recompute_groups(&mut sub, SimTime::ZERO), None);
}
