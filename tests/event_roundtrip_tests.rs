// Copyright (c) 2025 - Cowboy AI, LLC.

//! Wire round trips and decode failures for every event variant

use budget_events::{
    AccountClosed, AccountCreated, AccountNameChanged, CompatibilityMode, Event, EventError,
    EventPayload, EventSerializer, SerializerConfig, VectorClock,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use test_case::test_case;

fn dev_a(count: u64, payload: impl Into<EventPayload>) -> Event {
    Event::create(
        "account-1",
        "dev-A",
        VectorClock::from_entries([("dev-A", count)]),
        payload,
    )
    .unwrap()
}

#[test]
fn account_created_round_trip_keeps_every_field() -> anyhow::Result<()> {
    let event = dev_a(1, AccountCreated::new("Checking"));
    let serializer = EventSerializer::new();

    let decoded = serializer.decode(&serializer.encode(&event)?)?;

    match decoded.payload() {
        EventPayload::AccountCreated(created) => assert_eq!(created.name, "Checking"),
        other => panic!("expected AccountCreated, got {other:?}"),
    }
    assert_eq!(decoded.event_id(), event.event_id());
    assert_eq!(decoded.aggregate_id(), event.aggregate_id());
    assert_eq!(decoded.device_id().as_str(), "dev-A");
    assert_eq!(decoded.timestamp(), event.timestamp());
    assert_eq!(decoded.vector_clock(), &VectorClock::from_entries([("dev-A", 1)]));
    assert_eq!(decoded, event);
    Ok(())
}

#[test]
fn account_name_changed_round_trip() -> anyhow::Result<()> {
    let event = dev_a(2, AccountNameChanged::new("Savings"));
    let serializer = EventSerializer::new();
    let decoded = serializer.decode(&serializer.encode(&event)?)?;
    assert_eq!(decoded, event);
    assert_eq!(decoded.vector_clock().get("dev-A"), 2);
    Ok(())
}

#[test_case(SerializerConfig::lenient() ; "lenient")]
#[test_case(SerializerConfig::strict() ; "strict")]
#[test_case(SerializerConfig { pretty: true, ..SerializerConfig::default() } ; "pretty")]
fn every_variant_round_trips(config: SerializerConfig) {
    let serializer = EventSerializer::with_config(config);
    let events = [
        dev_a(1, AccountCreated::new("Checking")),
        dev_a(2, AccountNameChanged::new("Savings")),
        dev_a(3, AccountClosed::new()),
    ];
    for event in events {
        let bytes = serializer.encode(&event).unwrap();
        assert_eq!(serializer.decode(&bytes).unwrap(), event);
    }
}

#[test]
fn unknown_discriminator_is_rejected_with_context() {
    let event = dev_a(1, AccountCreated::new("Checking"));
    let serializer = EventSerializer::new();
    let mut envelope: serde_json::Value =
        serde_json::from_slice(&serializer.encode(&event).unwrap()).unwrap();
    envelope["type"] = json!("TransactionImported");

    let err = serializer
        .decode(&serde_json::to_vec(&envelope).unwrap())
        .unwrap_err();

    assert!(err.is_unknown_event_type());
    assert!(matches!(
        &err,
        EventError::UnknownEventType { event_type, .. } if event_type == "TransactionImported"
    ));
    assert_eq!(err.event_id(), Some(event.event_id().to_string().as_str()));
    assert_eq!(err.aggregate_id(), Some("account-1"));
}

#[test]
fn truncated_buffer_is_malformed() {
    let serializer = EventSerializer::new();
    let bytes = serializer
        .encode(&dev_a(1, AccountCreated::new("Checking")))
        .unwrap();

    for cut in [0, 1, bytes.len() / 3, bytes.len() / 2, bytes.len() - 1] {
        let err = serializer.decode(&bytes[..cut]).unwrap_err();
        assert!(err.is_malformed(), "cut at {cut}: {err}");
    }
}

#[test]
fn strict_mode_rejects_extra_payload_fields_lenient_ignores_them() {
    let event = dev_a(1, AccountCreated::new("Checking"));
    let mut envelope: serde_json::Value =
        serde_json::from_slice(&EventSerializer::new().encode(&event).unwrap()).unwrap();
    envelope["payload"]["currency"] = json!("EUR");
    let bytes = serde_json::to_vec(&envelope).unwrap();

    let lenient = EventSerializer::with_config(SerializerConfig::lenient());
    assert_eq!(lenient.decode(&bytes).unwrap(), event);

    let strict = EventSerializer::with_config(SerializerConfig::strict());
    assert_eq!(strict.config().compatibility, CompatibilityMode::Strict);
    assert!(strict.decode(&bytes).unwrap_err().is_malformed());
}

fn arb_clock() -> impl Strategy<Value = VectorClock> {
    prop::collection::btree_map("dev-[A-E]", 1u64..1_000, 0..4).prop_map(|mut entries| {
        entries.entry("dev-A".to_string()).or_insert(1);
        VectorClock::from_entries(entries)
    })
}

fn arb_payload() -> impl Strategy<Value = EventPayload> {
    prop_oneof![
        any::<String>().prop_map(|name| EventPayload::from(AccountCreated::new(name))),
        any::<String>().prop_map(|name| EventPayload::from(AccountNameChanged::new(name))),
        Just(EventPayload::from(AccountClosed::new())),
    ]
}

proptest! {
    #[test]
    fn decode_inverts_encode(clock in arb_clock(), payload in arb_payload()) {
        let event = Event::create("account-1", "dev-A", clock, payload).unwrap();
        let serializer = EventSerializer::new();
        let decoded = serializer.decode(&serializer.encode(&event).unwrap()).unwrap();
        prop_assert_eq!(decoded, event);
    }
}

fn encoded_envelope() -> serde_json::Value {
    let event = dev_a(1, AccountCreated::new("Checking"));
    serde_json::from_slice(&EventSerializer::new().encode(&event).unwrap()).unwrap()
}

#[test_case("type" ; "type")]
#[test_case("event_id" ; "event id")]
#[test_case("aggregate_id" ; "aggregate id")]
#[test_case("device_id" ; "device id")]
#[test_case("timestamp" ; "timestamp")]
#[test_case("vector_clock" ; "vector clock")]
#[test_case("payload" ; "payload")]
fn missing_base_field_is_malformed(field: &str) {
    let mut envelope = encoded_envelope();
    envelope.as_object_mut().unwrap().remove(field);

    for config in [SerializerConfig::lenient(), SerializerConfig::strict()] {
        let err = EventSerializer::with_config(config)
            .decode(&serde_json::to_vec(&envelope).unwrap())
            .unwrap_err();
        assert!(err.is_malformed(), "without `{field}`: {err}");
    }
}

#[test_case("type", json!(7) ; "numeric type")]
#[test_case("schema_version", json!("one") ; "textual schema version")]
#[test_case("event_id", json!(42) ; "numeric event id")]
#[test_case("event_id", json!("not-a-uuid") ; "non uuid event id")]
#[test_case("aggregate_id", json!(7) ; "numeric aggregate id")]
#[test_case("aggregate_id", json!("  ") ; "blank aggregate id")]
#[test_case("device_id", json!([]) ; "array device id")]
#[test_case("timestamp", json!("yesterday") ; "unparseable timestamp")]
#[test_case("timestamp", json!(1_700_000_000) ; "numeric timestamp")]
#[test_case("vector_clock", json!([1, 2]) ; "array vector clock")]
#[test_case("vector_clock", json!("dev-A") ; "string vector clock")]
#[test_case("vector_clock", json!({ "dev-A": -1 }) ; "negative counter")]
#[test_case("vector_clock", json!({ "dev-A": "1" }) ; "textual counter")]
#[test_case("vector_clock", json!({}) ; "empty vector clock")]
#[test_case("payload", json!("Checking") ; "string payload")]
#[test_case("payload", json!(null) ; "null payload")]
fn mistyped_base_field_is_malformed(field: &str, value: serde_json::Value) {
    let mut envelope = encoded_envelope();
    envelope[field] = value;

    let err = EventSerializer::new()
        .decode(&serde_json::to_vec(&envelope).unwrap())
        .unwrap_err();
    assert!(err.is_malformed(), "bad `{field}`: {err}");
}
