use lorebook_sync::{
	load::{snapshot_from_json, snapshot_from_str, validate},
	Config, Error, Snapshot, Strategy, Uid,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;

#[test]
fn numeric_and_textual_uids() {
	let snapshot = snapshot_from_str(
		"Fruit",
		r#"{"entries": {
			"0": {"uid": 0, "comment": "Zebra", "key": ["zebra", "stripes"], "constant": true},
			"a1": {"uid": "a1", "comment": "", "key": ["apple"], "disable": true, "order": 100}
		}}"#,
	)
	.unwrap();

	assert_eq!(snapshot.len(), 2);
	let zebra = snapshot.get("0").unwrap();
	assert_eq!(zebra.uid, Uid::from(0_u64));
	assert_eq!(zebra.strategy(), Strategy::Constant);
	assert!(zebra.is_enabled());

	let apple = snapshot.get("a1").unwrap();
	assert_eq!(apple.order_key(), "apple");
	assert!(!apple.is_enabled());
	assert_eq!(apple.extra.get("order"), Some(&json!(100)));
	assert_eq!(snapshot.display_order(), [Uid::from("a1"), Uid::from(0_u64)]);
}

#[test]
fn uninterpreted_fields_survive_serialization() {
	let snapshot = snapshot_from_json("Fruit", json!({"entries": {"5": {"uid": 5, "key": ["k"], "depth": 4}}})).unwrap();
	let round_trip: Snapshot = serde_json::from_value(serde_json::to_value(&snapshot).unwrap()).unwrap();
	assert_eq!(round_trip, snapshot);
	assert_eq!(round_trip.get("5").unwrap().extra.get("depth"), Some(&json!(4)));
}

#[test]
fn mismatched_key_is_malformed() {
	let result = snapshot_from_json("Fruit", json!({"entries": {"1": {"uid": 2, "key": []}}}));
	assert!(matches!(result, Err(Error::Malformed { ref book, .. }) if book == "Fruit"));
}

#[test]
fn missing_key_is_malformed() {
	let result = snapshot_from_json("Fruit", json!({"entries": {"1": {"uid": 1, "comment": "No keywords"}}}));
	assert!(matches!(result, Err(Error::Malformed { .. })));
}

#[test]
#[cfg(not(feature = "dangerous-logging"))]
fn malformed_reason_doesnt_quote_content() {
	let result = snapshot_from_json("Fruit", json!({"entries": {"1": {"uid": 1, "key": "Secret Garden"}}}));
	match result {
		Err(Error::Malformed { reason, .. }) => {
			assert!(reason.starts_with("entry \"1\": Data error"), "{}", reason);
			assert!(!reason.contains("Secret Garden"), "{}", reason);
		}
		other => panic!("expected a malformed book, got {:?}", other),
	}

	match snapshot_from_str("Fruit", r#"{"entries": {"1": {"uid": 1, "key": ["Secret Garden"]"#) {
		Err(Error::Malformed { reason, .. }) => assert!(!reason.contains("Secret Garden"), "{}", reason),
		other => panic!("expected a malformed book, got {:?}", other),
	}
}

#[test]
fn wrong_shape_is_malformed() {
	assert!(matches!(snapshot_from_str("Fruit", "[]"), Err(Error::Malformed { .. })));
	assert!(matches!(snapshot_from_str("Fruit", "{\"entries\": "), Err(Error::Malformed { .. })));
	assert!(matches!(snapshot_from_json("Fruit", json!({})), Err(Error::Malformed { .. })));
}

#[test]
fn collected_snapshots_are_valid() {
	let snapshot = snapshot_from_json("Fruit", json!({"entries": {}})).unwrap();
	assert!(snapshot.is_empty());
	validate("Fruit", &snapshot).unwrap();

	let snapshot = snapshot_from_json("Fruit", json!({"entries": {"3": {"uid": 3, "key": []}, "x": {"uid": "x", "key": []}}})).unwrap();
	validate("Fruit", &snapshot).unwrap();
	assert!(snapshot.as_map().iter().all(|(uid, entry)| *uid == entry.uid));
	assert_eq!(snapshot.as_map().len(), snapshot.len());
}

#[test]
fn config() {
	assert_eq!(Config::default().debounce(), Duration::from_millis(300));
	assert_eq!(Config::from_json("{}").unwrap(), Config::default());
	assert_eq!(Config::from_json(r#"{"debounce_ms": 50}"#).unwrap().debounce(), Duration::from_millis(50));
	assert_eq!(Config::with_debounce(Duration::from_secs(1)).debounce_ms, 1000);
}
