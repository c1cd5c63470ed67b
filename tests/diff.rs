use lorebook_sync::{
	diff::{changed_fields, diff_books, diff_entries, Added, Anchor},
	entry::Field,
	Snapshot, Uid,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::BTreeSet;

mod fixtures_;
use fixtures_::{entry, snapshot, uids};

fn fields(fields: impl IntoIterator<Item = Field>) -> BTreeSet<Field> {
	fields.into_iter().collect()
}

#[test]
fn disable_and_add() {
	let prior = snapshot([entry("1", "Zebra"), entry("2", "Apple")]);
	let mut zebra = entry("1", "Zebra");
	zebra.disable = true;
	let next = snapshot([zebra, entry("2", "Apple"), entry("3", "Mango")]);

	let diff = diff_entries(&prior, &next);
	assert!(diff.removed.is_empty());
	assert_eq!(
		diff.added,
		vec![Added {
			key: Uid::from("3"),
			anchor: Anchor::Before(Uid::from("1")),
		}]
	);
	assert_eq!(diff.changed.len(), 1);
	assert_eq!(diff.changed[&Uid::from("1")], fields([Field::Disable]));
	assert!(!diff.reorder_needed);
	assert_eq!(next.display_order(), uids(&["2", "3", "1"]));
}

#[test]
fn same_snapshot_is_clean() {
	let prior = snapshot([entry("1", "Zebra"), entry("2", "Apple")]);
	assert!(diff_entries(&prior, &prior.clone()).is_empty());

	let copy = snapshot([entry("1", "Zebra"), entry("2", "Apple")]);
	assert!(diff_entries(&prior, &copy).is_empty());
}

#[test]
fn anchors_skip_removed_entries() {
	let prior = snapshot([entry("1", "Apple"), entry("2", "Banana")]);
	let next = snapshot([entry("2", "Banana"), entry("3", "Avocado")]);

	let diff = diff_entries(&prior, &next);
	assert_eq!(diff.removed, uids(&["1"]));
	assert_eq!(diff.added[0].anchor, Anchor::Before(Uid::from("2")));
}

#[test]
fn ties_are_broken_by_uid() {
	let prior = snapshot([entry("5", "Same")]);
	let next = snapshot([entry("5", "Same"), entry("4", "Same"), entry("6", "Same")]);

	let diff = diff_entries(&prior, &next);
	assert_eq!(
		diff.added,
		vec![
			Added {
				key: Uid::from("4"),
				anchor: Anchor::Before(Uid::from("5")),
			},
			Added {
				key: Uid::from("6"),
				anchor: Anchor::Append,
			},
		]
	);
}

#[test]
fn added_entries_are_in_display_order() {
	let prior = Snapshot::default();
	let next = snapshot([entry("1", "charlie"), entry("2", "Bravo"), entry("3", "alpha")]);

	let diff = diff_entries(&prior, &next);
	let added: Vec<_> = diff.added.iter().map(|added| added.key.clone()).collect();
	assert_eq!(added, uids(&["3", "2", "1"]));
	assert!(diff.added.iter().all(|added| added.anchor == Anchor::Append));
}

#[test]
fn key_change_without_comment_needs_reorder() {
	let mut old = entry("1", "");
	old.key = vec!["a".to_owned()];
	let mut new = old.clone();
	new.key = vec!["z".to_owned()];

	let diff = diff_entries(&snapshot([old]), &snapshot([new]));
	assert_eq!(diff.changed[&Uid::from("1")], fields([Field::Key]));
	assert!(diff.reorder_needed);
}

#[test]
fn uninterpreted_fields() {
	let mut old = entry("1", "Apple");
	old.extra.insert("order".to_owned(), json!(100));
	old.extra.insert("probability".to_owned(), json!(50));
	let mut new = old.clone();
	new.extra.insert("order".to_owned(), json!(200));
	new.extra.remove("probability");
	new.extra.insert("depth".to_owned(), json!(4));

	assert_eq!(
		changed_fields(&old, &new),
		fields([
			Field::Other("depth".to_owned()),
			Field::Other("order".to_owned()),
			Field::Other("probability".to_owned()),
		])
	);

	let diff = diff_entries(&snapshot([old]), &snapshot([new]));
	assert!(!diff.reorder_needed);
}

#[test]
fn book_anchors() {
	let diff = diff_books(["Beta", "delta"], ["alpha", "Beta", "Charlie", "delta", "Echo"]);
	assert!(diff.removed.is_empty());
	assert_eq!(
		diff.added,
		vec![
			Added {
				key: "alpha".to_owned(),
				anchor: Anchor::Before("Beta".to_owned()),
			},
			Added {
				key: "Charlie".to_owned(),
				anchor: Anchor::Before("delta".to_owned()),
			},
			Added {
				key: "Echo".to_owned(),
				anchor: Anchor::Append,
			},
		]
	);
}

#[test]
fn book_removal_and_append() {
	let diff = diff_books(["C", "A", "B"], ["B", "Bb"]);
	assert_eq!(diff.removed, vec!["A".to_owned(), "C".to_owned()]);
	assert_eq!(
		diff.added,
		vec![Added {
			key: "Bb".to_owned(),
			anchor: Anchor::Append,
		}]
	);
}

#[test]
fn book_rename_is_remove_and_add() {
	let diff = diff_books(["Old name"], ["New name"]);
	assert_eq!(diff.removed, vec!["Old name".to_owned()]);
	assert_eq!(diff.added.len(), 1);
	assert_eq!(diff.added[0].key, "New name");
	assert_eq!(diff.added[0].anchor, Anchor::Append);
}

#[test]
fn unchanged_books() {
	assert!(diff_books(["a", "b"], ["b", "a"]).is_empty());
	assert!(diff_books(Vec::<&str>::new(), Vec::<&str>::new()).is_empty());
}
