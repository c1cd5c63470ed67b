//! Set differences between cached and authoritative state.
//!
//! Both differs are pure: They never touch a [`CacheStore`](`crate::cache::CacheStore`) or [`Renderer`](`crate::render::Renderer`),
//! which makes it possible to compute a complete diff before anything is applied.

use crate::entry::{fold_key, order_key, Entry, Field, Snapshot, Uid};
use core::ops::Deref;
use hashbrown::HashSet;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{instrument, trace};

/// Where a newly added item goes, relative to items that are already displayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Anchor<K> {
	/// Insert directly before this existing item.
	Before(K),
	/// Insert after all existing items.
	Append,
}
impl<K> Anchor<K> {
	#[must_use]
	pub fn as_ref(&self) -> Anchor<&K> {
		match self {
			Anchor::Before(k) => Anchor::Before(k),
			Anchor::Append => Anchor::Append,
		}
	}

	#[must_use]
	pub fn as_deref(&self) -> Anchor<&K::Target>
	where
		K: Deref,
	{
		match self {
			Anchor::Before(k) => Anchor::Before(&**k),
			Anchor::Append => Anchor::Append,
		}
	}
}

/// An addition together with its insertion position hint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Added<K> {
	pub key: K,
	pub anchor: Anchor<K>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookDiff {
	/// Names present before but not anymore, sorted.
	pub removed: Vec<String>,
	/// New names in display order. Applying them in sequence (after the removals) keeps books sorted.
	pub added: Vec<Added<String>>,
}
impl BookDiff {
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.removed.is_empty() && self.added.is_empty()
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryDiff {
	/// Uids present before but not anymore, sorted.
	pub removed: Vec<Uid>,
	/// New uids in display order, anchored among the prior entries that survive this diff.
	pub added: Vec<Added<Uid>>,
	/// Field-level changes of uids present on both sides.
	pub changed: BTreeMap<Uid, BTreeSet<Field>>,
	/// Whether any change touched a field that [`order_key`] depends on.
	pub reorder_needed: bool,
}
impl EntryDiff {
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.removed.is_empty() && self.added.is_empty() && self.changed.is_empty()
	}
}

/// Diffs the cached book names against the authoritative list.
///
/// Books are matched by exact name. A rename therefore shows up as one removal and one addition.
///
/// Each added name is anchored before the first surviving prior name that sorts after it case-insensitively,
/// or appended if there is none.
#[instrument(skip(prior, authoritative))]
pub fn diff_books<'a>(prior: impl IntoIterator<Item = &'a str>, authoritative: impl IntoIterator<Item = &'a str>) -> BookDiff {
	let prior: HashSet<&str> = prior.into_iter().collect();
	let next: HashSet<&str> = authoritative.into_iter().collect();

	let mut removed: Vec<String> = prior.difference(&next).map(|&name| name.to_owned()).collect();
	removed.sort_unstable();

	let mut survivors: Vec<(String, &str)> = prior.intersection(&next).map(|&name| (fold_key(name), name)).collect();
	survivors.sort_unstable();

	let mut added: Vec<(String, &str)> = next.difference(&prior).map(|&name| (fold_key(name), name)).collect();
	added.sort_unstable();

	let added = added
		.into_iter()
		.map(|(folded, name)| Added {
			key: name.to_owned(),
			anchor: anchor_among(&survivors, &(folded, name)).map_or(Anchor::Append, |&(_, before)| Anchor::Before(before.to_owned())),
		})
		.collect();

	let diff = BookDiff { removed, added };
	trace!(removed = diff.removed.len(), added = diff.added.len(), "Diffed book names.");
	diff
}

/// Diffs two snapshots of the same book.
///
/// Snapshots that share their allocation are equal without further inspection.
#[instrument(skip(prior, next), fields(prior.len = prior.len(), next.len = next.len()))]
pub fn diff_entries(prior: &Snapshot, next: &Snapshot) -> EntryDiff {
	if Snapshot::ptr_eq(prior, next) {
		trace!("Identical snapshot reference.");
		return EntryDiff::default();
	}

	let mut removed = Vec::new();
	let mut survivors = Vec::with_capacity(prior.len());
	let mut changed = BTreeMap::new();
	for (uid, old) in prior.iter() {
		match next.get(uid.as_str()) {
			None => removed.push(uid.clone()),
			Some(new) => {
				survivors.push((fold_key(&order_key(old)), uid));
				let fields = changed_fields(old, new);
				if !fields.is_empty() {
					changed.insert(uid.clone(), fields);
				}
			}
		}
	}
	removed.sort_unstable();
	survivors.sort_unstable();

	let mut added: Vec<(String, &Uid)> = next
		.iter()
		.filter(|(uid, _)| !prior.contains(uid.as_str()))
		.map(|(uid, entry)| (fold_key(&order_key(entry)), uid))
		.collect();
	added.sort_unstable();

	let added = added
		.iter()
		.map(|added| Added {
			key: added.1.clone(),
			anchor: anchor_among(&survivors, added).map_or(Anchor::Append, |&(_, before)| Anchor::Before(before.clone())),
		})
		.collect();

	let reorder_needed = changed.values().any(|fields: &BTreeSet<Field>| fields.iter().any(Field::affects_order));

	let diff = EntryDiff {
		removed,
		added,
		changed,
		reorder_needed,
	};
	trace!(
		removed = diff.removed.len(),
		added = diff.added.len(),
		changed = diff.changed.len(),
		reorder_needed = diff.reorder_needed,
		"Diffed entries."
	);
	diff
}

/// Lists the fields whose values differ between two versions of one entry.
///
/// Uninterpreted fields count as changed when they are present on only one side.
/// `key` is compared in order.
#[must_use]
pub fn changed_fields(old: &Entry, new: &Entry) -> BTreeSet<Field> {
	let mut fields = BTreeSet::new();
	if old == new {
		return fields;
	}

	if old.comment != new.comment {
		fields.insert(Field::Comment);
	}
	if old.key != new.key {
		fields.insert(Field::Key);
	}
	if old.disable != new.disable {
		fields.insert(Field::Disable);
	}
	if old.constant != new.constant {
		fields.insert(Field::Constant);
	}
	if old.vectorized != new.vectorized {
		fields.insert(Field::Vectorized);
	}
	for name in old.extra.keys().chain(new.extra.keys()) {
		if old.extra.get(name) != new.extra.get(name) {
			fields.insert(Field::Other(name.clone()));
		}
	}
	fields
}

/// Finds the first of the sorted `existing` items that sorts strictly after `item`.
fn anchor_among<'a, T: Ord>(existing: &'a [T], item: &T) -> Option<&'a T> {
	existing.get(existing.partition_point(|existing| existing <= item))
}
