#![allow(dead_code)]

use lorebook_sync::{Entry, Snapshot, Uid};

/// An entry whose single keyword is its lowercased title.
pub fn entry(uid: &str, comment: &str) -> Entry {
	Entry::new(uid, comment, [comment.to_lowercase()])
}

pub fn snapshot(entries: impl IntoIterator<Item = Entry>) -> Snapshot {
	entries.into_iter().collect()
}

pub fn uids(uids: &[&str]) -> Vec<Uid> {
	uids.iter().map(|&uid| Uid::from(uid)).collect()
}

/// A snapshot that stores `entry` under `key` instead of its own uid.
pub fn misfiled(key: &str, entry: Entry) -> Snapshot {
	let mut entries = hashbrown::HashMap::new();
	entries.insert(Uid::from(key), entry);
	Snapshot::capture(&entries)
}
