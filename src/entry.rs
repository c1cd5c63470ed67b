//! Lorebook entries, their display ordering and immutable [`Snapshot`]s of a book's entry set.

use core::{
	borrow::Borrow,
	cmp::Ordering,
	fmt::{self, Display, Formatter},
};
use hashbrown::HashMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::{
	borrow::Cow,
	collections::{BTreeMap, BTreeSet},
	sync::Arc,
};

/// Opaque entry identifier, unique within one book.
///
/// Hosts commonly send these as JSON numbers, so both numbers and strings are accepted when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Uid(String);
impl Uid {
	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Display for Uid {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}
impl Borrow<str> for Uid {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl From<&str> for Uid {
	fn from(uid: &str) -> Self {
		Self(uid.to_owned())
	}
}
impl From<String> for Uid {
	fn from(uid: String) -> Self {
		Self(uid)
	}
}
impl From<u64> for Uid {
	fn from(uid: u64) -> Self {
		Self(uid.to_string())
	}
}
impl<'de> Deserialize<'de> for Uid {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		#[derive(Deserialize)]
		#[serde(untagged)]
		enum Raw {
			Text(String),
			Number(serde_json::Number),
		}

		Ok(match Raw::deserialize(deserializer)? {
			Raw::Text(text) => Self(text),
			Raw::Number(number) => Self(number.to_string()),
		})
	}
}

/// Activation strategy of an [`Entry`], stored on the entry as the two mutually exclusive flags
/// [`constant`](`Entry::constant`) and [`vectorized`](`Entry::vectorized`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
	Normal,
	Constant,
	Vectorized,
}

/// A single lorebook entry.
///
/// Fields the core doesn't interpret are kept in [`extra`](`Entry::extra`) so that they still take part in change detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
	pub uid: Uid,
	/// Display title. Falls back to the joined [`key`](`Entry::key`)s when empty or absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub comment: Option<String>,
	pub key: Vec<String>,
	/// Inverted "enabled" state.
	#[serde(default)]
	pub disable: bool,
	#[serde(default)]
	pub constant: bool,
	#[serde(default)]
	pub vectorized: bool,
	#[serde(flatten)]
	pub extra: BTreeMap<String, Value>,
}
impl Entry {
	#[must_use]
	pub fn new(uid: impl Into<Uid>, comment: impl Into<String>, key: impl IntoIterator<Item = impl Into<String>>) -> Self {
		let comment = comment.into();
		Self {
			uid: uid.into(),
			comment: if comment.is_empty() { None } else { Some(comment) },
			key: key.into_iter().map(Into::into).collect(),
			disable: false,
			constant: false,
			vectorized: false,
			extra: BTreeMap::new(),
		}
	}

	#[must_use]
	pub fn strategy(&self) -> Strategy {
		if self.constant {
			Strategy::Constant
		} else if self.vectorized {
			Strategy::Vectorized
		} else {
			Strategy::Normal
		}
	}

	pub fn set_strategy(&mut self, strategy: Strategy) {
		self.constant = strategy == Strategy::Constant;
		self.vectorized = strategy == Strategy::Vectorized;
	}

	/// Setting `constant` clears `vectorized`.
	pub fn set_constant(&mut self, constant: bool) {
		self.constant = constant;
		if constant {
			self.vectorized = false;
		}
	}

	/// Setting `vectorized` clears `constant`.
	pub fn set_vectorized(&mut self, vectorized: bool) {
		self.vectorized = vectorized;
		if vectorized {
			self.constant = false;
		}
	}

	#[must_use]
	pub fn is_enabled(&self) -> bool {
		!self.disable
	}

	/// The (unfolded) display key of this entry. See [`order_key`].
	#[must_use]
	pub fn order_key(&self) -> Cow<'_, str> {
		order_key(self)
	}

	/// Expands a set of changed fields into the targeted updates a renderer has to apply.
	///
	/// [`Field::Constant`] and [`Field::Vectorized`] collapse into a single [`FieldUpdate::Strategy`].
	#[must_use]
	pub fn field_updates<'a>(&'a self, fields: &'a BTreeSet<Field>) -> Vec<FieldUpdate<'a>> {
		let mut updates = Vec::with_capacity(fields.len());
		let mut strategy_pushed = false;
		for field in fields {
			updates.push(match field {
				Field::Comment => FieldUpdate::Comment(self.comment.as_deref()),
				Field::Key => FieldUpdate::Key(&self.key),
				Field::Disable => FieldUpdate::Enabled(self.is_enabled()),
				Field::Constant | Field::Vectorized => {
					if strategy_pushed {
						continue;
					}
					strategy_pushed = true;
					FieldUpdate::Strategy(self.strategy())
				}
				Field::Other(name) => FieldUpdate::Other {
					name,
					value: self.extra.get(name),
				},
			});
		}
		updates
	}
}

/// Derives the display key of an entry: its comment if non-empty, otherwise its keywords joined with `", "`.
///
/// No case transform is applied here. Compare keys with [`compare_keys`].
#[must_use]
pub fn order_key(entry: &Entry) -> Cow<'_, str> {
	match entry.comment.as_deref() {
		Some(comment) if !comment.is_empty() => Cow::Borrowed(comment),
		_ => Cow::Owned(entry.key.join(", ")),
	}
}

/// Case-folds a display key for comparison.
#[must_use]
pub fn fold_key(key: &str) -> String {
	key.to_lowercase()
}

/// Case-insensitive comparison of two display keys (or book names).
#[must_use]
pub fn compare_keys(a: &str, b: &str) -> Ordering {
	fold_key(a).cmp(&fold_key(b))
}

/// A named field of an [`Entry`], as reported by change detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
	Comment,
	Key,
	Disable,
	Constant,
	Vectorized,
	Other(String),
}
impl Field {
	#[must_use]
	pub fn name(&self) -> &str {
		match self {
			Field::Comment => "comment",
			Field::Key => "key",
			Field::Disable => "disable",
			Field::Constant => "constant",
			Field::Vectorized => "vectorized",
			Field::Other(name) => name,
		}
	}

	/// Whether this field participates in [`order_key`].
	#[must_use]
	pub fn affects_order(&self) -> bool {
		matches!(self, Field::Comment | Field::Key)
	}
}
impl Display for Field {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// A targeted update of one visual aspect of an entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldUpdate<'a> {
	Comment(Option<&'a str>),
	Key(&'a [String]),
	Enabled(bool),
	Strategy(Strategy),
	/// A field the core doesn't interpret. `value` is [`None`] if the field was removed.
	Other { name: &'a str, value: Option<&'a Value> },
}

/// An immutable copy of a book's entries at one point in time.
///
/// Cloning a [`Snapshot`] is cheap and shares the underlying map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(Arc<HashMap<Uid, Entry>>);
impl Snapshot {
	/// Deep-copies `entries`.
	#[must_use]
	pub fn capture(entries: &HashMap<Uid, Entry>) -> Self {
		Self(Arc::new(entries.clone()))
	}

	#[must_use]
	pub fn get(&self, uid: &str) -> Option<&Entry> {
		self.0.get(uid)
	}

	#[must_use]
	pub fn contains(&self, uid: &str) -> bool {
		self.0.contains_key(uid)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&Uid, &Entry)> {
		self.0.iter()
	}

	pub fn entries(&self) -> impl Iterator<Item = &Entry> {
		self.0.values()
	}

	#[must_use]
	pub fn as_map(&self) -> &HashMap<Uid, Entry> {
		&self.0
	}

	/// Whether both snapshots share the same allocation.
	#[must_use]
	pub fn ptr_eq(a: &Self, b: &Self) -> bool {
		Arc::ptr_eq(&a.0, &b.0)
	}

	/// Uids in display order: by folded [`order_key`], ties broken by uid.
	#[must_use]
	pub fn display_order(&self) -> Vec<Uid> {
		let mut entries: Vec<&Entry> = self.0.values().collect();
		entries.sort_by_cached_key(|entry| (fold_key(&order_key(entry)), entry.uid.clone()));
		entries.into_iter().map(|entry| entry.uid.clone()).collect()
	}

	/// Copy-on-write access for the cache's own bookkeeping.
	pub(crate) fn make_mut(&mut self) -> &mut HashMap<Uid, Entry> {
		Arc::make_mut(&mut self.0)
	}
}
impl PartialEq for Snapshot {
	fn eq(&self, other: &Self) -> bool {
		Self::ptr_eq(self, other) || self.0 == other.0
	}
}
impl FromIterator<Entry> for Snapshot {
	fn from_iter<T: IntoIterator<Item = Entry>>(iter: T) -> Self {
		Self(Arc::new(iter.into_iter().map(|entry| (entry.uid.clone(), entry)).collect()))
	}
}
