//! The drawer's book filter: a search query, optionally extended to entry titles, and an "only globally active" toggle.
//!
//! Filtering works on cached state only. It never asks the host for anything.

use crate::entry::{fold_key, Entry, Snapshot};

/// What the drawer currently shows.
///
/// The default filter hides nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
	/// Case-folded.
	query: String,
	search_entries: bool,
	only_active: bool,
}
impl Filter {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Hides books whose name doesn't contain `query`, ignoring case. An empty query matches everything.
	#[must_use]
	pub fn with_query(mut self, query: &str) -> Self {
		self.query = fold_key(query);
		self
	}

	/// Lets the query match entry titles too.
	///
	/// A book then also stays visible if any of its entries matches,
	/// and within a book that doesn't match by name, only the matching entries are shown.
	#[must_use]
	pub fn searching_entries(mut self, search_entries: bool) -> Self {
		self.search_entries = search_entries;
		self
	}

	/// Hides books that aren't globally active.
	#[must_use]
	pub fn only_active(mut self, only_active: bool) -> Self {
		self.only_active = only_active;
		self
	}

	/// The case-folded query.
	#[must_use]
	pub fn query(&self) -> &str {
		&self.query
	}

	#[must_use]
	pub fn searches_entries(&self) -> bool {
		self.search_entries
	}

	#[must_use]
	pub fn is_only_active(&self) -> bool {
		self.only_active
	}

	/// Whether this filter can't hide anything.
	#[must_use]
	pub fn is_passive(&self) -> bool {
		self.query.is_empty() && !self.only_active
	}

	#[must_use]
	pub fn hides_book(&self, name: &str, active: bool, entries: &Snapshot) -> bool {
		if self.only_active && !active {
			return true;
		}
		if self.query.is_empty() || self.name_matches(name) {
			return false;
		}
		!(self.search_entries && entries.entries().any(|entry| self.title_matches(entry)))
	}

	/// Whether `entry` is hidden inside the book `name`. Says nothing about the book itself.
	#[must_use]
	pub fn hides_entry(&self, name: &str, entry: &Entry) -> bool {
		self.search_entries && !self.query.is_empty() && !self.name_matches(name) && !self.title_matches(entry)
	}

	fn name_matches(&self, name: &str) -> bool {
		fold_key(name).contains(&self.query)
	}

	fn title_matches(&self, entry: &Entry) -> bool {
		entry.comment.as_deref().map_or(false, |comment| fold_key(comment).contains(&self.query))
	}
}
