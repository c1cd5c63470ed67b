//! Process-lifetime state of the drawer: which books and entries are mounted, in which order, and which entry is focused.

use crate::{
	diff::{changed_fields, Anchor},
	entry::{Entry, Field, Snapshot, Uid},
	filter::Filter,
	render::Renderer,
};
use hashbrown::{hash_map::Entry as MapEntry, HashMap, HashSet};
use std::collections::BTreeSet;
use tracing::{instrument, level_filters::STATIC_MAX_LEVEL, trace, warn, Level};

/// The entry that is currently open in the editor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Focus {
	pub book: String,
	pub uid: Uid,
}

struct BookState<B> {
	snapshot: Snapshot,
	/// Uids in the order they are currently rendered.
	order: Vec<Uid>,
	active: bool,
	/// Whether the book is currently hidden by the [`Filter`].
	filtered: bool,
	/// Mounted entries that are currently hidden by the [`Filter`].
	filtered_entries: HashSet<Uid>,
	handle: B,
}

/// Derived, best-effort mirror of the host's lorebooks, kept in sync with a [`Renderer`].
///
/// All operations on books or entries that don't exist (anymore) are no-ops that return `false` or [`None`].
/// The host is the source of truth and the store may legitimately lag behind it.
pub struct CacheStore<R: Renderer> {
	renderer: R,
	books: HashMap<String, BookState<R::Book>>,
	/// Book names in the order they are currently rendered.
	book_order: Vec<String>,
	focus: Option<Focus>,
	settings_view: bool,
	filter: Filter,
}
impl<R: Renderer> CacheStore<R> {
	#[must_use]
	pub fn new(renderer: R) -> Self {
		Self {
			renderer,
			books: HashMap::new(),
			book_order: Vec::new(),
			focus: None,
			settings_view: false,
			filter: Filter::default(),
		}
	}

	pub fn renderer(&self) -> &R {
		&self.renderer
	}

	pub fn renderer_mut(&mut self) -> &mut R {
		&mut self.renderer
	}

	/// Book names in rendering order.
	pub fn book_names(&self) -> impl Iterator<Item = &str> {
		self.book_order.iter().map(String::as_str)
	}

	#[must_use]
	pub fn contains_book(&self, book: &str) -> bool {
		self.books.contains_key(book)
	}

	#[must_use]
	pub fn snapshot(&self, book: &str) -> Option<&Snapshot> {
		self.books.get(book).map(|state| &state.snapshot)
	}

	#[must_use]
	pub fn entry(&self, book: &str, uid: &str) -> Option<&Entry> {
		self.snapshot(book)?.get(uid)
	}

	/// Entry uids of `book` in rendering order.
	#[must_use]
	pub fn entry_order(&self, book: &str) -> Option<&[Uid]> {
		self.books.get(book).map(|state| state.order.as_slice())
	}

	#[must_use]
	pub fn handle(&self, book: &str) -> Option<&R::Book> {
		self.books.get(book).map(|state| &state.handle)
	}

	#[must_use]
	pub fn is_active(&self, book: &str) -> Option<bool> {
		self.books.get(book).map(|state| state.active)
	}

	#[must_use]
	pub fn focus(&self) -> Option<&Focus> {
		self.focus.as_ref()
	}

	#[must_use]
	pub fn settings_view_open(&self) -> bool {
		self.settings_view
	}

	#[must_use]
	pub fn filter(&self) -> &Filter {
		&self.filter
	}

	/// Whether `book` is currently hidden by the filter.
	#[must_use]
	pub fn is_filtered(&self, book: &str) -> Option<bool> {
		self.books.get(book).map(|state| state.filtered)
	}

	/// Whether the entry is currently hidden by the filter.
	#[must_use]
	pub fn is_entry_filtered(&self, book: &str, uid: &str) -> Option<bool> {
		let state = self.books.get(book)?;
		state.snapshot.contains(uid).then(|| state.filtered_entries.contains(uid))
	}

	/// Mounts a book with all of its entries in display order, or returns the existing handle.
	///
	/// For an existing book, only the cached snapshot is replaced (and only if it is a different one).
	/// Entry-level changes have to be applied through the entry operations.
	///
	/// An `anchor` that isn't mounted falls back to [`Anchor::Append`].
	#[instrument(skip(self, snapshot), fields(snapshot.len = snapshot.len()))]
	pub fn upsert_book(&mut self, name: &str, snapshot: Snapshot, anchor: Anchor<&str>, active: bool) -> &R::Book {
		let vacant = match self.books.entry(name.to_owned()) {
			MapEntry::Occupied(occupied) => {
				let state = occupied.into_mut();
				if !Snapshot::ptr_eq(&state.snapshot, &snapshot) {
					trace!("Replacing snapshot of mounted book.");
					state.snapshot = snapshot;
					apply_filter(&mut self.renderer, &self.filter, name, state);
				}
				return &state.handle;
			}
			MapEntry::Vacant(vacant) => vacant,
		};

		let (position, anchor) = match anchor {
			Anchor::Before(before) => match self.book_order.iter().position(|name| name == before) {
				Some(position) => (position, Anchor::Before(before)),
				None => {
					warn!("Book anchor {:?} is not mounted. Appending instead.", before);
					(self.book_order.len(), Anchor::Append)
				}
			},
			Anchor::Append => (self.book_order.len(), Anchor::Append),
		};

		let mut handle = self.renderer.mount_book(name, anchor, active);
		let order = snapshot.display_order();
		for uid in &order {
			if let Some(entry) = snapshot.get(uid.as_str()) {
				log_entry("Mounting entry.", entry);
				self.renderer.mount_entry(&mut handle, entry, Anchor::Append);
			}
		}
		self.book_order.insert(position, name.to_owned());

		let state = vacant.insert(BookState {
			snapshot,
			order,
			active,
			filtered: false,
			filtered_entries: HashSet::new(),
			handle,
		});
		apply_filter(&mut self.renderer, &self.filter, name, state);
		&state.handle
	}

	/// Unmounts a book and forgets all of its entries. Clears the focus if it was inside this book.
	#[instrument(skip(self))]
	pub fn remove_book(&mut self, name: &str) -> bool {
		let state = match self.books.remove(name) {
			Some(state) => state,
			None => {
				trace!("Book is not mounted. Nothing to remove.");
				return false;
			}
		};
		self.book_order.retain(|mounted| mounted != name);

		if self.focus.as_ref().map_or(false, |focus| focus.book == name) {
			self.clear_focus();
		}
		self.renderer.unmount_book(state.handle);
		true
	}

	/// Inserts or replaces a single entry.
	///
	/// A new entry is mounted at `anchor` (appended if the anchor isn't mounted).
	/// An existing entry receives targeted updates for the fields that differ.
	#[instrument(skip(self, entry), fields(uid = %entry.uid))]
	pub fn upsert_entry(&mut self, book: &str, entry: Entry, anchor: Anchor<&Uid>) -> bool {
		let state = match self.books.get_mut(book) {
			Some(state) => state,
			None => {
				trace!("Book is not mounted. Ignoring entry.");
				return false;
			}
		};

		if let Some(old) = state.snapshot.get(entry.uid.as_str()) {
			let fields = changed_fields(old, &entry);
			for update in entry.field_updates(&fields) {
				self.renderer.update_entry_field(&mut state.handle, &entry.uid, update);
			}
			state.snapshot.make_mut().insert(entry.uid.clone(), entry);
			apply_filter(&mut self.renderer, &self.filter, book, state);
			return true;
		}

		let (position, anchor) = match anchor {
			Anchor::Before(before) => match state.order.iter().position(|uid| uid == before) {
				Some(position) => (position, Anchor::Before(before)),
				None => {
					warn!("Entry anchor {} is not mounted. Appending instead.", before);
					(state.order.len(), Anchor::Append)
				}
			},
			Anchor::Append => (state.order.len(), Anchor::Append),
		};

		log_entry("Mounting entry.", &entry);
		self.renderer.mount_entry(&mut state.handle, &entry, anchor);
		state.order.insert(position, entry.uid.clone());
		state.snapshot.make_mut().insert(entry.uid.clone(), entry);
		apply_filter(&mut self.renderer, &self.filter, book, state);
		true
	}

	/// Replaces a mounted entry and pushes only the given `fields` to the renderer.
	#[instrument(skip(self, entry), fields(uid = %entry.uid))]
	pub fn update_entry(&mut self, book: &str, entry: Entry, fields: &BTreeSet<Field>) -> bool {
		let state = match self.books.get_mut(book) {
			Some(state) => state,
			None => return false,
		};
		if !state.snapshot.contains(entry.uid.as_str()) {
			trace!("Entry is not mounted. Ignoring update.");
			return false;
		}

		for update in entry.field_updates(fields) {
			self.renderer.update_entry_field(&mut state.handle, &entry.uid, update);
		}
		state.snapshot.make_mut().insert(entry.uid.clone(), entry);
		apply_filter(&mut self.renderer, &self.filter, book, state);
		true
	}

	/// Unmounts an entry. Clears the focus if it was this entry.
	#[instrument(skip(self))]
	pub fn remove_entry(&mut self, book: &str, uid: &Uid) -> bool {
		let state = match self.books.get_mut(book) {
			Some(state) => state,
			None => return false,
		};
		if state.snapshot.make_mut().remove(uid.as_str()).is_none() {
			trace!("Entry is not mounted. Nothing to remove.");
			return false;
		}
		state.order.retain(|mounted| mounted != uid);
		state.filtered_entries.remove(uid);
		self.renderer.unmount_entry(&mut state.handle, uid);
		apply_filter(&mut self.renderer, &self.filter, book, state);

		if self.focus.as_ref().map_or(false, |focus| focus.book == book && &focus.uid == uid) {
			self.clear_focus();
		}
		true
	}

	/// Applies `ordered` as the new rendering order, unless it is positionally identical to the current one.
	///
	/// Returns whether the renderer was asked to reorder.
	#[instrument(skip(self, ordered), fields(ordered.len = ordered.len()))]
	pub fn reorder_entries(&mut self, book: &str, ordered: &[Uid]) -> bool {
		let state = match self.books.get_mut(book) {
			Some(state) => state,
			None => return false,
		};
		if state.order == ordered {
			trace!("Order unchanged.");
			return false;
		}

		if STATIC_MAX_LEVEL >= Level::WARN {
			let mounted: HashSet<&Uid> = state.order.iter().collect();
			if ordered.len() != mounted.len() || !ordered.iter().all(|uid| mounted.contains(uid)) {
				warn!("Requested order doesn't match the mounted entries: {:?} vs. {:?}", ordered, state.order);
			}
		}

		self.renderer.reorder(&mut state.handle, ordered);
		state.order = ordered.to_vec();
		true
	}

	/// Replaces the cached snapshot of a mounted book without touching the renderer.
	pub fn replace_snapshot(&mut self, book: &str, snapshot: Snapshot) -> bool {
		match self.books.get_mut(book) {
			Some(state) => {
				state.snapshot = snapshot;
				apply_filter(&mut self.renderer, &self.filter, book, state);
				true
			}
			None => false,
		}
	}

	/// Applies a local edit to one entry and returns the book's new snapshot, for saving.
	#[instrument(skip(self, edit))]
	pub fn edit_entry(&mut self, book: &str, uid: &Uid, edit: impl FnOnce(&mut Entry)) -> Option<Snapshot> {
		let state = self.books.get_mut(book)?;
		let old = state.snapshot.get(uid.as_str())?;

		let mut entry = old.clone();
		edit(&mut entry);
		let fields = changed_fields(old, &entry);
		for update in entry.field_updates(&fields) {
			self.renderer.update_entry_field(&mut state.handle, uid, update);
		}
		if fields.iter().any(Field::affects_order) {
			warn!("Local edit changed the display key of {}; order will be fixed by the next pass.", uid);
		}

		state.snapshot.make_mut().insert(uid.clone(), entry);
		apply_filter(&mut self.renderer, &self.filter, book, state);
		Some(state.snapshot.clone())
	}

	/// Updates each book's "globally active" state from the names in `active`.
	/// The filter is re-applied to books whose state changed.
	///
	/// Returns how many books changed.
	#[instrument(skip(self, active))]
	pub fn sync_active(&mut self, active: &HashSet<&str>) -> usize {
		let mut changed = 0;
		for (name, state) in &mut self.books {
			let is_active = active.contains(name.as_str());
			if state.active != is_active {
				state.active = is_active;
				self.renderer.set_book_active(&mut state.handle, is_active);
				apply_filter(&mut self.renderer, &self.filter, name, state);
				changed += 1;
			}
		}
		trace!("{} book(s) changed active state.", changed);
		changed
	}

	/// Replaces the filter and re-applies it to every mounted book and entry.
	///
	/// Returns whether the filter changed.
	#[instrument(skip(self))]
	pub fn set_filter(&mut self, filter: Filter) -> bool {
		if self.filter == filter {
			trace!("Filter unchanged.");
			return false;
		}
		self.filter = filter;
		for (name, state) in &mut self.books {
			apply_filter(&mut self.renderer, &self.filter, name, state);
		}
		true
	}

	/// Focuses an entry and opens it in the editor, closing the settings view if necessary.
	#[instrument(skip(self))]
	pub fn set_focus(&mut self, book: &str, uid: &Uid) -> bool {
		let state = match self.books.get_mut(book) {
			Some(state) => state,
			None => return false,
		};
		let entry = match state.snapshot.get(uid.as_str()) {
			Some(entry) => entry,
			None => {
				trace!("Entry is not mounted. Not focusing.");
				return false;
			}
		};

		if self.settings_view {
			self.settings_view = false;
			self.renderer.set_settings_view(false);
		}
		self.renderer.set_focus(&mut state.handle, entry);
		self.focus = Some(Focus {
			book: book.to_owned(),
			uid: uid.clone(),
		});
		true
	}

	pub fn clear_focus(&mut self) {
		if self.focus.take().is_some() {
			self.renderer.clear_focus();
		}
	}

	/// Opens the editor for the current focus again, e.g. after the drawer was hidden.
	pub fn refocus(&mut self) -> bool {
		let focus = match self.focus.clone() {
			Some(focus) => focus,
			None => return false,
		};
		if !self.set_focus(&focus.book, &focus.uid) {
			warn!("Stale focus {:?}. Clearing it.", focus);
			self.clear_focus();
			return false;
		}
		true
	}

	/// Expands the entry's book and scrolls the entry into view.
	pub fn reveal_entry(&mut self, book: &str, uid: &Uid) -> bool {
		match self.books.get_mut(book) {
			Some(state) if state.snapshot.contains(uid.as_str()) => {
				self.renderer.reveal_entry(&mut state.handle, uid);
				true
			}
			_ => false,
		}
	}

	/// Switches to the global settings view. This is mutually exclusive with an open editor.
	pub fn open_settings_view(&mut self) {
		self.clear_focus();
		if !self.settings_view {
			self.settings_view = true;
			self.renderer.set_settings_view(true);
		}
	}

	pub fn close_settings_view(&mut self) {
		if self.settings_view {
			self.settings_view = false;
			self.renderer.set_settings_view(false);
		}
	}
}

/// Brings the renderer's filter state of one book and its mounted entries in line with `filter`.
fn apply_filter<R: Renderer>(renderer: &mut R, filter: &Filter, name: &str, state: &mut BookState<R::Book>) {
	if filter.is_passive() && !state.filtered && state.filtered_entries.is_empty() {
		return;
	}

	let filtered = filter.hides_book(name, state.active, &state.snapshot);
	if filtered != state.filtered {
		state.filtered = filtered;
		renderer.set_book_filtered(&mut state.handle, filtered);
	}

	for uid in &state.order {
		let hidden = match state.snapshot.get(uid.as_str()) {
			Some(entry) => filter.hides_entry(name, entry),
			None => continue,
		};
		let changed = if hidden {
			state.filtered_entries.insert(uid.clone())
		} else {
			state.filtered_entries.remove(uid)
		};
		if changed {
			renderer.set_entry_filtered(&mut state.handle, uid, hidden);
		}
	}
}

fn log_entry(message: &str, entry: &Entry) {
	if cfg!(feature = "dangerous-logging") {
		trace!(uid = %entry.uid, title = %entry.order_key(), "{}", message);
	} else {
		trace!(uid = %entry.uid, "{}", message);
	}
}
