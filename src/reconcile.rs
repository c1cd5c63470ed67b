//! One synchronization pass: books first, then (optionally) one targeted book's entries.
//!
//! Within a pass, removals are always applied before additions and additions before updates,
//! so that a uid is never mounted twice at any intermediate step.

use crate::{
	cache::CacheStore,
	diff::{diff_books, diff_entries, Added, BookDiff, EntryDiff},
	entry::{Entry, Snapshot, Strategy, Uid},
	filter::Filter,
	host::Host,
	load,
	render::Renderer,
	Error,
};
use hashbrown::HashSet;
use tracing::{debug, instrument, trace, trace_span, warn};

/// What a change notification carries.
///
/// An untargeted change (both fields [`None`]) only resynchronizes the set of books.
#[derive(Debug, Clone, Default)]
pub struct Change {
	pub book: Option<String>,
	/// The book's new entries. If [`None`] for a targeted change, they are fetched from the host.
	pub entries: Option<Snapshot>,
}
impl Change {
	#[must_use]
	pub fn books() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn book(book: impl Into<String>, entries: Snapshot) -> Self {
		Self {
			book: Some(book.into()),
			entries: Some(entries),
		}
	}
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
	pub books: BookDiff,
	/// Added books whose entries couldn't be fetched or were malformed. They stay absent and are retried by the next pass.
	pub skipped: Vec<String>,
	/// The entry diff of the targeted book, if there was one and it still exists.
	pub entries: Option<EntryDiff>,
	/// Whether the targeted book's entries were physically reordered.
	pub reordered: bool,
}

/// An added book whose entries were fetched and validated, ready to be mounted.
struct Prepared {
	name: String,
	entries: Snapshot,
	active: bool,
}

/// Applies authoritative host state to a [`CacheStore`].
///
/// All mutating operations take `&mut self`, so passes can't overlap.
pub struct Reconciler<H, R: Renderer> {
	host: H,
	store: CacheStore<R>,
}
impl<H: Host, R: Renderer> Reconciler<H, R> {
	#[must_use]
	pub fn new(host: H, renderer: R) -> Self {
		Self {
			host,
			store: CacheStore::new(renderer),
		}
	}

	pub fn host(&self) -> &H {
		&self.host
	}

	pub fn store(&self) -> &CacheStore<R> {
		&self.store
	}

	pub fn store_mut(&mut self) -> &mut CacheStore<R> {
		&mut self.store
	}

	/// Builds the drawer from scratch. Equivalent to an untargeted pass on an empty cache.
	pub async fn load(&mut self) -> Result<PassReport, Error> {
		self.pass(Change::books()).await
	}

	/// Runs one reconciliation pass.
	///
	/// Everything the pass needs from the host is fetched and validated before the cache is touched.
	/// A malformed or unfetchable payload for the targeted book rejects the whole pass,
	/// while an added book that can't be fetched or is malformed is only skipped.
	#[instrument(skip(self, change), fields(book = ?change.book, with_entries = change.entries.is_some()))]
	pub async fn pass(&mut self, change: Change) -> Result<PassReport, Error> {
		if let (Some(book), Some(entries)) = (&change.book, &change.entries) {
			load::validate(book, entries)?;
		}

		let names = self.host.list_book_names().await.map_err(|source| Error::ListBooks { source })?;
		let diff = diff_books(self.store.book_names(), names.iter().map(String::as_str));

		let mut target = None;
		if let Some(book) = change.book {
			let listed = names.iter().any(|name| *name == book);
			let entries = match change.entries {
				Some(entries) => Some(entries),
				None if listed && self.store.contains_book(&book) => {
					let entries = self.host.fetch_book_entries(&book).await.map_err(|source| Error::Fetch { book: book.clone(), source })?;
					load::validate(&book, &entries)?;
					Some(entries)
				}
				None => None,
			};
			target = Some((book, entries));
		}

		let mut report = PassReport::default();
		let prepared = self.prepare_books(&diff, &mut report).await;
		self.apply_books(&diff, prepared);
		report.books = diff;

		if let Some((book, entries)) = target {
			// A book that was only just mounted is already up to date.
			let next = entries.or_else(|| self.store.snapshot(&book).cloned());
			match next {
				Some(next) if self.store.contains_book(&book) => {
					let (diff, reordered) = self.sync_entries(&book, next);
					report.entries = Some(diff);
					report.reordered = reordered;
				}
				_ => trace!("Targeted book {:?} doesn't exist (anymore).", book),
			}
		}

		debug!(
			books.removed = report.books.removed.len(),
			books.added = report.books.added.len(),
			books.skipped = report.skipped.len(),
			entries.changed = report.entries.as_ref().map_or(0, |diff| diff.removed.len() + diff.added.len() + diff.changed.len()),
			reordered = report.reordered,
			"Pass complete."
		);
		Ok(report)
	}

	/// Fetches and validates the entries of each added book, without touching the cache.
	///
	/// Books that fail either step are reported as skipped and left out.
	async fn prepare_books(&self, diff: &BookDiff, report: &mut PassReport) -> Vec<Prepared> {
		let mut prepared = Vec::with_capacity(diff.added.len());
		for Added { key: name, .. } in &diff.added {
			let entries = match self.host.fetch_book_entries(name).await {
				Ok(entries) => entries,
				Err(error) => {
					warn!("Failed to fetch lorebook {:?}, skipping it for now: {}", name, error);
					report.skipped.push(name.clone());
					continue;
				}
			};
			if let Err(error) = load::validate(name, &entries) {
				warn!("Skipping lorebook for now: {}", error);
				report.skipped.push(name.clone());
				continue;
			}
			prepared.push(Prepared {
				name: name.clone(),
				entries,
				active: false,
			});
		}

		if !prepared.is_empty() {
			match self.host.active_book_names().await {
				Ok(active) => {
					let active: HashSet<String> = active.into_iter().collect();
					for book in &mut prepared {
						book.active = active.contains(&book.name);
					}
				}
				Err(error) => warn!("Failed to read active lorebooks, mounting as inactive: {}", error),
			}
		}
		prepared
	}

	fn apply_books(&mut self, diff: &BookDiff, prepared: Vec<Prepared>) {
		for name in &diff.removed {
			let span = trace_span!("Removing book", name = name.as_str());
			let _enter = span.enter();
			self.store.remove_book(name);
		}

		let mut prepared = prepared.into_iter().peekable();
		for Added { key: name, anchor } in &diff.added {
			let book = match prepared.next_if(|book| book.name == *name) {
				Some(book) => book,
				None => continue,
			};
			let span = trace_span!("Adding book", name = name.as_str(), ?anchor);
			let _enter = span.enter();
			self.store.upsert_book(name, book.entries, anchor.as_deref(), book.active);
		}
	}

	fn sync_entries(&mut self, book: &str, next: Snapshot) -> (EntryDiff, bool) {
		let prior = match self.store.snapshot(book) {
			Some(prior) => prior.clone(),
			None => return (EntryDiff::default(), false),
		};
		let diff = diff_entries(&prior, &next);

		for uid in &diff.removed {
			self.store.remove_entry(book, uid);
		}
		for Added { key: uid, anchor } in &diff.added {
			if let Some(entry) = next.get(uid.as_str()) {
				self.store.upsert_entry(book, entry.clone(), anchor.as_ref());
			}
		}
		for (uid, fields) in &diff.changed {
			if let Some(entry) = next.get(uid.as_str()) {
				self.store.update_entry(book, entry.clone(), fields);
			}
		}

		let reorder = diff.reorder_needed || !diff.added.is_empty();
		self.store.replace_snapshot(book, next.clone());
		let reordered = reorder && self.store.reorder_entries(book, &next.display_order());
		(diff, reordered)
	}

	/// Resynchronizes each book's "globally active" state.
	#[instrument(skip(self))]
	pub async fn settings_changed(&mut self) -> Result<usize, Error> {
		let active = self.host.active_book_names().await.map_err(|source| Error::ActiveBooks { source })?;
		let active: HashSet<&str> = active.iter().map(String::as_str).collect();
		Ok(self.store.sync_active(&active))
	}

	/// Closes the settings view, reveals the entry and opens it in the editor unless it already is.
	///
	/// The entry is expected to exist. If it doesn't, nothing happens.
	#[instrument(skip(self))]
	pub fn jump_to_entry(&mut self, book: &str, uid: &Uid) -> bool {
		if self.store.entry(book, uid.as_str()).is_none() {
			warn!("Can't jump to missing entry {} in {:?}.", uid, book);
			return false;
		}

		self.store.close_settings_view();
		self.store.reveal_entry(book, uid);
		let focused = self.store.focus().map_or(false, |focus| focus.book == book && &focus.uid == uid);
		if !focused {
			self.store.set_focus(book, uid);
		}
		true
	}

	/// Replaces the drawer's filter. Books and entries mounted by later passes are filtered too.
	pub fn set_filter(&mut self, filter: Filter) -> bool {
		self.store.set_filter(filter)
	}

	/// The user picked an entry.
	pub fn select_entry(&mut self, book: &str, uid: &Uid) -> bool {
		self.store.set_focus(book, uid)
	}

	pub fn open_settings_view(&mut self) {
		self.store.open_settings_view();
	}

	/// The drawer was shown or hidden.
	pub fn visibility_changed(&mut self, visible: bool) {
		if visible {
			self.store.refocus();
		}
	}

	/// Enables or disables an entry locally and saves the book.
	pub async fn set_entry_enabled(&mut self, book: &str, uid: &Uid, enabled: bool) -> Result<bool, Error> {
		self.edit_and_save(book, uid, |entry| entry.disable = !enabled).await
	}

	/// Changes an entry's activation strategy locally and saves the book.
	pub async fn set_entry_strategy(&mut self, book: &str, uid: &Uid, strategy: Strategy) -> Result<bool, Error> {
		self.edit_and_save(book, uid, |entry| entry.set_strategy(strategy)).await
	}

	#[instrument(skip(self, edit))]
	async fn edit_and_save(&mut self, book: &str, uid: &Uid, edit: impl FnOnce(&mut Entry)) -> Result<bool, Error> {
		let snapshot = match self.store.edit_entry(book, uid, edit) {
			Some(snapshot) => snapshot,
			None => {
				trace!("Entry vanished before the edit.");
				return Ok(false);
			}
		};
		self.host
			.save_book_entries(book, &snapshot)
			.await
			.map_err(|source| Error::Save { book: book.to_owned(), source })?;
		Ok(true)
	}
}
