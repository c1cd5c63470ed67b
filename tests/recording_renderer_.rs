#![allow(dead_code)]

use lorebook_sync::{
	diff::Anchor,
	entry::{Entry, FieldUpdate, Strategy, Uid},
	render::Renderer,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
	Comment(Option<String>),
	Key(Vec<String>),
	Enabled(bool),
	Strategy(Strategy),
	Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
	MountBook { name: String, before: Option<String>, active: bool },
	UnmountBook(String),
	MountEntry { book: String, uid: String, before: Option<String> },
	UnmountEntry { book: String, uid: String },
	Update { book: String, uid: String, update: Update },
	Reorder { book: String, order: Vec<String> },
	SetActive { book: String, active: bool },
	BookFiltered { book: String, filtered: bool },
	EntryFiltered { book: String, uid: String, filtered: bool },
	SetFocus { book: String, uid: String },
	ClearFocus,
	Reveal { book: String, uid: String },
	SettingsView(bool),
}

/// Per-book handle that mirrors what a real view would show.
#[derive(Debug)]
pub struct BookView {
	pub name: String,
	pub entries: Vec<Uid>,
}

/// Records every call and keeps a model of the rendered drawer, panicking on inconsistent requests.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
	pub calls: Vec<Call>,
	pub books: Vec<String>,
}
impl RecordingRenderer {
	pub fn take_calls(&mut self) -> Vec<Call> {
		std::mem::take(&mut self.calls)
	}

	pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
		self.calls.iter().filter(|call| predicate(call)).count()
	}
}

impl Renderer for RecordingRenderer {
	type Book = BookView;

	fn mount_book(&mut self, name: &str, anchor: Anchor<&str>, active: bool) -> BookView {
		assert!(!self.books.iter().any(|book| book == name), "book {:?} mounted twice", name);
		let before = match anchor {
			Anchor::Before(before) => {
				let position = self.books.iter().position(|book| book == before).expect("anchor book not rendered");
				self.books.insert(position, name.to_owned());
				Some(before.to_owned())
			}
			Anchor::Append => {
				self.books.push(name.to_owned());
				None
			}
		};
		self.calls.push(Call::MountBook {
			name: name.to_owned(),
			before,
			active,
		});
		BookView {
			name: name.to_owned(),
			entries: Vec::new(),
		}
	}

	fn unmount_book(&mut self, book: BookView) {
		let position = self.books.iter().position(|name| *name == book.name).expect("unmounting unrendered book");
		self.books.remove(position);
		self.calls.push(Call::UnmountBook(book.name));
	}

	fn mount_entry(&mut self, book: &mut BookView, entry: &Entry, anchor: Anchor<&Uid>) {
		assert!(!book.entries.contains(&entry.uid), "duplicate uid {} in {:?}", entry.uid, book.name);
		let before = match anchor {
			Anchor::Before(before) => {
				let position = book.entries.iter().position(|uid| uid == before).expect("anchor entry not rendered");
				book.entries.insert(position, entry.uid.clone());
				Some(before.to_string())
			}
			Anchor::Append => {
				book.entries.push(entry.uid.clone());
				None
			}
		};
		self.calls.push(Call::MountEntry {
			book: book.name.clone(),
			uid: entry.uid.to_string(),
			before,
		});
	}

	fn unmount_entry(&mut self, book: &mut BookView, uid: &Uid) {
		let position = book.entries.iter().position(|mounted| mounted == uid).expect("unmounting unrendered entry");
		book.entries.remove(position);
		self.calls.push(Call::UnmountEntry {
			book: book.name.clone(),
			uid: uid.to_string(),
		});
	}

	fn update_entry_field(&mut self, book: &mut BookView, uid: &Uid, update: FieldUpdate<'_>) {
		assert!(book.entries.contains(uid), "updating unrendered entry {}", uid);
		let update = match update {
			FieldUpdate::Comment(comment) => Update::Comment(comment.map(ToOwned::to_owned)),
			FieldUpdate::Key(key) => Update::Key(key.to_vec()),
			FieldUpdate::Enabled(enabled) => Update::Enabled(enabled),
			FieldUpdate::Strategy(strategy) => Update::Strategy(strategy),
			FieldUpdate::Other { name, .. } => Update::Other(name.to_owned()),
		};
		self.calls.push(Call::Update {
			book: book.name.clone(),
			uid: uid.to_string(),
			update,
		});
	}

	fn reorder(&mut self, book: &mut BookView, ordered: &[Uid]) {
		let mut before = book.entries.clone();
		let mut after = ordered.to_vec();
		before.sort();
		after.sort();
		assert_eq!(before, after, "reorder changes the set of entries");
		book.entries = ordered.to_vec();
		self.calls.push(Call::Reorder {
			book: book.name.clone(),
			order: ordered.iter().map(ToString::to_string).collect(),
		});
	}

	fn set_focus(&mut self, book: &mut BookView, entry: &Entry) {
		assert!(book.entries.contains(&entry.uid), "focusing unrendered entry {}", entry.uid);
		self.calls.push(Call::SetFocus {
			book: book.name.clone(),
			uid: entry.uid.to_string(),
		});
	}

	fn clear_focus(&mut self) {
		self.calls.push(Call::ClearFocus);
	}

	fn set_book_active(&mut self, book: &mut BookView, active: bool) {
		self.calls.push(Call::SetActive {
			book: book.name.clone(),
			active,
		});
	}

	fn set_book_filtered(&mut self, book: &mut BookView, filtered: bool) {
		self.calls.push(Call::BookFiltered {
			book: book.name.clone(),
			filtered,
		});
	}

	fn set_entry_filtered(&mut self, book: &mut BookView, uid: &Uid, filtered: bool) {
		assert!(book.entries.contains(uid), "filtering unrendered entry {}", uid);
		self.calls.push(Call::EntryFiltered {
			book: book.name.clone(),
			uid: uid.to_string(),
			filtered,
		});
	}

	fn reveal_entry(&mut self, book: &mut BookView, uid: &Uid) {
		self.calls.push(Call::Reveal {
			book: book.name.clone(),
			uid: uid.to_string(),
		});
	}

	fn set_settings_view(&mut self, open: bool) {
		self.calls.push(Call::SettingsView(open));
	}
}
