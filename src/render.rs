use crate::{
	diff::Anchor,
	entry::{Entry, FieldUpdate, Uid},
};

/// The visual side of the drawer.
///
/// The core never reads state back from a [`Renderer`]. Everything it needs to know
/// (what is mounted, in which order, what is focused) is tracked by the [`CacheStore`](`crate::cache::CacheStore`),
/// which calls into this trait only when the view actually has to change.
///
/// Entry-scoped callbacks receive the [`Book`](`Renderer::Book`) handle returned by [`mount_book`](`Renderer::mount_book`).
pub trait Renderer {
	/// Per-book rendering handle, opaque to the core.
	type Book;

	/// Creates the view of a book, without entries, before the book named in `anchor`.
	fn mount_book(&mut self, name: &str, anchor: Anchor<&str>, active: bool) -> Self::Book;

	/// Tears down a book's view, including all of its entries.
	fn unmount_book(&mut self, book: Self::Book);

	fn mount_entry(&mut self, book: &mut Self::Book, entry: &Entry, anchor: Anchor<&Uid>);

	fn unmount_entry(&mut self, book: &mut Self::Book, uid: &Uid);

	/// Applies one targeted change to an entry that stays mounted.
	fn update_entry_field(&mut self, book: &mut Self::Book, uid: &Uid, update: FieldUpdate<'_>);

	/// Moves the book's entries into `ordered`, which contains each mounted uid exactly once.
	fn reorder(&mut self, book: &mut Self::Book, ordered: &[Uid]);

	/// Opens the editor for `entry`.
	fn set_focus(&mut self, book: &mut Self::Book, entry: &Entry);

	/// Closes the editor.
	fn clear_focus(&mut self);

	/// Reflects whether a book is globally active.
	fn set_book_active(&mut self, book: &mut Self::Book, active: bool) {
		let _ = (book, active);
	}

	/// Hides or shows a book according to the drawer's [`Filter`](`crate::filter::Filter`).
	fn set_book_filtered(&mut self, book: &mut Self::Book, filtered: bool) {
		let _ = (book, filtered);
	}

	/// Hides or shows a mounted entry according to the drawer's [`Filter`](`crate::filter::Filter`).
	fn set_entry_filtered(&mut self, book: &mut Self::Book, uid: &Uid, filtered: bool) {
		let _ = (book, uid, filtered);
	}

	/// Expands the book and scrolls the entry into view.
	fn reveal_entry(&mut self, book: &mut Self::Book, uid: &Uid) {
		let _ = (book, uid);
	}

	/// Shows or hides the global settings view, which shares the editor's space.
	fn set_settings_view(&mut self, open: bool) {
		let _ = open;
	}
}
