use crate::{entry::Snapshot, error::HostError};
use async_trait::async_trait;
use std::sync::Arc;

/// The authoritative source of lorebooks.
///
/// All methods are suspension points of a reconciliation pass.
#[async_trait]
pub trait Host: Send + Sync {
	/// Names of all existing books, in no particular order.
	async fn list_book_names(&self) -> Result<Vec<String>, HostError>;

	/// The full entry payload of one book.
	async fn fetch_book_entries(&self, book: &str) -> Result<Snapshot, HostError>;

	/// Names of the books that are globally active.
	async fn active_book_names(&self) -> Result<Vec<String>, HostError>;

	/// Persists a book after a local edit.
	async fn save_book_entries(&self, book: &str, entries: &Snapshot) -> Result<(), HostError>;
}

#[async_trait]
impl<H: Host + ?Sized> Host for Arc<H> {
	async fn list_book_names(&self) -> Result<Vec<String>, HostError> {
		(**self).list_book_names().await
	}

	async fn fetch_book_entries(&self, book: &str) -> Result<Snapshot, HostError> {
		(**self).fetch_book_entries(book).await
	}

	async fn active_book_names(&self) -> Result<Vec<String>, HostError> {
		(**self).active_book_names().await
	}

	async fn save_book_entries(&self, book: &str, entries: &Snapshot) -> Result<(), HostError> {
		(**self).save_book_entries(book, entries).await
	}
}
