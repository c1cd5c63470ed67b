use thiserror::Error;

/// Failures reported by a [`Host`](`crate::host::Host`).
pub type HostError = Box<dyn std::error::Error + Send + Sync>;

/// Everything that can abort or partially fail a reconciliation pass or a local edit.
///
/// Stale references (books or entries that vanished in the meantime) are deliberately **not** represented here:
/// They are expected during races with the host and are handled as no-ops.
#[derive(Debug, Error)]
pub enum Error {
	#[error("failed to list lorebook names")]
	ListBooks {
		#[source]
		source: HostError,
	},

	#[error("failed to read the globally active lorebooks")]
	ActiveBooks {
		#[source]
		source: HostError,
	},

	#[error("failed to fetch entries of lorebook {book:?}")]
	Fetch {
		book: String,
		#[source]
		source: HostError,
	},

	#[error("malformed payload for lorebook {book:?}: {reason}")]
	Malformed { book: String, reason: String },

	#[error("failed to save lorebook {book:?}")]
	Save {
		book: String,
		#[source]
		source: HostError,
	},

	#[error("the dispatcher is no longer running")]
	Closed,
}
