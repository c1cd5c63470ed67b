//! Construction of [`Snapshot`]s from host payloads.
//!
//! Hosts deliver a book as `{"entries": {"<uid>": {<entry>}, …}}`.
//! Anything that doesn't fit the data model is rejected as [`Error::Malformed`] as a whole,
//! since no recovery policy exists for partially corrupt books.

use crate::{
	entry::{Entry, Snapshot},
	Error,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{instrument, trace};

#[derive(Deserialize)]
struct BookPayload {
	entries: serde_json::Map<String, Value>,
}

/// Parses a book payload from its JSON text.
#[instrument(skip(json), fields(json.len = json.len()))]
pub fn snapshot_from_str(book: &str, json: &str) -> Result<Snapshot, Error> {
	let value: Value = serde_json::from_str(json).map_err(|error| malformed(book, error))?;
	snapshot_from_json(book, value)
}

/// Parses a book payload from an already decoded JSON value.
#[instrument(skip(payload))]
pub fn snapshot_from_json(book: &str, payload: Value) -> Result<Snapshot, Error> {
	let BookPayload { entries: raw } = serde_json::from_value(payload).map_err(|error| malformed(book, error))?;

	let mut entries = Vec::with_capacity(raw.len());
	for (key, value) in raw {
		let entry: Entry = serde_json::from_value(value).map_err(|error| Error::Malformed {
			book: book.to_owned(),
			reason: format!("entry {:?}: {}", key, describe(&error)),
		})?;
		if entry.uid.as_str() != key {
			return Err(Error::Malformed {
				book: book.to_owned(),
				reason: format!("entry stored under {:?} has uid {:?}", key, entry.uid.as_str()),
			});
		}
		entries.push(entry);
	}

	trace!("Loaded {} entries.", entries.len());
	Ok(entries.into_iter().collect())
}

/// Checks that every entry of `snapshot` is stored under its own uid.
pub fn validate(book: &str, snapshot: &Snapshot) -> Result<(), Error> {
	match snapshot.iter().find(|(uid, entry)| **uid != entry.uid) {
		None => Ok(()),
		Some((uid, entry)) => Err(Error::Malformed {
			book: book.to_owned(),
			reason: format!("entry stored under {:?} has uid {:?}", uid.as_str(), entry.uid.as_str()),
		}),
	}
}

fn malformed(book: &str, error: serde_json::Error) -> Error {
	Error::Malformed {
		book: book.to_owned(),
		reason: describe(&error),
	}
}

/// serde_json's messages quote offending payload values, which may be user content.
fn describe(error: &serde_json::Error) -> String {
	if cfg!(feature = "dangerous-logging") {
		error.to_string()
	} else {
		format!("{:?} error at line {} column {}", error.classify(), error.line(), error.column())
	}
}
