#![doc(html_root_url = "https://docs.rs/lorebook-sync/0.0.1")]
#![warn(clippy::pedantic)]

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod cache;
pub mod config;
pub mod diff;
pub mod dispatch;
pub mod entry;
mod error;
pub mod filter;
pub mod host;
pub mod load;
pub mod reconcile;
pub mod render;

pub use config::Config;
pub use dispatch::{Dispatcher, Driver, PassState, Settle};
pub use entry::{Entry, Snapshot, Strategy, Uid};
pub use error::{Error, HostError};
pub use filter::Filter;
pub use reconcile::{Change, PassReport, Reconciler};
