use core::time::Duration;
use serde::Deserialize;

/// Tunables of the [`Dispatcher`](`crate::dispatch::Dispatcher`).
///
/// Missing fields fall back to their defaults when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Quiet period after the last change notification before a pass starts, in milliseconds.
	pub debounce_ms: u64,
}
impl Default for Config {
	fn default() -> Self {
		Self { debounce_ms: 300 }
	}
}
impl Config {
	#[must_use]
	pub fn with_debounce(debounce: Duration) -> Self {
		Self {
			debounce_ms: u64::try_from(debounce.as_millis()).unwrap_or(u64::MAX),
		}
	}

	#[must_use]
	pub fn debounce(&self) -> Duration {
		Duration::from_millis(self.debounce_ms)
	}

	pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
		serde_json::from_str(json)
	}
}
