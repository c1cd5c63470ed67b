//! Debounced, strictly sequential execution of reconciliation passes.
//!
//! A [`Dispatcher`] is a cheap, cloneable handle. The [`Driver`] it is paired with owns the [`Reconciler`]
//! and processes commands one at a time, so no two passes (or a pass and a local edit) ever interleave.
//!
//! Change notifications are debounced: A burst of them collapses into a single pass that uses the arguments
//! of the last notification, starting once no further notification arrived for [`Config::debounce`].
//! Notifications that arrive while a pass is running are queued and trigger exactly one follow-up pass.
//!
//! # Awaiting settle
//!
//! Each cycle has a *started* and a *finished* [`Settle`] barrier. Both fire once and are replaced afterwards:
//! The finished barrier is replaced right before the started barrier fires, and the started barrier right after.
//! To wait for a pass that reflects a change, capture the started barrier **before** notifying, wait for it,
//! and only then fetch and wait for the finished barrier. [`Dispatcher::next_settle`] does exactly that.
//!
//! While a pass is running, the current started barrier already belongs to the next pass.

use crate::{
	config::Config,
	entry::{Snapshot, Strategy, Uid},
	filter::Filter,
	host::Host,
	reconcile::{Change, PassReport, Reconciler},
	render::Renderer,
	Error,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::{
	sync::{mpsc, oneshot, watch},
	task::JoinHandle,
	time::{self, Duration, Instant},
};
use tracing::{error, instrument, trace, warn};

/// Whether a pass is currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassState {
	Idle,
	Running,
}

/// A single-fire completion handle.
struct Barrier(watch::Sender<bool>);
impl Barrier {
	fn new() -> Self {
		Self(watch::channel(false).0)
	}

	fn fired() -> Self {
		Self(watch::channel(true).0)
	}

	fn fire(&self) {
		self.0.send_replace(true);
	}

	fn subscribe(&self) -> Settle {
		Settle(self.0.subscribe())
	}
}

/// Awaitable view of one cycle's started or finished barrier.
#[must_use]
pub struct Settle(watch::Receiver<bool>);
impl Settle {
	#[must_use]
	pub fn is_fired(&self) -> bool {
		*self.0.borrow()
	}

	/// Resolves once the barrier fires.
	///
	/// # Errors
	///
	/// [`Error::Closed`] if the driver stopped without ever firing it.
	pub async fn wait(mut self) -> Result<(), Error> {
		self.0.wait_for(|fired| *fired).await.map(drop).map_err(|_| Error::Closed)
	}
}

/// "The next full settle" as seen from the moment it was created. See [`Dispatcher::next_settle`].
#[must_use]
pub struct NextSettle {
	started: Settle,
	signals: Arc<Mutex<Signals>>,
}
impl NextSettle {
	pub async fn wait(self) -> Result<(), Error> {
		self.started.wait().await?;
		let finished = self.signals.lock().finished.subscribe();
		finished.wait().await
	}
}

struct Signals {
	started: Barrier,
	finished: Barrier,
	state: PassState,
	passes: u64,
	last_report: Option<PassReport>,
}

enum Command {
	Change(Change),
	Immediate(Immediate),
}

enum Immediate {
	SettingsChanged,
	VisibilityChanged(bool),
	JumpToEntry { book: String, uid: Uid },
	SelectEntry { book: String, uid: Uid },
	OpenSettingsView,
	SetFilter(Filter),
	SetEnabled {
		book: String,
		uid: Uid,
		enabled: bool,
		reply: oneshot::Sender<Result<bool, Error>>,
	},
	SetStrategy {
		book: String,
		uid: Uid,
		strategy: Strategy,
		reply: oneshot::Sender<Result<bool, Error>>,
	},
}

/// Cloneable entry point for host notifications and UI actions.
#[derive(Clone)]
pub struct Dispatcher {
	commands: mpsc::UnboundedSender<Command>,
	signals: Arc<Mutex<Signals>>,
}

/// Owns the [`Reconciler`] and executes commands sent through its [`Dispatcher`]s.
///
/// [`run`](`Driver::run`) returns the [`Reconciler`] once all [`Dispatcher`]s are dropped and the last pending pass completed.
#[must_use = "Nothing happens unless the driver is run."]
pub struct Driver<H, R: Renderer> {
	reconciler: Reconciler<H, R>,
	commands: mpsc::UnboundedReceiver<Command>,
	signals: Arc<Mutex<Signals>>,
	debounce: Duration,
}

impl Dispatcher {
	/// Creates a dispatcher and the driver that has to be run for it to make progress.
	///
	/// Use this directly if the renderer isn't [`Send`] (e.g. with [`tokio::task::spawn_local`]).
	pub fn new<H: Host, R: Renderer>(reconciler: Reconciler<H, R>, config: &Config) -> (Self, Driver<H, R>) {
		let (tx, rx) = mpsc::unbounded_channel();
		let signals = Arc::new(Mutex::new(Signals {
			started: Barrier::new(),
			finished: Barrier::fired(),
			state: PassState::Idle,
			passes: 0,
			last_report: None,
		}));
		(
			Self {
				commands: tx,
				signals: Arc::clone(&signals),
			},
			Driver {
				reconciler,
				commands: rx,
				signals,
				debounce: config.debounce(),
			},
		)
	}

	/// Creates a dispatcher and spawns its driver onto the current Tokio runtime.
	pub fn spawn<H, R>(reconciler: Reconciler<H, R>, config: &Config) -> (Self, JoinHandle<Reconciler<H, R>>)
	where
		H: Host + 'static,
		R: Renderer + Send + Sync + 'static,
		R::Book: Send + Sync,
	{
		let (dispatcher, driver) = Self::new(reconciler, config);
		(dispatcher, tokio::spawn(driver.run()))
	}

	fn send(&self, command: Command) -> Result<(), Error> {
		self.commands.send(command).map_err(|_| Error::Closed)
	}

	/// A lorebook changed. `entries` is the book's new payload, if the host supplied it.
	pub fn notify_change(&self, book: Option<String>, entries: Option<Snapshot>) -> Result<(), Error> {
		self.send(Command::Change(Change { book, entries }))
	}

	/// The set of lorebooks changed (created, deleted or renamed).
	pub fn books_changed(&self) -> Result<(), Error> {
		self.send(Command::Change(Change::books()))
	}

	/// The host's lorebook settings changed, which may affect which books are globally active.
	pub fn settings_changed(&self) -> Result<(), Error> {
		self.send(Command::Immediate(Immediate::SettingsChanged))
	}

	pub fn visibility_changed(&self, visible: bool) -> Result<(), Error> {
		self.send(Command::Immediate(Immediate::VisibilityChanged(visible)))
	}

	/// Reveals and focuses an entry. The entry is expected to be cached by the time this command is executed.
	pub fn jump_to_entry(&self, book: impl Into<String>, uid: impl Into<Uid>) -> Result<(), Error> {
		self.send(Command::Immediate(Immediate::JumpToEntry {
			book: book.into(),
			uid: uid.into(),
		}))
	}

	pub fn select_entry(&self, book: impl Into<String>, uid: impl Into<Uid>) -> Result<(), Error> {
		self.send(Command::Immediate(Immediate::SelectEntry {
			book: book.into(),
			uid: uid.into(),
		}))
	}

	pub fn open_settings_view(&self) -> Result<(), Error> {
		self.send(Command::Immediate(Immediate::OpenSettingsView))
	}

	/// Replaces the drawer's filter. It also applies to books and entries mounted by later passes.
	pub fn set_filter(&self, filter: Filter) -> Result<(), Error> {
		self.send(Command::Immediate(Immediate::SetFilter(filter)))
	}

	/// Returns whether the entry still existed.
	pub async fn set_entry_enabled(&self, book: impl Into<String>, uid: impl Into<Uid>, enabled: bool) -> Result<bool, Error> {
		let (reply, response) = oneshot::channel();
		self.send(Command::Immediate(Immediate::SetEnabled {
			book: book.into(),
			uid: uid.into(),
			enabled,
			reply,
		}))?;
		response.await.map_err(|_| Error::Closed)?
	}

	/// Returns whether the entry still existed.
	pub async fn set_entry_strategy(&self, book: impl Into<String>, uid: impl Into<Uid>, strategy: Strategy) -> Result<bool, Error> {
		let (reply, response) = oneshot::channel();
		self.send(Command::Immediate(Immediate::SetStrategy {
			book: book.into(),
			uid: uid.into(),
			strategy,
			reply,
		}))?;
		response.await.map_err(|_| Error::Closed)?
	}

	/// The current cycle's started barrier.
	pub fn started(&self) -> Settle {
		self.signals.lock().started.subscribe()
	}

	/// The current cycle's finished barrier.
	pub fn finished(&self) -> Settle {
		self.signals.lock().finished.subscribe()
	}

	/// Captures the current started barrier. Waiting on the result observes a pass that started at or after this call.
	pub fn next_settle(&self) -> NextSettle {
		NextSettle {
			started: self.started(),
			signals: Arc::clone(&self.signals),
		}
	}

	#[must_use]
	pub fn state(&self) -> PassState {
		self.signals.lock().state
	}

	/// Number of passes started so far.
	#[must_use]
	pub fn passes(&self) -> u64 {
		self.signals.lock().passes
	}

	/// The report of the most recent successful pass.
	#[must_use]
	pub fn last_report(&self) -> Option<PassReport> {
		self.signals.lock().last_report.clone()
	}
}

impl<H: Host, R: Renderer> Driver<H, R> {
	/// Processes commands until every [`Dispatcher`] is dropped.
	pub async fn run(self) -> Reconciler<H, R> {
		let Self {
			mut reconciler,
			mut commands,
			signals,
			debounce,
		} = self;

		while let Some(command) = commands.recv().await {
			let mut pending = match command {
				Command::Change(change) => change,
				Command::Immediate(immediate) => {
					execute(&mut reconciler, immediate).await;
					continue;
				}
			};

			let deadline = time::sleep(debounce);
			tokio::pin!(deadline);
			let mut closed = false;
			loop {
				tokio::select! {
					() = &mut deadline => break,
					command = commands.recv() => match command {
						Some(Command::Change(change)) => {
							trace!("Coalescing change notification.");
							pending = change;
							deadline.as_mut().reset(Instant::now() + debounce);
						}
						Some(Command::Immediate(immediate)) => execute(&mut reconciler, immediate).await,
						None => {
							closed = true;
							break;
						}
					},
				}
			}

			run_pass(&mut reconciler, &signals, pending).await;
			if closed {
				break;
			}
		}

		trace!("All dispatchers dropped. Stopping.");
		reconciler
	}
}

#[instrument(skip_all)]
async fn run_pass<H: Host, R: Renderer>(reconciler: &mut Reconciler<H, R>, signals: &Mutex<Signals>, change: Change) {
	{
		let mut signals = signals.lock();
		signals.finished = Barrier::new();
		signals.state = PassState::Running;
		signals.passes += 1;
		signals.started.fire();
		signals.started = Barrier::new();
	}

	let report = match reconciler.pass(change).await {
		Ok(report) => Some(report),
		Err(error) => {
			error!("Reconciliation pass failed: {}", error);
			None
		}
	};

	let mut signals = signals.lock();
	signals.state = PassState::Idle;
	if report.is_some() {
		signals.last_report = report;
	}
	signals.finished.fire();
}

async fn execute<H: Host, R: Renderer>(reconciler: &mut Reconciler<H, R>, immediate: Immediate) {
	match immediate {
		Immediate::SettingsChanged => {
			if let Err(error) = reconciler.settings_changed().await {
				warn!("Failed to resync active lorebooks: {}", error);
			}
		}
		Immediate::VisibilityChanged(visible) => reconciler.visibility_changed(visible),
		Immediate::JumpToEntry { book, uid } => {
			reconciler.jump_to_entry(&book, &uid);
		}
		Immediate::SelectEntry { book, uid } => {
			reconciler.select_entry(&book, &uid);
		}
		Immediate::OpenSettingsView => reconciler.open_settings_view(),
		Immediate::SetFilter(filter) => {
			reconciler.set_filter(filter);
		}
		Immediate::SetEnabled { book, uid, enabled, reply } => {
			let result = reconciler.set_entry_enabled(&book, &uid, enabled).await;
			if reply.send(result).is_err() {
				trace!("Requester of the edit went away.");
			}
		}
		Immediate::SetStrategy { book, uid, strategy, reply } => {
			let result = reconciler.set_entry_strategy(&book, &uid, strategy).await;
			if reply.send(result).is_err() {
				trace!("Requester of the edit went away.");
			}
		}
	}
}
