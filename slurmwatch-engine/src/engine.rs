//! The Engine - periodic refresh of every facet.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use slurmwatch_adapters::{CommandFetcher, CommandSpec, Fetch};
use slurmwatch_types::{Facet, Snapshot};

use crate::pipeline::{CycleOutcome, Phase, Source};
use crate::store::SnapshotStore;
use crate::subscription::SnapshotStream;

/// Default delay between the starts of two refresh cycles.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Default hard timeout for one status command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Keeps a Slurm cluster snapshot up to date.
///
/// Each facet (nodes, jobs, config) is refreshed by its own task. Cycles for
/// one facet start `interval` apart, measured from the start of the previous
/// cycle; a cycle that overruns delays the next one rather than overlapping
/// it. Failures are recorded on the snapshot and never stop the engine.
///
/// # Example
///
/// ```rust,no_run
/// use slurmwatch_engine::Engine;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let engine = Engine::builder()
///         .interval(Duration::from_secs(30))
///         .timeout(Duration::from_secs(20))
///         .build();
///
///     engine.start();
///
///     tokio::time::sleep(Duration::from_secs(5)).await;
///     let snapshot = engine.current();
///     if let Some(nodes) = &snapshot.nodes {
///         println!("{} nodes", nodes.summary.nodes_total);
///     }
///
///     engine.stop().await;
/// }
/// ```
#[derive(Debug)]
pub struct Engine {
    store: Arc<SnapshotStore>,
    sources: Vec<Arc<Source>>,
    lifecycle: Mutex<Lifecycle>,
}

/// Cancellation and task tracking shared by scheduled loops and manual
/// refreshes. Replaced by a fresh pair once a stop has cancelled it.
#[derive(Debug)]
struct Lifecycle {
    shutdown: CancellationToken,
    tasks: TaskTracker,
    running: bool,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
            running: false,
        }
    }

    /// Token and tracker for new work.
    fn active(&mut self) -> (CancellationToken, TaskTracker) {
        if self.shutdown.is_cancelled() {
            self.shutdown = CancellationToken::new();
            self.tasks = TaskTracker::new();
        }
        (self.shutdown.clone(), self.tasks.clone())
    }
}

impl Engine {
    /// Create an engine with the default commands, interval and timeout.
    pub fn new() -> Self {
        EngineBuilder::new().build()
    }

    /// Create a builder for configuring the engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Start the per-facet refresh tasks.
    ///
    /// Each facet refreshes immediately, then every interval. Must be called
    /// from within a tokio runtime. Returns `false` if already running.
    pub fn start(&self) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.running {
            return false;
        }

        let (shutdown, tasks) = lifecycle.active();
        for source in &self.sources {
            tasks.spawn(refresh_loop(
                source.clone(),
                self.store.clone(),
                shutdown.clone(),
            ));
        }
        lifecycle.running = true;

        tracing::info!(
            nodes_interval_ms = self.interval(Facet::Nodes).as_millis() as u64,
            jobs_interval_ms = self.interval(Facet::Jobs).as_millis() as u64,
            config_interval_ms = self.interval(Facet::Config).as_millis() as u64,
            "engine started"
        );
        true
    }

    /// Stop all refresh work.
    ///
    /// Cancels the scheduled tasks and any [`refresh_now`](Self::refresh_now)
    /// in progress, then waits until every in-flight command has been killed
    /// and reaped. Concurrent callers all wait for the same completion;
    /// calling `stop` on a stopped engine returns once nothing is in flight.
    pub async fn stop(&self) {
        let (tasks, was_running) = {
            let mut lifecycle = self.lifecycle.lock();
            let was_running = std::mem::replace(&mut lifecycle.running, false);
            lifecycle.shutdown.cancel();
            lifecycle.tasks.close();
            (lifecycle.tasks.clone(), was_running)
        };

        tasks.wait().await;
        if was_running {
            tracing::info!("engine stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.lock().running
    }

    /// Run one cycle for `facet` now.
    ///
    /// Waits for any cycle of the same facet already in progress, so fetches
    /// for one facet never overlap. Works whether or not the engine is
    /// running; a later [`stop`](Self::stop) cancels it.
    pub async fn refresh_now(&self, facet: Facet) -> CycleOutcome {
        let (shutdown, tasks) = self.lifecycle.lock().active();
        tasks
            .track_future(self.source(facet).run_cycle(&self.store, &shutdown))
            .await
    }

    /// The latest published snapshot.
    pub fn current(&self) -> Arc<Snapshot> {
        self.store.current()
    }

    /// The snapshot before the latest one.
    pub fn previous(&self) -> Option<Arc<Snapshot>> {
        self.store.previous()
    }

    /// Stream of snapshots published from now on.
    ///
    /// The stream carries the latest snapshot, not every publish: if several
    /// publishes land before the consumer polls, it sees only the newest one
    /// and its `sequence` jumps. Failed refreshes publish too, so an item may
    /// differ from the one before only in a facet's status. Consumers that
    /// need every change should diff `sequence` against the last item seen.
    pub fn subscribe(&self) -> SnapshotStream {
        self.store.subscribe()
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Current refresh phase of a facet.
    pub fn phase(&self, facet: Facet) -> Phase {
        self.source(facet).phase()
    }

    pub fn interval(&self, facet: Facet) -> Duration {
        self.source(facet).interval
    }

    fn source(&self, facet: Facet) -> &Arc<Source> {
        &self.sources[slot(facet)]
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.lifecycle.get_mut().shutdown.cancel();
    }
}

async fn refresh_loop(source: Arc<Source>, store: Arc<SnapshotStore>, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(source.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                if source.run_cycle(&store, &shutdown).await == CycleOutcome::Cancelled {
                    break;
                }
            }
        }
    }
    tracing::debug!(facet = %source.facet, "refresh task finished");
}

fn slot(facet: Facet) -> usize {
    match facet {
        Facet::Nodes => 0,
        Facet::Jobs => 1,
        Facet::Config => 2,
    }
}

/// Builder for configuring an Engine.
#[derive(Debug)]
pub struct EngineBuilder {
    interval: Duration,
    timeout: Duration,
    intervals: [Option<Duration>; 3],
    commands: [Option<CommandSpec>; 3],
    fetchers: [Option<Arc<dyn Fetch>>; 3],
    store: Option<Arc<SnapshotStore>>,
}

impl EngineBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            intervals: [None, None, None],
            commands: [None, None, None],
            fetchers: [None, None, None],
            store: None,
        }
    }

    /// Set the refresh interval for every facet.
    ///
    /// Defaults to 30 seconds.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Override the refresh interval for one facet.
    pub fn facet_interval(mut self, facet: Facet, interval: Duration) -> Self {
        self.intervals[slot(facet)] = Some(interval);
        self
    }

    /// Set the hard timeout for each status command.
    ///
    /// Defaults to 20 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the command run for one facet.
    pub fn command(mut self, facet: Facet, spec: CommandSpec) -> Self {
        self.commands[slot(facet)] = Some(spec);
        self
    }

    /// Replace how one facet obtains its raw text.
    ///
    /// Takes precedence over [`command`](Self::command) and the timeout.
    pub fn fetcher(mut self, facet: Facet, fetcher: impl Fetch + 'static) -> Self {
        self.fetchers[slot(facet)] = Some(Arc::new(fetcher));
        self
    }

    /// Publish into an existing store.
    pub fn store(mut self, store: Arc<SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the engine.
    pub fn build(mut self) -> Engine {
        let sources = Facet::ALL
            .into_iter()
            .map(|facet| {
                let i = slot(facet);
                let interval = self.intervals[i].unwrap_or(self.interval).max(MIN_INTERVAL);
                let fetcher = self.fetchers[i].take().unwrap_or_else(|| {
                    let spec = self.commands[i].take().unwrap_or_else(|| default_command(facet));
                    Arc::new(CommandFetcher::new(spec, self.timeout))
                });
                Arc::new(Source::new(facet, interval, fetcher))
            })
            .collect();

        Engine {
            store: self.store.unwrap_or_default(),
            sources,
            lifecycle: Mutex::new(Lifecycle::new()),
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_command(facet: Facet) -> CommandSpec {
    match facet {
        Facet::Nodes => CommandSpec::nodes(),
        Facet::Jobs => CommandSpec::jobs(),
        Facet::Config => CommandSpec::config(),
    }
}
