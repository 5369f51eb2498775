//! Scheduling and lifecycle tests driven by scripted fetchers on a paused clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use slurmwatch_engine::{
    CommandError, CommandSpec, CycleOutcome, Engine, EngineBuilder, Facet, Fetch, Phase,
    RawOutput,
};

const NODES: &str = "n1|p1|mixed|2/2/0/4|4000|1000\nn2|p1,p2|allocated|8/0/0/8|8000|8000\n";
const JOBS: &str = "1|physics|alice|PENDING|1700000000|1700000000\n2|chem|bob|RUNNING|1700000000|\n";
const CONFIG: &str = "ClusterName = test\n";

#[derive(Debug, Default)]
struct Probe {
    starts: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    cancelled: AtomicUsize,
}

impl Probe {
    fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Sleeps for `delay`, then returns the next scripted response (cycling).
///
/// When cancelled, takes `wind_down` to return, like a child that is slow to
/// exit after being killed.
#[derive(Debug)]
struct Scripted {
    responses: Vec<Result<String, CommandError>>,
    delay: Duration,
    wind_down: Duration,
    probe: Arc<Probe>,
}

impl Scripted {
    fn ok(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())], Duration::ZERO)
    }

    fn new(responses: Vec<Result<String, CommandError>>, delay: Duration) -> Self {
        Self {
            responses,
            delay,
            wind_down: Duration::ZERO,
            probe: Arc::new(Probe::default()),
        }
    }

    fn slow(text: &str, delay: Duration) -> Self {
        Self::new(vec![Ok(text.to_string())], delay)
    }

    fn with_wind_down(mut self, wind_down: Duration) -> Self {
        self.wind_down = wind_down;
        self
    }

    fn probe(&self) -> Arc<Probe> {
        self.probe.clone()
    }
}

#[async_trait]
impl Fetch for Scripted {
    async fn fetch(&self, shutdown: &CancellationToken) -> Result<RawOutput, CommandError> {
        let n = self.probe.starts.fetch_add(1, Ordering::SeqCst);
        let now = self.probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let finished = tokio::select! {
            _ = tokio::time::sleep(self.delay) => true,
            _ = shutdown.cancelled() => false,
        };
        if !finished {
            tokio::time::sleep(self.wind_down).await;
        }
        self.probe.in_flight.fetch_sub(1, Ordering::SeqCst);

        if !finished {
            self.probe.cancelled.fetch_add(1, Ordering::SeqCst);
            return Err(CommandError::Cancelled {
                program: "scripted".to_string(),
            });
        }
        self.responses[n % self.responses.len()]
            .clone()
            .map(RawOutput::from_stdout)
    }

    fn description(&self) -> &str {
        "scripted"
    }
}

fn builder_with(nodes: Scripted) -> EngineBuilder {
    Engine::builder()
        .fetcher(Facet::Nodes, nodes)
        .fetcher(Facet::Jobs, Scripted::ok(JOBS))
        .fetcher(Facet::Config, Scripted::ok(CONFIG))
}

fn not_found() -> CommandError {
    CommandError::NotFound {
        program: "sinfo".to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn cycles_start_on_interval_from_previous_start() {
    let nodes = Scripted::slow(NODES, Duration::from_secs(10));
    let probe = nodes.probe();
    let engine = builder_with(nodes)
        .interval(Duration::from_secs(30))
        .build();

    engine.start();
    tokio::time::sleep(Duration::from_secs(65)).await;

    // starts at 0s, 30s and 60s
    assert_eq!(probe.starts(), 3);
    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn overrunning_cycle_defers_next_instead_of_overlapping() {
    let nodes = Scripted::slow(NODES, Duration::from_secs(25));
    let probe = nodes.probe();
    let engine = builder_with(nodes)
        .interval(Duration::from_secs(10))
        .build();

    engine.start();
    tokio::time::sleep(Duration::from_secs(60)).await;

    // starts at 0s, 25s and 50s
    assert_eq!(probe.starts(), 3);
    assert_eq!(probe.max_in_flight(), 1);
    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn manual_refresh_waits_for_scheduled_cycle() {
    let nodes = Scripted::slow(NODES, Duration::from_secs(25));
    let probe = nodes.probe();
    let engine = builder_with(nodes)
        .interval(Duration::from_secs(300))
        .build();

    engine.start();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(engine.phase(Facet::Nodes), Phase::Fetching);

    let outcome = engine.refresh_now(Facet::Nodes).await;
    assert_eq!(outcome, CycleOutcome::Published { skipped: 0 });
    assert_eq!(probe.starts(), 2);
    assert_eq!(probe.max_in_flight(), 1);
    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn refresh_now_without_start() {
    let engine = builder_with(Scripted::ok(NODES)).build();

    let outcome = engine.refresh_now(Facet::Config).await;
    assert!(outcome.is_published());

    let snapshot = engine.current();
    assert_eq!(snapshot.config.as_ref().unwrap().as_str(), CONFIG);
    assert!(snapshot.nodes.is_none());
    assert!(!engine.is_running());
}

#[tokio::test(start_paused = true)]
async fn failed_facet_keeps_data_and_isolates_others() {
    let nodes = Scripted::new(
        vec![Ok(NODES.to_string()), Err(not_found())],
        Duration::ZERO,
    );
    let engine = builder_with(nodes)
        .interval(Duration::from_secs(30))
        .facet_interval(Facet::Jobs, Duration::from_secs(1000))
        .facet_interval(Facet::Config, Duration::from_secs(1000))
        .build();

    engine.start();
    tokio::time::sleep(Duration::from_secs(1)).await;
    let good = engine.current();
    assert!(good.all_attempted());
    assert!(!good.is_stale(Facet::Nodes));

    tokio::time::sleep(Duration::from_secs(30)).await;
    let after = engine.current();
    engine.stop().await;

    assert!(after.is_stale(Facet::Nodes));
    assert_eq!(after.nodes, good.nodes);
    assert_eq!(
        after.status(Facet::Nodes).last_error.as_deref(),
        Some("sinfo: command not found")
    );
    assert_eq!(after.status(Facet::Nodes).consecutive_failures, 1);

    assert_eq!(after.jobs, good.jobs);
    assert_eq!(after.config, good.config);
    assert!(!after.is_stale(Facet::Jobs));
    assert!(!after.is_stale(Facet::Config));
}

#[tokio::test(start_paused = true)]
async fn failing_facet_keeps_retrying_on_schedule() {
    let nodes = Scripted::new(vec![Err(not_found())], Duration::ZERO);
    let probe = nodes.probe();
    let engine = builder_with(nodes)
        .interval(Duration::from_secs(10))
        .build();

    engine.start();
    tokio::time::sleep(Duration::from_secs(35)).await;
    engine.stop().await;

    assert_eq!(probe.starts(), 4);
    assert_eq!(
        engine.current().status(Facet::Nodes).consecutive_failures,
        4
    );
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_in_flight_fetch_without_recording_error() {
    let nodes = Scripted::slow(NODES, Duration::from_secs(1000));
    let probe = nodes.probe();
    let engine = builder_with(nodes).build();

    engine.start();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(engine.phase(Facet::Nodes), Phase::Fetching);

    let before = tokio::time::Instant::now();
    engine.stop().await;
    assert!(before.elapsed() < Duration::from_secs(1));

    assert_eq!(probe.cancelled(), 1);
    assert_eq!(engine.phase(Facet::Nodes), Phase::Idle);
    let snapshot = engine.current();
    assert!(snapshot.nodes.is_none());
    assert!(!snapshot.is_stale(Facet::Nodes));
    assert!(!snapshot.status(Facet::Nodes).attempted());
}

async fn timed_stop(engine: &Engine) -> Duration {
    let started = tokio::time::Instant::now();
    engine.stop().await;
    started.elapsed()
}

#[tokio::test(start_paused = true)]
async fn concurrent_stops_all_wait_for_in_flight_fetches() {
    let wind_down = Duration::from_secs(2);
    let nodes = Scripted::slow(NODES, Duration::from_secs(1000)).with_wind_down(wind_down);
    let probe = nodes.probe();
    let engine = Engine::builder()
        .fetcher(Facet::Nodes, nodes)
        .fetcher(
            Facet::Jobs,
            Scripted::slow(JOBS, Duration::from_secs(1000)).with_wind_down(wind_down),
        )
        .fetcher(
            Facet::Config,
            Scripted::slow(CONFIG, Duration::from_secs(1000)).with_wind_down(wind_down),
        )
        .build();

    engine.start();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let (first, second) = tokio::join!(timed_stop(&engine), timed_stop(&engine));
    assert!(first >= wind_down, "first stop returned after {:?}", first);
    assert!(second >= wind_down, "second stop returned after {:?}", second);
    assert_eq!(probe.cancelled(), 1);
    assert!(!engine.is_running());

    // a stop with nothing in flight returns at once
    assert_eq!(timed_stop(&engine).await, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_manual_refresh_on_stopped_engine() {
    let config = Scripted::slow(CONFIG, Duration::from_secs(1000));
    let probe = config.probe();
    let engine = Arc::new(
        Engine::builder()
            .fetcher(Facet::Nodes, Scripted::ok(NODES))
            .fetcher(Facet::Jobs, Scripted::ok(JOBS))
            .fetcher(Facet::Config, config)
            .build(),
    );

    let manual = tokio::spawn({
        let engine = engine.clone();
        async move { engine.refresh_now(Facet::Config).await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(probe.starts(), 1);
    assert!(!engine.is_running());

    engine.stop().await;
    assert_eq!(probe.cancelled(), 1);
    assert_eq!(manual.await.unwrap(), CycleOutcome::Cancelled);

    // manual refreshes keep working after a stop
    assert!(engine.refresh_now(Facet::Nodes).await.is_published());
}

/// Wait for the shell to write its pid.
#[cfg(unix)]
async fn read_pid(path: &std::path::Path) -> i32 {
    for _ in 0..200 {
        if let Ok(text) = std::fs::read_to_string(path) {
            if let Ok(pid) = text.trim().parse() {
                return pid;
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("command never wrote {}", path.display());
}

#[cfg(unix)]
fn process_alive(pid: i32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(unix)]
#[tokio::test]
async fn stop_kills_command_started_by_manual_refresh() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let script = format!("echo $$ > '{}'; exec sleep 318", pid_file.display());

    let engine = Arc::new(
        Engine::builder()
            .interval(Duration::from_secs(3600))
            .timeout(Duration::from_secs(600))
            .fetcher(Facet::Nodes, Scripted::ok(NODES))
            .fetcher(Facet::Jobs, Scripted::ok(JOBS))
            .command(Facet::Config, CommandSpec::new("sh").args(["-c", script.as_str()]))
            .build(),
    );

    // started while the engine is stopped
    let manual = tokio::spawn({
        let engine = engine.clone();
        async move { engine.refresh_now(Facet::Config).await }
    });
    let pid = read_pid(&pid_file).await;
    assert!(process_alive(pid));

    engine.start();
    engine.stop().await;

    assert!(!process_alive(pid), "sleep {} survived stop", pid);
    let outcome = tokio::time::timeout(Duration::from_secs(1), manual)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, CycleOutcome::Cancelled);
    assert!(!engine.current().is_stale(Facet::Config));
}

#[tokio::test(start_paused = true)]
async fn start_and_stop_are_idempotent() {
    let engine = builder_with(Scripted::ok(NODES)).build();

    assert!(engine.start());
    assert!(!engine.start());
    assert!(engine.is_running());

    engine.stop().await;
    engine.stop().await;
    assert!(!engine.is_running());

    // restartable
    assert!(engine.start());
    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn no_refresh_after_stop() {
    let nodes = Scripted::ok(NODES);
    let probe = nodes.probe();
    let engine = builder_with(nodes)
        .interval(Duration::from_secs(10))
        .build();

    engine.start();
    tokio::time::sleep(Duration::from_secs(1)).await;
    engine.stop().await;
    let starts = probe.starts();

    tokio::time::sleep(Duration::from_secs(100)).await;
    assert_eq!(probe.starts(), starts);
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_each_facet_publish() {
    let engine = builder_with(Scripted::ok(NODES))
        .interval(Duration::from_secs(30))
        .build();
    let mut updates = engine.subscribe();

    engine.start();

    let mut last_sequence = 0;
    while let Some(snapshot) = updates.next().await {
        assert!(snapshot.sequence > last_sequence);
        last_sequence = snapshot.sequence;
        if snapshot.all_attempted() {
            break;
        }
    }

    let snapshot = engine.current();
    let nodes = snapshot.nodes.as_ref().unwrap();
    assert_eq!(nodes.partition("p1").unwrap().cpus_total, 12);
    assert_eq!(nodes.partition("p2").unwrap().cpus_allocated, 8);
    let jobs = snapshot.jobs.as_ref().unwrap();
    assert_eq!(jobs.total_jobs, 2);
    assert_eq!(jobs.pending_wait.jobs(), 1);
    assert!(engine.previous().is_some());

    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn per_facet_intervals_are_independent() {
    let nodes = Scripted::ok(NODES);
    let nodes_probe = nodes.probe();
    let config = Scripted::ok(CONFIG);
    let config_probe = config.probe();

    let engine = Engine::builder()
        .interval(Duration::from_secs(10))
        .facet_interval(Facet::Config, Duration::from_secs(60))
        .fetcher(Facet::Nodes, nodes)
        .fetcher(Facet::Jobs, Scripted::ok(JOBS))
        .fetcher(Facet::Config, config)
        .build();

    engine.start();
    tokio::time::sleep(Duration::from_secs(55)).await;
    engine.stop().await;

    assert_eq!(nodes_probe.starts(), 6);
    assert_eq!(config_probe.starts(), 1);
}
