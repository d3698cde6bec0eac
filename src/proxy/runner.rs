//! Run orchestration: bounded-parallel dispatch of proxy checks with
//! pause/resume, cancellation, statistics and incremental persistence
//!
//! Workers never touch shared state directly. Every result funnels through
//! one aggregator task (the single writer), which updates the result map,
//! counters, the unique-IP set and the output files, and republishes each
//! result on the event stream.

use crate::config::Settings;
use crate::proxy::checker::{wait_cancelled, ProxyChecker};
use crate::proxy::gate::Gate;
use crate::proxy::isp;
use crate::proxy::models::{CheckResult, ProxyRecord, RunStatistics};
use crate::proxy::parser::ProxyRecordParser;
use crate::Result;
use anyhow::bail;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// All output files written for a run
const OUTPUT_FILES: [&str; 5] = [
    "移动_proxies.txt",
    "电信_proxies.txt",
    "联通_proxies.txt",
    "其他_proxies.txt",
    "failed_proxies.txt",
];

const FAILED_FILE: &str = "failed_proxies.txt";

/// Current run lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Paused,
}

/// Progress snapshot emitted once per second while a run is active
#[derive(Debug, Clone)]
pub struct RunProgress {
    pub completed: usize,
    pub total: usize,
    pub percent: f64,
    pub elapsed: Duration,
    /// Completed checks per elapsed second
    pub per_second: f64,
}

/// Events published to the external consumer, sequenced by the aggregator
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// One record reached a terminal state
    Result(CheckResult),
    Progress(RunProgress),
    /// The run ended, by completion or cancellation
    Finished(RunStatistics),
}

enum WorkerMessage {
    /// Work began on a record; ensures a Pending entry exists
    Started(ProxyRecord),
    Done(CheckResult),
}

/// Shared run state. Mutated only by the aggregator task; locks exist for
/// the benefit of readers.
#[derive(Debug, Default)]
struct RunShared {
    results: Mutex<BTreeMap<usize, CheckResult>>,
    stats: Mutex<RunStatistics>,
}

impl RunShared {
    fn upsert_pending(&self, record: ProxyRecord) {
        let mut results = self.results.lock().unwrap();
        results
            .entry(record.index)
            .or_insert_with(|| CheckResult::pending(record));
    }

    /// Idempotent create-or-update keyed by record index, plus counter and
    /// unique-IP bookkeeping
    fn apply(&self, result: &CheckResult, unique_ips: &mut HashSet<String>) {
        {
            let mut results = self.results.lock().unwrap();
            results.insert(result.record.index, result.clone());
        }

        let mut stats = self.stats.lock().unwrap();
        stats.completed += 1;
        if result.is_success() {
            stats.success += 1;
            if let Some(ip) = result.real_ip.as_deref() {
                if !ip.is_empty() && unique_ips.insert(ip.to_string()) {
                    stats.unique_ips += 1;
                }
            }
            stats.record_group(isp::group(&result.isp));
        } else {
            stats.failed += 1;
        }
    }

    fn reset(&self, total: usize) {
        self.results.lock().unwrap().clear();
        *self.stats.lock().unwrap() = RunStatistics {
            total,
            ..Default::default()
        };
    }
}

/// Schedules validation of a loaded record set
pub struct RunOrchestrator {
    settings: Settings,
    records: Vec<ProxyRecord>,
    output_dir: PathBuf,
    gate: Gate,
    cancel: Arc<watch::Sender<bool>>,
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    shared: Arc<RunShared>,
}

impl RunOrchestrator {
    pub fn new(settings: Settings) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            settings,
            records: Vec::new(),
            output_dir: PathBuf::from("."),
            gate: Gate::new(true),
            cancel: Arc::new(cancel),
            running: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            shared: Arc::new(RunShared::default()),
        }
    }

    /// Parse a proxy file and replace the record set. Output files are
    /// written next to the source file. Rejected while a run is active;
    /// the caller must stop the run first.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        if self.is_running() {
            bail!("cannot load while a run is active; stop it first");
        }

        let path = path.as_ref();
        let records = ProxyRecordParser::parse_file(path, &self.settings.parser)?;
        self.output_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        self.replace_records(records);
        info!(count = self.records.len(), file = %path.display(), "loaded proxy file");
        Ok(self.records.len())
    }

    /// Parse pre-loaded text and replace the record set. Output files go to
    /// the current directory.
    pub fn load_text(&mut self, content: &str) -> Result<usize> {
        if self.is_running() {
            bail!("cannot load while a run is active; stop it first");
        }

        let records = ProxyRecordParser::parse_text(content, &self.settings.parser);
        self.output_dir = PathBuf::from(".");
        self.replace_records(records);
        Ok(self.records.len())
    }

    fn replace_records(&mut self, records: Vec<ProxyRecord>) {
        self.shared.reset(records.len());
        self.records = records;
    }

    pub fn total(&self) -> usize {
        self.records.len()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.is_running() && self.paused.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> RunState {
        if !self.is_running() {
            RunState::Idle
        } else if self.paused.load(Ordering::SeqCst) {
            RunState::Paused
        } else {
            RunState::Running
        }
    }

    /// Snapshot of the current statistics
    pub fn statistics(&self) -> RunStatistics {
        self.shared.stats.lock().unwrap().clone()
    }

    /// Snapshot of all results, ordered by record index
    pub fn results(&self) -> Vec<CheckResult> {
        self.shared.results.lock().unwrap().values().cloned().collect()
    }

    /// Begin checking every loaded record. Fails when no records are loaded
    /// or a run is already active. Returns the event stream for this run.
    pub fn start(&self) -> Result<mpsc::UnboundedReceiver<RunEvent>> {
        if self.records.is_empty() {
            bail!("no records loaded");
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            bail!("a run is already active");
        }

        self.paused.store(false, Ordering::SeqCst);
        self.gate.open();
        self.cancel.send_replace(false);
        self.shared.reset(self.records.len());

        if self.settings.auto_save {
            clear_output_files(&self.output_dir);
        }

        let started_at = Instant::now();
        let (worker_tx, worker_rx) = mpsc::unbounded_channel::<WorkerMessage>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<RunEvent>();

        self.spawn_aggregator(worker_rx, event_tx.clone());
        self.spawn_ticker(event_tx, started_at);
        self.spawn_dispatch(worker_tx);

        info!(
            total = self.records.len(),
            concurrency = self.settings.concurrency,
            proxy_type = %self.settings.proxy_type,
            "run started"
        );
        Ok(event_rx)
    }

    /// Close the pause gate. Probes already admitted run to completion;
    /// their timeout clocks are unaffected.
    pub fn pause(&self) {
        if self.is_running() && !self.paused.swap(true, Ordering::SeqCst) {
            self.gate.close();
            info!("run paused");
        }
    }

    /// Reopen the pause gate
    pub fn resume(&self) {
        if self.is_running() && self.paused.swap(false, Ordering::SeqCst) {
            self.gate.open();
            info!("run resumed");
        }
    }

    /// Cancel the run. In-flight probes abandon their remaining retries and
    /// providers; completed statistics are retained.
    pub fn stop(&self) {
        self.cancel.send_replace(true);
        // release gate waiters so they can observe the cancellation
        self.gate.open();
        self.paused.store(false, Ordering::SeqCst);
        info!("run stop requested");
    }

    fn spawn_aggregator(
        &self,
        mut worker_rx: mpsc::UnboundedReceiver<WorkerMessage>,
        event_tx: mpsc::UnboundedSender<RunEvent>,
    ) {
        let shared = Arc::clone(&self.shared);
        let running = Arc::clone(&self.running);
        let paused = Arc::clone(&self.paused);
        let auto_save = self.settings.auto_save;
        let output_dir = self.output_dir.clone();

        tokio::spawn(async move {
            let mut unique_ips: HashSet<String> = HashSet::new();

            while let Some(message) = worker_rx.recv().await {
                match message {
                    WorkerMessage::Started(record) => shared.upsert_pending(record),
                    WorkerMessage::Done(result) => {
                        shared.apply(&result, &mut unique_ips);
                        if auto_save {
                            if let Err(err) = append_result(&output_dir, &result) {
                                warn!(error = %err, "failed to append result to output file");
                            }
                        }
                        let _ = event_tx.send(RunEvent::Result(result));
                    }
                }
            }

            running.store(false, Ordering::SeqCst);
            paused.store(false, Ordering::SeqCst);
            let stats = shared.stats.lock().unwrap().clone();
            info!(
                completed = stats.completed,
                success = stats.success,
                failed = stats.failed,
                unique_ips = stats.unique_ips,
                "run finished"
            );
            let _ = event_tx.send(RunEvent::Finished(stats));
        });
    }

    fn spawn_ticker(&self, event_tx: mpsc::UnboundedSender<RunEvent>, started_at: Instant) {
        let running = Arc::clone(&self.running);
        let shared = Arc::clone(&self.shared);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.tick().await;
            loop {
                interval.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                let (completed, total) = {
                    let stats = shared.stats.lock().unwrap();
                    (stats.completed, stats.total)
                };
                let elapsed = started_at.elapsed();
                let seconds = elapsed.as_secs_f64();
                let progress = RunProgress {
                    completed,
                    total,
                    percent: if total > 0 {
                        completed as f64 / total as f64 * 100.0
                    } else {
                        0.0
                    },
                    elapsed,
                    per_second: if seconds > 0.0 {
                        completed as f64 / seconds
                    } else {
                        0.0
                    },
                };
                if event_tx.send(RunEvent::Progress(progress)).is_err() {
                    break;
                }
            }
        });
    }

    fn spawn_dispatch(&self, worker_tx: mpsc::UnboundedSender<WorkerMessage>) {
        let checker = ProxyChecker::new(&self.settings);
        let records = self.records.clone();
        let gate = self.gate.clone();
        let cancel_rx = self.cancel.subscribe();
        let concurrency = self.settings.concurrency.max(1);

        tokio::spawn(async move {
            stream::iter(records)
                .map(|record| {
                    let checker = checker.clone();
                    let gate = gate.clone();
                    let cancel = cancel_rx.clone();
                    let tx = worker_tx.clone();
                    async move {
                        // admission: blocked while paused, abandoned on cancel
                        tokio::select! {
                            biased;
                            _ = wait_cancelled(cancel.clone()) => return,
                            _ = gate.wait() => {}
                        }
                        if *cancel.borrow() {
                            return;
                        }

                        let _ = tx.send(WorkerMessage::Started(record.clone()));

                        // dropping the probe future on cancel abandons any
                        // remaining retries and providers
                        tokio::select! {
                            biased;
                            _ = wait_cancelled(cancel.clone()) => {}
                            result = checker.check(&record, &cancel) => {
                                let _ = tx.send(WorkerMessage::Done(result));
                            }
                        }
                    }
                })
                .buffer_unordered(concurrency)
                .for_each(|_| async {})
                .await;
            // worker_tx drops here; the aggregator finalizes the run
        });
    }
}

fn clear_output_files(dir: &Path) {
    for name in OUTPUT_FILES {
        let path = dir.join(name);
        if let Err(err) = fs::remove_file(&path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(file = %path.display(), error = %err, "failed to clear output file");
            }
        }
    }
}

/// Append one result to its carrier-group file, or to the failures file
/// with the error message attached
fn append_result(dir: &Path, result: &CheckResult) -> std::io::Result<()> {
    let csv = result.record.to_csv_line();
    let (name, line) = if result.is_success() {
        (isp::group(&result.isp).output_file(), csv)
    } else {
        (
            FAILED_FILE,
            format!("{} | {}", csv, result.error.as_deref().unwrap_or("")),
        )
    };

    let mut file = OpenOptions::new().create(true).append(true).open(dir.join(name))?;
    writeln!(file, "{}", line)
}
