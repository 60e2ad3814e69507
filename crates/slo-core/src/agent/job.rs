//! Periodic indicator job
//!
//! A timer task wakes every `interval`, queues every objective and lets
//! [`WORKER_COUNT`] workers drain the queue through the provider registry.
//! Computed indicators go through an unbounded results channel which the
//! job's own loop drains into the indicator sink.

use super::sinks::{ErrorSink, IndicatorSink, LogErrorSink, LogIndicatorSink};
use crate::entities::{format_labels, Indicator, Objective};
use crate::observability::AgentLogger;
use crate::providers::{ProviderError, ProviderRegistry};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinSet;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Concurrent provider calls per tick
pub const WORKER_COUNT: usize = 5;

/// Default tick interval
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Why an objective produced no delivered indicator
#[derive(Debug, Error)]
pub enum AgentFailure {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("indicator delivery failed: {0}")]
    Delivery(anyhow::Error),

    #[error("indicator computation aborted: {0}")]
    Aborted(String),
}

/// Per-objective failure handed to the error sink
#[derive(Debug, Error)]
#[error("objective {}: {source}", format_labels(.objective.labels()))]
pub struct AgentError {
    pub objective: Objective,
    pub source: AgentFailure,
}

/// Configuration for the indicator job
#[derive(Clone)]
pub struct JobConfig {
    /// Time between two ticks
    pub interval: Duration,
    /// Objectives computed on every tick
    pub objectives: Arc<[Objective]>,
    pub registry: Arc<ProviderRegistry>,
    pub indicator_sink: Arc<dyn IndicatorSink>,
    pub error_sink: Arc<dyn ErrorSink>,
    pub logger: AgentLogger,
}

impl JobConfig {
    /// Config using the global provider registry and logging sinks
    pub fn new(objectives: Vec<Objective>) -> Self {
        let logger = AgentLogger::default();
        Self {
            interval: DEFAULT_INTERVAL,
            objectives: objectives.into(),
            registry: ProviderRegistry::global(),
            indicator_sink: Arc::new(LogIndicatorSink::new(logger.clone())),
            error_sink: Arc::new(LogErrorSink::new(logger.clone())),
            logger,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_registry(mut self, registry: Arc<ProviderRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_indicator_sink(mut self, sink: Arc<dyn IndicatorSink>) -> Self {
        self.indicator_sink = sink;
        self
    }

    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.error_sink = sink;
        self
    }

    pub fn with_logger(mut self, logger: AgentLogger) -> Self {
        self.logger = logger;
        self
    }
}

/// Counts for one tick
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickStats {
    pub indicators: usize,
    pub errors: usize,
}

impl std::ops::AddAssign for TickStats {
    fn add_assign(&mut self, other: Self) {
        self.indicators += other.indicators;
        self.errors += other.errors;
    }
}

type Delivery = (usize, Indicator);

pub struct Job {
    config: Arc<JobConfig>,
    stopped: Arc<AtomicBool>,
}

impl Job {
    pub fn new(config: JobConfig) -> Self {
        Self {
            config: Arc::new(config),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run until `shutdown` fires.
    ///
    /// The first tick starts immediately. On shutdown no new tick starts,
    /// in-flight provider calls finish and undelivered indicators are
    /// dropped.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            objectives = self.config.objectives.len(),
            workers = WORKER_COUNT,
            "Starting indicator job"
        );

        let (results_tx, mut results_rx) = mpsc::unbounded_channel::<Delivery>();
        let timer = tokio::spawn(timer_loop(
            self.config.clone(),
            self.stopped.clone(),
            results_tx,
            shutdown.resubscribe(),
        ));

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("Shutting down indicator job");
                    break;
                }
                delivery = results_rx.recv() => match delivery {
                    Some((index, indicator)) => self.deliver(index, indicator).await,
                    None => break,
                },
            }
        }

        self.stopped.store(true, Ordering::SeqCst);
        results_rx.close();
        if let Err(e) = timer.await {
            warn!(error = %e, "Indicator timer task failed");
        }
    }

    async fn deliver(&self, index: usize, indicator: Indicator) {
        if let Err(e) = self.config.indicator_sink.deliver(&indicator).await {
            if let Some(objective) = self.config.objectives.get(index) {
                self.config.error_sink.handle(AgentError {
                    objective: objective.clone(),
                    source: AgentFailure::Delivery(e),
                });
            }
        }
    }
}

async fn timer_loop(
    config: Arc<JobConfig>,
    stopped: Arc<AtomicBool>,
    results_tx: mpsc::UnboundedSender<Delivery>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if stopped.load(Ordering::SeqCst) {
                    break;
                }
                let start = Instant::now();
                let stats = run_tick(&config, &stopped, &results_tx).await;
                config
                    .logger
                    .log_tick(stats.indicators, stats.errors, start.elapsed().as_millis());
            }
            _ = shutdown.recv() => break,
        }
    }
    stopped.store(true, Ordering::SeqCst);
}

/// Compute every objective once, with at most [`WORKER_COUNT`] provider
/// calls in flight. Returns once all workers have exited.
pub(crate) async fn run_tick(
    config: &Arc<JobConfig>,
    stopped: &Arc<AtomicBool>,
    results_tx: &mpsc::UnboundedSender<Delivery>,
) -> TickStats {
    let (queue_tx, queue_rx) = mpsc::channel(config.objectives.len().max(1));
    for index in 0..config.objectives.len() {
        if queue_tx.send(index).await.is_err() {
            break;
        }
    }
    drop(queue_tx);

    let queue = Arc::new(Mutex::new(queue_rx));
    let mut workers = JoinSet::new();
    for worker_id in 0..WORKER_COUNT {
        workers.spawn(worker(
            worker_id,
            config.clone(),
            queue.clone(),
            stopped.clone(),
            results_tx.clone(),
        ));
    }

    let mut stats = TickStats::default();
    while let Some(result) = workers.join_next().await {
        match result {
            Ok(worker_stats) => stats += worker_stats,
            Err(e) => {
                stats.errors += 1;
                warn!(error = %e, "Indicator worker aborted");
            }
        }
    }
    stats
}

async fn worker(
    worker_id: usize,
    config: Arc<JobConfig>,
    queue: Arc<Mutex<mpsc::Receiver<usize>>>,
    stopped: Arc<AtomicBool>,
    results_tx: mpsc::UnboundedSender<Delivery>,
) -> TickStats {
    let mut stats = TickStats::default();

    loop {
        if stopped.load(Ordering::SeqCst) {
            break;
        }
        let next = queue.lock().await.recv().await;
        let Some(index) = next else { break };
        let Some(objective) = config.objectives.get(index) else {
            continue;
        };

        let to = Utc::now();
        let from = to - objective.spec.window.to_chrono();
        debug!(worker = worker_id, objective = %format_labels(objective.labels()), "computing indicator");

        // Own task per call so a panicking provider only fails its objective
        let computation = {
            let config = config.clone();
            let objective = objective.clone();
            tokio::spawn(async move { config.registry.compute(&objective, from, to).await })
        };
        let outcome = match computation.await {
            Ok(result) => result.map_err(AgentFailure::from),
            Err(e) => {
                warn!(worker = worker_id, error = %e, "Indicator computation aborted");
                Err(AgentFailure::Aborted(e.to_string()))
            }
        };

        match outcome {
            Ok(indicator) => {
                stats.indicators += 1;
                if results_tx.send((index, indicator)).is_err() {
                    debug!(worker = worker_id, "results channel closed, dropping indicator");
                }
            }
            Err(e) => {
                stats.errors += 1;
                config.error_sink.handle(AgentError {
                    objective: objective.clone(),
                    source: e,
                });
            }
        }
    }

    stats
}
