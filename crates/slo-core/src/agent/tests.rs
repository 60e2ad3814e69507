use super::*;
use crate::duration::MachineDuration;
use crate::entities::{labels, Indicator, Labels, Objective, ObjectiveSpec};
use crate::providers::{MetricsProvider, ProviderError, ProviderRegistry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

#[derive(Default)]
struct ProviderStats {
    computes: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Handles selectors with a `mock` key; fails objectives named `b` and
/// panics on objectives named `crash`
struct MockProvider {
    delay: Duration,
    stats: Arc<ProviderStats>,
}

#[async_trait]
impl MetricsProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn resource_from_selector(&self, selector: &Labels) -> Option<String> {
        selector.get("mock").cloned()
    }

    async fn compute_objective(
        &self,
        objective: &Objective,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Indicator, ProviderError> {
        self.stats.computes.fetch_add(1, Ordering::SeqCst);
        if objective.name() == Some("crash") {
            panic!("provider crashed");
        }
        let current = self.stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_in_flight.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.stats.in_flight.fetch_sub(1, Ordering::SeqCst);

        if objective.name() == Some("b") {
            return Err(ProviderError::NoData("b".to_string()));
        }
        Ok(Indicator::for_objective(objective, from, to).with_percent(100.0))
    }
}

#[derive(Default)]
struct RecordingIndicatorSink {
    names: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingIndicatorSink {
    fn count(&self) -> usize {
        self.names.lock().unwrap().len()
    }
}

#[async_trait]
impl IndicatorSink for RecordingIndicatorSink {
    async fn deliver(&self, indicator: &Indicator) -> anyhow::Result<()> {
        let name = indicator
            .metadata
            .labels
            .get("mock")
            .cloned()
            .unwrap_or_default();
        self.names.lock().unwrap().push(name);
        if self.fail {
            anyhow::bail!("entity service unavailable");
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingErrorSink {
    errors: Mutex<Vec<String>>,
}

impl RecordingErrorSink {
    fn count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }
}

impl ErrorSink for RecordingErrorSink {
    fn handle(&self, error: AgentError) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

fn objective(name: &str) -> Objective {
    Objective::new(
        labels([("service", "api"), ("name", name)]),
        ObjectiveSpec {
            indicator_selector: labels([("mock", name)]),
            objective_percent: 99.0,
            window: MachineDuration::from_mins(5),
        },
    )
}

fn registry(delay: Duration) -> (Arc<ProviderRegistry>, Arc<ProviderStats>) {
    let stats = Arc::new(ProviderStats::default());
    let shared = stats.clone();
    let mut registry = ProviderRegistry::new();
    registry.register("mock", move || {
        Ok(Box::new(MockProvider {
            delay,
            stats: shared.clone(),
        }) as Box<dyn MetricsProvider>)
    });
    (Arc::new(registry), stats)
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

mod scheduling_tests {
    use super::*;

    #[tokio::test]
    async fn test_failing_objective_does_not_affect_others() {
        let (registry, stats) = registry(Duration::ZERO);
        let indicators = Arc::new(RecordingIndicatorSink::default());
        let errors = Arc::new(RecordingErrorSink::default());

        let config = JobConfig::new(vec![objective("a"), objective("b"), objective("c")])
            .with_interval(Duration::from_millis(100))
            .with_registry(registry)
            .with_indicator_sink(indicators.clone())
            .with_error_sink(errors.clone());

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(Job::new(config).run(shutdown_rx));

        // Two full ticks
        wait_until(|| indicators.count() >= 4 && errors.count() >= 2).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        let mut names = indicators.names.lock().unwrap().clone();
        names.sort();
        assert_eq!(&names[..4], &["a", "a", "c", "c"]);
        assert!(!names.contains(&"b".to_string()));

        let recorded = errors.errors.lock().unwrap().clone();
        assert!(recorded[0].contains("name='b'"));
        assert!(recorded[0].contains("no data for resource b"));
        assert!(stats.computes.load(Ordering::SeqCst) >= 6);
    }

    #[tokio::test]
    async fn test_panicking_provider_goes_to_error_sink() {
        let (registry, _stats) = registry(Duration::ZERO);
        let indicators = Arc::new(RecordingIndicatorSink::default());
        let errors = Arc::new(RecordingErrorSink::default());

        let objectives = vec![objective("a"), objective("crash"), objective("c")];
        let config = JobConfig::new(objectives)
            .with_interval(Duration::from_millis(100))
            .with_registry(registry)
            .with_indicator_sink(indicators.clone())
            .with_error_sink(errors.clone());

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(Job::new(config).run(shutdown_rx));

        wait_until(|| indicators.count() >= 4 && errors.count() >= 2).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        let names = indicators.names.lock().unwrap().clone();
        assert!(names.iter().filter(|n| *n == "a").count() >= 2);
        assert!(names.iter().filter(|n| *n == "c").count() >= 2);

        let recorded = errors.errors.lock().unwrap().clone();
        assert!(recorded[0].contains("name='crash'"), "{recorded:?}");
        assert!(recorded[0].contains("aborted"), "{recorded:?}");
    }

    #[tokio::test]
    async fn test_at_most_five_concurrent_provider_calls() {
        let (registry, stats) = registry(Duration::from_millis(50));
        let indicators = Arc::new(RecordingIndicatorSink::default());
        let objectives = (0..10).map(|i| objective(&format!("slo-{i}"))).collect();

        let config = JobConfig::new(objectives)
            .with_interval(Duration::from_secs(3600))
            .with_registry(registry)
            .with_indicator_sink(indicators.clone())
            .with_error_sink(Arc::new(RecordingErrorSink::default()));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let start = Instant::now();
        let handle = tokio::spawn(Job::new(config).run(shutdown_rx));

        wait_until(|| indicators.count() == 10).await;
        let elapsed = start.elapsed();
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(stats.max_in_flight.load(Ordering::SeqCst), WORKER_COUNT);
        assert_eq!(stats.computes.load(Ordering::SeqCst), 10);
        assert!(elapsed >= Duration::from_millis(100), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(250), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn test_one_computation_per_objective_per_tick() {
        let (registry, stats) = registry(Duration::ZERO);
        let indicators = Arc::new(RecordingIndicatorSink::default());

        let config = JobConfig::new(vec![objective("a"), objective("c")])
            .with_interval(Duration::from_secs(3600))
            .with_registry(registry)
            .with_indicator_sink(indicators.clone())
            .with_error_sink(Arc::new(RecordingErrorSink::default()));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(Job::new(config).run(shutdown_rx));

        wait_until(|| indicators.count() == 2).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(stats.computes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_delivery_failure_goes_to_error_sink() {
        let (registry, _stats) = registry(Duration::ZERO);
        let indicators = Arc::new(RecordingIndicatorSink {
            fail: true,
            ..Default::default()
        });
        let errors = Arc::new(RecordingErrorSink::default());

        let config = JobConfig::new(vec![objective("a")])
            .with_interval(Duration::from_secs(3600))
            .with_registry(registry)
            .with_indicator_sink(indicators.clone())
            .with_error_sink(errors.clone());

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(Job::new(config).run(shutdown_rx));

        wait_until(|| errors.count() == 1).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        let recorded = errors.errors.lock().unwrap().clone();
        assert!(recorded[0].contains("indicator delivery failed"));
        assert!(recorded[0].contains("entity service unavailable"));
    }

    #[tokio::test]
    async fn test_unhandled_objective_is_reported() {
        let (registry, _stats) = registry(Duration::ZERO);
        let errors = Arc::new(RecordingErrorSink::default());

        let mut unhandled = objective("orphan");
        unhandled.spec.indicator_selector = labels([("aws_arn", "arn")]);

        let config = JobConfig::new(vec![unhandled])
            .with_interval(Duration::from_secs(3600))
            .with_registry(registry)
            .with_indicator_sink(Arc::new(RecordingIndicatorSink::default()))
            .with_error_sink(errors.clone());

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(Job::new(config).run(shutdown_rx));

        wait_until(|| errors.count() == 1).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        let recorded = errors.errors.lock().unwrap().clone();
        assert!(recorded[0].contains("no provider able to compute objective"));
    }
}

mod shutdown_tests {
    use super::*;

    #[tokio::test]
    async fn test_no_tick_after_shutdown() {
        let (registry, stats) = registry(Duration::ZERO);
        let indicators = Arc::new(RecordingIndicatorSink::default());

        let config = JobConfig::new(vec![objective("a")])
            .with_interval(Duration::from_millis(30))
            .with_registry(registry)
            .with_indicator_sink(indicators.clone())
            .with_error_sink(Arc::new(RecordingErrorSink::default()));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(Job::new(config).run(shutdown_rx));

        wait_until(|| indicators.count() >= 1).await;
        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("job did not stop")
            .unwrap();

        let computed = stats.computes.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(stats.computes.load(Ordering::SeqCst), computed);
    }

    #[tokio::test]
    async fn test_dropped_shutdown_sender_stops_job() {
        let (registry, _stats) = registry(Duration::ZERO);
        let config = JobConfig::new(vec![objective("a")])
            .with_interval(Duration::from_secs(3600))
            .with_registry(registry)
            .with_indicator_sink(Arc::new(RecordingIndicatorSink::default()))
            .with_error_sink(Arc::new(RecordingErrorSink::default()));

        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        drop(shutdown_tx);

        tokio::time::timeout(Duration::from_secs(1), Job::new(config).run(shutdown_rx))
            .await
            .expect("job did not stop");
    }
}

#[test]
fn test_tick_stats_accumulate() {
    let mut total = TickStats::default();
    total += TickStats {
        indicators: 2,
        errors: 1,
    };
    total += TickStats {
        indicators: 1,
        errors: 0,
    };
    assert_eq!(
        total,
        TickStats {
            indicators: 3,
            errors: 1
        }
    );
}
