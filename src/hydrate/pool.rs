//! Bounded concurrent scheduler for the per-URL pipeline.
//!
//! Up to `concurrency` pipelines are in flight at once, each on its own
//! tokio task. One hung page only occupies its own slot, and the rest of
//! the batch keeps flowing.
//! Completions arrive in any order and are put back into input order by
//! [`UrlTask::index`] before returning.

use super::extract::Extractor;
use super::fallback::RawFetcher;
use super::pipeline::{Outcome, Pipeline, Terminal};
use super::probe::Prober;
use crate::models::{ExtractionRecord, UrlTask};
use std::collections::HashMap;
use std::ops::AddAssign;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{Id, JoinSet};
use tracing::{Instrument, debug, error, info, instrument};

/// In-flight pipelines used by the reference deployment.
pub const DEFAULT_CONCURRENCY: usize = 24;

/// Count of terminal states over one batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub unreachable: usize,
    pub extracted: usize,
    pub recovered: usize,
    pub without_markup: usize,
    pub failed: usize,
}

impl Tally {
    fn record(&mut self, state: Terminal) {
        match state {
            Terminal::Unreachable => self.unreachable += 1,
            Terminal::Extracted => self.extracted += 1,
            Terminal::ExtractedWithFallback { recovered: true } => self.recovered += 1,
            Terminal::ExtractedWithFallback { recovered: false } => self.without_markup += 1,
            Terminal::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.unreachable + self.extracted + self.recovered + self.without_markup + self.failed
    }
}

impl AddAssign for Tally {
    fn add_assign(&mut self, other: Tally) {
        self.unreachable += other.unreachable;
        self.extracted += other.extracted;
        self.recovered += other.recovered;
        self.without_markup += other.without_markup;
        self.failed += other.failed;
    }
}

/// Hydrate every task and return one record per task, in index order.
///
/// Does not return until every task has reached a terminal record.
///
/// # Arguments
///
/// * `pipeline` - The per-URL pipeline, shared by every in-flight task
/// * `tasks` - URLs tagged with their input position
/// * `concurrency` - Maximum pipelines in flight; values below 1 mean 1
#[instrument(level = "info", skip_all, fields(tasks = tasks.len(), concurrency = concurrency))]
pub async fn run<P, E, F>(
    pipeline: &Arc<Pipeline<P, E, F>>,
    tasks: Vec<UrlTask>,
    concurrency: usize,
) -> Vec<ExtractionRecord>
where
    P: Prober + 'static,
    E: Extractor + 'static,
    F: RawFetcher + 'static,
{
    run_with_tally(pipeline, tasks, concurrency).await.0
}

/// [`run`], also returning how many tasks ended in each terminal state.
///
/// Each pipeline runs as its own tokio task, so pipelines make progress on
/// every runtime worker. A new task is only spawned when one finishes.
pub async fn run_with_tally<P, E, F>(
    pipeline: &Arc<Pipeline<P, E, F>>,
    tasks: Vec<UrlTask>,
    concurrency: usize,
) -> (Vec<ExtractionRecord>, Tally)
where
    P: Prober + 'static,
    E: Extractor + 'static,
    F: RawFetcher + 'static,
{
    let t0 = Instant::now();
    let total = tasks.len();
    let concurrency = concurrency.max(1);

    let mut pending = tasks.into_iter();
    let mut workers: JoinSet<Outcome> = JoinSet::new();
    let mut in_flight: HashMap<Id, usize> = HashMap::with_capacity(concurrency);
    for task in pending.by_ref().take(concurrency) {
        spawn_pipeline(&mut workers, &mut in_flight, pipeline, task);
    }

    let mut tally = Tally::default();
    let mut finished: Vec<(usize, ExtractionRecord)> = Vec::with_capacity(total);
    while let Some(joined) = workers.join_next_with_id().await {
        let (id, outcome) = match joined {
            Ok(done) => done,
            Err(e) => {
                error!(error = %e, "Pipeline task died; recording as unreachable");
                let failed = Outcome {
                    state: Terminal::Failed,
                    record: ExtractionRecord::unreachable(),
                };
                (e.id(), failed)
            }
        };
        if let Some(task) = pending.next() {
            spawn_pipeline(&mut workers, &mut in_flight, pipeline, task);
        }
        let Some(index) = in_flight.remove(&id) else {
            continue;
        };
        tally.record(outcome.state);
        finished.push((index, outcome.record));
        debug!(index, done = finished.len(), total, "Task reached terminal record");
    }

    finished.sort_by_key(|(index, _)| *index);
    let records: Vec<ExtractionRecord> = finished.into_iter().map(|(_, record)| record).collect();

    info!(
        total,
        extracted = tally.extracted,
        recovered_by_fallback = tally.recovered,
        without_markup = tally.without_markup,
        unreachable = tally.unreachable,
        failed = tally.failed,
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Hydration batch complete"
    );
    (records, tally)
}

fn spawn_pipeline<P, E, F>(
    workers: &mut JoinSet<Outcome>,
    in_flight: &mut HashMap<Id, usize>,
    pipeline: &Arc<Pipeline<P, E, F>>,
    task: UrlTask,
) where
    P: Prober + 'static,
    E: Extractor + 'static,
    F: RawFetcher + 'static,
{
    let pipeline = Arc::clone(pipeline);
    let index = task.index;
    let handle = workers.spawn(async move { pipeline.process(&task).await }.in_current_span());
    in_flight.insert(handle.id(), index);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrate::pipeline::stubs::*;
    use crate::error::ExtractionFailure;
    use crate::hydrate::probe::HttpProber;
    use crate::models::{ExtractedArticle, Markup};
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::thread::ThreadId;
    use std::time::Duration;

    /// Holds its thread for the whole call, the way a large parse does.
    #[derive(Default)]
    struct BusyExtractor {
        threads: Mutex<HashSet<ThreadId>>,
    }

    impl Extractor for BusyExtractor {
        async fn extract(&self, _url: &str) -> Result<ExtractedArticle, ExtractionFailure> {
            std::thread::sleep(Duration::from_millis(200));
            self.threads.lock().unwrap().insert(std::thread::current().id());
            Ok(article("busy", Markup::Present("<p/>".into())))
        }
    }

    #[tokio::test]
    async fn test_output_order_survives_slow_task() {
        let urls = ["http://a.example/0", "http://a.example/slow/1", "http://a.example/2"];
        let mut extractor = StubExtractor::with(
            urls.iter()
                .enumerate()
                .map(|(i, u)| (*u, article(&format!("rec{i}"), Markup::Present(format!("<p>{i}</p>")))))
                .collect(),
        );
        extractor.delay = Duration::from_millis(150);
        let pipeline = Arc::new(Pipeline::new(
            StubProber::default(),
            extractor,
            StubFallback::failing(),
        ));

        let records = run(&pipeline, UrlTask::batch(urls), 2).await;

        let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["rec0", "rec1", "rec2"]);
    }

    #[tokio::test]
    async fn test_slow_task_does_not_block_others() {
        let urls = ["http://a.example/slow/0", "http://a.example/1", "http://a.example/2"];
        let mut extractor = StubExtractor::with(
            urls.iter()
                .map(|u| (*u, article(u, Markup::Present("<p/>".into()))))
                .collect(),
        );
        extractor.delay = Duration::from_millis(300);
        let pipeline = Arc::new(Pipeline::new(
            StubProber::default(),
            extractor,
            StubFallback::failing(),
        ));

        let t0 = Instant::now();
        let records = run(&pipeline, UrlTask::batch(urls), 2).await;

        assert_eq!(records.len(), 3);
        assert!(t0.elapsed() < Duration::from_millis(600));
    }

    #[tokio::test]
    async fn test_cardinality_and_tally_for_mixed_batch() {
        let good = "http://good.example/a";
        let dead = "http://dead.example/b";
        let partial = "http://partial.example/c";
        let broken = "http://broken.example/d";
        let pipeline = Arc::new(Pipeline::new(
            StubProber::with(&[(dead, 404), (broken, 500)]),
            StubExtractor::with(vec![
                (good, article("good", Markup::Present("<html>".into()))),
                (partial, article("partial", Markup::Empty)),
            ]),
            StubFallback::returning("<raw/>"),
        ));

        let (records, tally) =
            run_with_tally(&pipeline, UrlTask::batch([good, dead, partial, broken]), 3).await;

        assert_eq!(records.len(), 4);
        assert_eq!(records[0].title, "good");
        assert_eq!(records[1].http_code, 404);
        assert!(records[1].is_empty());
        assert_eq!(records[2].markup, "<raw/>");
        assert_eq!(records[3].http_code, 500);
        assert!(records[3].is_empty());
        assert_eq!(
            tally,
            Tally {
                unreachable: 1,
                extracted: 1,
                recovered: 1,
                without_markup: 0,
                failed: 1,
            }
        );
        assert_eq!(tally.total(), 4);
        assert_eq!(calls(&pipeline.extractor().calls), 3);
        assert_eq!(calls(&pipeline.fallback().calls), 1);
    }

    #[tokio::test]
    async fn test_every_404_record_is_empty() {
        let urls: Vec<String> = (0..20).map(|i| format!("http://site.example/{i}")).collect();
        let dead: Vec<(&str, u16)> = urls.iter().step_by(2).map(|u| (u.as_str(), 404)).collect();
        let pipeline = Arc::new(Pipeline::new(
            StubProber::with(&dead),
            StubExtractor::with(
                urls.iter()
                    .map(|u| (u.as_str(), article(u, Markup::Present("<p/>".into()))))
                    .collect(),
            ),
            StubFallback::failing(),
        ));

        let records = run(&pipeline, UrlTask::batch(urls.clone()), 4).await;

        assert_eq!(records.len(), 20);
        for (i, record) in records.iter().enumerate() {
            if record.http_code == 404 {
                assert!(record.is_empty());
            } else {
                assert_eq!(record.title, urls[i]);
            }
        }
        assert_eq!(calls(&pipeline.extractor().calls), 10);
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_contained() {
        let pipeline = Arc::new(Pipeline::new(
            HttpProber::new("gdelt_hydrator-test", Duration::from_secs(5)).unwrap(),
            StubExtractor::with(vec![(
                "http://fine.example/",
                article("fine", Markup::Present("<p/>".into())),
            )]),
            StubFallback::failing(),
        ));
        let urls = ["http://does-not-exist.invalid/x", "::garbage::", ""];

        let records = run(&pipeline, UrlTask::batch(urls), 2).await;

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.http_code == 404 && r.is_empty()));
        assert_eq!(calls(&pipeline.extractor().calls), 0);
    }

    #[tokio::test]
    async fn test_zero_concurrency_still_runs() {
        let pipeline = Arc::new(Pipeline::new(
            StubProber::with(&[("http://x.example/", 404)]),
            StubExtractor::default(),
            StubFallback::failing(),
        ));
        let records = run(&pipeline, UrlTask::batch(["http://x.example/"]), 0).await;
        assert_eq!(records, vec![ExtractionRecord::unreachable()]);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let pipeline = Arc::new(Pipeline::new(
            StubProber::default(),
            StubExtractor::default(),
            StubFallback::failing(),
        ));
        assert!(run(&pipeline, Vec::new(), 4).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cpu_bound_extractions_overlap() {
        let pipeline = Arc::new(Pipeline::new(
            StubProber::default(),
            BusyExtractor::default(),
            StubFallback::failing(),
        ));
        let urls: Vec<String> = (0..4).map(|i| format!("http://busy.example/{i}")).collect();

        let t0 = Instant::now();
        let records = run(&pipeline, UrlTask::batch(urls), 4).await;

        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.title == "busy"));
        assert!(t0.elapsed() < Duration::from_millis(600));
        assert!(pipeline.extractor().threads.lock().unwrap().len() > 1);
    }
}
