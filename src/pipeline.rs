use chrono::{DateTime, NaiveDate, Utc};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::cache::SnapshotCache;
use crate::candidates::{enumerate_candidates, Candidate};
use crate::config::PipelineConfig;
use crate::fetch::fetch_all;
use crate::merge::{merge, MergedFrequency};
use crate::parser::{parse_batch, DrawAggregate};
use crate::select::{select_dates, Selection};
use crate::source::DrawSource;
use crate::store::AggregateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Recent,
    Backfill,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: Phase,
    pub requested: usize,
    pub stored: usize,
    pub duration: Duration,
}

/// Owns the store, the cache and the source, and drives fetch phases.
pub struct Pipeline {
    source: Arc<dyn DrawSource>,
    store: Arc<AggregateStore>,
    cache: Option<SnapshotCache>,
    config: PipelineConfig,
    generation: Arc<AtomicU64>,
    pool: Arc<rayon::ThreadPool>,
}

/// Older draws being fetched on a background thread.
pub struct Backfill {
    handle: JoinHandle<Option<PhaseReport>>,
}

impl Pipeline {
    pub fn new(source: Arc<dyn DrawSource>, config: PipelineConfig) -> anyhow::Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("drawstat-parse-{i}"))
            .build()?;
        info!(action = "configure", component = "pipeline", source = %source.describe(), worker_count = config.workers, concurrency = config.concurrency, "Pipeline ready");

        Ok(Self {
            source,
            store: Arc::new(AggregateStore::new()),
            cache: None,
            config,
            generation: Arc::new(AtomicU64::new(0)),
            pool: Arc::new(pool),
        })
    }

    pub fn with_cache(mut self, cache: SnapshotCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn store(&self) -> &AggregateStore {
        &self.store
    }

    /// Seeds the store from a fresh cache snapshot. Cache problems leave the
    /// store empty. Returns the number of draws restored.
    pub fn restore(&self, now: DateTime<Utc>) -> usize {
        let Some(cache) = &self.cache else {
            return 0;
        };
        match cache.load(now) {
            Ok(Some(snapshot)) => {
                let count = snapshot.data.len();
                for (date, aggregate) in snapshot.data {
                    self.store.set(date, aggregate);
                }
                count
            }
            Ok(None) => 0,
            Err(e) => {
                warn!(action = "load", component = "snapshot_cache", error = %e, "Ignoring unreadable cache");
                0
            }
        }
    }

    /// Drops the cached snapshot so the next run fetches everything.
    pub fn discard_cache(&self) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.clear() {
                warn!(action = "clear", component = "snapshot_cache", error = %e, "Failed to clear cache");
            }
        }
    }

    /// Candidates up to `today` that are not in the store yet, ascending.
    pub fn pending(&self, today: NaiveDate) -> Vec<Candidate> {
        enumerate_candidates(today)
            .into_iter()
            .filter(|c| !self.store.has(c.date))
            .collect()
    }

    /// Fetches, parses and stores `candidates`, then persists the store.
    pub fn run_phase(&self, phase: Phase, candidates: &[Candidate]) -> PhaseReport {
        let start_time = Instant::now();
        info!(action = "start", component = "pipeline", phase = ?phase, candidate_count = candidates.len(), "Starting fetch phase");

        let aggregates = fetch_and_parse(self.source.as_ref(), candidates, &self.config, &self.pool);
        let stored = aggregates.len();
        let store = &self.store;
        self.pool.install(|| {
            aggregates
                .into_par_iter()
                .for_each(|agg| store.set(agg.date, agg));
        });
        self.persist();

        let report = PhaseReport {
            phase,
            requested: candidates.len(),
            stored,
            duration: start_time.elapsed(),
        };
        info!(action = "complete", component = "pipeline", phase = ?phase, stored, duration_ms = report.duration.as_millis(), "Fetch phase completed");
        report
    }

    /// Fetches the most recent pending draws now and the rest on a background
    /// thread. Nothing is fetched for dates already in the store.
    pub fn refresh(&self, today: NaiveDate) -> (PhaseReport, Option<Backfill>) {
        let mut pending = self.pending(today);
        let split = pending.len().saturating_sub(self.config.recent_draws);
        let recent = pending.split_off(split);

        let report = self.run_phase(Phase::Recent, &recent);
        let backfill = (!pending.is_empty()).then(|| self.spawn_backfill(pending));
        (report, backfill)
    }

    fn spawn_backfill(&self, candidates: Vec<Candidate>) -> Backfill {
        let source = Arc::clone(&self.source);
        let store = Arc::clone(&self.store);
        let pool = Arc::clone(&self.pool);
        let generation = Arc::clone(&self.generation);
        let config = self.config.clone();
        let started_in = generation.load(Ordering::SeqCst);

        let handle = thread::spawn(move || {
            let start_time = Instant::now();
            info!(action = "start", component = "pipeline", phase = ?Phase::Backfill, candidate_count = candidates.len(), "Starting fetch phase");

            let aggregates = fetch_and_parse(source.as_ref(), &candidates, &config, &pool);
            let stored = store.commit_if(aggregates, || generation.load(Ordering::SeqCst) == started_in);
            match stored {
                Some(stored) => Some(PhaseReport {
                    phase: Phase::Backfill,
                    requested: candidates.len(),
                    stored,
                    duration: start_time.elapsed(),
                }),
                None => {
                    info!(action = "discard", component = "pipeline", phase = ?Phase::Backfill, "Superseded backfill discarded");
                    None
                }
            }
        });
        Backfill { handle }
    }

    /// Invalidates any backfill still running; its results will not be stored.
    pub fn supersede(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn select(&self, selection: &Selection, today: NaiveDate) -> Vec<NaiveDate> {
        select_dates(&self.store.keys(), selection, today)
    }

    pub fn merge(&self, dates: &[NaiveDate]) -> MergedFrequency {
        let store = &self.store;
        let date_cap = self.config.date_cap;
        self.pool.install(|| merge(store, dates, date_cap))
    }

    fn persist(&self) {
        let Some(cache) = &self.cache else {
            return;
        };
        if let Err(e) = cache.save(&self.store.snapshot(), Utc::now()) {
            warn!(action = "save", component = "snapshot_cache", error = %e, "Failed to persist snapshot");
        }
    }
}

impl Backfill {
    /// Waits for the background phase and persists what it stored. `None`
    /// means the phase was superseded or its thread died.
    pub fn wait(self, pipeline: &Pipeline) -> Option<PhaseReport> {
        let report = match self.handle.join() {
            Ok(report) => report?,
            Err(_) => {
                warn!(action = "join", component = "pipeline", "Backfill thread panicked");
                return None;
            }
        };
        pipeline.persist();
        info!(action = "complete", component = "pipeline", phase = ?report.phase, stored = report.stored, duration_ms = report.duration.as_millis(), "Fetch phase completed");
        Some(report)
    }
}

fn fetch_and_parse(
    source: &dyn DrawSource,
    candidates: &[Candidate],
    config: &PipelineConfig,
    pool: &rayon::ThreadPool,
) -> Vec<DrawAggregate> {
    let draws = fetch_all(source, candidates, config.concurrency, config.retries);
    pool.install(|| parse_batch(draws))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FetchError;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct MapSource {
        files: HashMap<String, String>,
        calls: AtomicUsize,
        gate: Mutex<()>,
    }

    impl DrawSource for MapSource {
        fn retrieve(&self, candidate: &Candidate) -> Result<String, FetchError> {
            let _open = self.gate.lock().unwrap();
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.files
                .get(&candidate.locator)
                .cloned()
                .ok_or_else(|| FetchError::NotFound(candidate.locator.clone()))
        }

        fn describe(&self) -> String {
            "map".into()
        }
    }

    fn source(dates: &[&str]) -> Arc<MapSource> {
        Arc::new(MapSource {
            files: dates
                .iter()
                .map(|d| (format!("{d}.txt"), "hdr\nTWO 12".to_string()))
                .collect(),
            calls: AtomicUsize::new(0),
            gate: Mutex::new(()),
        })
    }

    fn config(recent_draws: usize) -> PipelineConfig {
        PipelineConfig {
            recent_draws,
            workers: 2,
            ..PipelineConfig::default()
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn recent_phase_takes_latest_pending_candidates() {
        let src = source(&["2007-01-01", "2007-01-16"]);
        let pipeline = Pipeline::new(src.clone(), config(2)).unwrap();
        let (report, backfill) = pipeline.refresh(date(2007, 1, 17));

        assert_eq!(report.requested, 2);
        assert_eq!(report.stored, 1);
        assert!(pipeline.store().has(date(2007, 1, 16)));

        let backfill = backfill.unwrap().wait(&pipeline).unwrap();
        assert_eq!(backfill.phase, Phase::Backfill);
        assert_eq!(backfill.stored, 1);
        assert_eq!(pipeline.store().keys(), [date(2007, 1, 1), date(2007, 1, 16)]);
    }

    #[test]
    fn stored_dates_are_not_fetched_again() {
        let src = source(&["2007-01-01"]);
        let pipeline = Pipeline::new(src.clone(), config(100)).unwrap();
        let today = date(2007, 1, 3);

        pipeline.refresh(today);
        let first_calls = src.calls.load(Ordering::SeqCst);
        assert_eq!(first_calls, 5);

        let (report, backfill) = pipeline.refresh(today);
        assert!(backfill.is_none());
        assert_eq!(report.requested, 4);
        assert_eq!(src.calls.load(Ordering::SeqCst), first_calls + 4);
    }

    #[test]
    fn superseded_backfill_is_discarded() {
        let src = source(&["2007-01-01", "2007-01-16"]);
        let pipeline = Pipeline::new(src.clone(), config(1)).unwrap();

        let gate = src.gate.lock().unwrap();
        let backfill = pipeline.spawn_backfill(pipeline.pending(date(2007, 1, 16)));
        pipeline.supersede();
        drop(gate);

        assert!(backfill.wait(&pipeline).is_none());
        assert!(pipeline.store().is_empty());
    }

    #[test]
    fn restore_and_merge() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let src = source(&["2007-01-01"]);

        let pipeline = Pipeline::new(src.clone(), config(100))
            .unwrap()
            .with_cache(SnapshotCache::open(&path).unwrap());
        pipeline.refresh(date(2007, 1, 2));
        let dates = pipeline.select(&Selection::default(), date(2007, 1, 2));
        assert_eq!(pipeline.merge(&dates).draws, [date(2007, 1, 1)]);

        let restored = Pipeline::new(src, config(100))
            .unwrap()
            .with_cache(SnapshotCache::open(&path).unwrap());
        assert_eq!(restored.restore(Utc::now()), 1);
        assert!(restored.store().has(date(2007, 1, 1)));

        restored.discard_cache();
        let emptied = Pipeline::new(source(&[]), config(100))
            .unwrap()
            .with_cache(SnapshotCache::open(&path).unwrap());
        assert_eq!(emptied.restore(Utc::now()), 0);
    }
}
