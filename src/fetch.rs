use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::candidates::Candidate;
use crate::source::{DrawSource, FetchError, RawDraw};

const RETRY_BACKOFF_MS: u64 = 250;

/// Retrieves candidates with at most `concurrency` requests in flight.
///
/// Workers pull the next index from a shared cursor until the list is
/// exhausted. Sources that are missing or fail are left out of the result,
/// which is ordered by date.
pub fn fetch_all<S>(
    source: &S,
    candidates: &[Candidate],
    concurrency: usize,
    retries: u32,
) -> Vec<RawDraw>
where
    S: DrawSource + ?Sized,
{
    if candidates.is_empty() {
        return Vec::new();
    }

    let start_time = Instant::now();
    let worker_count = concurrency.clamp(1, candidates.len());
    info!(
        action = "start",
        component = "fetch_scheduler",
        candidate_count = candidates.len(),
        worker_count,
        "Fetching draw files"
    );

    let cursor = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
        for _ in 0..worker_count {
            let tx = tx.clone();
            let cursor = &cursor;
            scope.spawn(move || loop {
                let index = cursor.fetch_add(1, Ordering::Relaxed);
                let Some(candidate) = candidates.get(index) else {
                    break;
                };
                match retrieve_with_retry(source, candidate, retries) {
                    Ok(text) => {
                        let draw = RawDraw {
                            date: candidate.date,
                            text,
                        };
                        if tx.send(draw).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(action = "skip", component = "fetch_scheduler", date = %candidate.date, error = %e, "Draw file unavailable");
                    }
                }
            });
        }
    });
    drop(tx);

    let mut draws: Vec<RawDraw> = rx.into_iter().collect();
    draws.sort_by_key(|d| d.date);

    info!(
        action = "complete",
        component = "fetch_scheduler",
        retrieved = draws.len(),
        missing = candidates.len() - draws.len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Fetch batch completed"
    );
    draws
}

fn retrieve_with_retry<S>(source: &S, candidate: &Candidate, retries: u32) -> Result<String, FetchError>
where
    S: DrawSource + ?Sized,
{
    let mut attempt = 0;
    loop {
        match source.retrieve(candidate) {
            Err(e) if e.is_transient() && attempt < retries => {
                attempt += 1;
                debug!(action = "retry", component = "fetch_scheduler", date = %candidate.date, attempt, error = %e, "Retrying draw file");
                thread::sleep(Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempt)));
            }
            result => return result,
        }
    }
}
