use crate::fetcher::PageSource;
use crate::models::{Dataset, RawVacancy};
use futures::future::join_all;
use tracing::{debug, info};

/// Receives harvest progress. Counts only ever grow within a session.
pub trait HarvestObserver: Send + Sync {
    fn on_progress(&self, records_so_far: usize);
    fn on_complete(&self, _dataset: &Dataset) {}
}

/// Observer that ignores everything.
#[cfg(test)]
pub struct SilentObserver;

#[cfg(test)]
impl HarvestObserver for SilentObserver {
    fn on_progress(&self, _records_so_far: usize) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EmptyPageThreshold,
    PageBudgetExhausted,
}

#[derive(Debug)]
pub struct HarvestOutcome {
    pub records: Vec<RawVacancy>,
    pub pages_requested: u32,
    pub stop_reason: StopReason,
}

pub struct Harvester<'a, S: PageSource> {
    source: &'a S,
    session_token: &'a str,
    empty_page_threshold: u32,
    observer: &'a dyn HarvestObserver,
}

impl<'a, S: PageSource> Harvester<'a, S> {
    pub fn new(
        source: &'a S,
        session_token: &'a str,
        empty_page_threshold: u32,
        observer: &'a dyn HarvestObserver,
    ) -> Self {
        Self {
            source,
            session_token,
            empty_page_threshold: empty_page_threshold.max(1),
            observer,
        }
    }

    /// Fetch pages 1..=max_pages in batches of at most `concurrency`.
    ///
    /// Stops once `empty_page_threshold` consecutive pages came back empty or
    /// the page budget is spent. An empty page may also be a fetch that
    /// failed every retry; the two cases are indistinguishable here.
    pub async fn harvest(&self, max_pages: u32, concurrency: usize) -> HarvestOutcome {
        let batch_size = u32::try_from(concurrency).unwrap_or(u32::MAX).max(1);
        let mut records = Vec::new();
        let mut consecutive_empty = 0u32;
        let mut next_page = 1u32;

        while next_page <= max_pages {
            let last_page = next_page.saturating_add(batch_size - 1).min(max_pages);
            let pages: Vec<u32> = (next_page..=last_page).collect();
            debug!(first = next_page, last = last_page, "fetching batch");

            let fetches = pages.iter().map(|&page| self.source.fetch(page, self.session_token));
            let batch = join_all(fetches).await;

            // join_all keeps request order, so the streak is counted in page order
            for (page, page_records) in pages.iter().zip(batch) {
                if page_records.is_empty() {
                    consecutive_empty += 1;
                    debug!(page, consecutive_empty, "empty page");
                    if consecutive_empty >= self.empty_page_threshold {
                        info!(page, total = records.len(), "empty page threshold reached");
                        self.observer.on_progress(records.len());
                        return HarvestOutcome {
                            records,
                            pages_requested: last_page,
                            stop_reason: StopReason::EmptyPageThreshold,
                        };
                    }
                } else {
                    consecutive_empty = 0;
                    records.extend(page_records);
                }
            }

            self.observer.on_progress(records.len());
            if last_page == max_pages {
                break;
            }
            next_page = last_page + 1;
        }

        info!(pages = max_pages, total = records.len(), "page budget exhausted");
        HarvestOutcome {
            records,
            pages_requested: max_pages,
            stop_reason: StopReason::PageBudgetExhausted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Serves canned pages and records every page it was asked for.
    struct ScriptedSource {
        pages: HashMap<u32, usize>,
        requested: Mutex<Vec<u32>>,
    }

    impl ScriptedSource {
        fn new(pages: &[(u32, usize)]) -> Self {
            Self {
                pages: pages.iter().copied().collect(),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<u32> {
            let mut pages = self.requested.lock().unwrap().clone();
            pages.sort_unstable();
            pages
        }
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        async fn fetch(&self, page: u32, _session_token: &str) -> Vec<RawVacancy> {
            self.requested.lock().unwrap().push(page);
            let count = self.pages.get(&page).copied().unwrap_or(0);
            (0..count)
                .map(|i| RawVacancy::from_value(json!({"posisi": format!("p{page}-{i}")})).unwrap())
                .collect()
        }
    }

    struct CountingObserver(Mutex<Vec<usize>>);

    impl HarvestObserver for CountingObserver {
        fn on_progress(&self, records_so_far: usize) {
            self.0.lock().unwrap().push(records_so_far);
        }
    }

    #[tokio::test]
    async fn stops_after_empty_page_threshold() {
        let threshold = 3;
        let source = ScriptedSource::new(&[(1, 2), (2, 2), (3, 1)]);
        let harvester = Harvester::new(&source, "tok", threshold, &SilentObserver);

        let outcome = harvester.harvest(100, 3).await;

        assert_eq!(outcome.stop_reason, StopReason::EmptyPageThreshold);
        assert_eq!(outcome.records.len(), 5);
        // Whole batches are issued, so the last request can be up to
        // concurrency - 1 pages past the stopping page. The bound below only
        // holds while concurrency <= threshold + 3.
        assert!(source.requested().iter().all(|&p| p <= threshold + 3));
        assert_eq!(source.requested(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn sporadic_empty_pages_do_not_stop_harvest() {
        // page 3 empty (e.g. a transient failure), data resumes on page 4
        let source = ScriptedSource::new(&[(1, 1), (2, 1), (4, 1), (5, 1)]);
        let harvester = Harvester::new(&source, "tok", 2, &SilentObserver);

        let outcome = harvester.harvest(50, 1).await;

        assert_eq!(outcome.records.len(), 4);
        assert_eq!(source.requested(), vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[tokio::test]
    async fn failed_pages_at_threshold_end_harvest_early() {
        // Known imprecision: a run of failed fetches looks exactly like the end of data,
        // so page 4 with real data is never reached.
        let source = ScriptedSource::new(&[(1, 1), (4, 1)]);
        let harvester = Harvester::new(&source, "tok", 2, &SilentObserver);

        let outcome = harvester.harvest(10, 1).await;

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.stop_reason, StopReason::EmptyPageThreshold);
        assert_eq!(source.requested(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn respects_page_budget() {
        let pages: Vec<(u32, usize)> = (1..=20).map(|p| (p, 1)).collect();
        let source = ScriptedSource::new(&pages);
        let harvester = Harvester::new(&source, "tok", 3, &SilentObserver);

        let outcome = harvester.harvest(7, 4).await;

        assert_eq!(outcome.stop_reason, StopReason::PageBudgetExhausted);
        assert_eq!(outcome.records.len(), 7);
        assert_eq!(source.requested(), (1..=7).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn progress_is_monotonic_record_count() {
        let pages: Vec<(u32, usize)> = (1..=6).map(|p| (p, 2)).collect();
        let source = ScriptedSource::new(&pages);
        let observer = CountingObserver(Mutex::new(Vec::new()));
        let harvester = Harvester::new(&source, "tok", 3, &observer);

        harvester.harvest(6, 2).await;

        let progress = observer.0.lock().unwrap().clone();
        assert_eq!(progress, vec![4, 8, 12]);
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Start(u32),
        Finish(u32),
    }

    /// Every page has one record and takes a page-dependent time to answer.
    /// Tracks how many fetches overlap and logs starts and finishes in order.
    struct SlowSource {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        events: Mutex<Vec<Event>>,
    }

    impl SlowSource {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                events: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PageSource for SlowSource {
        async fn fetch(&self, page: u32, _session_token: &str) -> Vec<RawVacancy> {
            self.events.lock().unwrap().push(Event::Start(page));
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(5 * u64::from(page % 3 + 1))).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.events.lock().unwrap().push(Event::Finish(page));
            vec![RawVacancy::from_value(json!({"posisi": format!("p{page}")})).unwrap()]
        }
    }

    #[tokio::test]
    async fn batches_run_concurrently_and_never_overlap() {
        let concurrency = 3;
        let source = SlowSource::new();
        let harvester = Harvester::new(&source, "tok", 3, &SilentObserver);

        let outcome = harvester.harvest(9, concurrency).await;

        assert_eq!(outcome.records.len(), 9);
        assert_eq!(source.peak.load(Ordering::SeqCst), concurrency);

        let batch_of = |page: u32| (page as usize - 1) / concurrency;
        let mut finished = [0usize; 3];
        for event in source.events.lock().unwrap().iter() {
            match *event {
                Event::Start(page) if batch_of(page) > 0 => {
                    assert_eq!(
                        finished[batch_of(page) - 1],
                        concurrency,
                        "page {page} started before the previous batch returned"
                    );
                }
                Event::Start(_) => {}
                Event::Finish(page) => finished[batch_of(page)] += 1,
            }
        }
        assert_eq!(finished, [concurrency; 3]);
    }

    #[tokio::test]
    async fn oversized_concurrency_is_capped_by_page_budget() {
        let pages: Vec<(u32, usize)> = (1..=5).map(|p| (p, 1)).collect();
        let source = ScriptedSource::new(&pages);
        let harvester = Harvester::new(&source, "tok", 3, &SilentObserver);

        let outcome = harvester.harvest(5, usize::MAX).await;

        assert_eq!(outcome.stop_reason, StopReason::PageBudgetExhausted);
        assert_eq!(outcome.records.len(), 5);
        assert_eq!(source.requested(), (1..=5).collect::<Vec<_>>());
    }
}
