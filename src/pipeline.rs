use crate::aggregator::aggregate;
use crate::classifier::InstitutionClassifier;
use crate::fetcher::PageSource;
use crate::harvester::{HarvestObserver, Harvester, StopReason};
use crate::models::{CanonicalRecord, Config, RawVacancy};
use crate::normalizer::{normalize, NormalizedVacancy};
use crate::session::HarvestSession;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

/// Normalize raw vacancies, dropping only those without a title.
pub fn normalize_all(raw: &[RawVacancy]) -> Vec<NormalizedVacancy> {
    let mut normalized = Vec::with_capacity(raw.len());
    let mut dropped = 0usize;

    for vacancy in raw {
        match normalize(vacancy) {
            Ok(n) => normalized.push(n),
            Err(_) => dropped += 1,
        }
    }

    if dropped > 0 {
        warn!(dropped, "skipped vacancies without a title");
    }
    normalized
}

/// Label every pending row with one classifier in a single batch.
pub fn classify_all(pending: Vec<NormalizedVacancy>, classifier: &dyn InstitutionClassifier) -> Vec<CanonicalRecord> {
    let texts: Vec<&str> = pending.iter().map(|p| p.text.as_str()).collect();
    let labels = classifier.classify_batch(&texts);

    pending
        .into_iter()
        .zip(labels)
        .map(|(vacancy, label)| vacancy.into_record(label))
        .collect()
}

/// Run one complete harvest session: fetch, normalize, classify, aggregate.
pub async fn run_session<S: PageSource>(
    source: &S,
    classifier: &dyn InstitutionClassifier,
    config: &Config,
    observer: &dyn HarvestObserver,
) -> HarvestSession {
    let token = Uuid::new_v4().to_string();
    let started_at = Utc::now();
    info!(token = %token, classifier = classifier.name(), "starting harvest session");

    let harvester = Harvester::new(source, &token, config.empty_page_threshold, observer);
    let outcome = harvester.harvest(config.max_pages, config.concurrency).await;
    if outcome.stop_reason == StopReason::PageBudgetExhausted {
        warn!(max_pages = config.max_pages, "page budget reached before the listing ran dry");
    }

    let pending = normalize_all(&outcome.records);
    let labeled = classify_all(pending, classifier);
    let dataset = aggregate(labeled);
    info!(
        raw = outcome.records.len(),
        unique = dataset.len(),
        pages = outcome.pages_requested,
        "harvest session complete"
    );

    observer.on_complete(&dataset);

    HarvestSession {
        token,
        started_at,
        finished_at: Utc::now(),
        pages_requested: outcome.pages_requested,
        classifier: classifier.name().to_string(),
        dataset,
    }
}
