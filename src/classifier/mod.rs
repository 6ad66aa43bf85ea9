pub mod rules;
pub mod trained;

use crate::models::{Classification, Config};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub use rules::RuleClassifier;
pub use trained::TrainedClassifier;

/// Labels institutions as government or private from their text blob.
pub trait InstitutionClassifier: Send + Sync {
    fn name(&self) -> &'static str;

    fn classify(&self, text: &str) -> Classification;

    fn classify_batch(&self, texts: &[&str]) -> Vec<Classification> {
        texts.iter().map(|text| self.classify(text)).collect()
    }
}

/// Pick the classifier for the whole session.
///
/// The trained model is used only when both artifacts load; any problem
/// falls back to the rule engine.
pub fn select_classifier(config: &Config) -> Arc<dyn InstitutionClassifier> {
    let rules = || -> Arc<dyn InstitutionClassifier> { Arc::new(RuleClassifier::new(config.rule_fallback)) };

    let (Some(vectorizer_path), Some(model_path)) = (&config.vectorizer_path, &config.model_path) else {
        info!("no classifier artifacts configured, using rule engine");
        return rules();
    };

    if !Path::new(vectorizer_path).exists() || !Path::new(model_path).exists() {
        info!(vectorizer = %vectorizer_path, model = %model_path, "classifier artifacts not found, using rule engine");
        return rules();
    }

    match TrainedClassifier::load(vectorizer_path, model_path) {
        Ok(classifier) => {
            info!(features = classifier.feature_count(), "loaded trained classifier");
            Arc::new(classifier)
        }
        Err(e) => {
            warn!(error = %e, "failed to load trained classifier, using rule engine");
            rules()
        }
    }
}
