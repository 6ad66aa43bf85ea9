use super::InstitutionClassifier;
use crate::error::ArtifactError;
use crate::models::Classification;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("token pattern is valid"));

/// Sparse feature vector as (feature index, weight) pairs.
pub type SparseVector = Vec<(usize, f64)>;

/// TF-IDF vectorizer exported from the offline trainer.
///
/// Mirrors the trainer's defaults: lowercase, tokens of two or more word
/// characters, raw counts scaled by idf, then L2 normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    pub vocabulary: HashMap<String, usize>,
    pub idf: Vec<f64>,
    #[serde(default = "default_true")]
    pub lowercase: bool,
    #[serde(default)]
    pub sublinear_tf: bool,
    #[serde(default = "default_true")]
    pub normalize: bool,
}

fn default_true() -> bool {
    true
}

impl TfidfVectorizer {
    pub fn feature_count(&self) -> usize {
        self.idf.len()
    }

    pub fn transform(&self, text: &str) -> SparseVector {
        let text = if self.lowercase { text.to_lowercase() } else { text.to_string() };

        let mut counts: HashMap<usize, f64> = HashMap::new();
        for token in TOKEN.find_iter(&text) {
            if let Some(&index) = self.vocabulary.get(token.as_str()) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let mut vector: SparseVector = counts
            .into_iter()
            .map(|(index, count)| {
                let tf = if self.sublinear_tf { 1.0 + count.ln() } else { count };
                (index, tf * self.idf[index])
            })
            .collect();
        vector.sort_unstable_by_key(|(index, _)| *index);

        if self.normalize {
            let norm = vector.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
            if norm > 0.0 {
                for (_, weight) in vector.iter_mut() {
                    *weight /= norm;
                }
            }
        }
        vector
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        if let Some((term, &index)) = self.vocabulary.iter().find(|&(_, &i)| i >= self.idf.len()) {
            return Err(ArtifactError::Shape(format!(
                "vocabulary term '{}' maps to feature {} but only {} idf weights exist",
                term,
                index,
                self.idf.len()
            )));
        }
        Ok(())
    }
}

/// Text model exported from the offline trainer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TextModel {
    MultinomialNb {
        classes: Vec<String>,
        class_log_prior: Vec<f64>,
        feature_log_prob: Vec<Vec<f64>>,
    },
    /// One weight row per class, or a single row for a binary model where a
    /// positive score selects the second class.
    Linear {
        classes: Vec<String>,
        coef: Vec<Vec<f64>>,
        intercept: Vec<f64>,
    },
}

impl TextModel {
    pub fn classes(&self) -> &[String] {
        match self {
            TextModel::MultinomialNb { classes, .. } | TextModel::Linear { classes, .. } => classes,
        }
    }

    pub fn predict(&self, features: &[(usize, f64)]) -> &str {
        let classes = self.classes();
        match self {
            TextModel::MultinomialNb { class_log_prior, feature_log_prob, .. } => {
                let scores = class_log_prior
                    .iter()
                    .zip(feature_log_prob)
                    .map(|(prior, log_probs)| prior + dot(features, log_probs));
                &classes[argmax(scores)]
            }
            TextModel::Linear { coef, intercept, .. } if coef.len() == 1 && classes.len() == 2 => {
                let score = intercept[0] + dot(features, &coef[0]);
                if score > 0.0 {
                    &classes[1]
                } else {
                    &classes[0]
                }
            }
            TextModel::Linear { coef, intercept, .. } => {
                let scores = coef.iter().zip(intercept).map(|(row, b)| b + dot(features, row));
                &classes[argmax(scores)]
            }
        }
    }

    fn validate(&self, feature_count: usize) -> Result<(), ArtifactError> {
        let classes = self.classes();
        if classes.is_empty() {
            return Err(ArtifactError::Shape("model has no classes".to_string()));
        }

        let (rows, bias_len) = match self {
            TextModel::MultinomialNb { class_log_prior, feature_log_prob, .. } => {
                if feature_log_prob.len() != classes.len() {
                    return Err(ArtifactError::Shape(format!(
                        "{} classes but {} feature_log_prob rows",
                        classes.len(),
                        feature_log_prob.len()
                    )));
                }
                (feature_log_prob, class_log_prior.len())
            }
            TextModel::Linear { coef, intercept, .. } => {
                let binary = coef.len() == 1 && classes.len() == 2;
                if !binary && coef.len() != classes.len() {
                    return Err(ArtifactError::Shape(format!(
                        "{} classes but {} coefficient rows",
                        classes.len(),
                        coef.len()
                    )));
                }
                (coef, intercept.len())
            }
        };

        if bias_len != rows.len() {
            return Err(ArtifactError::Shape(format!(
                "{} weight rows but {} bias terms",
                rows.len(),
                bias_len
            )));
        }
        if let Some(row) = rows.iter().find(|row| row.len() != feature_count) {
            return Err(ArtifactError::Shape(format!(
                "weight row has {} features, vectorizer produces {}",
                row.len(),
                feature_count
            )));
        }
        Ok(())
    }
}

fn dot(features: &[(usize, f64)], weights: &[f64]) -> f64 {
    features.iter().map(|&(index, value)| value * weights[index]).sum()
}

fn argmax(scores: impl Iterator<Item = f64>) -> usize {
    let mut best = (0, f64::NEG_INFINITY);
    for (index, score) in scores.enumerate() {
        if score > best.1 {
            best = (index, score);
        }
    }
    best.0
}

/// Map a model label onto the closed label set. Anything that is not
/// recognisably government counts as private.
pub fn label_to_classification(label: &str) -> Classification {
    let label = label.trim().to_lowercase();
    if label.starts_with("negeri") || label.starts_with("government") || label.starts_with("pemerintah") {
        Classification::GOVERNMENT
    } else {
        if !(label.starts_with("swasta") || label.starts_with("private")) {
            debug!(label = %label, "unrecognized model label coerced to private");
        }
        Classification::PRIVATE
    }
}

pub struct TrainedClassifier {
    vectorizer: TfidfVectorizer,
    model: TextModel,
}

impl TrainedClassifier {
    pub fn new(vectorizer: TfidfVectorizer, model: TextModel) -> Result<Self, ArtifactError> {
        vectorizer.validate()?;
        model.validate(vectorizer.feature_count())?;
        Ok(Self { vectorizer, model })
    }

    pub fn load(vectorizer_path: impl AsRef<Path>, model_path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let vectorizer: TfidfVectorizer = read_artifact(vectorizer_path.as_ref())?;
        let model: TextModel = read_artifact(model_path.as_ref())?;
        Self::new(vectorizer, model)
    }

    pub fn feature_count(&self) -> usize {
        self.vectorizer.feature_count()
    }
}

fn read_artifact<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let content = std::fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ArtifactError::Decode {
        path: path.display().to_string(),
        source,
    })
}

impl InstitutionClassifier for TrainedClassifier {
    fn name(&self) -> &'static str {
        "trained"
    }

    fn classify(&self, text: &str) -> Classification {
        let features = self.vectorizer.transform(text);
        label_to_classification(self.model.predict(&features))
    }

    fn classify_batch(&self, texts: &[&str]) -> Vec<Classification> {
        let matrix: Vec<SparseVector> = texts.iter().map(|text| self.vectorizer.transform(text)).collect();
        matrix
            .iter()
            .map(|features| label_to_classification(self.model.predict(features)))
            .collect()
    }
}
