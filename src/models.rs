use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub base_url: String,
    pub page_limit: u32,
    pub max_pages: u32,
    pub concurrency: usize,
    pub empty_page_threshold: u32,
    // Per-request fetch behaviour
    pub request_timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub backoff: BackoffMode,
    // Classifier artifacts; both must load for the trained classifier to be used
    pub vectorizer_path: Option<String>,
    pub model_path: Option<String>,
    pub rule_fallback: RuleFallback,
    pub output_directory: Option<String>,
    pub snapshot_ttl_secs: u64,
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackoffMode {
    #[serde(rename = "fixed")]
    Fixed,
    #[serde(rename = "linear")]
    Linear,
}

/// Label the rule engine assigns when no keyword matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleFallback {
    #[serde(rename = "private")]
    Private,
    #[serde(rename = "private_small")]
    PrivateSmall,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://maganghub.kemnaker.go.id/be/v1/api/list/vacancies-aktif".to_string(),
            page_limit: 100,
            max_pages: 200,
            concurrency: 10,
            empty_page_threshold: 3,
            request_timeout_secs: 10,
            max_attempts: 3,
            backoff_ms: 500,
            backoff: BackoffMode::Linear,
            vectorizer_path: Some("vectorizer_maganghub.json".to_string()),
            model_path: Some("model_maganghub.json".to_string()),
            rule_fallback: RuleFallback::Private,
            output_directory: Some("output".to_string()),
            snapshot_ttl_secs: 3600,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read config file: {}", file_path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", file_path))?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.base_url.trim().is_empty() {
            bail!("base_url must not be empty");
        }
        if self.page_limit == 0 {
            bail!("page_limit must be greater than zero");
        }
        if self.max_pages == 0 {
            bail!("max_pages must be greater than zero");
        }
        if self.concurrency == 0 {
            bail!("concurrency must be greater than zero");
        }
        if self.empty_page_threshold == 0 {
            bail!("empty_page_threshold must be greater than zero");
        }
        if !(1..=10).contains(&self.max_attempts) {
            bail!("max_attempts must be between 1 and 10, got {}", self.max_attempts);
        }
        Ok(())
    }
}

/// One vacancy object exactly as the listing API returned it.
///
/// The schema is not stable across API versions, so fields are read through
/// lenient accessors instead of a typed struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawVacancy(pub Map<String, Value>);

impl RawVacancy {
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// Nested object field; anything that is not an object reads as absent.
    pub fn object(&self, key: &str) -> Option<&Map<String, Value>> {
        self.get(key).and_then(Value::as_object)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstitutionType {
    Government,
    Private,
    Unknown,
}

impl InstitutionType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "government" | "negeri" | "gov" => Some(Self::Government),
            "private" | "swasta" => Some(Self::Private),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for InstitutionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InstitutionType::Government => "Government",
            InstitutionType::Private => "Private",
            InstitutionType::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrivateScale {
    Large,
    Small,
}

/// Outcome of classifying one institution text blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub institution_type: InstitutionType,
    pub scale: Option<PrivateScale>,
}

impl Classification {
    pub const GOVERNMENT: Self = Self { institution_type: InstitutionType::Government, scale: None };
    pub const PRIVATE: Self = Self { institution_type: InstitutionType::Private, scale: None };
    pub const PRIVATE_LARGE: Self = Self {
        institution_type: InstitutionType::Private,
        scale: Some(PrivateScale::Large),
    };
    pub const PRIVATE_SMALL: Self = Self {
        institution_type: InstitutionType::Private,
        scale: Some(PrivateScale::Small),
    };
    pub const UNKNOWN: Self = Self { institution_type: InstitutionType::Unknown, scale: None };
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scale {
            Some(PrivateScale::Large) => write!(f, "{} (large)", self.institution_type),
            Some(PrivateScale::Small) => write!(f, "{} (small)", self.institution_type),
            None => write!(f, "{}", self.institution_type),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub district: String,
    pub province: String,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.district.is_empty(), self.province.is_empty()) {
            (false, false) => write!(f, "{}, {}", self.district, self.province),
            (false, true) => f.write_str(&self.district),
            (true, false) => f.write_str(&self.province),
            (true, true) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub title: String,
    pub institution_name: String,
    pub institution_type: InstitutionType,
    pub institution_scale: Option<PrivateScale>,
    pub program_of_study: Vec<String>,
    pub degree_level: Vec<String>,
    pub location: Location,
    pub quota: u32,
    pub registered: u32,
    pub acceptance_likelihood: u8,
    pub published_at: Option<DateTime<Utc>>,
}

impl CanonicalRecord {
    pub fn classification(&self) -> Classification {
        Classification {
            institution_type: self.institution_type,
            scale: self.institution_scale,
        }
    }

    pub fn dedup_key(&self) -> (&str, &str) {
        (&self.title, &self.institution_name)
    }
}

/// Deduplicated records of one harvest session, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub records: Vec<CanonicalRecord>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CanonicalRecord> {
        self.records.iter()
    }

    pub fn count_by_type(&self, institution_type: InstitutionType) -> usize {
        self.records
            .iter()
            .filter(|r| r.institution_type == institution_type)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_config_is_valid_and_round_trips_through_toml() {
        let config = Config::default();
        config.validate().unwrap();

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.page_limit, 100);
        assert_eq!(parsed.backoff, BackoffMode::Linear);
        assert_eq!(parsed.rule_fallback, RuleFallback::Private);
    }

    #[test]
    fn validate_rejects_out_of_range_attempts() {
        let mut config = Config::default();
        config.max_attempts = 11;
        assert!(config.validate().is_err());
        config.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let config = Config { concurrency: 0, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn raw_vacancy_treats_null_as_absent() {
        let raw = RawVacancy::from_value(json!({"posisi": null, "perusahaan": "x"})).unwrap();
        assert!(raw.get("posisi").is_none());
        assert!(raw.object("perusahaan").is_none());
        assert!(RawVacancy::from_value(json!([1, 2])).is_none());
    }

    #[test]
    fn classification_labels() {
        assert_eq!(Classification::GOVERNMENT.to_string(), "Government");
        assert_eq!(Classification::PRIVATE_LARGE.to_string(), "Private (large)");
        assert_eq!(Classification::PRIVATE_SMALL.to_string(), "Private (small)");
        assert_eq!(InstitutionType::parse("Negeri"), Some(InstitutionType::Government));
        assert_eq!(InstitutionType::parse("swasta"), Some(InstitutionType::Private));
        assert_eq!(InstitutionType::parse("other"), None);
    }

    #[test]
    fn location_display_skips_blank_parts() {
        let both = Location { district: "Kota Bandung".into(), province: "Jawa Barat".into() };
        assert_eq!(both.to_string(), "Kota Bandung, Jawa Barat");
        let only_province = Location { district: String::new(), province: "Bali".into() };
        assert_eq!(only_province.to_string(), "Bali");
    }
}
