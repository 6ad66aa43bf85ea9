use crate::error::NormalizeError;
use crate::models::{CanonicalRecord, Classification, InstitutionType, Location, RawVacancy};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

/// A vacancy flattened into its canonical row, waiting for classification.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedVacancy {
    pub record: CanonicalRecord,
    /// Company name, address and description joined for the classifier.
    pub text: String,
}

impl NormalizedVacancy {
    /// Consume the pending row, fixing its institution label.
    pub fn into_record(self, classification: Classification) -> CanonicalRecord {
        CanonicalRecord {
            institution_type: classification.institution_type,
            institution_scale: classification.scale,
            ..self.record
        }
    }
}

/// The shapes a program-of-study or degree-level payload has been seen in.
#[derive(Deserialize)]
#[serde(untagged)]
enum TitleListPayload {
    Titled(Vec<TitledEntry>),
    Plain(Vec<String>),
    Mixed(Vec<Value>),
}

#[derive(Deserialize)]
struct TitledEntry {
    title: String,
}

/// Flatten one API vacancy. Only a missing title rejects the record; every
/// other malformed field degrades to an empty value.
pub fn normalize(raw: &RawVacancy) -> Result<NormalizedVacancy, NormalizeError> {
    let title = text_field(raw.get("posisi"));
    if title.is_empty() {
        return Err(NormalizeError::MissingTitle);
    }

    let empty = Map::new();
    let company = raw.object("perusahaan").unwrap_or(&empty);

    let mut institution_name = text_field(company.get("nama_perusahaan"));
    if institution_name.is_empty() {
        institution_name = agency_name(raw);
    }
    let address = text_field(company.get("alamat"));
    let description = text_field(company.get("deskripsi_perusahaan"));

    let location = Location {
        district: text_field(company.get("nama_kabupaten")),
        province: text_field(company.get("nama_provinsi")),
    };

    let text = format!("{} {} {}", institution_name, address, description);

    let record = CanonicalRecord {
        title,
        institution_name,
        institution_type: InstitutionType::Unknown,
        institution_scale: None,
        program_of_study: parse_title_list(raw.get("program_studi")),
        degree_level: parse_title_list(raw.get("jenjang")),
        location,
        quota: count_field(raw.get("jumlah_kuota")),
        registered: count_field(raw.get("jumlah_terdaftar")),
        acceptance_likelihood: 0,
        published_at: raw.get("created_at").and_then(Value::as_str).and_then(parse_timestamp),
    };

    Ok(NormalizedVacancy { record, text })
}

/// Extract titles from a program/degree field.
///
/// The field is usually a JSON-encoded string, sometimes an inline array.
/// A string that fails to parse is kept verbatim as a single entry.
pub fn parse_title_list(value: Option<&Value>) -> Vec<String> {
    match value {
        None => Vec::new(),
        Some(Value::String(encoded)) => {
            let trimmed = encoded.trim();
            if trimmed.is_empty() {
                return Vec::new();
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(Value::Array(items)) => titles_from_items(items),
                Ok(Value::String(inner)) => vec![inner.trim().to_string()],
                _ => vec![trimmed.to_string()],
            }
        }
        Some(Value::Array(items)) => titles_from_items(items.clone()),
        Some(other) => vec![other.to_string()],
    }
}

pub fn join_titles(titles: &[String]) -> String {
    titles.join(", ")
}

fn titles_from_items(items: Vec<Value>) -> Vec<String> {
    let titles = match serde_json::from_value::<TitleListPayload>(Value::Array(items)) {
        Ok(TitleListPayload::Titled(entries)) => entries.into_iter().map(|e| e.title).collect(),
        Ok(TitleListPayload::Plain(names)) => names,
        Ok(TitleListPayload::Mixed(values)) => values.iter().filter_map(title_of).collect(),
        Err(_) => Vec::new(),
    };

    titles
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn title_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("title")
            .or_else(|| map.get("nama"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn agency_name(raw: &RawVacancy) -> String {
    raw.object("government_agency")
        .map(|agency| {
            let name = text_field(agency.get("government_agency_name"));
            if name.is_empty() {
                text_field(agency.get("nama"))
            } else {
                name
            }
        })
        .unwrap_or_default()
}

fn text_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Non-negative count from a number or numeric string; anything else is 0.
fn count_field(value: Option<&Value>) -> u32 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.unwrap_or(0).clamp(0, u32::MAX as i64) as u32
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
