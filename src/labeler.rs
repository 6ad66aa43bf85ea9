use crate::classifier::{InstitutionClassifier, RuleClassifier};
use crate::models::{Classification, InstitutionType, PrivateScale, RawVacancy, RuleFallback};
use anyhow::Result;
use csv::Writer;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::io::Write;

/// One row of the seed dataset the offline trainer learns from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabeledCompany {
    pub nama: String,
    pub alamat: String,
    pub deskripsi: String,
    pub kategori: String,
}

/// Category names the trainer expects.
pub fn category_label(classification: Classification) -> &'static str {
    match (classification.institution_type, classification.scale) {
        (InstitutionType::Government, _) => "Negeri",
        (InstitutionType::Private, Some(PrivateScale::Large)) => "Swasta Besar",
        (InstitutionType::Private, Some(PrivateScale::Small)) => "Swasta Kecil",
        (InstitutionType::Private, None) => "Swasta",
        (InstitutionType::Unknown, _) => "Tidak Diketahui",
    }
}

/// Auto-label every company with the rule engine, keeping the first row per
/// (name, address).
pub fn label_companies(raw: &[RawVacancy]) -> Vec<LabeledCompany> {
    let rules = RuleClassifier::new(RuleFallback::PrivateSmall);
    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    for vacancy in raw {
        let Some(company) = vacancy.object("perusahaan") else {
            continue;
        };
        let field = |key: &str| company.get(key).and_then(Value::as_str).unwrap_or("").trim().to_string();
        let (nama, alamat, deskripsi) = (field("nama_perusahaan"), field("alamat"), field("deskripsi_perusahaan"));

        if !seen.insert((nama.clone(), alamat.clone())) {
            continue;
        }

        let text = format!("{} {} {}", nama, alamat, deskripsi);
        let kategori = category_label(rules.classify(&text)).to_string();
        rows.push(LabeledCompany { nama, alamat, deskripsi, kategori });
    }
    rows
}

pub fn write_labeled<W: Write>(rows: &[LabeledCompany], sink: W) -> Result<()> {
    let mut writer = Writer::from_writer(sink);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
