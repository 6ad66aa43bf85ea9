use crate::models::CanonicalRecord;
use crate::normalizer::join_titles;
use anyhow::{Context, Result};
use csv::Writer;
use std::io::Write;
use std::path::Path;

const HEADER: [&str; 12] = [
    "title",
    "institution_name",
    "institution_type",
    "institution_scale",
    "program_of_study",
    "degree_level",
    "district",
    "province",
    "quota",
    "registered",
    "acceptance_likelihood",
    "published_at",
];

pub fn write_csv<'a, W: Write>(records: impl IntoIterator<Item = &'a CanonicalRecord>, sink: W) -> Result<()> {
    let mut writer = Writer::from_writer(sink);
    writer.write_record(HEADER)?;

    for record in records {
        let scale = record
            .institution_scale
            .map(|s| format!("{:?}", s).to_lowercase())
            .unwrap_or_default();
        let published = record.published_at.map(|t| t.to_rfc3339()).unwrap_or_default();
        let institution_type = record.institution_type.to_string();
        let programs = join_titles(&record.program_of_study);
        let degrees = join_titles(&record.degree_level);
        let quota = record.quota.to_string();
        let registered = record.registered.to_string();
        let likelihood = record.acceptance_likelihood.to_string();

        let row: [&str; 12] = [
            &record.title,
            &record.institution_name,
            &institution_type,
            &scale,
            &programs,
            &degrees,
            &record.location.district,
            &record.location.province,
            &quota,
            &registered,
            &likelihood,
            &published,
        ];
        writer.write_record(row)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_csv_file<'a>(records: impl IntoIterator<Item = &'a CanonicalRecord>, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path).with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
    write_csv(records, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InstitutionType, Location, PrivateScale};
    use chrono::{TimeZone, Utc};

    fn record() -> CanonicalRecord {
        CanonicalRecord {
            title: "Staf Keuangan".to_string(),
            institution_name: "PT Astra, Tbk".to_string(),
            institution_type: InstitutionType::Private,
            institution_scale: Some(PrivateScale::Large),
            program_of_study: vec!["Akuntansi".to_string(), "Manajemen".to_string()],
            degree_level: vec!["S1".to_string()],
            location: Location {
                district: "Kota Jakarta Utara".to_string(),
                province: "DKI Jakarta".to_string(),
            },
            quota: 3,
            registered: 12,
            acceptance_likelihood: 25,
            published_at: Some(Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap()),
        }
    }

    #[test]
    fn writes_header_and_quoted_rows() {
        let records = vec![record()];
        let mut buffer = Vec::new();
        write_csv(&records, &mut buffer).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), HEADER.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "Staf Keuangan,\"PT Astra, Tbk\",Private,large,\"Akuntansi, Manajemen\",S1,Kota Jakarta Utara,DKI Jakarta,3,12,25,2025-10-01T00:00:00+00:00"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn writes_file_readable_by_csv_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let records = vec![record(), record()];
        write_csv_file(&records, &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.records().count(), 2);
    }
}
