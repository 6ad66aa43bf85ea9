use crate::models::{CanonicalRecord, Dataset, InstitutionType};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Likelihood,
    Quota,
    Registered,
    Published,
    Title,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "likelihood" | "chance" => Ok(Self::Likelihood),
            "quota" => Ok(Self::Quota),
            "registered" => Ok(Self::Registered),
            "published" | "date" => Ok(Self::Published),
            "title" => Ok(Self::Title),
            other => Err(format!("unknown sort key: {}", other)),
        }
    }
}

/// What the presentation layer asked to see.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub keyword: Option<String>,
    pub institution_type: Option<InstitutionType>,
    pub sort: Option<(SortKey, bool)>,
}

impl Query {
    pub fn matches(&self, record: &CanonicalRecord) -> bool {
        if let Some(wanted) = self.institution_type {
            if record.institution_type != wanted {
                return false;
            }
        }

        match self.keyword.as_deref().map(str::trim) {
            Some(keyword) if !keyword.is_empty() => {
                let keyword = keyword.to_lowercase();
                record.institution_name.to_lowercase().contains(&keyword)
                    || record.title.to_lowercase().contains(&keyword)
                    || record.location.to_string().to_lowercase().contains(&keyword)
            }
            _ => true,
        }
    }

    /// Filtered and sorted view over a dataset. The dataset is untouched.
    pub fn apply<'a>(&self, dataset: &'a Dataset) -> Vec<&'a CanonicalRecord> {
        let mut rows: Vec<&CanonicalRecord> = dataset.iter().filter(|r| self.matches(r)).collect();

        if let Some((key, descending)) = self.sort {
            // stable sort keeps dataset order among equal keys
            rows.sort_by(|a, b| {
                let ordering = compare(a, b, key);
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }
        rows
    }
}

fn compare(a: &CanonicalRecord, b: &CanonicalRecord, key: SortKey) -> Ordering {
    match key {
        SortKey::Likelihood => a.acceptance_likelihood.cmp(&b.acceptance_likelihood),
        SortKey::Quota => a.quota.cmp(&b.quota),
        SortKey::Registered => a.registered.cmp(&b.registered),
        SortKey::Published => a.published_at.cmp(&b.published_at),
        SortKey::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
    }
}

/// One page of a result list. Page numbers start at 1.
#[derive(Debug)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    pub number: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> Page<'_, T> {
    let page_size = page_size.max(1);
    let total_pages = items.len().div_ceil(page_size).max(1);
    let number = page.clamp(1, total_pages);
    let start = ((number - 1) * page_size).min(items.len());
    let end = (start + page_size).min(items.len());

    Page {
        items: &items[start..end],
        number,
        total_pages,
        total_items: items.len(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikelihoodTier {
    High,
    Medium,
    Low,
    VeryLow,
}

impl LikelihoodTier {
    pub fn of(likelihood: u8) -> Self {
        match likelihood {
            75.. => Self::High,
            50..=74 => Self::Medium,
            25..=49 => Self::Low,
            _ => Self::VeryLow,
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            Self::High => "🟢",
            Self::Medium => "🟡",
            Self::Low => "🟠",
            Self::VeryLow => "🔴",
        }
    }
}

impl fmt::Display for LikelihoodTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::VeryLow => "very low",
        };
        f.write_str(label)
    }
}
