use super::InstitutionClassifier;
use crate::models::{Classification, RuleFallback};
use once_cell::sync::Lazy;
use regex::Regex;

static GOVERNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(kementerian|dinas|badan|lembaga|sekretariat|pemerintah|provinsi|kabupaten|universitas negeri|politeknik negeri|bank rakyat indonesia|bank negara indonesia)\b",
    )
    .expect("government pattern is valid")
});

static BUSINESS_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(pt|cv)\b").expect("business entity pattern is valid"));

static CORPORATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(alfa|astra|indofood|unilever|mustika|midi|bank|finance|group|holding|retail|industri|corporate|international|mining|energy|technology|chemical|aeon|indonesia)\b",
    )
    .expect("corporate pattern is valid")
});

/// Keyword classifier. Checks run in a fixed order and the first match wins:
/// government, large private, small private, then the configured fallback.
pub struct RuleClassifier {
    fallback: Classification,
}

impl RuleClassifier {
    pub fn new(fallback: RuleFallback) -> Self {
        let fallback = match fallback {
            RuleFallback::Private => Classification::PRIVATE,
            RuleFallback::PrivateSmall => Classification::PRIVATE_SMALL,
            RuleFallback::Unknown => Classification::UNKNOWN,
        };
        Self { fallback }
    }
}

impl InstitutionClassifier for RuleClassifier {
    fn name(&self) -> &'static str {
        "rules"
    }

    fn classify(&self, text: &str) -> Classification {
        if GOVERNMENT.is_match(text) {
            Classification::GOVERNMENT
        } else if BUSINESS_ENTITY.is_match(text) && CORPORATE.is_match(text) {
            Classification::PRIVATE_LARGE
        } else if BUSINESS_ENTITY.is_match(text) {
            Classification::PRIVATE_SMALL
        } else {
            self.fallback
        }
    }
}
