//! PII detection/masking capability seam
//!
//! The streaming core only ever talks to `PiiEngine`; production deployments
//! plug the external DataCloak library in behind this trait. The built-in
//! `RegexEngine` ports the workbench's bundled engine: four regex categories
//! with validator-backed confidence adjustment and type-specific mask
//! formats.

use anyhow::{Context, Result as AnyResult};
use regex::Regex;

use crate::error::EngineError;
use crate::scan::types::PiiType;

/// One detection hit for a piece of text.
#[derive(Debug, Clone)]
pub struct Detection {
    pub pii_type: PiiType,
    pub confidence: f64,
}

/// External PII capability. Called once per field, never batched, and both
/// operations may fail without affecting any other field.
pub trait PiiEngine: Send + Sync {
    fn detect(&self, text: &str) -> Result<Vec<Detection>, EngineError>;
    fn mask(&self, text: &str) -> Result<String, EngineError>;
}

const BASE_CONFIDENCE: f64 = 0.95;
const INVALID_PENALTY: f64 = 0.7;
const MIN_CONFIDENCE: f64 = 0.6;
const DEFAULT_MAX_TEXT_LENGTH: usize = 100_000;

/// Built-in regex-backed engine.
pub struct RegexEngine {
    patterns: Vec<(PiiType, Regex)>,
    max_text_length: usize,
}

impl RegexEngine {
    pub fn new() -> AnyResult<Self> {
        let patterns = vec![
            (
                PiiType::Email,
                Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
                    .context("failed to compile email pattern")?,
            ),
            (
                PiiType::Phone,
                Regex::new(r"\b\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b")
                    .context("failed to compile phone pattern")?,
            ),
            (
                PiiType::Ssn,
                Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").context("failed to compile SSN pattern")?,
            ),
            (
                PiiType::CreditCard,
                Regex::new(r"\b(?:\d[ -]*?){13,19}\b")
                    .context("failed to compile credit card pattern")?,
            ),
        ];
        Ok(Self { patterns, max_text_length: DEFAULT_MAX_TEXT_LENGTH })
    }

    fn matches(&self, text: &str) -> Result<Vec<(PiiType, String, f64)>, EngineError> {
        if text.len() > self.max_text_length {
            return Err(EngineError::Detection(format!(
                "text length {} exceeds maximum {}",
                text.len(),
                self.max_text_length
            )));
        }

        let mut hits = Vec::new();
        for (pii_type, pattern) in &self.patterns {
            for found in pattern.find_iter(text) {
                let sample = found.as_str().to_string();
                let valid = match pii_type {
                    PiiType::Email => validate_email(&sample),
                    PiiType::CreditCard => validate_luhn(&sample),
                    _ => true,
                };
                let confidence =
                    if valid { BASE_CONFIDENCE } else { BASE_CONFIDENCE * INVALID_PENALTY };
                if confidence > MIN_CONFIDENCE {
                    hits.push((*pii_type, sample, confidence));
                }
            }
        }
        Ok(hits)
    }
}

impl PiiEngine for RegexEngine {
    fn detect(&self, text: &str) -> Result<Vec<Detection>, EngineError> {
        Ok(self
            .matches(text)?
            .into_iter()
            .map(|(pii_type, _, confidence)| Detection { pii_type, confidence })
            .collect())
    }

    fn mask(&self, text: &str) -> Result<String, EngineError> {
        let mut hits =
            self.matches(text).map_err(|e| EngineError::Masking(e.to_string()))?;

        // Longest samples first so shorter matches cannot clobber parts of
        // longer ones during replacement.
        hits.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

        let mut masked = text.to_string();
        for (pii_type, sample, _) in &hits {
            masked = masked.replace(sample, &mask_value(sample, *pii_type));
        }
        Ok(masked)
    }
}

fn validate_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }
    let domain = parts[1];
    domain.contains('.') && !domain.contains("..")
}

fn validate_luhn(card_number: &str) -> bool {
    let digits: Vec<u32> = card_number.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 13 || digits.len() > 19 {
        return false;
    }

    let mut sum = 0;
    let mut alternate = false;
    for &digit in digits.iter().rev() {
        let mut digit = digit;
        if alternate {
            digit *= 2;
            if digit > 9 {
                digit = digit / 10 + digit % 10;
            }
        }
        sum += digit;
        alternate = !alternate;
    }
    sum % 10 == 0
}

fn mask_value(value: &str, pii_type: PiiType) -> String {
    match pii_type {
        PiiType::Email => match value.find('@') {
            Some(at) if at > 0 => {
                let (local, domain) = value.split_at(at);
                format!("{}***{}", &local[..1], domain)
            }
            _ => "***@domain.com".to_string(),
        },
        PiiType::Phone => {
            let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
            if digits.len() >= 4 {
                format!("***-***-{}", &digits[digits.len() - 4..])
            } else {
                "***-***-****".to_string()
            }
        }
        PiiType::Ssn => {
            if value.len() >= 4 {
                format!("***-**-{}", &value[value.len() - 4..])
            } else {
                "***-**-****".to_string()
            }
        }
        PiiType::CreditCard => {
            let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
            if digits.len() >= 4 {
                format!("**** **** **** {}", &digits[digits.len() - 4..])
            } else {
                "**** **** **** ****".to_string()
            }
        }
        PiiType::Address | PiiType::Name => "***".to_string(),
    }
}
