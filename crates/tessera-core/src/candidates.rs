//! Expansion of wildcard phone patterns into candidate numbers.
//!
//! A pattern such as `+420 731x4x748` expands every `x` (or `X`) into the
//! digits `0-9`. Expansion is lazy and iterative: [`Candidates`] walks the
//! wildcard positions like an odometer, so stack depth does not grow with the
//! number of wildcards and the sequence can be restarted at any time by asking
//! the pattern for a fresh iterator.

use crate::error::{Result, TesseraError};
use crate::types::WorkItem;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Mobile numbering rules for one calling code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountryPattern {
    /// Calling code without the leading `+`
    pub code: &'static str,
    /// National number length
    pub length: usize,
    /// Leading digits used by mobile numbers
    pub prefixes: &'static [&'static str],
    /// Human-readable country name
    pub name: &'static str,
}

/// Supported calling codes.
pub const COUNTRY_PATTERNS: &[CountryPattern] = &[
    CountryPattern {
        code: "420",
        length: 9,
        prefixes: &["6", "7"],
        name: "Czech Republic",
    },
    CountryPattern {
        code: "421",
        length: 9,
        prefixes: &["9"],
        name: "Slovakia",
    },
    CountryPattern {
        code: "1",
        length: 10,
        prefixes: &["2", "3", "4", "5", "6", "7", "8", "9"],
        name: "USA/Canada",
    },
    CountryPattern {
        code: "44",
        length: 10,
        prefixes: &["7"],
        name: "United Kingdom",
    },
    CountryPattern {
        code: "49",
        length: 10,
        prefixes: &["1"],
        name: "Germany",
    },
];

/// Look up a calling code in [`COUNTRY_PATTERNS`].
#[must_use]
pub fn country_pattern(code: &str) -> Option<&'static CountryPattern> {
    COUNTRY_PATTERNS.iter().find(|p| p.code == code)
}

fn is_wildcard(c: char) -> bool {
    c == 'x' || c == 'X'
}

/// A validated wildcard phone pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePattern {
    raw: String,
    country: Option<&'static CountryPattern>,
    base_number: Option<String>,
}

impl CandidatePattern {
    /// Parse and validate a pattern.
    ///
    /// # Errors
    /// Returns [`TesseraError::Pattern`] if the pattern is not phone-shaped,
    /// has no wildcard, or has more than `max_wildcards` wildcards.
    pub fn parse(pattern: &str, max_wildcards: usize) -> Result<Self> {
        static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = PHONE_REGEX.get_or_init(|| {
            Regex::new(r"(?i)^(\+\d{1,4}\s?)[\d\sx\-\(\)]+").expect("valid regex")
        });

        let raw = pattern.trim().to_string();

        if !regex.is_match(&raw) {
            return Err(TesseraError::Pattern(format!(
                "'{raw}' is not a phone pattern (example: '+420 731x4x748')"
            )));
        }

        let wildcards = raw.chars().filter(|c| is_wildcard(*c)).count();
        if wildcards == 0 {
            return Err(TesseraError::Pattern(
                "pattern must contain at least one 'x' wildcard".to_string(),
            ));
        }
        if wildcards > max_wildcards {
            return Err(TesseraError::Pattern(format!(
                "too many wildcards ({wildcards}), maximum {max_wildcards} allowed"
            )));
        }

        let (country, base_number) = Self::split_country_code(&raw);

        Ok(Self {
            raw,
            country,
            base_number,
        })
    }

    fn split_country_code(raw: &str) -> (Option<&'static CountryPattern>, Option<String>) {
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+' || is_wildcard(*c))
            .collect();

        if let Some(rest) = cleaned.strip_prefix('+') {
            // Calling codes are 1-4 digits; the shortest registered match wins.
            let upper = cleaned.len().min(6);
            for end in 2..upper {
                let code = &rest[..end - 1];
                if let Some(country) = country_pattern(code) {
                    let base = rest[end - 1..].to_string();
                    debug!(country = %country.code, base = %base, "parsed country code");
                    return (Some(country), Some(base));
                }
            }
        }

        debug!(pattern = %raw, "could not extract country code");
        (None, None)
    }

    /// The trimmed pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Number of wildcards in the pattern.
    #[must_use]
    pub fn wildcard_count(&self) -> usize {
        self.raw.chars().filter(|c| is_wildcard(*c)).count()
    }

    /// Detected country, if the calling code is supported.
    #[must_use]
    pub fn country(&self) -> Option<&'static CountryPattern> {
        self.country
    }

    /// Country whose mobile prefixes can replace the first base digit.
    ///
    /// Only available when the first digit after the calling code is a wildcard.
    #[must_use]
    pub fn prefix_country(&self) -> Option<&'static CountryPattern> {
        let country = self.country?;
        let first = self.base_number.as_deref()?.chars().next()?;
        is_wildcard(first).then_some(country)
    }

    /// Iterate over every candidate.
    ///
    /// With `use_country_prefixes` set (and [`prefix_country`](Self::prefix_country)
    /// available), the first base digit only takes the country's mobile prefixes.
    #[must_use]
    pub fn candidates(&self, use_country_prefixes: bool) -> Candidates {
        let templates = match (use_country_prefixes, self.prefix_country()) {
            (true, Some(country)) => {
                let base = self.base_number.as_deref().unwrap_or_default();
                let rest: String = base.chars().skip(1).collect();
                info!(
                    country = %country.name,
                    prefixes = %country.prefixes.join(", "),
                    "using country mobile prefixes"
                );
                country
                    .prefixes
                    .iter()
                    .map(|prefix| format!("+{}{prefix}{rest}", country.code))
                    .collect()
            }
            _ => vec![self.raw.clone()],
        };
        Candidates::new(templates)
    }

    /// Materialize numbered work items.
    ///
    /// Indices are 1-based ordinal positions, so the first returned item has
    /// index `start_index + 1`. Returns an empty list when `start_index` is past
    /// the end or the remaining count exceeds `max_variations`.
    #[must_use]
    pub fn work_items(
        &self,
        use_country_prefixes: bool,
        start_index: usize,
        max_variations: usize,
    ) -> Vec<WorkItem> {
        let candidates = self.candidates(use_country_prefixes);
        let total = candidates.total();

        if total == 0 || start_index >= total {
            return Vec::new();
        }

        if total - start_index > max_variations {
            info!(
                remaining = total - start_index,
                max = max_variations,
                "variation count exceeds limit"
            );
            return Vec::new();
        }

        let items: Vec<WorkItem> = candidates
            .skip(start_index)
            .enumerate()
            .map(|(offset, number)| WorkItem::new(start_index + offset + 1, number))
            .collect();

        info!(count = items.len(), pattern = %self.raw, "generated variations");
        items
    }
}

/// Lazy odometer over the wildcard positions of one or more templates.
///
/// The first wildcard is the most significant digit, so the order matches a
/// depth-first expansion of the leftmost wildcard.
#[derive(Debug, Clone)]
pub struct Candidates {
    templates: Vec<Vec<char>>,
    template_idx: usize,
    positions: Vec<usize>,
    digits: Vec<u8>,
    fresh: bool,
}

impl Candidates {
    fn new(templates: Vec<String>) -> Self {
        let mut candidates = Self {
            templates: templates.iter().map(|t| t.chars().collect()).collect(),
            template_idx: 0,
            positions: Vec::new(),
            digits: Vec::new(),
            fresh: true,
        };
        candidates.load_template();
        candidates
    }

    fn load_template(&mut self) {
        self.positions = self
            .templates
            .get(self.template_idx)
            .map(|t| {
                t.iter()
                    .enumerate()
                    .filter(|(_, c)| is_wildcard(**c))
                    .map(|(i, _)| i)
                    .collect()
            })
            .unwrap_or_default();
        self.digits = vec![0; self.positions.len()];
        self.fresh = true;
    }

    /// Total number of candidates across all templates.
    #[must_use]
    pub fn total(&self) -> usize {
        self.templates
            .iter()
            .map(|t| {
                let wildcards = t.iter().filter(|c| is_wildcard(**c)).count();
                10usize.saturating_pow(u32::try_from(wildcards).unwrap_or(u32::MAX))
            })
            .fold(0usize, usize::saturating_add)
    }

    /// Advance the odometer; returns false when the current template is exhausted.
    fn advance(&mut self) -> bool {
        for digit in self.digits.iter_mut().rev() {
            if *digit < 9 {
                *digit += 1;
                return true;
            }
            *digit = 0;
        }
        false
    }

    fn render(&self) -> Option<String> {
        let mut chars = self.templates.get(self.template_idx)?.clone();
        for (pos, digit) in self.positions.iter().zip(&self.digits) {
            chars[*pos] = char::from(b'0' + digit);
        }
        Some(chars.into_iter().collect())
    }
}

impl Iterator for Candidates {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if self.template_idx >= self.templates.len() {
                return None;
            }

            if self.fresh {
                self.fresh = false;
                return self.render();
            }

            if self.advance() {
                return self.render();
            }

            self.template_idx += 1;
            self.load_template();
        }
    }
}
