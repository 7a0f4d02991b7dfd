use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::category::Category;
use crate::source::RawDraw;

/// Occurrences of each digit `0..=9` at one value position.
pub type DigitTally = [u32; 10];

/// Parsed summary of a single draw file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawAggregate {
    pub date: NaiveDate,
    pub value_counts: BTreeMap<Category, BTreeMap<String, u32>>,
    pub digit_counts: BTreeMap<Category, Vec<DigitTally>>,
    pub display_results: BTreeMap<Category, String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("draw file for {0} is empty")]
    Empty(NaiveDate),

    #[error("draw file for {0} is markup, not a results listing")]
    Markup(NaiveDate),
}

impl DrawAggregate {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            value_counts: BTreeMap::new(),
            digit_counts: BTreeMap::new(),
            display_results: BTreeMap::new(),
        }
    }

    fn record(&mut self, category: Category, values: &[&str]) {
        let counts = self.value_counts.entry(category).or_default();
        let digits = self
            .digit_counts
            .entry(category)
            .or_insert_with(|| vec![[0; 10]; category.value_len()]);

        for value in values {
            *counts.entry((*value).to_string()).or_insert(0) += 1;
            for (pos, byte) in value.bytes().enumerate() {
                digits[pos][usize::from(byte - b'0')] += 1;
            }
        }

        let display = self.display_results.entry(category).or_default();
        if !display.is_empty() {
            display.push(',');
        }
        display.push_str(&values.join(","));
    }

    /// Accepted values for a category in file order, repeats included.
    pub fn values(&self, category: Category) -> impl Iterator<Item = &str> {
        self.display_results
            .get(&category)
            .map(String::as_str)
            .unwrap_or_default()
            .split(',')
            .filter(|v| !v.is_empty())
    }
}

/// Keeps the last `len` characters of a token. Tokens that come up short or
/// carry anything other than ASCII digits are rejected.
pub fn normalize_value(token: &str, len: usize) -> Option<&str> {
    if len == 0 {
        return None;
    }
    let (start, _) = token.char_indices().rev().nth(len - 1)?;
    let value = &token[start..];
    value.bytes().all(|b| b.is_ascii_digit()).then_some(value)
}

pub fn parse_draw(date: NaiveDate, text: &str) -> Result<DrawAggregate, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty(date));
    }

    let mut lines = text.lines();
    lines.next();

    let mut aggregate = DrawAggregate::new(date);
    for (line_num, line) in lines.enumerate() {
        let mut tokens = line.split_whitespace();
        let Some(tag) = tokens.next() else {
            continue;
        };
        let Some(category) = Category::from_tag(tag) else {
            debug!(action = "skip", component = "record_parser", %date, line_number = line_num + 2, tag, "Unknown category tag");
            continue;
        };

        let len = category.value_len();
        let accepted: Vec<&str> = tokens
            .filter_map(|token| {
                let value = normalize_value(token, len);
                if value.is_none() {
                    debug!(action = "skip", component = "record_parser", %date, %category, token, "Rejected value token");
                }
                value
            })
            .collect();

        if !accepted.is_empty() {
            aggregate.record(category, &accepted);
        }
    }

    // A file with only unknown tags is still a draw; an error page is not
    if aggregate.value_counts.is_empty() && looks_like_markup(text) {
        return Err(ParseError::Markup(date));
    }
    Ok(aggregate)
}

fn looks_like_markup(text: &str) -> bool {
    text.lines().any(|line| line.trim_start().starts_with('<'))
}

/// Parses independent files in parallel. Failed files are logged and left out;
/// the output is ordered by date.
pub fn parse_batch(draws: Vec<RawDraw>) -> Vec<DrawAggregate> {
    let start_time = Instant::now();
    let file_count = draws.len();

    let mut aggregates: Vec<DrawAggregate> = draws
        .into_par_iter()
        .filter_map(|draw| match parse_draw(draw.date, &draw.text) {
            Ok(aggregate) => Some(aggregate),
            Err(e) => {
                warn!(action = "skip", component = "record_parser", date = %draw.date, error = %e, "Skipping unparsable draw file");
                None
            }
        })
        .collect();
    aggregates.sort_by_key(|a| a.date);

    info!(
        action = "complete",
        component = "record_parser",
        file_count,
        parsed = aggregates.len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Parsed draw files"
    );
    aggregates
}
