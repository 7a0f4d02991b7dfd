use std::io::{self, Write};

use crate::category::Category;
use crate::merge::{CategoryFrequency, MergedFrequency, ValueStat};
use crate::utils::format_number;

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub top: usize,
    pub bottom: Option<usize>,
    /// Empty means every category.
    pub categories: Vec<Category>,
    pub recent_display: usize,
}

impl ReportOptions {
    fn categories(&self) -> Vec<Category> {
        if self.categories.is_empty() {
            Category::ALL.to_vec()
        } else {
            self.categories.clone()
        }
    }
}

pub fn write_report<W: Write>(out: &mut W, merged: &MergedFrequency, options: &ReportOptions) -> io::Result<()> {
    writeln!(out, "\n--- Draw Frequency Analysis ---")?;
    match merged.date_range() {
        Some((first, last)) => writeln!(
            out,
            "Draws: {} ({} to {})",
            format_number(merged.draws.len() as u32),
            first.format("%B %-d, %Y"),
            last.format("%B %-d, %Y")
        )?,
        None => {
            writeln!(out, "No draws in the selected range")?;
            return Ok(());
        }
    }

    for category in options.categories() {
        if let Some(frequency) = merged.category(category) {
            write_category(out, frequency, options)?;
        }
    }

    write_recent_draws(out, merged, options)
}

fn write_category<W: Write>(out: &mut W, frequency: &CategoryFrequency, options: &ReportOptions) -> io::Result<()> {
    let ranked = frequency.ranked();
    writeln!(
        out,
        "\n[{}] {} values, {} distinct",
        frequency.category,
        format_number(frequency.total()),
        format_number(ranked.len() as u32)
    )?;
    if ranked.is_empty() {
        return Ok(());
    }

    writeln!(out, "Top {} most frequent:", std::cmp::min(options.top, ranked.len()))?;
    for (value, stat) in ranked.iter().take(options.top) {
        write_value_line(out, value, stat)?;
    }

    if let Some(bottom) = options.bottom {
        writeln!(out, "Bottom {} least frequent:", std::cmp::min(bottom, ranked.len()))?;
        for (value, stat) in ranked.iter().rev().take(bottom) {
            write_value_line(out, value, stat)?;
        }
    }

    writeln!(out, "Digits by position:")?;
    write!(out, "  pos")?;
    for digit in 0..10 {
        write!(out, " {:>6}", digit)?;
    }
    writeln!(out)?;
    for (pos, tally) in frequency.digits.iter().enumerate() {
        write!(out, "  {:>3}", pos + 1)?;
        for count in tally {
            write!(out, " {:>6}", count)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_value_line<W: Write>(out: &mut W, value: &str, stat: &ValueStat) -> io::Result<()> {
    let dates: Vec<String> = stat.dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect();
    let more = if stat.draws as usize > stat.dates.len() { ", ..." } else { "" };
    writeln!(
        out,
        "- {}: {} times [{}{}]",
        value,
        format_number(stat.count),
        dates.join(", "),
        more
    )
}

fn write_recent_draws<W: Write>(out: &mut W, merged: &MergedFrequency, options: &ReportOptions) -> io::Result<()> {
    if options.recent_display == 0 || merged.display_results.is_empty() {
        return Ok(());
    }

    writeln!(out, "\nMost recent draws:")?;
    let categories = options.categories();
    for (date, results) in merged.display_results.iter().rev().take(options.recent_display) {
        writeln!(out, "{}", date.format("%Y-%m-%d"))?;
        for category in &categories {
            if let Some(values) = results.get(category) {
                writeln!(out, "  {:<11} {}", category.tag(), values)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge;
    use crate::parser::parse_draw;
    use crate::store::AggregateStore;
    use chrono::NaiveDate;

    fn merged() -> MergedFrequency {
        let store = AggregateStore::new();
        let mut dates = Vec::new();
        for (day, body) in [(1, "TWO 12 34\nFIRST 123456"), (16, "TWO 12")] {
            let date = NaiveDate::from_ymd_opt(2020, 1, day).unwrap();
            store.set(date, parse_draw(date, &format!("hdr\n{body}")).unwrap());
            dates.push(date);
        }
        merge(&store, &dates, 1)
    }

    fn render(options: &ReportOptions) -> String {
        let mut out = Vec::new();
        write_report(&mut out, &merged(), options).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn renders_ranked_values_and_recent_draws() {
        let text = render(&ReportOptions {
            top: 1,
            bottom: Some(1),
            categories: vec![Category::Two],
            recent_display: 1,
        });

        assert!(text.contains("Draws: 2 (January 1, 2020 to January 16, 2020)"));
        assert!(text.contains("[TWO] 3 values, 2 distinct"));
        assert!(text.contains("- 12: 2 times [2020-01-01, ...]"));
        assert!(text.contains("- 34: 1 times [2020-01-01]"));
        assert!(text.contains("2020-01-16\n  TWO         12"));
        assert!(!text.contains("[FIRST]"));
    }

    #[test]
    fn repeats_within_one_draw_are_not_marked_as_truncated() {
        let store = AggregateStore::new();
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        store.set(date, parse_draw(date, "hdr\nTWO 11 11").unwrap());
        let merged = merge(&store, &[date], 10);

        let mut out = Vec::new();
        let options = ReportOptions { top: 5, bottom: None, categories: vec![Category::Two], recent_display: 0 };
        write_report(&mut out, &merged, &options).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("- 11: 2 times [2020-01-01]"));
        assert!(!text.contains("..."));
    }

    #[test]
    fn empty_selection_says_so() {
        let mut out = Vec::new();
        let options = ReportOptions { top: 5, bottom: None, categories: Vec::new(), recent_display: 5 };
        write_report(&mut out, &MergedFrequency::default(), &options).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("No draws in the selected range"));
    }
}
