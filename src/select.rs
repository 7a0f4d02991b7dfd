use chrono::{Months, NaiveDate};

use crate::candidates::epoch;

/// Which draws are in scope for a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    #[default]
    All,
    RecentDraws(usize),
    Years(u32),
    Months(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub policy: SelectionPolicy,
    /// Measure from the archive epoch instead of from today.
    pub anchored: bool,
}

impl Selection {
    pub fn new(policy: SelectionPolicy, anchored: bool) -> Self {
        Self { policy, anchored }
    }
}

/// Picks the dates in scope from `known`, which must be ascending.
/// The result is ascending as well.
pub fn select_dates(known: &[NaiveDate], selection: &Selection, today: NaiveDate) -> Vec<NaiveDate> {
    let epoch = epoch();
    match selection.policy {
        SelectionPolicy::All => known.to_vec(),
        SelectionPolicy::RecentDraws(count) if selection.anchored => known
            .iter()
            .copied()
            .filter(|d| *d >= epoch)
            .take(count)
            .collect(),
        SelectionPolicy::RecentDraws(count) => {
            let eligible: Vec<NaiveDate> = known.iter().copied().filter(|d| *d <= today).collect();
            let skip = eligible.len().saturating_sub(count);
            eligible.into_iter().skip(skip).collect()
        }
        SelectionPolicy::Years(years) => window(known, years.saturating_mul(12), selection.anchored, epoch, today),
        SelectionPolicy::Months(months) => window(known, months, selection.anchored, epoch, today),
    }
}

fn window(known: &[NaiveDate], months: u32, anchored: bool, epoch: NaiveDate, today: NaiveDate) -> Vec<NaiveDate> {
    let span = Months::new(months);
    let (start, end) = match (anchored, months) {
        (true, 0) => (Some(epoch), None),
        // Past the calendar's range means unbounded
        (true, _) => (Some(epoch), epoch.checked_add_months(span)),
        (false, 0) => (None, None),
        (false, _) => (Some(today.checked_sub_months(span).unwrap_or(NaiveDate::MIN)), Some(today)),
    };

    known
        .iter()
        .copied()
        .filter(|d| start.map_or(true, |s| *d >= s) && end.map_or(true, |e| *d <= e))
        .collect()
}
