use chrono::{Datelike, NaiveDate};

/// Days of month on which a draw file may be published. Draws happen on the
/// 1st and 16th; the neighbouring days cover publication drift.
pub const DRAW_DAYS: [u32; 9] = [30, 31, 1, 2, 3, 14, 15, 16, 17];

/// First date of the archive.
pub fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2006, 12, 30).expect("archive epoch is a valid date")
}

/// A date that may have a published draw file, and where to find it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub date: NaiveDate,
    pub locator: String,
}

impl Candidate {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            locator: format!("{}.txt", date.format("%Y-%m-%d")),
        }
    }
}

pub fn is_draw_day(date: NaiveDate) -> bool {
    DRAW_DAYS.contains(&date.day())
}

/// All candidate dates from the epoch through `today`, ascending.
pub fn enumerate_candidates(today: NaiveDate) -> Vec<Candidate> {
    epoch()
        .iter_days()
        .take_while(|date| *date <= today)
        .filter(|date| is_draw_day(*date))
        .map(Candidate::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn starts_at_epoch() {
        let candidates = enumerate_candidates(date(2007, 1, 3));
        let dates: Vec<_> = candidates.iter().map(|c| c.date).collect();
        assert_eq!(
            dates,
            [
                date(2006, 12, 30),
                date(2006, 12, 31),
                date(2007, 1, 1),
                date(2007, 1, 2),
                date(2007, 1, 3),
            ]
        );
    }

    #[test]
    fn nothing_before_epoch() {
        assert!(enumerate_candidates(date(2006, 12, 29)).is_empty());
        assert!(enumerate_candidates(date(2001, 1, 1)).is_empty());
    }

    #[test]
    fn only_allowed_days_ascending() {
        let candidates = enumerate_candidates(date(2010, 6, 30));
        assert!(candidates.iter().all(|c| DRAW_DAYS.contains(&c.date.day())));
        assert!(candidates.windows(2).all(|w| w[0].date < w[1].date));
        assert_eq!(candidates.last().map(|c| c.date), Some(date(2010, 6, 30)));
    }

    #[test]
    fn locator_is_date_stamped() {
        assert_eq!(Candidate::new(date(2020, 1, 16)).locator, "2020-01-16.txt");
        assert_eq!(Candidate::new(date(2009, 3, 1)).locator, "2009-03-01.txt");
    }

    #[test]
    fn a_full_month_yields_the_allowed_days() {
        let in_march: Vec<_> = enumerate_candidates(date(2015, 3, 31))
            .into_iter()
            .filter(|c| c.date.year() == 2015 && c.date.month() == 3)
            .map(|c| c.date.day())
            .collect();
        assert_eq!(in_march, [1, 2, 3, 14, 15, 16, 17, 30, 31]);
    }
}
