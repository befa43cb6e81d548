//! Week numbering.
//!
//! Weeks start on Monday. Week 1 of a year begins on the first Monday on or
//! after January 1st. Days before that Monday share a Monday-to-Sunday span
//! with the end of December, so they count as the last week of the previous
//! year.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};

use chapterwatch_shared::WeekIndex;

/// The week index for the current UTC date.
pub fn current_week() -> WeekIndex {
    week_at(Utc::now())
}

/// The week index an instant falls in (UTC).
pub fn week_at(instant: DateTime<Utc>) -> WeekIndex {
    week_of(instant.date_naive())
}

/// The week index a calendar date falls in.
pub fn week_of(date: NaiveDate) -> WeekIndex {
    let start = first_monday_of_year(date);

    if date < start {
        let dec_31 = start_of_year(date) - Days::new(1);
        return week_of(dec_31);
    }

    let elapsed_weeks = (date - start).num_days() / 7;
    WeekIndex::new(date.year(), elapsed_weeks as u32 + 1)
}

/// First Monday on or after January 1st of `date`'s year.
pub fn first_monday_of_year(date: NaiveDate) -> NaiveDate {
    let jan_1 = start_of_year(date);
    let offset = (7 - jan_1.weekday().num_days_from_monday()) % 7;
    jan_1 + Days::new(u64::from(offset))
}

fn start_of_year(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.ordinal0()))
}
