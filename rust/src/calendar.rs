//! Calendar primitives: week arithmetic, rotation-cycle anchoring and date iteration.
//!
//! All arithmetic is done on `NaiveDate`, so there is no timezone or DST
//! involvement. Weeks start on Sunday.

use chrono::{Datelike, Days, NaiveDate, Weekday};

/// First day of every scheduling week.
pub const WEEK_START_DAY: Weekday = Weekday::Sun;

/// Start (Sunday) of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = (date.weekday().num_days_from_monday() + 7
        - WEEK_START_DAY.num_days_from_monday())
        % 7;
    date.checked_sub_days(Days::new(u64::from(offset))).unwrap_or(date)
}

/// Last day (Saturday) of the week containing `date`.
pub fn week_end(date: NaiveDate) -> NaiveDate {
    let start = week_start(date);
    start.checked_add_days(Days::new(6)).unwrap_or(start)
}

/// Add a signed number of days, saturating at the calendar bounds.
pub fn shift_days(date: NaiveDate, days: i64) -> NaiveDate {
    if days >= 0 {
        date.checked_add_days(Days::new(days as u64))
            .unwrap_or(NaiveDate::MAX)
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
            .unwrap_or(NaiveDate::MIN)
    }
}

/// Whole weeks between the week containing `anchor` and the week containing `date`.
///
/// Negative when `date` falls before the anchor week.
pub fn weeks_since(anchor: NaiveDate, date: NaiveDate) -> i64 {
    let days = (week_start(date) - week_start(anchor)).num_days();
    days.div_euclid(7)
}

/// Position of a week inside the anchored rotation cycle.
///
/// Returns `(cycle_number, week_in_cycle)` where cycles are whole multiples of
/// `cycle_weeks` counted from the anchor week. `cycle_weeks` must be positive.
pub fn cycle_position(week: NaiveDate, anchor: NaiveDate, cycle_weeks: u32) -> (i64, u32) {
    let cycle_weeks = i64::from(cycle_weeks.max(1));
    let weeks = weeks_since(anchor, week);
    (
        weeks.div_euclid(cycle_weeks),
        weeks.rem_euclid(cycle_weeks) as u32,
    )
}

/// Iterator over every date in `[start, end]` (empty when `start > end`).
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start
        .iter_days()
        .take_while(move |date| *date <= end)
}

/// Start of every week that intersects `[start, end]`, in order.
pub fn week_starts(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if start > end {
        return Vec::new();
    }
    let mut weeks = Vec::new();
    let mut current = week_start(start);
    while current <= end {
        weeks.push(current);
        current = shift_days(current, 7);
    }
    weeks
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Parse a weekday name ("Sun", "sunday", "SUN", ...).
pub fn parse_weekday(name: &str) -> Option<Weekday> {
    name.trim().parse::<Weekday>().ok()
}

/// Short display name used in pattern names and messages.
pub fn weekday_label(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}
