use chrono::{DateTime, Days, Months, NaiveDate, Utc};
use serde::Deserialize;

use crate::model::ValidationError;
use crate::model::time::{end_of_day, parse_calendar_date, start_of_day};

/// Source of "now". Injected so windows can be resolved against a fixed instant in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// The `period` tag as it arrives on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    #[default]
    Date,
    Week,
    Month,
    Range,
}

/// A validated selection period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Today,
    /// Today and the six days before it.
    LastWeek,
    /// From the same day one calendar month ago through today.
    LastMonth,
    Range { start: NaiveDate, end: NaiveDate },
}

impl Period {
    /// Validates the wire form. Bounds are only read for [`PeriodKind::Range`],
    /// where both must be present, parseable and ordered.
    pub fn from_wire(
        kind: PeriodKind,
        starting_date: Option<&str>,
        ending_date: Option<&str>,
    ) -> Result<Self, ValidationError> {
        match kind {
            PeriodKind::Date => Ok(Period::Today),
            PeriodKind::Week => Ok(Period::LastWeek),
            PeriodKind::Month => Ok(Period::LastMonth),
            PeriodKind::Range => {
                let start = range_bound(starting_date, "startingDate")?;
                let end = range_bound(ending_date, "endingDate")?;
                if start > end {
                    return Err(ValidationError::new(
                        "startingDate must not be after endingDate",
                    ));
                }
                Ok(Period::Range { start, end })
            }
        }
    }

    pub fn resolve(self, today: NaiveDate) -> SelectionWindow {
        let (first, last) = match self {
            Period::Today => (today, today),
            Period::LastWeek => (today.checked_sub_days(Days::new(6)).unwrap_or(today), today),
            // chrono clamps to the last day of a shorter month.
            Period::LastMonth => (
                today.checked_sub_months(Months::new(1)).unwrap_or(today),
                today,
            ),
            Period::Range { start, end } => (start, end),
        };
        SelectionWindow {
            start: start_of_day(first),
            end: end_of_day(last),
        }
    }
}

fn range_bound(raw: Option<&str>, field: &str) -> Result<NaiveDate, ValidationError> {
    let raw = raw
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| ValidationError::new(format!("{field} is required for period 'range'")))?;
    parse_calendar_date(raw)
        .ok_or_else(|| ValidationError::new(format!("{field} '{raw}' is not a valid date")))
}

/// Inclusive creation-time bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SelectionWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn today_covers_the_whole_day() {
        let window = Period::Today.resolve(date(2024, 5, 10));
        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap());
        assert_eq!(
            window.end,
            Utc.with_ymd_and_hms(2024, 5, 10, 23, 59, 59).unwrap() + Duration::milliseconds(999)
        );
    }

    #[test]
    fn week_is_seven_calendar_days() {
        let window = Period::LastWeek.resolve(date(2024, 3, 3));
        assert_eq!(window.start.date_naive(), date(2024, 2, 26));
        assert_eq!(window.end.date_naive(), date(2024, 3, 3));
    }

    #[test]
    fn month_clamps_to_shorter_month() {
        let window = Period::LastMonth.resolve(date(2024, 3, 31));
        assert_eq!(window.start.date_naive(), date(2024, 2, 29));
        let window = Period::LastMonth.resolve(date(2023, 3, 31));
        assert_eq!(window.start.date_naive(), date(2023, 2, 28));
        let window = Period::LastMonth.resolve(date(2024, 1, 15));
        assert_eq!(window.start.date_naive(), date(2023, 12, 15));
    }

    #[test]
    fn january_range_is_inclusive_to_the_millisecond() {
        let period =
            Period::from_wire(PeriodKind::Range, Some("2024-01-01"), Some("2024-01-31")).unwrap();
        let window = period.resolve(date(2030, 1, 1));

        let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let last =
            Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap() + Duration::milliseconds(999);
        assert!(window.contains(first));
        assert!(window.contains(last));
        assert!(!window.contains(first - Duration::milliseconds(1)));
        assert!(!window.contains(last + Duration::milliseconds(1)));
    }

    #[test]
    fn range_accepts_rfc3339_bounds() {
        let period = Period::from_wire(
            PeriodKind::Range,
            Some("2024-01-01T10:00:00Z"),
            Some("2024-01-02T00:00:00+00:00"),
        )
        .unwrap();
        assert_eq!(
            period,
            Period::Range {
                start: date(2024, 1, 1),
                end: date(2024, 1, 2)
            }
        );
    }

    #[test]
    fn malformed_range_is_rejected() {
        assert!(Period::from_wire(PeriodKind::Range, None, Some("2024-01-31")).is_err());
        let range = |start, end| Period::from_wire(PeriodKind::Range, start, end);
        assert!(range(Some("yesterday"), Some("2024-01-31")).is_err());
        assert!(range(Some("2024-02-01"), Some("2024-01-31")).is_err());
    }

    #[test]
    fn bounds_are_ignored_outside_range() {
        let period = Period::from_wire(PeriodKind::Week, Some("garbage"), None).unwrap();
        assert_eq!(period, Period::LastWeek);
    }

    #[test]
    fn fixed_clock_reports_its_day() {
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 6, 1, 23, 30, 0).unwrap());
        assert_eq!(clock.today(), date(2024, 6, 1));
    }
}
