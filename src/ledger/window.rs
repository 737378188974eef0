//! Reporting windows
//!
//! A window is a closed interval `[start, end]`; both boundaries are
//! inclusive. Windows are built in the viewer's time zone so that "this
//! month" starts at local midnight.

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, TimeZone, Utc};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Clone, PartialEq)]
pub struct TimeWindow<Tz: TimeZone> {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl<Tz: TimeZone> TimeWindow<Tz> {
    pub fn new(start: DateTime<Tz>, end: DateTime<Tz>) -> Self {
        Self { start, end }
    }

    /// The last `days` calendar days up to `now`.
    ///
    /// Steps back in local time, so the start keeps the wall-clock time of
    /// `now` across DST changes. When that wall-clock time does not exist,
    /// steps back in absolute time instead. A span reaching past the
    /// earliest representable instant starts there.
    pub fn trailing_days(now: DateTime<Tz>, days: u64) -> Self {
        let start = now
            .clone()
            .checked_sub_days(Days::new(days))
            .or_else(|| {
                let span = i64::try_from(days).ok().and_then(Duration::try_days)?;
                now.clone().checked_sub_signed(span)
            })
            .unwrap_or_else(|| DateTime::<Utc>::MIN_UTC.with_timezone(&now.timezone()));
        Self { start, end: now }
    }

    /// From local midnight on the first day of `now`'s month up to `now`
    pub fn current_month(now: DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let start = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
            .and_then(|first| {
                // Midnight can fall in a DST gap; take the first valid hour
                (0..24).find_map(|hour| {
                    first
                        .and_hms_opt(hour, 0, 0)
                        .and_then(|naive| tz.from_local_datetime(&naive).earliest())
                })
            })
            .unwrap_or_else(|| now.clone());
        Self { start, end: now }
    }

    /// Whether `instant` lies inside the window (boundaries included)
    pub fn contains<Tz2: TimeZone>(&self, instant: &DateTime<Tz2>) -> bool {
        *instant >= self.start && *instant <= self.end
    }

    /// `M/D-M/D` label, e.g. `10/12-10/19`
    pub fn range_label(&self) -> String {
        format!(
            "{}/{}-{}/{}",
            self.start.month(),
            self.start.day(),
            self.end.month(),
            self.end.day()
        )
    }

    /// English name of the month the window ends in
    pub fn month_label(&self) -> &'static str {
        MONTH_NAMES[self.end.month0() as usize]
    }
}

impl<Tz: TimeZone> std::fmt::Display for TimeWindow<Tz>
where
    Tz::Offset: std::fmt::Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}
