use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Offset, Utc, Weekday};

/// Decides how far back a run looks for news.
#[derive(Debug, Clone)]
pub struct LookbackPolicy {
    pub default_hours: i64,
    pub wide_hours: i64,
    pub wide_days: Vec<Weekday>,
    pub holidays: Vec<NaiveDate>,
    /// Calendar days are judged in this fixed offset from UTC.
    pub utc_offset_hours: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub hours: i64,
    pub wide: bool,
    offset: FixedOffset,
}

impl LookbackPolicy {
    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
    }

    /// Whether `day` falls on a non-trading period.
    pub fn is_wide_day(&self, day: NaiveDate) -> bool {
        self.wide_days.contains(&day.weekday()) || self.holidays.contains(&day)
    }

    pub fn window(&self, now: DateTime<Utc>) -> LookbackWindow {
        let offset = self.offset();
        let today = now.with_timezone(&offset).date_naive();
        let wide = self.is_wide_day(today);
        let hours = if wide { self.wide_hours } else { self.default_hours };
        LookbackWindow {
            start: Duration::try_hours(hours)
                .and_then(|span| now.checked_sub_signed(span))
                .unwrap_or_default(),
            end: now,
            hours,
            wide,
            offset,
        }
    }
}

impl LookbackWindow {
    pub fn from_date(&self) -> NaiveDate {
        self.start.with_timezone(&self.offset).date_naive()
    }

    pub fn to_date(&self) -> NaiveDate {
        self.end.with_timezone(&self.offset).date_naive()
    }

    /// The market-local calendar day the run belongs to.
    pub fn market_date(&self) -> NaiveDate {
        self.to_date()
    }
}
