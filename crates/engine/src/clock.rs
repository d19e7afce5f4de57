use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Utc, Weekday};

/// Time source for the session driver: current time and whether the market
/// is in session.
pub trait SessionClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    fn is_open(&self, at: DateTime<Utc>) -> bool;
}

/// Weekday market hours in a fixed UTC offset (NSE by default: 09:15–15:30
/// at +05:30). Exchange holidays are not modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketClock {
    open: NaiveTime,
    close: NaiveTime,
    offset: FixedOffset,
}

impl MarketClock {
    pub fn new(open: NaiveTime, close: NaiveTime, offset: FixedOffset) -> Self {
        Self {
            open,
            close,
            offset,
        }
    }
}

impl SessionClock for MarketClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn is_open(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.offset);
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let time = local.time();
        self.open <= time && time <= self.close
    }
}

/// Clock that never closes. Used when replaying a saved snapshot outside
/// market hours; the session is then bounded by `max_ticks` or a stop.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOpen;

impl SessionClock for AlwaysOpen {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn is_open(&self, _at: DateTime<Utc>) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn nse() -> MarketClock {
        MarketClock::new(
            NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
            FixedOffset::east_opt(330 * 60).unwrap(),
        )
    }

    #[test]
    fn open_during_weekday_hours() {
        // Tuesday 2024-03-05 10:00 IST = 04:30 UTC
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 4, 30, 0).unwrap();
        assert!(nse().is_open(at));
    }

    #[test]
    fn boundaries_are_inclusive() {
        // 09:15 IST = 03:45 UTC, 15:30 IST = 10:00 UTC
        assert!(nse().is_open(Utc.with_ymd_and_hms(2024, 3, 5, 3, 45, 0).unwrap()));
        assert!(nse().is_open(Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap()));
        assert!(!nse().is_open(Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 1).unwrap()));
        assert!(!nse().is_open(Utc.with_ymd_and_hms(2024, 3, 5, 3, 44, 59).unwrap()));
    }

    #[test]
    fn closed_on_weekends() {
        // Saturday 2024-03-09 11:00 IST
        assert!(!nse().is_open(Utc.with_ymd_and_hms(2024, 3, 9, 5, 30, 0).unwrap()));
    }

    #[test]
    fn weekday_is_judged_in_local_time() {
        // Monday 2024-03-04 00:30 IST is still Sunday in UTC, and before open
        assert!(!nse().is_open(Utc.with_ymd_and_hms(2024, 3, 3, 19, 0, 0).unwrap()));
    }

    #[test]
    fn always_open_is_open() {
        assert!(AlwaysOpen.is_open(Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap()));
    }
}
