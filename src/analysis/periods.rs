use chrono::{Datelike, Duration, NaiveDate};
use crate::analysis::types::{PeriodKind, StayPeriod};

fn days_until_friday(date: NaiveDate) -> i64 {
    let weekday = date.weekday().num_days_from_monday() as i64;
    let days = (4 - weekday).rem_euclid(7);
    // a Friday rolls over to the following week
    if days == 0 && weekday >= 4 { 7 } else { days }
}

fn weekend_from(friday: NaiveDate) -> StayPeriod {
    let sunday = friday + Duration::days(2);
    StayPeriod {
        kind: PeriodKind::Weekend,
        checkin: friday,
        checkout: sunday,
        label: format!("Weekend {} - {}", friday.format("%d/%m"), sunday.format("%d/%m")),
        priority: 1,
    }
}

/// Friday to Sunday of the coming weekend. From Friday on, the following one.
pub fn next_weekend(today: NaiveDate) -> StayPeriod {
    weekend_from(today + Duration::days(days_until_friday(today)))
}

/// Weekend stays plus the Tuesday-Thursday stay before each, up to
/// `30 × months_ahead` days out. Weekday stays already in the past are left out.
pub fn upcoming_periods(today: NaiveDate, months_ahead: u32) -> Vec<StayPeriod> {
    let end = today + Duration::days(30 * i64::from(months_ahead));
    let mut periods = Vec::new();
    let mut current = today;

    while current <= end {
        let friday = current + Duration::days(days_until_friday(current));

        if friday <= end {
            periods.push(weekend_from(friday));
        }

        let tuesday = friday - Duration::days(3);
        let thursday = friday - Duration::days(1);
        if tuesday >= today && tuesday <= end {
            periods.push(StayPeriod {
                kind: PeriodKind::Weekday,
                checkin: tuesday,
                checkout: thursday,
                label: format!("Weekdays {} - {}", tuesday.format("%d/%m"), thursday.format("%d/%m")),
                priority: 2,
            });
        }

        // the Saturday, so the next lookup lands on the following Friday
        current = friday + Duration::days(1);
    }

    periods
}
