// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Duration, Utc};

/// Compact age of a publication: `42m`, `5H`, `3D`, `2W`
pub fn format_age(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = (now - created_at).max(Duration::zero());

    if elapsed < Duration::hours(1) {
        format!("{}m", elapsed.num_minutes())
    } else if elapsed < Duration::days(1) {
        format!("{}H", elapsed.num_hours())
    } else if elapsed < Duration::weeks(1) {
        format!("{}D", elapsed.num_days())
    } else {
        format!("{}W", elapsed.num_weeks())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn picks_largest_unit_below_threshold() {
        assert_eq!(format_age(now() - Duration::seconds(59), now()), "0m");
        assert_eq!(format_age(now() - Duration::minutes(59), now()), "59m");
        assert_eq!(format_age(now() - Duration::minutes(60), now()), "1H");
        assert_eq!(format_age(now() - Duration::hours(23), now()), "23H");
        assert_eq!(format_age(now() - Duration::days(6), now()), "6D");
        assert_eq!(format_age(now() - Duration::days(7), now()), "1W");
        assert_eq!(format_age(now() - Duration::days(20), now()), "2W");
    }

    #[test]
    fn future_timestamps_clamp_to_zero() {
        assert_eq!(format_age(now() + Duration::hours(2), now()), "0m");
    }
}
