//! View formatting helpers for badges and timestamps.

use chrono::{DateTime, Utc};

/// Unread badge: empty at zero, the number up to 9, "9+" beyond.
pub fn format_unread_badge(count: u32) -> String {
    match count {
        0 => String::new(),
        1..=9 => count.to_string(),
        _ => "9+".to_string(),
    }
}

/// Compact relative age: "now", "3m", "2h", "2d".
pub fn format_relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(timestamp);
    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        return "now".to_string();
    }
    let hours = elapsed.num_hours();
    if hours < 1 {
        return format!("{minutes}m");
    }
    let days = elapsed.num_days();
    if days < 1 {
        return format!("{hours}h");
    }
    format!("{days}d")
}

/// Bubble timestamp, 24h clock.
pub fn format_message_time(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn badge_formatting() {
        assert_eq!(format_unread_badge(0), "");
        assert_eq!(format_unread_badge(5), "5");
        assert_eq!(format_unread_badge(9), "9");
        assert_eq!(format_unread_badge(15), "9+");
    }

    #[test]
    fn relative_time_buckets() {
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap();
        assert_eq!(format_relative_time(now - Duration::seconds(20), now), "now");
        assert_eq!(format_relative_time(now - Duration::minutes(3), now), "3m");
        assert_eq!(format_relative_time(now - Duration::hours(2), now), "2h");
        assert_eq!(format_relative_time(now - Duration::days(2), now), "2d");
    }

    #[test]
    fn message_time_is_hours_minutes() {
        let ts = Utc.with_ymd_and_hms(2026, 2, 1, 9, 5, 30).unwrap();
        assert_eq!(format_message_time(ts), "09:05");
    }
}
