use crate::api::model::ApiActivityResponse;
use crate::config;
use crate::model::common::parse_timestamp;
use crate::model::member::ActivityRecord;
use chrono::{DateTime, Duration, Utc};

/// Reduces one member's activity feed to the newest open inside the trailing
/// window ending at `now`.
pub fn latest_open(
    response: &ApiActivityResponse,
    now: DateTime<Utc>,
    window_days: i64,
) -> ActivityRecord {
    // A window reaching past the representable range counts every open.
    let cutoff = Duration::try_days(window_days)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let recent_open = response
        .activity
        .iter()
        .filter(|a| a.action.as_deref() == Some(config::OPEN_ACTION))
        .filter_map(|a| a.timestamp.as_deref().and_then(parse_timestamp))
        .filter(|ts| *ts > cutoff)
        .max();

    ActivityRecord {
        id: response.email_id.clone(),
        recent_open,
    }
}

pub fn latest_opens(
    responses: &[ApiActivityResponse],
    now: DateTime<Utc>,
    window_days: i64,
) -> Vec<ActivityRecord> {
    responses
        .iter()
        .map(|r| latest_open(r, now, window_days))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn response(events: &[(&str, DateTime<Utc>)]) -> ApiActivityResponse {
        let activity: Vec<serde_json::Value> = events
            .iter()
            .map(|(action, ts)| serde_json::json!({"action": action, "timestamp": ts.to_rfc3339()}))
            .collect();
        serde_json::from_value(serde_json::json!({"email_id": "m1", "activity": activity})).unwrap()
    }

    #[test]
    fn keeps_newest_open_in_window() {
        let now = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap();
        let r = response(&[
            ("open", now - Duration::days(100)),
            ("click", now - Duration::days(1)),
            ("open", now - Duration::days(10)),
            ("open", now - Duration::days(400)),
        ]);
        let record = latest_open(&r, now, 365);
        assert_eq!(record.id, "m1");
        assert_eq!(record.recent_open, Some(now - Duration::days(10)));
    }

    #[test]
    fn opens_outside_window_do_not_count() {
        let now = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap();
        let r = response(&[("open", now - Duration::days(400)), ("sent", now)]);
        assert_eq!(latest_open(&r, now, 365).recent_open, None);
        assert_eq!(latest_open(&r, now, 500).recent_open, Some(now - Duration::days(400)));
    }

    #[test]
    fn oversized_window_counts_every_open() {
        let now = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap();
        let old = Utc.with_ymd_and_hms(1990, 1, 1, 0, 0, 0).unwrap();
        let r = response(&[("open", old)]);
        assert_eq!(latest_open(&r, now, 100_000_000).recent_open, Some(old));
        assert_eq!(latest_open(&r, now, i64::MAX).recent_open, Some(old));
    }

    #[test]
    fn unparseable_timestamps_are_skipped() {
        let r: ApiActivityResponse = serde_json::from_str(
            r#"{"email_id": "m2", "activity": [{"action": "open", "timestamp": "yesterday"}]}"#,
        )
        .unwrap();
        assert_eq!(latest_open(&r, Utc::now(), 365).recent_open, None);
    }
}
