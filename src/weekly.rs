use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde_json::Value;

use crate::models::{SeriesPoint, WeeklySeries};

/// Candidate timestamp fields on a buyer record, probed in priority order.
const TIMESTAMP_FIELDS: [&str; 12] = [
    "createdAt",
    "created_at",
    "createdOn",
    "created_on",
    "created",
    "createdDate",
    "created_date",
    "registeredAt",
    "registered_at",
    "joinedAt",
    "joined_at",
    "timestamp",
];

const UNDATED_NOTE: &str = "Buyers without timestamps are counted in the most recent week.";

#[derive(Debug, Clone, Copy)]
struct WeekBucket {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl WeekBucket {
    fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    fn label(&self) -> String {
        self.start.format("%b %-d").to_string()
    }
}

/// Counts buyer registrations per week over the trailing `weeks` window.
///
/// Buckets are Monday-anchored 7-day half-open intervals ending with the week
/// containing `now`, oldest first. Records older than the window land in the
/// first bucket, records newer than it in the last. Buyers with no parseable
/// timestamp are counted in the most recent bucket and flagged in the note.
/// Never fails: malformed records degrade to undated rather than erroring.
pub fn weekly_registrations(buyers: &[Value], weeks: usize, now: DateTime<Utc>) -> WeeklySeries {
    let weeks = weeks.max(1);
    let buckets = build_buckets(weeks, now);
    let earliest_start = buckets[0].start;
    let latest_end = buckets[weeks - 1].end;

    let mut counts = vec![0u64; weeks];
    let mut undated = 0u64;

    for buyer in buyers {
        let Some(created_at) = extract_created_at(buyer) else {
            undated += 1;
            continue;
        };

        if created_at < earliest_start {
            counts[0] += 1;
        } else if created_at >= latest_end {
            counts[weeks - 1] += 1;
        } else if let Some(idx) = buckets.iter().position(|b| b.contains(created_at)) {
            counts[idx] += 1;
        } else {
            undated += 1;
        }
    }

    if undated > 0 {
        counts[weeks - 1] += undated;
    }

    let series = buckets
        .iter()
        .zip(counts)
        .map(|(bucket, value)| SeriesPoint {
            label: bucket.label(),
            value,
        })
        .collect();

    let note = if undated > 0 {
        UNDATED_NOTE.to_string()
    } else {
        String::new()
    };

    WeeklySeries { series, note }
}

fn build_buckets(weeks: usize, now: DateTime<Utc>) -> Vec<WeekBucket> {
    let base_start = start_of_week(now);
    (0..weeks)
        .rev()
        .map(|weeks_back| {
            let start = base_start - Duration::weeks(weeks_back as i64);
            WeekBucket {
                start,
                end: start + Duration::days(7),
            }
        })
        .collect()
}

/// Midnight of the most recent Monday at or before `now`.
pub fn start_of_week(now: DateTime<Utc>) -> DateTime<Utc> {
    let days_back = now.weekday().num_days_from_monday() as i64;
    let monday = now.date_naive() - Duration::days(days_back);
    monday.and_time(NaiveTime::MIN).and_utc()
}

fn extract_created_at(buyer: &Value) -> Option<DateTime<Utc>> {
    TIMESTAMP_FIELDS
        .iter()
        .filter_map(|field| buyer.get(field))
        .find_map(parse_date_value)
}

/// Best-effort timestamp parsing over the shapes the backend has been seen to
/// emit: Unix seconds, Unix millis, digit-only strings of either, and ISO-ish
/// date strings. Anything else is undated.
pub fn parse_date_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => parse_epoch(n.as_f64()?),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else if trimmed.bytes().all(|b| b.is_ascii_digit()) {
                parse_epoch(trimmed.parse::<f64>().ok()?)
            } else {
                parse_date_string(trimmed)
            }
        }
        _ => None,
    }
}

// Values below 1e12 are Unix seconds (1e12 ms is ~2001; plausible second
// counts stay far under it), at or above are already milliseconds.
fn parse_epoch(raw: f64) -> Option<DateTime<Utc>> {
    if !raw.is_finite() {
        return None;
    }
    let millis = if raw < 1e12 { raw * 1000.0 } else { raw };
    if millis < i64::MIN as f64 || millis > i64::MAX as f64 {
        return None;
    }
    Utc.timestamp_millis_opt(millis as i64).single()
}

fn parse_date_string(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.and_utc());
        }
    }
    // Bare dates resolve to midnight UTC, same as the dashboard charts did.
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::MIN).and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Wednesday; the current week starts Monday 2025-11-03.
    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 5, 12, 0, 0).unwrap()
    }

    fn series_values(series: &WeeklySeries) -> Vec<u64> {
        series.series.iter().map(|p| p.value).collect()
    }

    #[test]
    fn empty_input_yields_zeroed_series_without_note() {
        let series = weekly_registrations(&[], 8, fixed_now());
        assert_eq!(series.series.len(), 8);
        assert!(series.series.iter().all(|p| p.value == 0));
        assert!(series.note.is_empty());
    }

    #[test]
    fn labels_are_monday_starts_oldest_first() {
        let series = weekly_registrations(&[], 8, fixed_now());
        let labels: Vec<&str> = series.series.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Sep 15", "Sep 22", "Sep 29", "Oct 6", "Oct 13", "Oct 20", "Oct 27", "Nov 3"
            ]
        );
    }

    #[test]
    fn current_week_record_lands_in_last_bucket() {
        let buyers = vec![json!({"createdAt": "2025-11-04"})];
        let series = weekly_registrations(&buyers, 8, fixed_now());
        assert_eq!(series_values(&series), vec![0, 0, 0, 0, 0, 0, 0, 1]);
        assert!(series.note.is_empty());
    }

    #[test]
    fn timestamp_exactly_at_week_start_counts_as_this_week() {
        let buyers = vec![json!({"createdAt": "2025-11-03T00:00:00Z"})];
        let series = weekly_registrations(&buyers, 8, fixed_now());
        assert_eq!(series.series.last().unwrap().value, 1);
    }

    #[test]
    fn bucket_end_belongs_to_the_next_bucket() {
        // Exactly at the end of the second-to-last bucket, i.e. the start of
        // the last one.
        let buyers = vec![json!({"createdAt": "2025-11-03T00:00:00Z"})];
        let series = weekly_registrations(&buyers, 2, fixed_now());
        assert_eq!(series_values(&series), vec![0, 1]);
    }

    #[test]
    fn record_before_window_counts_in_oldest_bucket() {
        // One millisecond before the first bucket opens on Sep 15.
        let buyers = vec![json!({"createdAt": "2025-09-14T23:59:59.999Z"})];
        let series = weekly_registrations(&buyers, 8, fixed_now());
        assert_eq!(series.series[0].value, 1);
        assert_eq!(series_values(&series)[1..], [0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn record_after_window_counts_in_newest_bucket() {
        let buyers = vec![json!({"createdAt": "2025-11-20T00:00:00Z"})];
        let series = weekly_registrations(&buyers, 8, fixed_now());
        assert_eq!(series.series.last().unwrap().value, 1);
    }

    #[test]
    fn undated_records_fold_into_newest_bucket_with_note() {
        let buyers = vec![
            json!({"username": "no-dates-at-all"}),
            json!({"createdAt": null, "created_at": "invalid-date"}),
        ];
        let series = weekly_registrations(&buyers, 8, fixed_now());
        assert_eq!(series.series.last().unwrap().value, 2);
        assert_eq!(
            series.note,
            "Buyers without timestamps are counted in the most recent week."
        );
    }

    #[test]
    fn every_record_is_counted_exactly_once() {
        let buyers = vec![
            json!({"createdAt": "2025-11-04"}),
            json!({"createdAt": "2025-10-07T08:30:00Z"}),
            json!({"createdAt": "2024-01-01"}),
            json!({"createdAt": "2026-01-01"}),
            json!({"created": "not a date"}),
        ];
        let series = weekly_registrations(&buyers, 8, fixed_now());
        let total: u64 = series_values(&series).iter().sum();
        assert_eq!(total, buyers.len() as u64);
    }

    #[test]
    fn unix_seconds_are_scaled_to_millis() {
        // 1762250400 s = 2025-11-04T10:00:00Z. Misread as millis it would be
        // 1970 and land in the oldest bucket instead of the current week.
        let buyers = vec![json!({"createdAt": 1_762_250_400})];
        let series = weekly_registrations(&buyers, 8, fixed_now());
        assert_eq!(series.series.last().unwrap().value, 1);
        assert!(series.note.is_empty());

        // 1730000000 s = 2024-10-27, older than the window, so oldest bucket.
        let buyers = vec![json!({"createdAt": 1_730_000_000})];
        let series = weekly_registrations(&buyers, 8, fixed_now());
        assert_eq!(series.series[0].value, 1);
    }

    #[test]
    fn unix_millis_pass_through_unscaled() {
        let instant = Utc.with_ymd_and_hms(2025, 11, 4, 10, 0, 0).unwrap();
        let buyers = vec![json!({ "createdAt": instant.timestamp_millis() })];
        let series = weekly_registrations(&buyers, 8, fixed_now());
        assert_eq!(series.series.last().unwrap().value, 1);
    }

    #[test]
    fn digit_strings_parse_as_epoch_numbers() {
        let buyers = vec![json!({"createdAt": "1730000000"})];
        let series = weekly_registrations(&buyers, 8, fixed_now());
        assert_eq!(series.series[0].value, 1);
    }

    #[test]
    fn probes_fall_through_to_later_fields() {
        let buyers = vec![json!({
            "createdAt": null,
            "created_at": "",
            "registered_at": "2025-11-04T09:00:00Z"
        })];
        let series = weekly_registrations(&buyers, 8, fixed_now());
        assert_eq!(series.series.last().unwrap().value, 1);
        assert!(series.note.is_empty());
    }

    #[test]
    fn canonical_field_wins_over_synonyms() {
        let buyers = vec![json!({
            "timestamp": "2024-01-01T00:00:00Z",
            "createdAt": "2025-11-04T00:00:00Z"
        })];
        let series = weekly_registrations(&buyers, 8, fixed_now());
        assert_eq!(series.series.last().unwrap().value, 1);
        assert_eq!(series.series[0].value, 0);
    }

    #[test]
    fn non_scalar_values_are_undated() {
        let buyers = vec![json!({"createdAt": {"nested": true}, "created_at": [1, 2]})];
        let series = weekly_registrations(&buyers, 8, fixed_now());
        assert_eq!(series.series.last().unwrap().value, 1);
        assert!(!series.note.is_empty());
    }

    #[test]
    fn zero_weeks_is_clamped_to_one_bucket() {
        let buyers = vec![json!({"createdAt": "2025-11-04"})];
        let series = weekly_registrations(&buyers, 0, fixed_now());
        assert_eq!(series.series.len(), 1);
        assert_eq!(series.series[0].value, 1);
    }

    #[test]
    fn start_of_week_rolls_back_to_monday_midnight() {
        let expected = Utc.with_ymd_and_hms(2025, 11, 3, 0, 0, 0).unwrap();
        assert_eq!(start_of_week(fixed_now()), expected);
        // A Sunday rolls back six days, not zero.
        let sunday = Utc.with_ymd_and_hms(2025, 11, 9, 23, 59, 59).unwrap();
        assert_eq!(start_of_week(sunday), expected);
        // A Monday is already the week start.
        assert_eq!(start_of_week(expected), expected);
    }

    #[test]
    fn parse_date_value_rejects_junk() {
        assert!(parse_date_value(&Value::Null).is_none());
        assert!(parse_date_value(&json!("")).is_none());
        assert!(parse_date_value(&json!("   ")).is_none());
        assert!(parse_date_value(&json!("soon")).is_none());
        assert!(parse_date_value(&json!(true)).is_none());
        assert!(parse_date_value(&json!(f64::NAN)).is_none());
    }

    #[test]
    fn parse_date_value_accepts_common_shapes() {
        let expected = Utc.with_ymd_and_hms(2025, 11, 4, 0, 0, 0).unwrap();
        assert_eq!(parse_date_value(&json!("2025-11-04")), Some(expected));
        assert_eq!(
            parse_date_value(&json!("2025-11-04T00:00:00Z")),
            Some(expected)
        );
        assert_eq!(
            parse_date_value(&json!("2025-11-04T02:00:00+02:00")),
            Some(expected)
        );
        assert_eq!(
            parse_date_value(&json!(expected.timestamp())),
            Some(expected)
        );
        assert_eq!(
            parse_date_value(&json!(expected.timestamp_millis())),
            Some(expected)
        );
    }
}
