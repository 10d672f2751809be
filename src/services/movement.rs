//! GPS movement analytics over an employee's location samples.
//!
//! Everything here is pure: callers load the samples and supply `now`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::database::models::{EventType, LocationSample};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinates, in kilometres
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 60_000.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    /// Distance from the previous point; 0 for the first
    pub distance_km: f64,
    /// Minutes since the previous point; 0 for the first
    pub elapsed_minutes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackReport {
    pub points: Vec<TrackPoint>,
    pub total_distance_km: f64,
    pub total_time_minutes: f64,
}

impl TrackReport {
    pub fn empty() -> Self {
        Self {
            points: vec![],
            total_distance_km: 0.0,
            total_time_minutes: 0.0,
        }
    }
}

/// Per-segment distance and elapsed time along a subject's samples.
///
/// Input is sorted by timestamp first (stable, so equal timestamps keep their order).
pub fn compute_track(samples: &[LocationSample]) -> TrackReport {
    let mut ordered: Vec<&LocationSample> = samples.iter().collect();
    ordered.sort_by_key(|s| s.timestamp);

    let (Some(first), Some(last)) = (ordered.first(), ordered.last()) else {
        return TrackReport::empty();
    };
    let total_time_minutes = minutes_between(first.timestamp, last.timestamp);

    let mut points = Vec::with_capacity(ordered.len());
    let mut total_distance_km = 0.0;
    let mut previous: Option<&LocationSample> = None;

    for sample in ordered.iter().copied() {
        let (distance_km, elapsed_minutes) = match previous {
            Some(prev) => (
                haversine_km(prev.latitude, prev.longitude, sample.latitude, sample.longitude),
                minutes_between(prev.timestamp, sample.timestamp),
            ),
            None => (0.0, 0.0),
        };
        total_distance_km += distance_km;
        points.push(TrackPoint {
            latitude: sample.latitude,
            longitude: sample.longitude,
            accuracy: sample.accuracy,
            timestamp: sample.timestamp,
            event_type: sample.event_type,
            distance_km,
            elapsed_minutes,
        });
        previous = Some(sample);
    }

    TrackReport {
        points,
        total_distance_km,
        total_time_minutes,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    Idle,
    Offline,
    NoData,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresenceThresholds {
    pub online_minutes: f64,
    pub idle_minutes: f64,
}

impl Default for PresenceThresholds {
    fn default() -> Self {
        Self {
            online_minutes: 5.0,
            idle_minutes: 15.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Presence {
    pub status: PresenceStatus,
    /// Raw difference `now - last.timestamp`; negative under clock skew.
    /// `None` when there is no sample.
    pub minutes_since_update: Option<f64>,
}

pub fn presence_status(last: Option<&LocationSample>, now: DateTime<Utc>) -> Presence {
    presence_status_with(last, now, PresenceThresholds::default())
}

pub fn presence_status_with(
    last: Option<&LocationSample>,
    now: DateTime<Utc>,
    thresholds: PresenceThresholds,
) -> Presence {
    let Some(last) = last else {
        return Presence {
            status: PresenceStatus::NoData,
            minutes_since_update: None,
        };
    };

    let minutes = minutes_between(last.timestamp, now);
    let effective = minutes.max(0.0);
    let status = if effective <= thresholds.online_minutes {
        PresenceStatus::Online
    } else if effective <= thresholds.idle_minutes {
        PresenceStatus::Idle
    } else {
        PresenceStatus::Offline
    };

    Presence {
        status,
        minutes_since_update: Some(minutes),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Online,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    #[serde(rename = "type")]
    pub kind: MarkerKind,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Marker {
    fn from_sample(kind: MarkerKind, sample: &LocationSample) -> Self {
        Self {
            kind,
            latitude: sample.latitude,
            longitude: sample.longitude,
            accuracy: sample.accuracy,
            timestamp: sample.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedHistory {
    pub online_marker: Option<Marker>,
    pub offline_markers: Vec<Marker>,
}

/// Current online marker plus every sign-off point in the window.
///
/// Samples are expected newest first. The latest sample is the one with the
/// greatest timestamp, the earliest in input order on ties.
pub fn classify_history(samples: &[LocationSample]) -> ClassifiedHistory {
    let latest = samples
        .iter()
        .reduce(|best, s| if s.timestamp > best.timestamp { s } else { best });

    let online_marker = latest
        .filter(|s| s.event_type != EventType::Logout)
        .map(|s| Marker::from_sample(MarkerKind::Online, s));

    let offline_markers = samples
        .iter()
        .filter(|s| s.event_type == EventType::Logout)
        .map(|s| Marker::from_sample(MarkerKind::Offline, s))
        .collect();

    ClassifiedHistory {
        online_marker,
        offline_markers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn sample(lat: f64, lon: f64, at: DateTime<Utc>, event_type: EventType) -> LocationSample {
        LocationSample {
            id: Uuid::new_v4(),
            employee: Uuid::nil(),
            latitude: lat,
            longitude: lon,
            accuracy: None,
            timestamp: at,
            day: at.date_naive(),
            event_type,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn haversine_matches_arc_length_along_a_meridian() {
        let expected = EARTH_RADIUS_KM * 0.01_f64.to_radians();
        let d = haversine_km(12.97, 77.59, 12.98, 77.59);
        assert!((d - expected).abs() < 1e-9, "got {d}, expected {expected}");
        assert!((d - 1.11195).abs() < 1e-4);
    }

    #[test]
    fn two_samples_one_minute_apart() {
        let samples = vec![
            sample(12.97, 77.59, t0(), EventType::Login),
            sample(12.98, 77.59, t0() + Duration::minutes(1), EventType::Tracking),
        ];
        let report = compute_track(&samples);
        assert_eq!(report.points.len(), 2);
        assert_eq!(report.points[0].distance_km, 0.0);
        assert_eq!(report.points[0].elapsed_minutes, 0.0);
        assert!((report.points[1].distance_km - EARTH_RADIUS_KM * 0.01_f64.to_radians()).abs() < 1e-9);
        assert_eq!(report.points[1].elapsed_minutes, 1.0);
        assert_eq!(report.total_time_minutes, 1.0);
        assert_eq!(report.total_distance_km, report.points[1].distance_km);
    }

    #[test]
    fn empty_track_is_not_an_error() {
        assert_eq!(compute_track(&[]), TrackReport::empty());
    }

    #[test]
    fn unsorted_input_is_sorted_first() {
        let samples = vec![
            sample(10.0, 10.0, t0() + Duration::minutes(30), EventType::Tracking),
            sample(10.0, 10.0, t0(), EventType::Login),
            sample(10.0, 10.0, t0() + Duration::seconds(90), EventType::Tracking),
        ];
        let report = compute_track(&samples);
        assert_eq!(report.points[0].timestamp, t0());
        assert_eq!(report.points[1].elapsed_minutes, 1.5);
        assert_eq!(report.points[2].elapsed_minutes, 28.5);
        assert_eq!(report.total_time_minutes, 30.0);
        assert_eq!(report.total_distance_km, 0.0);
    }

    #[test]
    fn total_distance_is_sum_of_segments() {
        let samples = vec![
            sample(0.0, 0.0, t0(), EventType::Tracking),
            sample(0.0, 1.0, t0() + Duration::minutes(5), EventType::Tracking),
            sample(1.0, 1.0, t0() + Duration::minutes(10), EventType::Tracking),
        ];
        let report = compute_track(&samples);
        let sum: f64 = report.points.iter().map(|p| p.distance_km).sum();
        assert!((report.total_distance_km - sum).abs() < 1e-12);
        assert!(report.total_distance_km > 222.0 && report.total_distance_km < 223.0);
    }

    #[test]
    fn presence_thresholds() {
        let last = sample(0.0, 0.0, t0(), EventType::Tracking);
        let at = |m: i64| presence_status(Some(&last), t0() + Duration::minutes(m));
        assert_eq!(at(4).status, PresenceStatus::Online);
        assert_eq!(at(5).status, PresenceStatus::Online);
        assert_eq!(at(10).status, PresenceStatus::Idle);
        assert_eq!(at(15).status, PresenceStatus::Idle);
        assert_eq!(at(20).status, PresenceStatus::Offline);
        assert_eq!(at(20).minutes_since_update, Some(20.0));
    }

    #[test]
    fn no_sample_is_no_data_not_offline() {
        let presence = presence_status(None, t0());
        assert_eq!(presence.status, PresenceStatus::NoData);
        assert_eq!(presence.minutes_since_update, None);
    }

    #[test]
    fn clock_skew_reports_raw_difference_but_counts_as_online() {
        let last = sample(0.0, 0.0, t0() + Duration::minutes(2), EventType::Tracking);
        let presence = presence_status(Some(&last), t0());
        assert_eq!(presence.status, PresenceStatus::Online);
        assert_eq!(presence.minutes_since_update, Some(-2.0));
    }

    #[test]
    fn custom_thresholds() {
        let last = sample(0.0, 0.0, t0(), EventType::Tracking);
        let thresholds = PresenceThresholds { online_minutes: 1.0, idle_minutes: 2.0 };
        let presence = presence_status_with(Some(&last), t0() + Duration::minutes(3), thresholds);
        assert_eq!(presence.status, PresenceStatus::Offline);
    }

    #[test]
    fn latest_logout_means_no_online_marker() {
        let samples = vec![
            sample(1.0, 1.0, t0() + Duration::hours(2), EventType::Logout),
            sample(2.0, 2.0, t0() + Duration::hours(1), EventType::Tracking),
            sample(3.0, 3.0, t0(), EventType::Login),
        ];
        let history = classify_history(&samples);
        assert!(history.online_marker.is_none());
        assert_eq!(history.offline_markers.len(), 1);
        assert_eq!(history.offline_markers[0].latitude, 1.0);
        assert_eq!(history.offline_markers[0].kind, MarkerKind::Offline);
    }

    #[test]
    fn latest_tracking_sample_is_online_and_old_logouts_are_kept() {
        let samples = vec![
            sample(5.0, 5.0, t0() + Duration::hours(3), EventType::Tracking),
            sample(4.0, 4.0, t0() + Duration::hours(2), EventType::Login),
            sample(1.0, 1.0, t0() + Duration::hours(1), EventType::Logout),
            sample(0.5, 0.5, t0(), EventType::Logout),
        ];
        let history = classify_history(&samples);
        let online = history.online_marker.unwrap();
        assert_eq!(online.kind, MarkerKind::Online);
        assert_eq!(online.latitude, 5.0);
        assert_eq!(history.offline_markers.len(), 2);
    }

    #[test]
    fn empty_history_has_no_markers() {
        let history = classify_history(&[]);
        assert!(history.online_marker.is_none());
        assert!(history.offline_markers.is_empty());
    }

    #[test]
    fn marker_serializes_type_tag() {
        let history = classify_history(&[sample(1.0, 2.0, t0(), EventType::Login)]);
        let json = serde_json::to_value(&history).unwrap();
        assert_eq!(json["online_marker"]["type"], "online");
    }
}
