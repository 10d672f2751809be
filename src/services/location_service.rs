use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use super::clock::Clock;
use super::error::{ServiceError, ServiceResult};
use super::movement::{
    classify_history, compute_track, presence_status_with, ClassifiedHistory, Presence, PresenceThresholds,
    TrackReport,
};
use crate::auth::AuthUser;
use crate::config::TrackingConfig;
use crate::database::models::{EventType, LocationSample, User};
use crate::database::store::{Collection, DocumentStore};
use crate::database::Repository;
use crate::filter::FilterData;

/// A position reported by a device
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LocationReport {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub event_type: EventType,
}

impl LocationReport {
    pub fn validate(&self) -> ServiceResult<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ServiceError::validation(format!("latitude out of range: {}", self.latitude)));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ServiceError::validation(format!("longitude out of range: {}", self.longitude)));
        }
        if let Some(accuracy) = self.accuracy {
            if !accuracy.is_finite() || accuracy < 0.0 {
                return Err(ServiceError::validation(format!("invalid accuracy: {}", accuracy)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MovementReport {
    pub employee: Uuid,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub track: TrackReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct LiveLocation {
    pub employee: Uuid,
    #[serde(flatten)]
    pub presence: Presence,
    pub last_location: Option<LocationSample>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationHistory {
    pub employee: Uuid,
    pub days: u32,
    pub sample_count: usize,
    #[serde(flatten)]
    pub markers: ClassifiedHistory,
}

pub struct LocationService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    tracking: TrackingConfig,
}

impl LocationService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, tracking: TrackingConfig) -> Self {
        Self { store, clock, tracking }
    }

    fn samples(&self) -> Repository<LocationSample> {
        Repository::new(self.store.clone())
    }

    /// Append a sample for `employee`, stamped with the current time
    pub async fn record_sample(&self, employee: Uuid, report: LocationReport) -> ServiceResult<LocationSample> {
        report.validate()?;
        let now = self.clock.now();
        let sample = LocationSample {
            id: Uuid::new_v4(),
            employee,
            latitude: report.latitude,
            longitude: report.longitude,
            accuracy: report.accuracy,
            timestamp: now,
            day: now.date_naive(),
            event_type: report.event_type,
        };
        self.samples().create(&sample).await?;
        debug!("Recorded {:?} sample for {}", sample.event_type, employee);
        Ok(sample)
    }

    /// Track for one UTC day, today when `date` is absent
    pub async fn movement(&self, employee: Uuid, date: Option<NaiveDate>, requester: &AuthUser) -> ServiceResult<MovementReport> {
        self.authorize_read(employee, requester).await?;
        let date = date.unwrap_or_else(|| self.clock.now().date_naive());
        let samples = self
            .samples()
            .select_any(FilterData::where_clause(json!({ "employee": employee, "day": date })).order("timestamp asc"))
            .await?;

        Ok(MovementReport {
            employee,
            date,
            track: compute_track(&samples),
        })
    }

    pub async fn live_location(&self, employee: Uuid, requester: &AuthUser) -> ServiceResult<LiveLocation> {
        self.authorize_read(employee, requester).await?;
        let last = self
            .samples()
            .select_one(FilterData::where_clause(json!({ "employee": employee })).order("timestamp desc"))
            .await?;

        Ok(LiveLocation {
            employee,
            presence: presence_status_with(last.as_ref(), self.clock.now(), self.thresholds()),
            last_location: last,
        })
    }

    pub async fn location_history(&self, employee: Uuid, days: Option<u32>, requester: &AuthUser) -> ServiceResult<LocationHistory> {
        let days = days.unwrap_or(self.tracking.default_history_days);
        if days == 0 || days > self.tracking.max_history_days {
            return Err(ServiceError::validation(format!(
                "days must be between 1 and {}",
                self.tracking.max_history_days
            )));
        }
        self.authorize_read(employee, requester).await?;

        let since = self.clock.now() - Duration::days(days as i64);
        let samples = self
            .samples()
            .select_any(
                FilterData::where_clause(json!({
                    "employee": employee,
                    "timestamp": { "$gte": since.timestamp_millis() }
                }))
                .order("timestamp desc"),
            )
            .await?;

        Ok(LocationHistory {
            employee,
            days,
            sample_count: samples.len(),
            markers: classify_history(&samples),
        })
    }

    /// Administrative reset of an employee's timeline
    pub async fn reset_locations(&self, employee: Uuid, requester: &AuthUser) -> ServiceResult<u64> {
        if !requester.is_elevated() {
            return Err(ServiceError::forbidden("only admins may reset location history"));
        }
        let removed = self.purge(employee).await?;
        info!("Location history of {} reset by {}: {} samples removed", employee, requester.user_id, removed);
        Ok(removed)
    }

    /// Remove every sample of `employee` without an access check
    pub async fn purge(&self, employee: Uuid) -> ServiceResult<u64> {
        Ok(self
            .store
            .delete_many(Collection::LocationSamples, FilterData::where_clause(json!({ "employee": employee })))
            .await?)
    }

    fn thresholds(&self) -> PresenceThresholds {
        PresenceThresholds {
            online_minutes: self.tracking.online_threshold_minutes,
            idle_minutes: self.tracking.idle_threshold_minutes,
        }
    }

    /// Own timeline always; others only with elevated privilege and only if they exist
    async fn authorize_read(&self, employee: Uuid, requester: &AuthUser) -> ServiceResult<()> {
        if requester.user_id == employee {
            return Ok(());
        }
        if !requester.is_elevated() {
            return Err(ServiceError::forbidden("cannot read another employee's locations"));
        }
        if Repository::<User>::new(self.store.clone()).select_id(employee).await?.is_none() {
            return Err(ServiceError::not_found("Employee"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::roles::Role;
    use crate::database::memory::MemoryStore;
    use crate::services::clock::FixedClock;
    use crate::services::movement::PresenceStatus;
    use chrono::{DateTime, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn setup() -> (LocationService, Arc<FixedClock>, AuthUser) {
        let clock = Arc::new(FixedClock::new(t0()));
        let service = LocationService::new(Arc::new(MemoryStore::new()), clock.clone(), TrackingConfig::default());
        let me = AuthUser { user_id: Uuid::new_v4(), email: "me@tikidan.test".into(), role: Role::User };
        (service, clock, me)
    }

    fn report(lat: f64, lon: f64, event_type: EventType) -> LocationReport {
        LocationReport { latitude: lat, longitude: lon, accuracy: Some(8.0), event_type }
    }

    #[tokio::test]
    async fn rejects_out_of_range_coordinates() {
        let (service, _, me) = setup();
        for bad in [report(91.0, 0.0, EventType::Tracking), report(0.0, -180.5, EventType::Tracking), report(f64::NAN, 0.0, EventType::Tracking)] {
            let err = service.record_sample(me.user_id, bad).await.unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn movement_covers_only_the_requested_day() {
        let (service, clock, me) = setup();
        service.record_sample(me.user_id, report(12.97, 77.59, EventType::Login)).await.unwrap();
        clock.advance(Duration::minutes(1));
        service.record_sample(me.user_id, report(12.98, 77.59, EventType::Tracking)).await.unwrap();
        clock.advance(Duration::days(1));
        service.record_sample(me.user_id, report(13.50, 77.59, EventType::Tracking)).await.unwrap();

        let report = service.movement(me.user_id, Some(t0().date_naive()), &me).await.unwrap();
        assert_eq!(report.track.points.len(), 2);
        assert_eq!(report.track.total_time_minutes, 1.0);
        assert!((report.track.total_distance_km - 1.11195).abs() < 1e-3);

        let today = service.movement(me.user_id, None, &me).await.unwrap();
        assert_eq!(today.track.points.len(), 1);
    }

    #[tokio::test]
    async fn live_location_goes_idle_then_offline() {
        let (service, clock, me) = setup();
        assert_eq!(service.live_location(me.user_id, &me).await.unwrap().presence.status, PresenceStatus::NoData);

        service.record_sample(me.user_id, report(1.0, 1.0, EventType::Tracking)).await.unwrap();
        clock.advance(Duration::minutes(4));
        assert_eq!(service.live_location(me.user_id, &me).await.unwrap().presence.status, PresenceStatus::Online);
        clock.advance(Duration::minutes(6));
        assert_eq!(service.live_location(me.user_id, &me).await.unwrap().presence.status, PresenceStatus::Idle);
        clock.advance(Duration::minutes(10));
        let live = service.live_location(me.user_id, &me).await.unwrap();
        assert_eq!(live.presence.status, PresenceStatus::Offline);
        assert_eq!(live.presence.minutes_since_update, Some(20.0));
        assert_eq!(live.last_location.unwrap().latitude, 1.0);
    }

    #[tokio::test]
    async fn history_window_and_logout_markers() {
        let (service, clock, me) = setup();
        service.record_sample(me.user_id, report(1.0, 1.0, EventType::Logout)).await.unwrap();
        clock.advance(Duration::days(10));
        service.record_sample(me.user_id, report(2.0, 2.0, EventType::Login)).await.unwrap();
        clock.advance(Duration::hours(8));
        service.record_sample(me.user_id, report(3.0, 3.0, EventType::Logout)).await.unwrap();

        let history = service.location_history(me.user_id, None, &me).await.unwrap();
        assert_eq!(history.days, 7);
        assert_eq!(history.sample_count, 2);
        assert!(history.markers.online_marker.is_none());
        assert_eq!(history.markers.offline_markers.len(), 1);
        assert_eq!(history.markers.offline_markers[0].latitude, 3.0);

        let wide = service.location_history(me.user_id, Some(30), &me).await.unwrap();
        assert_eq!(wide.markers.offline_markers.len(), 2);

        let err = service.location_history(me.user_id, Some(0), &me).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn other_employees_need_elevation() {
        let (service, _, me) = setup();
        let err = service.live_location(Uuid::new_v4(), &me).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let admin = AuthUser { user_id: Uuid::new_v4(), email: "admin@tikidan.test".into(), role: Role::Admin };
        let err = service.live_location(Uuid::new_v4(), &admin).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn reset_is_admin_only() {
        let (service, _, me) = setup();
        service.record_sample(me.user_id, report(1.0, 1.0, EventType::Tracking)).await.unwrap();
        service.record_sample(me.user_id, report(1.0, 1.0, EventType::Tracking)).await.unwrap();

        let err = service.reset_locations(me.user_id, &me).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let admin = AuthUser { user_id: Uuid::new_v4(), email: "admin@tikidan.test".into(), role: Role::Admin };
        assert_eq!(service.reset_locations(me.user_id, &admin).await.unwrap(), 2);
        assert_eq!(service.live_location(me.user_id, &me).await.unwrap().presence.status, PresenceStatus::NoData);
    }
}
