use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::clock::Clock;
use super::error::{ServiceError, ServiceResult};
use super::location_service::{LocationReport, LocationService};
use super::require_text;
use crate::auth::{generate_jwt, AuthUser, Claims, PasswordService};
use crate::config::{roles::Role, TrackingConfig};
use crate::database::models::{EventType, User};
use crate::database::store::{DocumentStore, StoreError};
use crate::database::Repository;
use crate::filter::FilterData;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Admin-created account with an explicit role
#[derive(Debug, Clone, Deserialize)]
pub struct NewEmployee {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub employee_code: Option<String>,
    #[serde(default)]
    pub designation: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Coordinates {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
}

impl Coordinates {
    fn report(&self, event_type: EventType) -> Option<LocationReport> {
        Some(LocationReport {
            latitude: self.latitude?,
            longitude: self.longitude?,
            accuracy: self.accuracy,
            event_type,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(flatten)]
    pub coordinates: Coordinates,
}

/// User as shown to clients; never carries the password hash
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub display_name: String,
    pub department: Option<String>,
    pub permissions: Vec<String>,
    pub employee_code: Option<String>,
    pub designation: Option<String>,
    pub mobile: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            display_name: user.role.display_name(),
            permissions: user.role.menu_access(),
            department: user.department.or_else(|| user.role.department()),
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            employee_code: user.employee_code,
            designation: user.designation,
            mobile: user.mobile,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

fn normalize_email(email: &str) -> ServiceResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(ServiceError::validation(format!("invalid email: {}", email))),
    }
}

pub struct UserService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    locations: LocationService,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, tracking: TrackingConfig) -> Self {
        let locations = LocationService::new(store.clone(), clock.clone(), tracking);
        Self { store, clock, locations }
    }

    fn users(&self) -> Repository<User> {
        Repository::new(self.store.clone())
    }

    /// Self-service sign-up; always the plain `user` role
    pub async fn register(&self, request: RegisterRequest) -> ServiceResult<LoginResponse> {
        let user = self
            .insert_user(NewEmployee {
                name: request.name,
                email: request.email,
                password: request.password,
                role: Role::User,
                department: None,
                employee_code: None,
                designation: None,
                mobile: None,
            })
            .await?;
        self.issue(user)
    }

    pub async fn create_employee(&self, employee: NewEmployee, requester: &AuthUser) -> ServiceResult<UserProfile> {
        if !requester.is_elevated() {
            return Err(ServiceError::forbidden("only admins may create employees"));
        }
        Ok(self.insert_user(employee).await?.into())
    }

    /// Bootstrap path for the admin CLI
    pub async fn create_admin(&self, name: String, email: String, password: String) -> ServiceResult<UserProfile> {
        let user = self
            .insert_user(NewEmployee {
                name,
                email,
                password,
                role: Role::Admin,
                department: None,
                employee_code: None,
                designation: None,
                mobile: None,
            })
            .await?;
        info!("Created admin account {}", user.email);
        Ok(user.into())
    }

    pub async fn login(&self, request: LoginRequest) -> ServiceResult<LoginResponse> {
        let email = request.email.trim().to_lowercase();
        let invalid = || ServiceError::Unauthorized("Invalid credentials".into());

        let user = self
            .users()
            .select_one(FilterData::where_clause(json!({ "email": email })))
            .await?
            .ok_or_else(invalid)?;
        let verified = PasswordService::verify(&request.password, &user.password_hash).map_err(|e| {
            warn!("Stored password hash for {} is unreadable: {}", user.id, e);
            invalid()
        })?;
        if !verified {
            return Err(invalid());
        }

        if let Some(report) = request.coordinates.report(EventType::Login) {
            self.locations.record_sample(user.id, report).await?;
        }
        self.issue(user)
    }

    /// Tokens are stateless; logout only records where the user signed off
    pub async fn logout(&self, requester: &AuthUser, coordinates: Coordinates) -> ServiceResult<()> {
        if let Some(report) = coordinates.report(EventType::Logout) {
            self.locations.record_sample(requester.user_id, report).await?;
        }
        Ok(())
    }

    pub async fn me(&self, requester: &AuthUser) -> ServiceResult<UserProfile> {
        self.users()
            .select_id(requester.user_id)
            .await?
            .map(UserProfile::from)
            .ok_or_else(|| ServiceError::not_found("User"))
    }

    pub async fn list_employees(&self, requester: &AuthUser) -> ServiceResult<Vec<UserProfile>> {
        if !requester.is_elevated() {
            return Err(ServiceError::forbidden("only admins may list employees"));
        }
        let mut users = self.users().select_any(FilterData::all()).await?;
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users.into_iter().map(UserProfile::from).collect())
    }

    pub async fn delete_employee(&self, id: Uuid, requester: &AuthUser) -> ServiceResult<()> {
        if !requester.is_elevated() {
            return Err(ServiceError::forbidden("only admins may delete employees"));
        }
        if id == requester.user_id {
            return Err(ServiceError::validation("cannot delete your own account"));
        }
        if !self.users().delete_id(id).await? {
            return Err(ServiceError::not_found("Employee"));
        }
        info!("Employee {} deleted by {}", id, requester.user_id);
        Ok(())
    }

    async fn insert_user(&self, employee: NewEmployee) -> ServiceResult<User> {
        require_text("name", &employee.name)?;
        let email = normalize_email(&employee.email)?;
        if employee.password.chars().count() < PasswordService::MIN_LENGTH {
            return Err(ServiceError::validation(format!(
                "password must be at least {} characters",
                PasswordService::MIN_LENGTH
            )));
        }

        let taken = self
            .users()
            .count(FilterData::where_clause(json!({ "email": email })))
            .await?;
        if taken > 0 {
            return Err(ServiceError::Conflict(format!("email already registered: {}", email)));
        }

        let password_hash = PasswordService::hash(&employee.password)
            .map_err(|e| ServiceError::validation(e.to_string()))?;
        let user = User {
            id: Uuid::new_v4(),
            name: employee.name.trim().to_string(),
            email,
            password_hash,
            role: employee.role,
            department: employee.department,
            employee_code: employee.employee_code,
            designation: employee.designation,
            mobile: employee.mobile,
            created_at: self.clock.now(),
        };

        match self.users().create(&user).await {
            Ok(()) => Ok(user),
            Err(StoreError::Duplicate { .. }) => Err(ServiceError::Conflict(format!("email already registered: {}", user.email))),
            Err(e) => Err(e.into()),
        }
    }

    fn issue(&self, user: User) -> ServiceResult<LoginResponse> {
        let claims = Claims::new(user.id, user.email.clone(), user.role);
        let token = generate_jwt(&claims).map_err(|e| ServiceError::Unauthorized(e.to_string()))?;
        Ok(LoginResponse { token, user: user.into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::database::models::LocationSample;
    use crate::services::clock::SystemClock;

    fn setup() -> (UserService, Arc<dyn DocumentStore>) {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        (UserService::new(store.clone(), Arc::new(SystemClock), TrackingConfig::default()), store)
    }

    fn register(email: &str) -> RegisterRequest {
        RegisterRequest { name: "Priya".into(), email: email.into(), password: "s3cret!".into() }
    }

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest { email: email.into(), password: password.into(), coordinates: Coordinates::default() }
    }

    #[tokio::test]
    async fn register_then_login_case_insensitively() {
        let (service, _) = setup();
        let registered = service.register(register("Priya@Tikidan.test")).await.unwrap();
        assert_eq!(registered.user.email, "priya@tikidan.test");
        assert_eq!(registered.user.role, Role::User);

        let session = service.login(login("PRIYA@tikidan.test", "s3cret!")).await.unwrap();
        assert_eq!(session.user.id, registered.user.id);
        assert!(!session.token.is_empty());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let (service, _) = setup();
        service.register(register("a@tikidan.test")).await.unwrap();
        let wrong = service.login(login("a@tikidan.test", "nope")).await.unwrap_err();
        let unknown = service.login(login("b@tikidan.test", "s3cret!")).await.unwrap_err();
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert!(matches!(wrong, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let (service, _) = setup();
        service.register(register("dup@tikidan.test")).await.unwrap();
        let err = service.register(register("DUP@tikidan.test")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        let (service, _) = setup();
        let mut request = register("x@tikidan.test");
        request.password = "12345".into();
        assert!(matches!(service.register(request).await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn login_and_logout_with_coordinates_record_samples() {
        let (service, store) = setup();
        let user = service.register(register("gps@tikidan.test")).await.unwrap().user;
        let coordinates = Coordinates { latitude: Some(12.9), longitude: Some(77.6), accuracy: None };
        let mut request = login("gps@tikidan.test", "s3cret!");
        request.coordinates = coordinates;
        service.login(request).await.unwrap();

        let me = AuthUser { user_id: user.id, email: user.email.clone(), role: user.role };
        service.logout(&me, coordinates).await.unwrap();

        let samples = Repository::<LocationSample>::new(store)
            .select_any(FilterData::where_clause(json!({ "employee": user.id })).order("timestamp asc"))
            .await
            .unwrap();
        let events: Vec<EventType> = samples.iter().map(|s| s.event_type).collect();
        assert_eq!(events.len(), 2);
        assert!(events.contains(&EventType::Login));
        assert!(events.contains(&EventType::Logout));
    }

    #[tokio::test]
    async fn admin_manages_employees_but_not_itself() {
        let (service, _) = setup();
        let admin = service
            .create_admin("Root".into(), "root@tikidan.test".into(), "rootpass".into())
            .await
            .unwrap();
        let admin_user = AuthUser { user_id: admin.id, email: admin.email.clone(), role: Role::Admin };
        assert_eq!(admin.permissions, vec!["*".to_string()]);

        let hire = NewEmployee {
            name: "Sam".into(),
            email: "sam@tikidan.test".into(),
            password: "password1".into(),
            role: Role::SalesManager,
            department: None,
            employee_code: Some("EMP-7".into()),
            designation: None,
            mobile: None,
        };
        let sam = service.create_employee(hire, &admin_user).await.unwrap();
        assert_eq!(sam.department.as_deref(), Some("sales"));
        assert_eq!(service.list_employees(&admin_user).await.unwrap().len(), 2);

        let sam_user = AuthUser { user_id: sam.id, email: sam.email.clone(), role: sam.role };
        assert!(matches!(service.list_employees(&sam_user).await, Err(ServiceError::Forbidden(_))));
        assert!(matches!(
            service.delete_employee(admin.id, &admin_user).await,
            Err(ServiceError::Validation(_))
        ));
        service.delete_employee(sam.id, &admin_user).await.unwrap();
        assert!(matches!(
            service.delete_employee(sam.id, &admin_user).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
