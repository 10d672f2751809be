pub mod client_service;
pub mod clock;
pub mod error;
pub mod expense_service;
pub mod location_service;
pub mod meeting_service;
pub mod movement;
pub mod project_service;
pub mod user_service;

pub use client_service::ClientService;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ServiceError, ServiceResult};
pub use expense_service::ExpenseService;
pub use location_service::LocationService;
pub use meeting_service::MeetingService;
pub use project_service::ProjectService;
pub use user_service::UserService;

/// Reject empty or whitespace-only text fields
pub(crate) fn require_text(field: &str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::validation(format!("{} is required", field)));
    }
    Ok(())
}
