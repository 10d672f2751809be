pub mod branch_location;
pub mod client;
pub mod contact_person;
pub mod expense;
pub mod location_sample;
pub mod meeting;
pub mod project;
pub mod user;

pub use branch_location::BranchLocation;
pub use client::{Client, ClientCategory, ClientStatus};
pub use contact_person::ContactPerson;
pub use expense::{Expense, ExpenseCategory, ExpenseStatus};
pub use location_sample::{EventType, LocationSample};
pub use meeting::{Attendee, Meeting, MeetingStatus, MeetingType};
pub use project::{Project, ProjectPriority, ProjectStatus, TeamMember};
pub use user::User;
