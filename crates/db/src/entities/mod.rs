//! Database entities.

#![allow(missing_docs)]

pub mod department;
pub mod notification;
pub mod report;
pub mod user;

pub use department::{Department, Departments};
pub use notification::Entity as Notification;
pub use report::Entity as Report;
pub use report::{ReportStatus, Severity, UserSummary};
pub use user::Entity as User;
pub use user::UserRole;
