//! Database repositories.

pub mod notification;
pub mod report;
pub mod user;

pub use notification::NotificationRepository;
pub use report::ReportRepository;
pub use user::UserRepository;
