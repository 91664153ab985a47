//! Business logic services.

pub mod assignment;
pub mod deadline;
pub mod email;
pub mod event_publisher;
pub mod notification;
pub mod overdue;
pub mod report;
pub mod resolution;

pub use assignment::{AssignmentService, EligibleStaff};
pub use deadline::{
    Urgency, classify, deadline_for, deadline_offset, next_recheck_at, sort_by_deadline,
    time_remaining_secs,
};
pub use email::{Mailer, MailerService, NoOpMailer, RecordingMailer, SentMail, SmtpMailer};
pub use event_publisher::{
    EventPublisher, EventPublisherService, StreamEvent, Subscription, UserChannelHub,
};
pub use notification::{NotificationService, overdue_message};
pub use overdue::{OverdueService, SweepReport};
pub use report::{CreateReportInput, GeoPoint, ReportService};
pub use resolution::ResolutionService;
