//! Outbound mail.
//!
//! Mail is fire-and-forget: callers go through [`send_best_effort`], which
//! logs failures and never propagates them.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use janta_common::{AppError, AppResult, MailConfig};
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// Port for sending plain-text mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one message.
    async fn send_mail(&self, to: &str, subject: &str, body: &str) -> AppResult<()>;
}

/// Shared mailer handle.
pub type MailerService = Arc<dyn Mailer>;

/// Send a mail, logging instead of failing.
pub async fn send_best_effort(mailer: &dyn Mailer, to: &str, subject: &str, body: &str) {
    if let Err(e) = mailer.send_mail(to, subject, body).await {
        tracing::warn!(to = %to, subject = %subject, error = %e, "Failed to send mail");
    }
}

/// SMTP mailer backed by lettre.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build a STARTTLS relay transport from configuration.
    pub fn new(config: &MailConfig) -> AppResult<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| AppError::Config(format!("Invalid SMTP relay: {e}")))?
            .port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let from = format!("{} <{}>", config.from_name, config.from_address)
            .parse::<Mailbox>()
            .map_err(|e| AppError::Config(format!("Invalid sender address: {e}")))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_mail(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        let to = to
            .parse::<Mailbox>()
            .map_err(|e| AppError::BadRequest(format!("Invalid recipient {to}: {e}")))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AppError::Internal(format!("Failed to build mail: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::ExternalService(format!("SMTP delivery failed: {e}")))?;

        Ok(())
    }
}

/// Mailer used when SMTP is not configured. Logs the message.
#[derive(Clone, Default)]
pub struct NoOpMailer;

#[async_trait]
impl Mailer for NoOpMailer {
    async fn send_mail(&self, to: &str, subject: &str, _body: &str) -> AppResult<()> {
        tracing::info!(to = %to, subject = %subject, "Mail disabled, not sending");
        Ok(())
    }
}

/// A message captured by [`RecordingMailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mailer that keeps every message in memory.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
}

impl RecordingMailer {
    /// Messages sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_mail(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentMail {
                to: to.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
        Ok(())
    }
}

/// Mail templates.
pub mod templates {
    use chrono::{DateTime, Utc};

    /// Sent to every admin when a report is filed.
    #[must_use]
    pub fn new_report(title: &str) -> (String, String) {
        (
            "New Report Created".to_string(),
            format!(
                "A new report has been created with the title: {title}. \
                 Please review it at your earliest convenience."
            ),
        )
    }

    /// Sent to the creator when staff asks them to verify.
    #[must_use]
    pub fn resolution_requested(title: &str) -> (String, String) {
        (
            "Problem Resolved verification".to_string(),
            format!(
                "Your report with the title: {title} has been marked as resolved. \
                 Please verify the resolution at your earliest convenience."
            ),
        )
    }

    /// Sent to staff when a report is assigned to them.
    #[must_use]
    pub fn assigned(title: &str, admin_name: &str, deadline: Option<DateTime<Utc>>) -> (String, String) {
        let due = deadline.map_or_else(|| "no deadline".to_string(), |d| d.to_rfc3339());
        (
            format!("Report Assigned: {title}"),
            format!(
                "The report \"{title}\" has been assigned to you by {admin_name}. \
                 It is due by {due}."
            ),
        )
    }

    /// Sent to the assigned staff when the creator accepts or rejects.
    #[must_use]
    pub fn verification_outcome(title: &str, accepted: bool) -> (String, String) {
        if accepted {
            (
                format!("Resolution Accepted: {title}"),
                format!("The citizen accepted the resolution of \"{title}\". The report is now closed."),
            )
        } else {
            (
                format!("Resolution Rejected: {title}"),
                format!(
                    "The citizen rejected the resolution of \"{title}\". \
                     The report has been reopened."
                ),
            )
        }
    }

    /// Escalation sent when a report is flagged overdue.
    #[must_use]
    pub fn overdue(id: &str, title: &str, deadline: Option<DateTime<Utc>>) -> (String, String) {
        let deadline = deadline.map_or_else(|| "unknown".to_string(), |d| d.to_rfc3339());
        (
            format!("🚨 Overdue Report: {title}"),
            format!(
                "The report \"{title}\" (id: {id}) has passed its deadline ({deadline}) \
                 and is now marked as overdue. Please take action."
            ),
        )
    }
}
