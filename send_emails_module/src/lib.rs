//! Outbound reminder mail over authenticated SMTP.
//!
//! One message is built and submitted per recipient; the transport is opened
//! with STARTTLS against the configured submission host and dropped after
//! each send.

use chrono::NaiveDate;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;

pub const DEFAULT_SENDER_NAME: &str = "LeadSquared Automation Bot";

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender_name: String,
}

/// Parameters for one weekly visit-plan reminder.
#[derive(Debug, Clone)]
pub struct ReminderEmail {
    pub to: String,
    pub first_name: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
}

#[derive(Debug, thiserror::Error)]
pub enum SendEmailError {
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

pub fn render_subject(email: &ReminderEmail) -> String {
    format!(
        "Action Required: Create Your Visit Plan for the Week {} to {}",
        email.week_start, email.week_end
    )
}

pub fn render_body(email: &ReminderEmail) -> String {
    let first_name = if email.first_name.trim().is_empty() {
        "there"
    } else {
        email.first_name.trim()
    };
    format!(
        "Dear {first_name},\n\n\
         This is an automated reminder.\n\n\
         We've noticed that you have not yet created any visit plans in LeadSquared \
         for the current week of {} to {}.\n\n\
         To ensure proper planning and tracking, please create your visit plans for \
         the week at your earliest convenience.\n\n\
         Thank you,\n\
         Captain Steel India Limited\n",
        email.week_start.format("%B %d"),
        email.week_end.format("%B %d"),
    )
}

pub fn build_message(config: &SmtpConfig, email: &ReminderEmail) -> Result<Message, SendEmailError> {
    let from: Mailbox = format!("{} <{}>", config.sender_name, config.username).parse()?;
    let to: Mailbox = email.to.parse()?;
    let message = Message::builder()
        .from(from)
        .to(to)
        .subject(render_subject(email))
        .header(ContentType::TEXT_PLAIN)
        .body(render_body(email))?;
    Ok(message)
}

/// Send one reminder through the configured submission host.
///
/// The connection is upgraded with STARTTLS and authenticated with the
/// configured username/password before the message is submitted.
pub fn send_reminder(config: &SmtpConfig, email: &ReminderEmail) -> Result<(), SendEmailError> {
    let message = build_message(config, email)?;
    let mailer = SmtpTransport::starttls_relay(&config.host)?
        .port(config.port)
        .credentials(Credentials::new(
            config.username.clone(),
            config.password.clone(),
        ))
        .build();
    mailer.send(&message)?;
    info!("sent visit plan reminder to {}", email.to);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_email() -> ReminderEmail {
        ReminderEmail {
            to: "asha@example.com".to_string(),
            first_name: "Asha".to_string(),
            week_start: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            week_end: NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(),
        }
    }

    fn sample_config() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "bot@example.com".to_string(),
            password: "secret".to_string(),
            sender_name: DEFAULT_SENDER_NAME.to_string(),
        }
    }

    #[test]
    fn subject_carries_week_range() {
        let subject = render_subject(&sample_email());
        assert_eq!(
            subject,
            "Action Required: Create Your Visit Plan for the Week 2025-03-10 to 2025-03-15"
        );
    }

    #[test]
    fn body_uses_month_day_dates_and_name() {
        let body = render_body(&sample_email());
        assert!(body.starts_with("Dear Asha,"));
        assert!(body.contains("March 10 to March 15"));
    }

    #[test]
    fn body_falls_back_when_first_name_missing() {
        let mut email = sample_email();
        email.first_name = "  ".to_string();
        assert!(render_body(&email).starts_with("Dear there,"));
    }

    #[test]
    fn message_builds_with_sender_name() {
        let message = build_message(&sample_config(), &sample_email()).expect("build message");
        let rendered = String::from_utf8(message.formatted()).expect("utf8 message");
        assert!(rendered.contains("To: asha@example.com"));
        assert!(rendered.contains("Action Required"));
    }

    #[test]
    fn invalid_recipient_is_an_address_error() {
        let mut email = sample_email();
        email.to = "not-an-address".to_string();
        let err = build_message(&sample_config(), &email).unwrap_err();
        assert!(matches!(err, SendEmailError::Address(_)));
    }
}
