//! Outbound transactional email
//!
//! Services hand a template, a recipient and string substitutions to an
//! [`EmailSender`]. Three senders ship with the crate:
//!
//! - [`HttpEmailSender`]: renders the message and POSTs it as JSON to a relay
//! - [`LogEmailSender`]: renders the message and writes it to the log; for local runs
//! - [`MemoryOutbox`]: keeps every message in memory; for tests
//!
//! Delivery failures propagate to the caller. There are no retries.

use askama::Template;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Substitution key for a one-time code
pub const CODE_KEY: &str = "code";

/// Substitution key for the decrypted account title
pub const ACCOUNT_TITLE_KEY: &str = "account_title";

/// Substitution key for the display name of the inviting user
pub const INVITER_NAME_KEY: &str = "inviter_name";

pub type Substitutions = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Missing substitution '{0}'")]
    MissingSubstitution(&'static str),

    #[error("Email template failed to render: {0}")]
    Render(#[from] askama::Error),

    #[error("Email delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailTemplate {
    LoginCode,
    SignupCode,
    AddedToAccount,
    AccountInvitation,
}

/// A template rendered for one recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

impl EmailTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailTemplate::LoginCode => "login_code",
            EmailTemplate::SignupCode => "signup_code",
            EmailTemplate::AddedToAccount => "added_to_account",
            EmailTemplate::AccountInvitation => "account_invitation",
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            EmailTemplate::LoginCode => "Login Code",
            EmailTemplate::SignupCode => "Signup Verification Code",
            EmailTemplate::AddedToAccount => "You've been added to an account",
            EmailTemplate::AccountInvitation => "You're invited to join an account",
        }
    }

    /// Renders the HTML body; substituted values are HTML-escaped
    pub fn render(&self, substitutions: &Substitutions) -> Result<RenderedEmail, EmailError> {
        let get = |key: &'static str| {
            substitutions
                .get(key)
                .map(String::as_str)
                .ok_or(EmailError::MissingSubstitution(key))
        };

        let html = match self {
            EmailTemplate::LoginCode => LoginCodeEmail { code: get(CODE_KEY)? }.render()?,
            EmailTemplate::SignupCode => SignupCodeEmail { code: get(CODE_KEY)? }.render()?,
            EmailTemplate::AddedToAccount => AddedToAccountEmail {
                account_title: get(ACCOUNT_TITLE_KEY)?,
                inviter_name: get(INVITER_NAME_KEY)?,
            }
            .render()?,
            EmailTemplate::AccountInvitation => AccountInvitationEmail {
                account_title: get(ACCOUNT_TITLE_KEY)?,
                inviter_name: get(INVITER_NAME_KEY)?,
            }
            .render()?,
        };

        Ok(RenderedEmail {
            subject: self.subject().to_string(),
            html,
        })
    }
}

#[derive(Template)]
#[template(path = "email/login_code.html")]
struct LoginCodeEmail<'a> {
    code: &'a str,
}

#[derive(Template)]
#[template(path = "email/signup_code.html")]
struct SignupCodeEmail<'a> {
    code: &'a str,
}

#[derive(Template)]
#[template(path = "email/added_to_account.html")]
struct AddedToAccountEmail<'a> {
    account_title: &'a str,
    inviter_name: &'a str,
}

#[derive(Template)]
#[template(path = "email/account_invitation.html")]
struct AccountInvitationEmail<'a> {
    account_title: &'a str,
    inviter_name: &'a str,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(
        &self,
        template: EmailTemplate,
        recipient: &str,
        substitutions: Substitutions,
    ) -> Result<(), EmailError>;
}

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    template: EmailTemplate,
    subject: &'a str,
    html: &'a str,
}

/// Delivers email through an HTTP relay
#[derive(Debug, Clone)]
pub struct HttpEmailSender {
    client: reqwest::Client,
    relay_url: String,
    from: String,
}

impl HttpEmailSender {
    pub fn new(relay_url: impl Into<String>, from: impl Into<String>) -> Result<Self, EmailError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| EmailError::Delivery(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            relay_url: relay_url.into(),
            from: from.into(),
        })
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(
        &self,
        template: EmailTemplate,
        recipient: &str,
        substitutions: Substitutions,
    ) -> Result<(), EmailError> {
        let rendered = template.render(&substitutions)?;
        let message = RelayMessage {
            from: &self.from,
            to: recipient,
            template,
            subject: &rendered.subject,
            html: &rendered.html,
        };

        let response = self
            .client
            .post(&self.relay_url)
            .json(&message)
            .send()
            .await
            .map_err(|e| EmailError::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EmailError::Delivery(format!(
                "Relay responded with status {}",
                response.status()
            )));
        }

        debug!(template = template.as_str(), "Email handed to relay");
        Ok(())
    }
}

/// Writes rendered email to the log instead of delivering it
///
/// Intended for local development only: the log line includes the body, and so
/// any one-time code.
#[derive(Debug, Clone, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(
        &self,
        template: EmailTemplate,
        recipient: &str,
        substitutions: Substitutions,
    ) -> Result<(), EmailError> {
        let rendered = template.render(&substitutions)?;
        info!(
            template = template.as_str(),
            recipient,
            subject = %rendered.subject,
            body = %rendered.html,
            "Email not delivered (log sender)"
        );
        Ok(())
    }
}

/// A message captured by [`MemoryOutbox`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub template: EmailTemplate,
    pub recipient: String,
    pub substitutions: Substitutions,
}

/// Keeps every sent message in memory
///
/// Cloning yields another handle to the same outbox.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutbox {
    sent: Arc<Mutex<Vec<SentEmail>>>,
    fail: Arc<AtomicBool>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent send fail until switched off again
    pub fn fail_deliveries(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().await.clone()
    }

    /// Most recent message to `recipient`
    pub async fn last_to(&self, recipient: &str) -> Option<SentEmail> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find(|email| email.recipient == recipient)
            .cloned()
    }

    /// Code from the most recent code-bearing message to `recipient`
    pub async fn last_code_for(&self, recipient: &str) -> Option<i32> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .filter(|email| email.recipient == recipient)
            .find_map(|email| email.substitutions.get(CODE_KEY))
            .and_then(|code| code.parse().ok())
    }
}

#[async_trait]
impl EmailSender for MemoryOutbox {
    async fn send(
        &self,
        template: EmailTemplate,
        recipient: &str,
        substitutions: Substitutions,
    ) -> Result<(), EmailError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmailError::Delivery("outbox rejected message".to_string()));
        }
        template.render(&substitutions)?;
        self.sent.lock().await.push(SentEmail {
            template,
            recipient: recipient.to_string(),
            substitutions,
        });
        Ok(())
    }
}
