use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{MailConfig, SmtpConfig};
use crate::fetcher::NewsItem;

const SUMMARY_LIMIT: usize = 300;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("message build failed: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp send failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("mock sink write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Delivery of one rendered digest to one recipient.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, html_body: &str)
        -> Result<(), SendError>;
}

/// Real SMTP delivery with STARTTLS.
pub struct SmtpMailer {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, SendError> {
        let from: Mailbox = config.address.parse()?;
        let creds = Credentials::new(config.address.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)?
            .port(config.port)
            .credentials(creds)
            .build();
        Ok(Self { from, transport })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), SendError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(recipient.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())?;

        self.transport.send(email).await?;
        Ok(())
    }
}

/// Mock delivery: the rendered body goes to a file, no network call occurs.
pub struct MockMailer {
    path: PathBuf,
}

impl MockMailer {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl MailTransport for MockMailer {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), SendError> {
        info!(
            "[MOCK EMAIL MODE] Would send '{}' to {}, content written to {}",
            subject,
            recipient,
            self.path.display()
        );
        tokio::fs::write(&self.path, html_body).await?;
        Ok(())
    }
}

/// Why a dispatch completed without attempting any sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoItems,
    NoRecipients,
    CredentialsUnconfigured,
}

/// Outcome of one dispatch call. Partial success is a valid terminal state;
/// nothing here is rolled back.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub skipped: Option<SkipReason>,
    pub sent: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl DispatchReport {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Default::default()
        }
    }
}

pub struct DigestDispatcher {
    transport: Option<Arc<dyn MailTransport>>,
}

impl DigestDispatcher {
    pub fn new(transport: Arc<dyn MailTransport>) -> Self {
        Self {
            transport: Some(transport),
        }
    }

    /// Dispatcher with no transport; every dispatch is a logged no-op.
    pub fn unconfigured() -> Self {
        Self { transport: None }
    }

    pub fn from_mail_config(config: &MailConfig) -> Result<Self, SendError> {
        match config {
            MailConfig::Smtp(smtp) => Ok(Self::new(Arc::new(SmtpMailer::new(smtp)?))),
            MailConfig::Mock { path } => Ok(Self::new(Arc::new(MockMailer::new(path.clone())))),
            MailConfig::Unconfigured => Ok(Self::unconfigured()),
        }
    }

    /// Render one digest body and send it to each recipient individually.
    ///
    /// A failed send is recorded and the loop continues; the call completes
    /// after every recipient has been attempted.
    pub async fn dispatch(&self, items: &[NewsItem], recipients: &[String]) -> DispatchReport {
        if items.is_empty() {
            info!("No news to send");
            return DispatchReport::skipped(SkipReason::NoItems);
        }
        if recipients.is_empty() {
            info!("No subscribers to send to");
            return DispatchReport::skipped(SkipReason::NoRecipients);
        }
        let Some(transport) = &self.transport else {
            warn!("Email credentials not set, skipping digest send");
            return DispatchReport::skipped(SkipReason::CredentialsUnconfigured);
        };

        let subject = render_subject(items.len());
        let body = render_digest(items);
        info!("Sending digest to {} recipients", recipients.len());

        let mut report = DispatchReport::default();
        for recipient in recipients {
            match transport.send(recipient, &subject, &body).await {
                Ok(()) => {
                    info!("Sent digest to {}", recipient);
                    report.sent.push(recipient.clone());
                }
                Err(e) => {
                    error!("Failed to send to {}: {}", recipient, e);
                    report.failed.push((recipient.clone(), e.to_string()));
                }
            }
        }
        report
    }
}

pub fn render_subject(count: usize) -> String {
    format!("Daily AI News Digest - {} Updates", count)
}

/// One HTML body shared across all recipients of a dispatch.
pub fn render_digest(items: &[NewsItem]) -> String {
    let mut html = String::from(
        r#"<html>
<body style="font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; background-color: #f4f4f9; padding: 20px;">
    <div style="max-width: 600px; margin: 0 auto; background: #ffffff; padding: 30px; border-radius: 10px; box-shadow: 0 0 10px rgba(0,0,0,0.1);">
        <h2 style="color: #333; border-bottom: 2px solid #5a67d8; padding-bottom: 10px;">AI News Updates</h2>
        <ul style="padding-left: 0; list-style: none;">
"#,
    );

    for item in items {
        html.push_str(&format!(
            r#"        <li style="margin-bottom: 25px; border-bottom: 1px solid #eee; padding-bottom: 15px;">
            <strong style="font-size: 1.1em;"><a href="{link}" style="color: #5a67d8; text-decoration: none;">{title}</a></strong><br/>
            <span style="color: #888; font-size: 0.85em; display: block; margin-top: 5px;">{source} &bull; {published}</span>
            <p style="color: #555; line-height: 1.6; margin-top: 10px;">{summary}</p>
        </li>
"#,
            link = item.link,
            title = item.title,
            source = item.source,
            published = published_label(item),
            summary = truncate_summary(&item.summary),
        ));
    }

    html.push_str(
        r#"        </ul>
        <p style="font-size: 0.8em; color: #aaa; text-align: center; margin-top: 30px;">Automated by AI News Bot</p>
    </div>
</body>
</html>
"#,
    );
    html
}

fn published_label(item: &NewsItem) -> String {
    item.published_at
        .map(|dt| dt.format("%a, %d %b %Y %H:%M UTC").to_string())
        .unwrap_or_else(|| "Unknown date".to_string())
}

fn truncate_summary(summary: &str) -> String {
    let truncated: String = summary.chars().take(SUMMARY_LIMIT).collect();
    format!("{}...", truncated)
}
