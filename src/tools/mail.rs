//! Email dispatch over SMTP.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::{json, Map, Value};

use crate::config::SmtpConfig;

use super::{string_arg, Mailer, Tool, ToolError, ToolOutput};

pub const DEFAULT_SUBJECT: &str = "AgentFlow Local Report";

/// Normalize a recipient argument: a single string becomes a one-element
/// list; non-string entries and blanks are dropped.
pub fn recipients_from_value(value: &Value) -> Vec<String> {
    let candidates: Vec<&str> = match value {
        Value::String(one) => vec![one.as_str()],
        Value::Array(many) => many.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    candidates
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Send an email on the agent's behalf.
pub struct SendEmail {
    mail: Arc<dyn Mailer>,
}

impl SendEmail {
    pub fn new(mail: Arc<dyn Mailer>) -> Self {
        Self { mail }
    }
}

#[async_trait]
impl Tool for SendEmail {
    fn name(&self) -> &str {
        "send_email"
    }

    fn description(&self) -> &str {
        "Send an email with the given subject and body to one or more recipients."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "to": {
                    "type": "array",
                    "items": {"type": "string", "format": "email"},
                    "description": "List of recipient email addresses."
                },
                "subject": {
                    "type": "string",
                    "description": "Subject line of the email."
                },
                "body": {
                    "type": "string",
                    "description": "Plain-text email body."
                }
            },
            "required": ["to", "subject", "body"]
        })
    }

    async fn execute(
        &self,
        args: &Map<String, Value>,
        _model_hint: Option<&str>,
    ) -> Result<ToolOutput, ToolError> {
        let to = args.get("to").map(recipients_from_value).unwrap_or_default();
        if to.is_empty() {
            return Err(ToolError::invalid("'to' (recipient list) is required."));
        }
        let subject = string_arg(args, &["subject"]).unwrap_or(DEFAULT_SUBJECT);
        let body = args.get("body").and_then(Value::as_str).unwrap_or("");

        self.mail.send(&to, subject, body).await?;

        Ok(ToolOutput::text(format!(
            "SUCCESS: email dispatched to {}.",
            to.join(", ")
        )))
    }
}

/// STARTTLS relay with login credentials from configuration.
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, to: &[String], subject: &str, body: &str) -> anyhow::Result<Message> {
        let from = self
            .config
            .from_addr
            .as_deref()
            .or(self.config.user.as_deref())
            .unwrap_or_default();
        let from: Mailbox = from
            .parse()
            .with_context(|| format!("invalid sender address '{}'", from))?;

        let mut builder = Message::builder()
            .from(from)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN);
        for recipient in to {
            let mailbox: Mailbox = recipient
                .parse()
                .with_context(|| format!("invalid recipient address '{}'", recipient))?;
            builder = builder.to(mailbox);
        }

        Ok(builder.body(body.to_string())?)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &[String], subject: &str, body: &str) -> anyhow::Result<()> {
        let (Some(host), Some(user), Some(password)) = (
            self.config.host.as_deref(),
            self.config.user.as_deref(),
            self.config.password.as_deref(),
        ) else {
            tracing::warn!("SMTP send attempted without complete configuration");
            anyhow::bail!(
                "SMTP configuration is incomplete. Please set AGENTFLOW_SMTP_* env vars."
            );
        };

        let message = self.build_message(to, subject, body)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
            .port(self.config.port)
            .credentials(Credentials::new(user.to_string(), password.to_string()))
            .build();

        transport.send(message).await?;
        tracing::info!(recipients = to.len(), "Email dispatched");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubCapabilities;

    #[test]
    fn test_recipients_normalization() {
        assert_eq!(recipients_from_value(&json!("a@x.io")), vec!["a@x.io"]);
        assert_eq!(
            recipients_from_value(&json!(["a@x.io", " ", 3, "b@x.io "])),
            vec!["a@x.io", "b@x.io"]
        );
        assert!(recipients_from_value(&json!("")).is_empty());
        assert!(recipients_from_value(&json!({"to": "a@x.io"})).is_empty());
    }

    #[tokio::test]
    async fn test_single_recipient_is_coerced() {
        let stubs = StubCapabilities::default();
        let tool = SendEmail::new(stubs.capabilities().mail);
        let args: Map<String, Value> =
            serde_json::from_value(json!({"to": "ops@x.io", "body": "hi"})).unwrap();

        let output = tool.execute(&args, None).await.unwrap();

        assert_eq!(output.observation, "SUCCESS: email dispatched to ops@x.io.");
        assert_eq!(
            stubs.sent_mail(),
            vec![(
                vec!["ops@x.io".to_string()],
                DEFAULT_SUBJECT.to_string(),
                "hi".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_incomplete_smtp_config_fails() {
        let mailer = SmtpMailer::new(SmtpConfig::default());
        let err = mailer
            .send(&["a@x.io".to_string()], "s", "b")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SMTP configuration is incomplete"));
    }

    #[test]
    fn test_build_message_rejects_bad_recipient() {
        let mailer = SmtpMailer::new(SmtpConfig {
            host: Some("smtp.x.io".to_string()),
            user: Some("bot@x.io".to_string()),
            password: Some("pw".to_string()),
            ..SmtpConfig::default()
        });
        assert!(mailer
            .build_message(&["a@x.io".to_string(), "b@x.io".to_string()], "s", "b")
            .is_ok());
        assert!(mailer
            .build_message(&["not an address".to_string()], "s", "b")
            .is_err());
    }
}
