use serde::Serialize;
use tokio::sync::mpsc;

use crate::{config::EmailConfig, models::OtpPurpose};

const BREVO_SEND_URL: &str = "https://api.brevo.com/v3/smtp/email";

#[derive(Debug)]
pub enum OutboundEmail {
    Otp {
        to: String,
        code: i32,
        purpose: OtpPurpose,
    },
    Welcome {
        to: String,
        name: String,
    },
}

impl OutboundEmail {
    fn recipient(&self) -> &str {
        match self {
            Self::Otp { to, .. } => to,
            Self::Welcome { to, .. } => to,
        }
    }

    fn subject(&self) -> String {
        match self {
            Self::Otp {
                purpose: OtpPurpose::Signup,
                ..
            } => "Verify your email address".to_string(),
            Self::Otp {
                purpose: OtpPurpose::PasswordReset,
                ..
            } => "Your password reset code".to_string(),
            Self::Welcome { .. } => "Welcome aboard!".to_string(),
        }
    }

    fn text_body(&self) -> String {
        match self {
            Self::Otp { code, purpose, .. } => {
                let action = match purpose {
                    OtpPurpose::Signup => "verify your email address",
                    OtpPurpose::PasswordReset => "reset your password",
                };
                format!(
                    "Your one-time code to {action} is {code}. It expires in a few minutes. \
                     If you did not request this, you can ignore this email."
                )
            }
            Self::Welcome { name, .. } => {
                format!("Hi {name}, your account is verified and ready to use.")
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoSendBody {
    sender: BrevoAddress,
    to: Vec<BrevoAddress>,
    subject: String,
    text_content: String,
}

/// Handle for submitting outbound mail. Submission never fails the caller:
/// queue or delivery errors are logged by the worker and dropped.
#[derive(Clone)]
pub struct EmailDispatcher {
    tx: mpsc::UnboundedSender<OutboundEmail>,
}

impl EmailDispatcher {
    /// Spawns the delivery worker and returns the submit handle.
    pub fn start(config: EmailConfig, http: reqwest::Client) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(deliver_loop(rx, config, http));
        Self { tx }
    }

    pub fn enqueue(&self, email: OutboundEmail) {
        if let Err(e) = self.tx.send(email) {
            tracing::error!("Email queue closed, dropping message: {}", e);
        }
    }
}

async fn deliver_loop(
    mut rx: mpsc::UnboundedReceiver<OutboundEmail>,
    config: EmailConfig,
    http: reqwest::Client,
) {
    while let Some(email) = rx.recv().await {
        if let Err(e) = deliver(&email, &config, &http).await {
            tracing::error!("Failed to send email to {}: {}", email.recipient(), e);
        }
    }
}

async fn deliver(
    email: &OutboundEmail,
    config: &EmailConfig,
    http: &reqwest::Client,
) -> anyhow::Result<()> {
    let Some(api_key) = &config.api_key else {
        // No provider configured; log instead of sending
        tracing::info!(
            "Email to {}: {} / {}",
            email.recipient(),
            email.subject(),
            email.text_body()
        );
        return Ok(());
    };

    let body = BrevoSendBody {
        sender: BrevoAddress {
            email: config.sender_email.clone(),
            name: Some(config.sender_name.clone()),
        },
        to: vec![BrevoAddress {
            email: email.recipient().to_string(),
            name: None,
        }],
        subject: email.subject(),
        text_content: email.text_body(),
    };

    let resp = http
        .post(BREVO_SEND_URL)
        .header("api-key", api_key)
        .header("Accept", "application/json")
        .json(&body)
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let detail = resp.text().await.unwrap_or_default();
        anyhow::bail!("delivery failed (status={status}): {detail}");
    }

    tracing::info!("Email sent to {}: {}", email.recipient(), email.subject());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_email_carries_code() {
        let email = OutboundEmail::Otp {
            to: "a@x.com".to_string(),
            code: 123456,
            purpose: OtpPurpose::Signup,
        };
        assert!(email.text_body().contains("123456"));
        assert_eq!(email.recipient(), "a@x.com");
    }

    #[test]
    fn test_reset_and_signup_subjects_differ() {
        let signup = OutboundEmail::Otp {
            to: "a@x.com".to_string(),
            code: 1,
            purpose: OtpPurpose::Signup,
        };
        let reset = OutboundEmail::Otp {
            to: "a@x.com".to_string(),
            code: 1,
            purpose: OtpPurpose::PasswordReset,
        };
        assert_ne!(signup.subject(), reset.subject());
    }

    #[tokio::test]
    async fn test_enqueue_after_worker_gone_does_not_panic() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let dispatcher = EmailDispatcher { tx };
        dispatcher.enqueue(OutboundEmail::Welcome {
            to: "a@x.com".to_string(),
            name: "Alice".to_string(),
        });
    }
}
