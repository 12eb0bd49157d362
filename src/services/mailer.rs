//! Delivery seam for raw verification tokens.
//!
//! The auth service hands the raw token over exactly once, after the
//! issuing transaction committed. Actual transport (SMTP, queues) is
//! out of scope; the shipped implementation logs the link.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

#[async_trait]
pub trait VerificationMailer: Send + Sync {
    async fn deliver(&self, recipient: &str, raw_token: &str) -> Result<()>;
}

/// Logs the verification link instead of sending mail.
pub struct LinkLogMailer {
    app_url: String,
}

impl LinkLogMailer {
    #[must_use]
    pub fn new(app_url: &str) -> Self {
        Self {
            app_url: app_url.trim_end_matches('/').to_string(),
        }
    }

    fn verification_link(&self, raw_token: &str) -> String {
        format!("{}/auth/verify_email?token={raw_token}", self.app_url)
    }
}

#[async_trait]
impl VerificationMailer for LinkLogMailer {
    async fn deliver(&self, recipient: &str, raw_token: &str) -> Result<()> {
        info!(
            recipient,
            link = %self.verification_link(raw_token),
            "Verification link issued"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_embeds_token_once() {
        let mailer = LinkLogMailer::new("http://localhost:8000/");
        let link = mailer.verification_link("deadbeef");

        assert_eq!(
            link,
            "http://localhost:8000/auth/verify_email?token=deadbeef"
        );
    }
}
