//! Outbound notifier: email (REST provider) + webhook channels.
//!
//! Both channels are attempted independently; each reports its own
//! success flag and failures never propagate.

pub mod format;

use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info, warn};

use crate::adapter::outbound::http;
use crate::application::config::ConfigResolver;
use crate::port::outbound::notifier::{
    ChannelResults, DigestReport, Notifier, RecommendationAlert, ResolutionAlert, ScanStats,
    TradeAlert,
};

/// Email provider endpoint (Resend-compatible REST API).
const EMAIL_API_URL: &str = "https://api.resend.com/emails";

/// Channel configuration resolved from merged runtime config before
/// each send, so config writes take effect immediately.
#[derive(Debug, Clone, Default)]
pub struct NotifierSettings {
    pub enabled: bool,
    /// Recipient address; email channel is off when empty.
    pub email_to: String,
    /// Provider API key; email channel is off when empty.
    pub email_api_key: String,
    /// Sender identity.
    pub email_from: String,
    /// Webhook URL; webhook channel is off when empty.
    pub webhook_url: String,
    /// Minimum EV for a recommendation to be alerted.
    pub min_ev: f64,
}

/// Notifier sending to the configured email + webhook channels.
pub struct OutboundNotifier {
    http: reqwest::Client,
    settings: NotifierSettings,
}

impl OutboundNotifier {
    #[must_use]
    pub fn new(settings: NotifierSettings) -> Self {
        Self {
            http: http::client(),
            settings,
        }
    }

    fn email_enabled(&self) -> bool {
        !self.settings.email_to.is_empty() && !self.settings.email_api_key.is_empty()
    }

    fn webhook_enabled(&self) -> bool {
        !self.settings.webhook_url.is_empty()
    }

    async fn send_email(&self, subject: &str, text: &str, html: &str) -> bool {
        let from = if self.settings.email_from.is_empty() {
            "augur <alerts@augur.local>"
        } else {
            &self.settings.email_from
        };
        let body = json!({
            "from": from,
            "to": [self.settings.email_to],
            "subject": subject,
            "text": text,
            "html": html,
        });
        let result = http::send_with_retry(|| {
            Ok(self
                .http
                .post(EMAIL_API_URL)
                .header(
                    "Authorization",
                    format!("Bearer {}", self.settings.email_api_key),
                )
                .json(&body))
        })
        .await;

        match result {
            Ok(_) => {
                info!(to = %self.settings.email_to, "email sent");
                true
            }
            Err(e) => {
                error!(error = %e, "email send failed");
                false
            }
        }
    }

    async fn send_webhook(&self, text: &str) -> bool {
        let body = json!({ "text": text });
        let result = http::send_with_retry(|| {
            Ok(self.http.post(&self.settings.webhook_url).json(&body))
        })
        .await;
        match result {
            Ok(_) => {
                info!("webhook sent");
                true
            }
            Err(e) => {
                error!(error = %e, "webhook send failed");
                false
            }
        }
    }

    /// Fan a message out to every enabled channel.
    async fn broadcast(
        &self,
        subject: &str,
        text: &str,
        html: Option<&str>,
        webhook_text: &str,
    ) -> ChannelResults {
        let mut results = ChannelResults::new();
        if self.email_enabled() {
            let html = html.map(ToString::to_string).unwrap_or_else(|| {
                format!("<pre style=\"font-family:monospace\">{text}</pre>")
            });
            results.insert(
                "email".to_string(),
                self.send_email(subject, text, &html).await,
            );
        }
        if self.webhook_enabled() {
            results.insert("webhook".to_string(), self.send_webhook(webhook_text).await);
        }
        if results.is_empty() {
            warn!("no notification channels configured");
        }
        results
    }
}

#[async_trait]
impl Notifier for OutboundNotifier {
    async fn scan_results(
        &self,
        recommendations: &[RecommendationAlert],
        stats: ScanStats,
    ) -> ChannelResults {
        if !self.settings.enabled {
            return ChannelResults::new();
        }
        let filtered: Vec<RecommendationAlert> = recommendations
            .iter()
            .filter(|r| r.ev >= self.settings.min_ev)
            .cloned()
            .collect();
        if filtered.is_empty() {
            info!(
                min_ev = self.settings.min_ev,
                "no recommendations above notification threshold"
            );
            return ChannelResults::new();
        }

        let (subject, text, html) = format::scan_email(&filtered, stats);
        let webhook_text = format::scan_webhook_text(&filtered, stats);
        self.broadcast(&subject, &text, Some(&html), &webhook_text)
            .await
    }

    async fn sweep_trades(&self, trades: &[TradeAlert]) -> ChannelResults {
        if !self.settings.enabled || trades.is_empty() {
            return ChannelResults::new();
        }
        let text = format::sweep_text(trades);
        self.broadcast("augur: sweep orders placed", &text, None, &text)
            .await
    }

    async fn resolutions(&self, resolved: &[ResolutionAlert]) -> ChannelResults {
        if !self.settings.enabled || resolved.is_empty() {
            return ChannelResults::new();
        }
        let text = format::resolutions_text(resolved);
        self.broadcast("augur: markets resolved", &text, None, &text)
            .await
    }

    async fn job_failure(&self, job: &str, error: &str) -> ChannelResults {
        if !self.settings.enabled {
            return ChannelResults::new();
        }
        let text = format::failure_text(job, error);
        self.broadcast(&format!("augur: job {job} failed"), &text, None, &text)
            .await
    }

    async fn daily_digest(&self, digest: &DigestReport) -> ChannelResults {
        if !self.settings.enabled {
            return ChannelResults::new();
        }
        let text = format::digest_text(digest);
        self.broadcast("augur: daily digest", &text, None, &text)
            .await
    }
}

/// Notifier that re-reads the merged runtime config before every send,
/// so channel toggles and addresses written to the config table take
/// effect without a restart.
pub struct ReloadingNotifier {
    config: ConfigResolver,
    email_api_key: String,
    email_from: String,
}

impl ReloadingNotifier {
    #[must_use]
    pub fn new(
        config: ConfigResolver,
        email_api_key: impl Into<String>,
        email_from: impl Into<String>,
    ) -> Self {
        Self {
            config,
            email_api_key: email_api_key.into(),
            email_from: email_from.into(),
        }
    }

    async fn current(&self) -> OutboundNotifier {
        let config = self.config.load().await;
        OutboundNotifier::new(NotifierSettings {
            enabled: config.notifications_enabled,
            email_to: config.notification_email,
            email_api_key: self.email_api_key.clone(),
            email_from: self.email_from.clone(),
            webhook_url: config.notification_webhook,
            min_ev: config.notification_min_ev,
        })
    }
}

#[async_trait]
impl Notifier for ReloadingNotifier {
    async fn scan_results(
        &self,
        recommendations: &[RecommendationAlert],
        stats: ScanStats,
    ) -> ChannelResults {
        self.current().await.scan_results(recommendations, stats).await
    }

    async fn sweep_trades(&self, trades: &[TradeAlert]) -> ChannelResults {
        self.current().await.sweep_trades(trades).await
    }

    async fn resolutions(&self, resolved: &[ResolutionAlert]) -> ChannelResults {
        self.current().await.resolutions(resolved).await
    }

    async fn job_failure(&self, job: &str, error: &str) -> ChannelResults {
        self.current().await.job_failure(job, error).await
    }

    async fn daily_digest(&self, digest: &DigestReport) -> ChannelResults {
        self.current().await.daily_digest(digest).await
    }
}
