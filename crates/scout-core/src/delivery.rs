//! Delivery boundary: retry, backoff, and rate-limit handling around a
//! [`Notifier`].
//!
//! `deliver` never lets an error escape; after exhausting retries it
//! reports failure and the pipeline records the listing as accepted
//! but unsent.

use std::time::Duration;

use crate::config::DeliveryConfig;
use crate::error::AppError;
use crate::models::Listing;
use crate::traits::Notifier;

/// How delivery side effects are performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Real sends through the notification channel.
    Live,
    /// Simulated success: no network effect, state advances as if sent.
    DryRun,
    /// Channel not configured: warn and report failure.
    Disabled,
}

/// Upper bound on consecutive rate-limit waits for a single listing.
/// Rate-limit waits don't consume retry attempts, so a channel that
/// rate-limits every attempt would otherwise loop forever.
const MAX_RATE_LIMIT_WAITS: u32 = 10;

/// Retry wrapper around the notification channel.
pub struct DeliveryService<N: Notifier> {
    notifier: N,
    mode: DeliveryMode,
    max_retries: u32,
    backoff_unit: Duration,
    send_delay: Duration,
    truncate: usize,
}

impl<N: Notifier> DeliveryService<N> {
    pub fn new(notifier: N, config: &DeliveryConfig, mode: DeliveryMode) -> Self {
        Self {
            notifier,
            mode,
            max_retries: config.max_retries,
            backoff_unit: Duration::from_millis(config.backoff_ms),
            send_delay: Duration::from_millis(config.delay_ms),
            truncate: config.truncate_description,
        }
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Attempt to deliver one listing. Returns whether it was sent
    /// (or, in dry-run mode, would have been sent).
    pub async fn deliver(&self, listing: &Listing) -> bool {
        match self.mode {
            DeliveryMode::Disabled => {
                tracing::warn!(
                    identity = %listing.identity,
                    "Delivery channel not configured, skipping send"
                );
                return false;
            }
            DeliveryMode::DryRun => {
                tracing::info!(
                    identity = %listing.identity,
                    title = %listing.title,
                    "[dry-run] Would send notification"
                );
                return true;
            }
            DeliveryMode::Live => {}
        }

        let message = render_message(listing, self.truncate);
        let mut attempt = 0u32;
        let mut rate_limit_waits = 0u32;

        while attempt < self.max_retries {
            match self.notifier.send(&message).await {
                Ok(()) => {
                    // Pause after every successful send to stay under
                    // the channel's sustained rate limit.
                    if !self.send_delay.is_zero() {
                        tokio::time::sleep(self.send_delay).await;
                    }
                    return true;
                }
                Err(AppError::RateLimited { retry_after }) => {
                    rate_limit_waits += 1;
                    if rate_limit_waits > MAX_RATE_LIMIT_WAITS {
                        tracing::warn!(
                            identity = %listing.identity,
                            waits = rate_limit_waits,
                            "Channel keeps rate-limiting, giving up"
                        );
                        return false;
                    }
                    tracing::info!(
                        identity = %listing.identity,
                        cooldown_ms = retry_after.as_millis() as u64,
                        "Rate limited, honoring channel cooldown"
                    );
                    tokio::time::sleep(retry_after).await;
                    // Not counted against max_retries.
                }
                Err(e) => {
                    attempt += 1;
                    tracing::warn!(
                        identity = %listing.identity,
                        error = %e,
                        attempt,
                        max_retries = self.max_retries,
                        "Delivery attempt failed"
                    );
                    if attempt < self.max_retries {
                        let backoff = self.backoff_unit * 2u32.pow(attempt - 1);
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        false
    }
}

/// Render the message payload for the notification channel.
///
/// Telegram-flavored HTML: field values are escaped, the description is
/// truncated at `truncate` characters.
pub fn render_message(listing: &Listing, truncate: usize) -> String {
    let description: String = listing.description.chars().take(truncate).collect();
    let ellipsis = if listing.description.chars().count() > truncate {
        "..."
    } else {
        ""
    };

    format!(
        "<b>{}</b>\n\n{}\n{}\n{}\n\n{}{}",
        escape_html(&listing.title),
        escape_html(&listing.organization),
        escape_html(&listing.compensation),
        escape_html(&listing.url),
        escape_html(&description),
        ellipsis,
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
