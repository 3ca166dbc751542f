//! Hands in-call submissions to the outside world.
//!
//! Leads go to the configured webhook, bookings to the calendar API. Each
//! call is made once with a bounded timeout and its outcome becomes one
//! spoken line. Nothing is retried or queued: a failed submission is lost.

use crate::booking::{BookingClient, ViewingRequest};
use crate::config::Config;
use concierge_types::LeadSubmission;
use concierge_voice::ToolCall;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

pub const LEAD_THANKS: &str = "Thank you. Your information has been sent. \
Was there anything else I can help you with today?";
pub const LEAD_ERROR: &str = "I'm sorry, there was an error sending your information.";
pub const LEAD_NOT_CONFIGURED: &str =
    "I'm sorry, there is a configuration error and I can't save your information.";

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no webhook URL configured")]
    NotConfigured,
    #[error("malformed lead payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("webhook answered {0}")]
    Status(u16),
}

impl DispatchError {
    /// The line the caller hears for this failure.
    pub fn spoken(&self) -> &'static str {
        match self {
            Self::NotConfigured => LEAD_NOT_CONFIGURED,
            _ => LEAD_ERROR,
        }
    }
}

/// Sends leads and bookings on behalf of one call.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    http: reqwest::Client,
    webhook_url: Option<String>,
    webhook_timeout: Duration,
    default_business: Option<String>,
    calendar: BookingClient,
}

impl Dispatcher {
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            calendar: BookingClient::new(http.clone(), &config.calendar_api),
            http,
            webhook_url: config.webhook.url.clone(),
            webhook_timeout: Duration::from_secs(config.webhook.timeout_seconds),
            default_business: config.business.id.clone(),
        }
    }

    /// Posts a lead form payload to the webhook.
    ///
    /// Any 2xx answer counts as delivered.
    pub async fn submit_lead(&self, payload: &str) -> Result<(), DispatchError> {
        let url = self.webhook_url.as_deref().ok_or(DispatchError::NotConfigured)?;

        let lead: LeadSubmission = serde_json::from_str(payload)?;
        let lead = lead.with_default_business(self.default_business.as_deref());
        if !lead.is_actionable() {
            warn!(
                business_id = ?lead.business_id,
                "lead has no way to reach the visitor, forwarding anyway"
            );
        }

        let response = self
            .http
            .post(url)
            .timeout(self.webhook_timeout)
            .json(&lead)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            info!(status = status.as_u16(), "lead delivered to webhook");
            Ok(())
        } else {
            Err(DispatchError::Status(status.as_u16()))
        }
    }

    /// Submits a lead and returns what to tell the caller.
    pub async fn lead_reply(&self, payload: &str) -> &'static str {
        match self.submit_lead(payload).await {
            Ok(()) => LEAD_THANKS,
            Err(e) => {
                error!(error = %e, "lead submission failed");
                e.spoken()
            }
        }
    }

    /// Runs a calendar tool call and returns what to tell the caller.
    ///
    /// Returns `None` for calls that are not bookings.
    pub async fn booking_reply(&self, call: &ToolCall) -> Option<String> {
        let line = match call {
            ToolCall::CheckAvailability { date, duration } => {
                self.calendar.check_availability(date, *duration).await
            }
            ToolCall::BookViewing {
                guest_name,
                guest_phone,
                date,
                time,
                guest_email,
                notes,
            } => {
                let viewing = ViewingRequest {
                    guest_name: guest_name.clone(),
                    guest_phone: guest_phone.clone(),
                    guest_email: guest_email.clone(),
                    date: date.clone(),
                    time: time.clone(),
                    notes: notes.clone(),
                };
                self.calendar.book_viewing(&viewing).await
            }
            ToolCall::AvailableDates => self.calendar.available_dates().await,
            ToolCall::ShowLeadForm => return None,
        };
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher(webhook: Option<&str>) -> Dispatcher {
        let mut config = Config::default();
        config.webhook.url = webhook.map(str::to_string);
        Dispatcher::new(reqwest::Client::new(), &config)
    }

    #[tokio::test]
    async fn missing_webhook_is_a_configuration_error() {
        let err = dispatcher(None).submit_lead("{}").await.unwrap_err();
        assert!(matches!(err, DispatchError::NotConfigured));
        assert_eq!(err.spoken(), LEAD_NOT_CONFIGURED);
    }

    #[tokio::test]
    async fn malformed_payload_gets_generic_apology() {
        let reply = dispatcher(Some("http://127.0.0.1:9/lead"))
            .lead_reply("not json")
            .await;
        assert_eq!(reply, LEAD_ERROR);
    }

    #[tokio::test]
    async fn show_form_is_not_a_booking() {
        assert!(dispatcher(None)
            .booking_reply(&ToolCall::ShowLeadForm)
            .await
            .is_none());
    }
}
