//! Calendar collaborator client
//!
//! REST client for a Google-Calendar-style events API. Busy events are
//! listed page by page; booking events are created colour-coded by status
//! and recoloured as the booking progresses.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};
use tripoint_core::models::BookingStatus;
use tripoint_core::traits::{BusyEvent, CalendarEventDraft, CalendarGateway};
use tripoint_core::{AppError, AppResult};

/// Colour id for bookings holding or awaiting deposit
const COLOUR_BOOKED: &str = "5";
/// Colour id for completed visits with balance outstanding
const COLOUR_COMPLETED_UNPAID: &str = "11";
/// Colour id for fully paid visits
const COLOUR_PAID: &str = "10";

/// Map a booking status to the calendar colour id
fn colour_for_status(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::PendingDeposit | BookingStatus::DepositPaid => COLOUR_BOOKED,
        BookingStatus::CompletedUnpaid => COLOUR_COMPLETED_UNPAID,
        BookingStatus::CompletedPaid | BookingStatus::Cancelled => COLOUR_PAID,
    }
}

/// Google-Calendar-style gateway
pub struct GoogleCalendarClient {
    http: reqwest::Client,
    api_base: String,
    calendar_id: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct EventsPage {
    #[serde(default)]
    items: Vec<RawEvent>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    id: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    description: String,
    start: Option<RawEventTime>,
    end: Option<RawEventTime>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    transparency: String,
}

#[derive(Debug, Deserialize)]
struct RawEventTime {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
}

/// Parse an event boundary; all-day events resolve to midnight UTC
fn parse_event_time(raw: &RawEventTime) -> Option<DateTime<Utc>> {
    if let Some(dt) = &raw.date_time {
        return DateTime::parse_from_rfc3339(dt)
            .ok()
            .map(|t| t.with_timezone(&Utc));
    }
    if let Some(date) = &raw.date {
        return DateTime::parse_from_rfc3339(&format!("{}T00:00:00+00:00", date))
            .ok()
            .map(|t| t.with_timezone(&Utc));
    }
    None
}

impl GoogleCalendarClient {
    /// Create a calendar client
    pub fn new(api_base: &str, calendar_id: &str, access_token: &str) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            calendar_id: calendar_id.to_string(),
            access_token: access_token.to_string(),
        })
    }

    fn events_url(&self) -> String {
        format!("{}/calendars/{}/events", self.api_base, self.calendar_id)
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/{}", self.events_url(), event_id)
    }

    fn map_raw_event(raw: RawEvent) -> Option<BusyEvent> {
        let start = raw.start.as_ref().and_then(parse_event_time)?;
        let end = raw.end.as_ref().and_then(parse_event_time)?;
        Some(BusyEvent {
            id: raw.id,
            summary: raw.summary,
            notes: raw.description,
            start,
            end,
            status: raw.status,
            transparency: raw.transparency,
        })
    }
}

#[async_trait]
impl CalendarGateway for GoogleCalendarClient {
    #[instrument(skip(self))]
    async fn list_busy_events(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> AppResult<Vec<BusyEvent>> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, String)> = vec![
                ("timeMin", window_start.to_rfc3339()),
                ("timeMax", window_end.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let page: EventsPage = self
                .http
                .get(self.events_url())
                .bearer_auth(&self.access_token)
                .query(&query)
                .send()
                .await
                .map_err(|e| {
                    warn!("Calendar list failed: {}", e);
                    AppError::Upstream(format!("Calendar list failed: {}", e))
                })?
                .error_for_status()
                .map_err(|e| AppError::Upstream(format!("Calendar list failed: {}", e)))?
                .json()
                .await
                .map_err(|e| AppError::Upstream(format!("Calendar response parse failed: {}", e)))?;

            debug!("Fetched {} calendar events", page.items.len());
            events.extend(page.items.into_iter().filter_map(Self::map_raw_event));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(events)
    }

    #[instrument(skip(self, draft))]
    async fn create_event(&self, draft: &CalendarEventDraft) -> AppResult<String> {
        let body = json!({
            "summary": draft.summary,
            "description": draft.notes,
            "start": {"dateTime": draft.start.to_rfc3339()},
            "end": {"dateTime": draft.end.to_rfc3339()},
            "colorId": colour_for_status(draft.status),
        });

        let created: CreatedEvent = self
            .http
            .post(self.events_url())
            .bearer_auth(&self.access_token)
            .query(&[("sendUpdates", "all")])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("Calendar event creation failed: {}", e);
                AppError::Upstream(format!("Calendar event creation failed: {}", e))
            })?
            .error_for_status()
            .map_err(|e| AppError::Upstream(format!("Calendar event creation failed: {}", e)))?
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Calendar response parse failed: {}", e)))?;

        debug!("Created calendar event {}", created.id);
        Ok(created.id)
    }

    #[instrument(skip(self))]
    async fn update_event_colour(&self, event_id: &str, status: BookingStatus) -> AppResult<()> {
        let body = json!({"colorId": colour_for_status(status)});

        self.http
            .patch(self.event_url(event_id))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("Calendar recolour failed: {}", e);
                AppError::Upstream(format!("Calendar recolour failed: {}", e))
            })?
            .error_for_status()
            .map_err(|e| AppError::Upstream(format!("Calendar recolour failed: {}", e)))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_event(&self, event_id: &str) -> AppResult<()> {
        self.http
            .delete(self.event_url(event_id))
            .bearer_auth(&self.access_token)
            .query(&[("sendUpdates", "all")])
            .send()
            .await
            .map_err(|e| {
                warn!("Calendar delete failed: {}", e);
                AppError::Upstream(format!("Calendar delete failed: {}", e))
            })?
            .error_for_status()
            .map_err(|e| AppError::Upstream(format!("Calendar delete failed: {}", e)))?;

        Ok(())
    }
}
