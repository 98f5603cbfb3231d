// Notification relay.
// Turns push payloads into a fixed notification descriptor and hands it to a Notifier.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const NOTIFICATION_TITLE: &str = "KL Timetable";
pub const DEFAULT_BODY: &str = "New update available!";
pub const NOTIFICATION_ICON: &str = "/maskable_icon_x192.png";
pub const VIBRATE_PATTERN: [u32; 3] = [100, 50, 100];

/// Incoming push message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushEvent {
    /// Plain-text payload, if the sender attached one.
    pub data: Option<String>,
}

impl PushEvent {
    pub fn new(data: Option<String>) -> Self {
        Self { data }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    /// Epoch milliseconds on the wire.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date_of_arrival: DateTime<Utc>,
    pub primary_key: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    /// Build the descriptor for a push. Only the body depends on the payload.
    pub fn from_push(event: &PushEvent) -> Self {
        let body = event
            .data
            .clone()
            .unwrap_or_else(|| DEFAULT_BODY.to_string());

        Self {
            title: NOTIFICATION_TITLE.to_string(),
            body,
            icon: NOTIFICATION_ICON.to_string(),
            badge: NOTIFICATION_ICON.to_string(),
            vibrate: VIBRATE_PATTERN.to_vec(),
            data: NotificationData {
                date_of_arrival: Utc::now(),
                primary_key: 1,
            },
            actions: vec![
                NotificationAction {
                    action: "explore".to_string(),
                    title: "View".to_string(),
                    icon: NOTIFICATION_ICON.to_string(),
                },
                NotificationAction {
                    action: "close".to_string(),
                    title: "Close".to_string(),
                    icon: NOTIFICATION_ICON.to_string(),
                },
            ],
        }
    }
}

/// Displays notifications. Fire-and-forget: no acknowledgement or retry.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: &Notification) -> Result<()>;
}

/// Writes notifications to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn show(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            title = %notification.title,
            body = %notification.body,
            "notification"
        );
        Ok(())
    }
}
