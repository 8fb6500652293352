//! Notifications built from push payloads.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::NotificationConfig;

/// Fields read from a push payload. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
  pub title: Option<String>,
  pub body: Option<String>,
  #[serde(default)]
  pub primary_key: Value,
}

impl PushPayload {
  /// Parse a JSON payload; `None` if it is not a JSON object.
  pub fn parse(data: &[u8]) -> Option<Self> {
    let value: Value = serde_json::from_slice(data).ok()?;
    if !value.is_object() {
      return None;
    }
    serde_json::from_value(value).ok()
  }
}

/// Options passed alongside a notification title.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOptions {
  pub body: Option<String>,
  pub icon: String,
  pub badge: String,
  pub vibrate: Vec<u32>,
  pub data: NotificationData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
  /// Milliseconds since the Unix epoch
  pub date_of_arrival: i64,
  /// Copied verbatim from the payload
  pub primary_key: Value,
}

/// A notification ready to be displayed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
  pub title: String,
  pub options: NotificationOptions,
}

impl Notification {
  pub fn from_payload(payload: PushPayload, defaults: &NotificationConfig) -> Self {
    Self {
      title: payload
        .title
        .unwrap_or_else(|| defaults.default_title.clone()),
      options: NotificationOptions {
        body: payload.body,
        icon: defaults.icon.clone(),
        badge: defaults.badge.clone(),
        vibrate: defaults.vibrate.clone(),
        data: NotificationData {
          date_of_arrival: Utc::now().timestamp_millis(),
          primary_key: payload.primary_key,
        },
      },
    }
  }
}

/// Something that can show notifications to the user.
pub trait Notifier: Send + Sync {
  fn show(&self, notification: &Notification) -> Result<()>;
}

/// Notifier that writes notifications to the log and stdout.
pub struct LogNotifier;

impl Notifier for LogNotifier {
  fn show(&self, notification: &Notification) -> Result<()> {
    let json = serde_json::to_string_pretty(notification)
      .map_err(|e| eyre!("Failed to serialize notification: {}", e))?;
    tracing::info!(title = %notification.title, "Showing notification");
    println!("{}", json);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_payload_parse() {
    let payload =
      PushPayload::parse(br#"{"title":"Paid","body":"Rs 500 received","primaryKey":7}"#).unwrap();
    assert_eq!(payload.title.as_deref(), Some("Paid"));
    assert_eq!(payload.primary_key, Value::from(7));

    assert!(PushPayload::parse(b"not json").is_none());
    assert!(PushPayload::parse(b"[1, 2]").is_none());
    assert!(PushPayload::parse(br#"["Paid", "Rs 500"]"#).is_none());
    assert!(PushPayload::parse(b"\"Paid\"").is_none());
  }

  #[test]
  fn test_notification_from_payload() {
    let defaults = NotificationConfig::default();
    let payload = PushPayload {
      title: Some("Paid".to_string()),
      body: Some("Rs 500 received".to_string()),
      primary_key: Value::from("txn-1"),
    };

    let before = Utc::now().timestamp_millis();
    let notification = Notification::from_payload(payload, &defaults);

    assert_eq!(notification.title, "Paid");
    assert_eq!(notification.options.icon, "/static/images/icon-192.png");
    assert_eq!(notification.options.vibrate, vec![100, 50, 100]);
    assert_eq!(notification.options.data.primary_key, Value::from("txn-1"));
    assert!(notification.options.data.date_of_arrival >= before);
  }

  #[test]
  fn test_missing_title_uses_default() {
    let defaults = NotificationConfig::default();
    let notification = Notification::from_payload(PushPayload::default(), &defaults);
    assert_eq!(notification.title, defaults.default_title);
    assert_eq!(notification.options.data.primary_key, Value::Null);
  }

  #[test]
  fn test_options_serialize_camel_case() {
    let defaults = NotificationConfig::default();
    let notification = Notification::from_payload(PushPayload::default(), &defaults);
    let json = serde_json::to_value(&notification.options).unwrap();
    assert!(json["data"].get("dateOfArrival").is_some());
    assert!(json["data"].get("primaryKey").is_some());
  }
}
