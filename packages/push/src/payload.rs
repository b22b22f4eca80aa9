//! Push payload wire format.
//!
//! The delivery endpoint accepts an FCM v1 style message: a device token,
//! a human-readable notification, a string-only data map for the client
//! app, and an Android delivery block controlling appearance and priority.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::registry::AndroidConfig;

/// Priority requested for every alert notification.
const DELIVERY_PRIORITY: &str = "high";

/// A complete push payload as sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushPayload {
    /// The single message envelope.
    pub message: PushMessage,
}

/// The message envelope addressed to one device token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushMessage {
    /// Target device push token.
    pub token: String,
    /// Human-readable notification content.
    pub notification: Notification,
    /// Machine-readable payload for the client app. Values must be
    /// strings on the wire.
    pub data: BTreeMap<String, String>,
    /// Android-specific delivery settings.
    pub android: AndroidBlock,
}

/// Human-readable notification content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub body: String,
}

/// Android-specific delivery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AndroidBlock {
    /// Appearance settings for the Android notification.
    pub notification: AndroidNotification,
    /// Delivery priority; always `"high"` for alerts.
    pub priority: String,
}

/// Appearance settings for the Android notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AndroidNotification {
    /// Icon resource name.
    pub icon: String,
    /// Accent color hex string.
    pub color: String,
    /// Sound name.
    pub sound: String,
    /// Notification channel ID.
    pub channel_id: String,
}

impl AndroidBlock {
    /// Builds the Android block from provider registry defaults.
    #[must_use]
    pub fn from_config(config: &AndroidConfig) -> Self {
        Self {
            notification: AndroidNotification {
                icon: config.icon.clone(),
                color: config.color.clone(),
                sound: config.sound.clone(),
                channel_id: config.channel_id.clone(),
            },
            priority: DELIVERY_PRIORITY.to_string(),
        }
    }
}

impl PushPayload {
    /// Assembles a payload for one recipient.
    #[must_use]
    pub const fn new(
        token: String,
        notification: Notification,
        data: BTreeMap<String, String>,
        android: AndroidBlock,
    ) -> Self {
        Self {
            message: PushMessage {
                token,
                notification,
                data,
                android,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::fcm_provider;

    #[test]
    fn payload_serializes_to_wire_shape() {
        let provider = fcm_provider();
        let mut data = BTreeMap::new();
        data.insert("alert_type".to_string(), "FIRE".to_string());
        data.insert("location".to_string(), "37.774900,-122.419400".to_string());
        data.insert("severity".to_string(), "HIGH".to_string());
        data.insert("distance".to_string(), "1.4".to_string());
        data.insert("description".to_string(), "smoke visible".to_string());

        let payload = PushPayload::new(
            "device-token".to_string(),
            Notification {
                title: "Fire reported 1.4 km away".to_string(),
                body: "smoke visible".to_string(),
            },
            data,
            AndroidBlock::from_config(&provider.android),
        );

        let value = serde_json::to_value(&payload).unwrap();
        let expected = serde_json::json!({
            "message": {
                "token": "device-token",
                "notification": {
                    "title": "Fire reported 1.4 km away",
                    "body": "smoke visible"
                },
                "data": {
                    "alert_type": "FIRE",
                    "location": "37.774900,-122.419400",
                    "severity": "HIGH",
                    "distance": "1.4",
                    "description": "smoke visible"
                },
                "android": {
                    "notification": {
                        "icon": "ic_alert",
                        "color": "#D32F2F",
                        "sound": "default",
                        "channel_id": "blockwatch_alerts"
                    },
                    "priority": "high"
                }
            }
        });

        assert_eq!(value, expected);
    }
}
