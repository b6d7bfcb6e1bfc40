use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FcmRequest {
    pub message: FcmMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FcmMessage {
    pub token: String,
    pub notification: FcmNotification,

    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub data: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub android: Option<AndroidConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub apns: Option<ApnsConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FcmNotification {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AndroidConfig {
    pub priority: String,
    pub notification: AndroidNotification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AndroidNotification {
    pub channel_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApnsConfig {
    pub payload: ApnsPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApnsPayload {
    pub aps: Aps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aps {
    pub alert: FcmNotification,
    pub sound: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FcmResponse {
    pub name: Option<String>,
}

/// Token-independent part of a push message. One is built per event and
/// addressed to every resolved token.
#[derive(Debug, Clone)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
    pub channel_id: String,
}

impl PushPayload {
    pub fn new(title: impl Into<String>, body: impl Into<String>, channel_id: &str) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: BTreeMap::new(),
            channel_id: channel_id.to_string(),
        }
    }

    pub fn with_data(mut self, key: &str, value: impl Into<String>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn to_message(&self, token: &str) -> FcmMessage {
        let notification = FcmNotification {
            title: self.title.clone(),
            body: self.body.clone(),
        };

        FcmMessage {
            token: token.to_string(),
            notification: notification.clone(),
            data: self.data.clone(),
            android: Some(AndroidConfig {
                priority: "high".to_string(),
                notification: AndroidNotification {
                    channel_id: self.channel_id.clone(),
                },
            }),
            apns: Some(ApnsConfig {
                payload: ApnsPayload {
                    aps: Aps {
                        alert: notification,
                        sound: "default".to_string(),
                    },
                },
            }),
        }
    }
}

/// Android notification channel for a message type tag.
pub fn channel_for_message_type(message_type: &str) -> &'static str {
    match message_type {
        "CHAT" => "channel_chat",
        "ANNOUNCEMENT" => "channel_announcements",
        "INCIDENT" => "channel_incidencias",
        "ATTENDANCE" => "channel_asistencia",
        "DAILY_RECORD" => "channel_tareas",
        "NOTIFICATION" | "SYSTEM" => "channel_unified_communication",
        _ => "channel_general",
    }
}
