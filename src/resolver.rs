//! Recipient and delivery resolution.
//!
//! A qualifying write is turned into a recipient set, each recipient into a
//! user profile, each profile into delivery tokens, and each token into one
//! independent push attempt. Individual delivery failures are recorded on
//! the attempt and never fail the batch.

use std::sync::Arc;

use anyhow::{Error, Result};
use futures_util::future::{join_all, try_join_all};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    clients::{fcm::FcmClient, store::DocumentStore},
    models::{
        delivery::{AggregateResult, DeliveryAttempt, DeliveryOutcome},
        document::{Fields, collections, str_at},
        event::EventRecord,
        fcm::PushPayload,
        profile::UserProfile,
    },
    utils::token_preview,
};

/// Why an event produced no dispatch. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoData,
    NoRecipients,
    EmptyContent,
    MissingCentre,
    MissingFamilyMember,
    NoAdmins,
    NoTokens,
    IrrelevantTransition,
    MissingFirebaseUid,
    Unchanged,
}

/// Ordered, duplicate-free recipient identities. Never contains the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientSet(Vec<String>);

impl RecipientSet {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Primary recipient, then secondary recipients in stored order, minus the
/// sender.
pub fn compute_recipients(record: &EventRecord) -> Result<RecipientSet, SkipReason> {
    let candidates = record
        .receiver_id
        .iter()
        .chain(record.receivers_ids.iter());

    recipients_from(candidates, record.sender_id.as_deref())
}

/// Recipients taken verbatim from a stored participant list.
pub fn participant_recipients(record: &EventRecord) -> Result<RecipientSet, SkipReason> {
    recipients_from(record.participants_ids.iter(), None)
}

fn recipients_from<'a>(
    candidates: impl Iterator<Item = &'a String>,
    sender: Option<&str>,
) -> Result<RecipientSet, SkipReason> {
    let mut recipients: Vec<String> = Vec::new();

    for id in candidates {
        if Some(id.as_str()) != sender && !recipients.contains(id) {
            recipients.push(id.clone());
        }
    }

    if recipients.is_empty() {
        Err(SkipReason::NoRecipients)
    } else {
        Ok(RecipientSet(recipients))
    }
}

/// Storage shapes that have held delivery tokens over time, in priority
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// `preferencias.notificaciones.fcmToken`
    PreferenceToken,
    /// Root `fcmToken`.
    RootToken,
    /// Root `fcmTokens`, a map of device name to token.
    RootTokenMap,
    /// `preferencias.notificaciones.deviceId`
    DeviceId,
}

impl TokenSource {
    pub const PRIORITY: [TokenSource; 4] = [
        TokenSource::PreferenceToken,
        TokenSource::RootToken,
        TokenSource::RootTokenMap,
        TokenSource::DeviceId,
    ];

    pub fn extract(&self, fields: &Fields) -> Vec<String> {
        match self {
            TokenSource::PreferenceToken => {
                single(str_at(fields, &["preferencias", "notificaciones", "fcmToken"]))
            }
            TokenSource::RootToken => single(str_at(fields, &["fcmToken"])),
            TokenSource::RootTokenMap => match fields.get("fcmTokens") {
                Some(Value::Object(tokens)) => tokens
                    .values()
                    .filter_map(Value::as_str)
                    .filter(|token| !token.is_empty())
                    .map(str::to_string)
                    .collect(),
                _ => Vec::new(),
            },
            TokenSource::DeviceId => {
                single(str_at(fields, &["preferencias", "notificaciones", "deviceId"]))
            }
        }
    }
}

fn single(token: Option<&str>) -> Vec<String> {
    token.map(str::to_string).into_iter().collect()
}

/// Appends tokens not already present, keeping first-seen order.
pub fn merge_tokens(into: &mut Vec<String>, tokens: impl IntoIterator<Item = String>) {
    for token in tokens {
        if !into.contains(&token) {
            into.push(token);
        }
    }
}

/// Every token a profile carries, across all storage shapes. An empty result
/// is a valid outcome.
pub fn resolve_tokens(profile: &UserProfile) -> Vec<String> {
    let mut tokens = Vec::new();

    for source in TokenSource::PRIORITY {
        merge_tokens(&mut tokens, source.extract(&profile.fields));
    }

    tokens
}

/// Looks up user profiles for recipient identities.
pub struct Resolver {
    store: Arc<dyn DocumentStore>,
    fallback_field: String,
}

impl Resolver {
    pub fn new(store: Arc<dyn DocumentStore>, fallback_field: impl Into<String>) -> Self {
        Self {
            store,
            fallback_field: fallback_field.into(),
        }
    }

    /// Document key first, then the secondary key field. Only a missing
    /// document triggers the fallback; store errors propagate.
    pub async fn resolve_identity(&self, id: &str) -> Result<Option<UserProfile>, Error> {
        if let Some(document) = self.store.get(collections::USERS, id).await? {
            return Ok(Some(UserProfile::from_document(document)));
        }

        debug!(
            identity = id,
            field = %self.fallback_field,
            "Profile not found by key, trying secondary key"
        );

        let fallback = self
            .store
            .find_one(collections::USERS, &self.fallback_field, id)
            .await?;

        if fallback.is_none() {
            info!(identity = id, "No profile found for identity");
        }

        Ok(fallback.map(UserProfile::from_document))
    }

    /// Tokens of every recipient merged into one set. Recipients without a
    /// profile contribute nothing.
    pub async fn resolve_recipient_tokens(
        &self,
        recipients: &RecipientSet,
    ) -> Result<Vec<String>, Error> {
        let profiles = try_join_all(
            recipients
                .as_slice()
                .iter()
                .map(|id| self.resolve_identity(id)),
        )
        .await?;

        let mut tokens = Vec::new();
        for profile in profiles.iter().flatten() {
            let found = resolve_tokens(profile);
            if found.is_empty() {
                debug!(profile = %profile.id, "Profile has no delivery tokens");
            }
            merge_tokens(&mut tokens, found);
        }

        Ok(tokens)
    }
}

/// One push request. Transport errors and rejections are captured on the
/// attempt.
pub async fn dispatch(fcm: &FcmClient, token: &str, payload: &PushPayload) -> DeliveryAttempt {
    let outcome = match fcm.send(&payload.to_message(token)).await {
        Ok(message_name) => {
            debug!(token = %token_preview(token), "Push delivered");
            DeliveryOutcome::Sent { message_name }
        }
        Err(e) => {
            warn!(token = %token_preview(token), error = %e, "Push delivery failed");
            DeliveryOutcome::Failed {
                reason: e.to_string(),
            }
        }
    };

    DeliveryAttempt {
        token: token.to_string(),
        outcome,
    }
}

/// Dispatches to every token concurrently and waits for all of them.
pub async fn dispatch_all(
    fcm: &FcmClient,
    tokens: &[String],
    payload: &PushPayload,
) -> Vec<DeliveryAttempt> {
    join_all(tokens.iter().map(|token| dispatch(fcm, token, payload))).await
}

pub fn aggregate(attempts: &[DeliveryAttempt]) -> AggregateResult {
    let success_count = attempts.iter().filter(|a| a.is_success()).count();

    AggregateResult {
        success_count,
        failure_count: attempts.len() - success_count,
    }
}
