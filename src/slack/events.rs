//! Inbound Slack Events API callbacks.
//!
//! Slack first verifies the endpoint with a `url_verification` challenge, then
//! delivers `event_callback` envelopes. Only `message` events are acted on:
//! the text is scanned for an activity keyword and the result is logged.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::error::{SlackError, SlackResult};

/// Outer envelope of an Events API request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(rename = "type")]
    pub payload_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<u64>,
    /// Inner event, kept raw until its `type` is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<Value>,
}

/// Inner events this service understands.
#[derive(Debug, Clone, PartialEq)]
pub enum SlackEvent {
    Message(MessageEvent),
    /// Any other inner `type`, carried for logging.
    Unknown(String),
}

/// A `message` event. Slack omits `user` for some subtypes and `text` for others.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MessageEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
}

impl MessageEvent {
    /// Sender and text, when both are present and non-empty.
    pub fn sender_and_text(&self) -> Option<(&str, &str)> {
        let user = self.user.as_deref().filter(|u| !u.is_empty())?;
        let text = self.text.as_deref().filter(|t| !t.is_empty())?;
        Some((user, text))
    }
}

/// Activity kind mentioned in a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Visit,
    Call,
}

impl ActivityKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActivityKind::Visit => "訪問",
            ActivityKind::Call => "電話",
        }
    }

    /// First matching keyword wins, visit before call.
    pub fn detect(text: &str) -> Option<Self> {
        [ActivityKind::Visit, ActivityKind::Call]
            .into_iter()
            .find(|kind| text.contains(kind.label()))
    }
}

/// What the endpoint should answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Echo the verification challenge.
    Challenge(String),
    /// A message event was handled.
    Processed,
    /// Nothing to do for this payload.
    Ignored,
}

/// Decode the inner event of an `event_callback`.
pub fn parse_event(payload: &EventPayload) -> SlackResult<SlackEvent> {
    let event = payload
        .event
        .as_ref()
        .ok_or_else(|| SlackError::InvalidPayload("event_callback without event".to_string()))?;

    match event.get("type").and_then(Value::as_str) {
        Some("message") => Ok(SlackEvent::Message(serde_json::from_value(event.clone())?)),
        Some(other) => Ok(SlackEvent::Unknown(other.to_string())),
        None => Err(SlackError::InvalidPayload("event has no type".to_string())),
    }
}

/// Classify an Events API request.
///
/// Only a `url_verification` without a challenge is an error. Undecodable
/// callbacks are logged and ignored so Slack does not keep redelivering them.
pub fn handle_event(payload: &EventPayload) -> SlackResult<EventOutcome> {
    match payload.payload_type.as_str() {
        "url_verification" => payload
            .challenge
            .clone()
            .map(EventOutcome::Challenge)
            .ok_or_else(|| SlackError::InvalidPayload("url_verification without challenge".to_string())),
        "event_callback" => match parse_event(payload) {
            Ok(SlackEvent::Message(message)) => Ok(handle_message(&message)),
            Ok(SlackEvent::Unknown(kind)) => {
                debug!(event_type = %kind, "Ignoring unsupported Slack event");
                Ok(EventOutcome::Ignored)
            }
            Err(e) => {
                warn!(event_id = ?payload.event_id, error = %e, "Ignoring undecodable Slack event");
                Ok(EventOutcome::Ignored)
            }
        },
        other => {
            debug!(payload_type = %other, "Ignoring Slack payload");
            Ok(EventOutcome::Ignored)
        }
    }
}

fn handle_message(message: &MessageEvent) -> EventOutcome {
    let Some((user, text)) = message.sender_and_text() else {
        warn!(channel = ?message.channel, subtype = ?message.subtype, "Message event without user or text");
        return EventOutcome::Ignored;
    };

    match ActivityKind::detect(text) {
        Some(kind) => info!(slack_id = user, activity = kind.label(), "Activity mentioned in Slack message"),
        None => debug!(slack_id = user, "Slack message mentions no activity"),
    }
    EventOutcome::Processed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn callback(event: Value) -> EventPayload {
        serde_json::from_value(json!({
            "type": "event_callback",
            "team_id": "T123",
            "event_id": "Ev01",
            "event_time": 1715500000,
            "event": event
        }))
        .unwrap()
    }

    #[test]
    fn test_detect_activity_kind() {
        assert_eq!(ActivityKind::detect("今日は顧客Aを訪問しました"), Some(ActivityKind::Visit));
        assert_eq!(ActivityKind::detect("先方に電話で確認"), Some(ActivityKind::Call));
        assert_eq!(ActivityKind::detect("訪問前に電話する"), Some(ActivityKind::Visit));
        assert_eq!(ActivityKind::detect("見積を送付"), None);
    }

    #[test]
    fn test_url_verification_echoes_challenge() {
        let payload: EventPayload =
            serde_json::from_value(json!({"type": "url_verification", "token": "t", "challenge": "abc123"}))
                .unwrap();
        assert_eq!(handle_event(&payload).unwrap(), EventOutcome::Challenge("abc123".into()));

        let missing: EventPayload = serde_json::from_value(json!({"type": "url_verification"})).unwrap();
        assert!(matches!(handle_event(&missing), Err(SlackError::InvalidPayload(_))));
    }

    #[test]
    fn test_message_with_user_and_text_is_processed() {
        let payload = callback(json!({
            "type": "message", "user": "U01234ABC", "text": "顧客Aを訪問", "channel": "C1", "ts": "1.0"
        }));
        assert!(matches!(parse_event(&payload).unwrap(), SlackEvent::Message(_)));
        assert_eq!(handle_event(&payload).unwrap(), EventOutcome::Processed);
    }

    #[test]
    fn test_message_without_user_or_text_is_ignored() {
        for event in [
            json!({"type": "message", "text": "hello", "subtype": "bot_message", "bot_id": "B1"}),
            json!({"type": "message", "user": "U1", "subtype": "message_deleted"}),
            json!({"type": "message", "user": "U1", "text": ""}),
        ] {
            assert_eq!(handle_event(&callback(event)).unwrap(), EventOutcome::Ignored);
        }
    }

    #[test]
    fn test_other_events_and_payloads_are_ignored() {
        let mention = callback(json!({"type": "app_mention", "user": "U1", "text": "hi"}));
        assert_eq!(parse_event(&mention).unwrap(), SlackEvent::Unknown("app_mention".into()));
        assert_eq!(handle_event(&mention).unwrap(), EventOutcome::Ignored);

        let empty: EventPayload = serde_json::from_value(json!({"type": "event_callback"})).unwrap();
        assert!(matches!(parse_event(&empty), Err(SlackError::InvalidPayload(_))));
        assert_eq!(handle_event(&empty).unwrap(), EventOutcome::Ignored);

        let rate_limited: EventPayload = serde_json::from_value(json!({"type": "app_rate_limited"})).unwrap();
        assert_eq!(handle_event(&rate_limited).unwrap(), EventOutcome::Ignored);
    }
}
