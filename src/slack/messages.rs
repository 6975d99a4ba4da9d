//! Block Kit payloads for notification DMs.
//!
//! The layout is purely presentational: a headline section, then (when the
//! message concerns an opportunity) a divider, a two-field section and a
//! "view opportunity" button.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::notification::NotificationCandidate;

/// Slack Block Kit block types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackBlock {
    /// Section block (main content).
    Section {
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<SlackTextObject>,
        #[serde(skip_serializing_if = "Option::is_none")]
        fields: Option<Vec<SlackTextObject>>,
    },
    /// Divider block.
    Divider {},
    /// Actions block (buttons).
    Actions { elements: Vec<SlackBlockElement> },
}

/// Slack text object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlackTextObject {
    #[serde(rename = "type")]
    pub text_type: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<bool>,
}

impl SlackTextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text_type: "plain_text".to_string(),
            text: text.into(),
            emoji: Some(true),
        }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self {
            text_type: "mrkdwn".to_string(),
            text: text.into(),
            emoji: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackBlockElement {
    Button {
        text: SlackTextObject,
        action_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
}

/// Message content for `chat.postMessage`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SlackMessageContent {
    /// Fallback text for notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<SlackBlock>>,
}

impl SlackMessageContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// Opportunity details attached to a notification.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NotificationContext {
    pub opportunity_id: Option<Uuid>,
    pub opportunity_title: Option<String>,
    pub last_activity_date: Option<String>,
}

impl From<&NotificationCandidate> for NotificationContext {
    fn from(candidate: &NotificationCandidate) -> Self {
        Self {
            opportunity_id: Some(candidate.opportunity_id),
            opportunity_title: Some(candidate.opportunity_title.clone()),
            last_activity_date: Some(candidate.last_activity_date.to_string()),
        }
    }
}

/// Builder for creating notification messages.
pub struct SlackMessageBuilder {
    blocks: Vec<SlackBlock>,
    fallback_text: Option<String>,
}

impl SlackMessageBuilder {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            fallback_text: None,
        }
    }

    pub fn fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback_text = Some(text.into());
        self
    }

    pub fn section(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(SlackBlock::Section {
            text: Some(SlackTextObject::mrkdwn(text)),
            fields: None,
        });
        self
    }

    /// Add a section made only of `*label*\nvalue` fields.
    pub fn section_with_fields(mut self, fields: Vec<(String, String)>) -> Self {
        let field_objects: Vec<SlackTextObject> = fields
            .into_iter()
            .map(|(label, value)| SlackTextObject::mrkdwn(format!("*{}*\n{}", label, value)))
            .collect();

        self.blocks.push(SlackBlock::Section {
            text: None,
            fields: Some(field_objects),
        });
        self
    }

    pub fn divider(mut self) -> Self {
        self.blocks.push(SlackBlock::Divider {});
        self
    }

    pub fn button(mut self, label: impl Into<String>, action_id: impl Into<String>, value: impl Into<String>) -> Self {
        self.blocks.push(SlackBlock::Actions {
            elements: vec![SlackBlockElement::Button {
                text: SlackTextObject::plain(label),
                action_id: action_id.into(),
                value: Some(value.into()),
            }],
        });
        self
    }

    pub fn build(self) -> SlackMessageContent {
        SlackMessageContent {
            text: self.fallback_text,
            blocks: Some(self.blocks),
        }
    }
}

impl Default for SlackMessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Fallback text for a stale-opportunity DM.
pub fn progress_reminder_text(opportunity_title: &str, inactivity_days: i64) -> String {
    format!(
        "案件「{}」は{}日以上活動が記録されていません。進捗を確認し、活動を記録してください。",
        opportunity_title, inactivity_days
    )
}

/// Build the notification DM: fallback text plus the Block Kit layout.
pub fn build_notification(message: &str, context: Option<&NotificationContext>) -> SlackMessageContent {
    let mut builder = SlackMessageBuilder::new()
        .fallback(message)
        .section(format!("*通知*\n{}", message));

    if let Some(context) = context {
        let mut fields = Vec::new();
        if let Some(title) = context.opportunity_title.as_deref().filter(|t| !t.is_empty()) {
            fields.push(("【案件名】".to_string(), title.to_string()));
        }
        if let Some(date) = context.last_activity_date.as_deref().filter(|d| !d.is_empty()) {
            fields.push(("【最終活動日】".to_string(), date.to_string()));
        }

        builder = builder.divider().section_with_fields(fields);

        let value = context
            .opportunity_id
            .map(|id| format!("view_opportunity_{}", id))
            .unwrap_or_else(|| "view_opportunity_".to_string());
        builder = builder.button("案件を表示", "view_opportunity", value);
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::LastActivity;
    use chrono::NaiveDate;
    use serde_json::json;

    fn candidate() -> NotificationCandidate {
        NotificationCandidate {
            user_id: Uuid::new_v4(),
            slack_id: Some("U01234ABC".to_string()),
            opportunity_id: Uuid::nil(),
            opportunity_title: "Web導入".to_string(),
            last_activity_date: LastActivity::On(NaiveDate::from_ymd_opt(2025, 4, 30).unwrap()),
        }
    }

    #[test]
    fn test_plain_notification_has_single_section() {
        let content = build_notification("今週のKPIが未達成です", None);
        assert_eq!(content.text.as_deref(), Some("今週のKPIが未達成です"));
        let blocks = content.blocks.unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(matches!(&blocks[0], SlackBlock::Section { text: Some(t), .. } if t.text.starts_with("*通知*")));
    }

    #[test]
    fn test_opportunity_notification_layout() {
        let context = NotificationContext::from(&candidate());
        let content = build_notification("進捗を確認してください", Some(&context));
        let value = serde_json::to_value(&content).unwrap();

        let blocks = value["blocks"].as_array().unwrap();
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[1], json!({"type": "divider"}));
        assert_eq!(blocks[2]["fields"][0]["text"], "*【案件名】*\nWeb導入");
        assert_eq!(blocks[2]["fields"][1]["text"], "*【最終活動日】*\n2025-04-30");
        assert!(blocks[2].get("text").is_none());
        assert_eq!(blocks[3]["elements"][0]["action_id"], "view_opportunity");
        assert_eq!(
            blocks[3]["elements"][0]["value"],
            format!("view_opportunity_{}", Uuid::nil())
        );
    }

    #[test]
    fn test_reminder_text_mentions_title_and_threshold() {
        let text = progress_reminder_text("Web導入", 3);
        assert!(text.contains("Web導入"));
        assert!(text.contains("3日"));
    }
}
