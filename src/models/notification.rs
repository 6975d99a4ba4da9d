use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

/// Placeholder shown instead of a date when an opportunity has no activity at all.
pub const NO_ACTIVITY_SENTINEL: &str = "なし";

/// Most recent activity for an opportunity, or none at all.
///
/// Serialized as an ISO date string or the [`NO_ACTIVITY_SENTINEL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LastActivity {
    On(NaiveDate),
    Never,
}

impl LastActivity {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            LastActivity::On(date) => Some(*date),
            LastActivity::Never => None,
        }
    }
}

impl From<Option<NaiveDate>> for LastActivity {
    fn from(value: Option<NaiveDate>) -> Self {
        value.map(LastActivity::On).unwrap_or(LastActivity::Never)
    }
}

impl fmt::Display for LastActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LastActivity::On(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            LastActivity::Never => f.write_str(NO_ACTIVITY_SENTINEL),
        }
    }
}

impl Serialize for LastActivity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LastActivity {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == NO_ACTIVITY_SENTINEL || raw.eq_ignore_ascii_case("none") {
            return Ok(LastActivity::Never);
        }
        NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map(LastActivity::On)
            .map_err(serde::de::Error::custom)
    }
}

/// One owner of one stale opportunity. Lives only for a single scan-and-notify run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NotificationCandidate {
    pub user_id: Uuid,
    pub slack_id: Option<String>,
    pub opportunity_id: Uuid,
    pub opportunity_title: String,
    pub last_activity_date: LastActivity,
}

impl NotificationCandidate {
    /// The DM destination, if the owner has a usable handle.
    pub fn messaging_handle(&self) -> Option<&str> {
        self.slack_id
            .as_deref()
            .map(str::trim)
            .filter(|handle| !handle.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressNotificationRequest {
    pub target_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressNotificationResponse {
    pub status: String,
    pub target_date: NaiveDate,
    pub notifications_count: usize,
    pub notifications_sent: usize,
    pub notifications: Vec<NotificationCandidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct KpiNotificationRequest {
    #[validate(length(min = 1))]
    pub user_slack_id: String,
    #[validate(length(min = 1, max = 3000))]
    pub message: String,
    pub opportunity_id: Option<Uuid>,
    pub opportunity_title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiNotificationResponse {
    pub status: String,
    pub success: bool,
    pub user_slack_id: String,
}

/// A scheduled KPI nudge, configured through `KPI_TARGETS`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KpiTarget {
    pub slack_id: Option<String>,
    #[serde(default)]
    pub kpi_status: Option<String>,
    pub message: Option<String>,
}
