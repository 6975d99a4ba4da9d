use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

use super::master::StageSummary;
use super::user::{CustomerSummary, UserSummary};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Opportunity {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub title: String,
    pub amount: f64,
    pub stage_id: i64,
    pub expected_close_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityRole {
    Owner,
    Collaborator,
}

impl OpportunityRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityRole::Owner => "owner",
            OpportunityRole::Collaborator => "collaborator",
        }
    }
}

impl fmt::Display for OpportunityRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOpportunityRequest {
    pub customer_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub amount: f64,
    pub stage_id: i64,
    pub expected_close_date: NaiveDate,
    pub owners: Vec<Uuid>,
    #[serde(default)]
    pub collaborators: Vec<Uuid>,
}

/// Only these fields are mutable after creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateOpportunityRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub amount: Option<f64>,
    pub stage_id: Option<i64>,
    pub expected_close_date: Option<NaiveDate>,
}

impl UpdateOpportunityRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.amount.is_none()
            && self.stage_id.is_none()
            && self.expected_close_date.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpportunitySearchQuery {
    pub customer_id: Option<Uuid>,
    pub title: Option<String>,
    pub stage_id: Option<i64>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpportunityDetail {
    pub id: Uuid,
    pub customer: CustomerSummary,
    pub title: String,
    pub amount: f64,
    pub stage: StageSummary,
    pub expected_close_date: NaiveDate,
    pub owners: Vec<UserSummary>,
    pub collaborators: Vec<UserSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpportunitySearchResult {
    pub id: Uuid,
    pub customer: CustomerSummary,
    pub title: String,
    pub amount: f64,
    pub stage: StageSummary,
    pub expected_close_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityCreated {
    pub id: Uuid,
}
