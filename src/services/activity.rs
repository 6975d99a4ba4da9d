use crate::{
    error::{AppError, Result},
    models::activity::*,
    services::{
        database::{parse_uuid, Database},
        master::MasterDataService,
        opportunity::OpportunityService,
    },
};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

#[derive(sqlx::FromRow)]
struct ActivityLogRow {
    id: String,
    opportunity_id: String,
    user_id: String,
    activity_type_id: i64,
    action_date: NaiveDate,
    comment: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ActivityLogRow> for ActivityLog {
    type Error = AppError;

    fn try_from(row: ActivityLogRow) -> Result<Self> {
        Ok(ActivityLog {
            id: parse_uuid(&row.id)?,
            opportunity_id: parse_uuid(&row.opportunity_id)?,
            user_id: parse_uuid(&row.user_id)?,
            activity_type_id: row.activity_type_id,
            action_date: row.action_date,
            comment: row.comment,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Append-only activity logs.
#[derive(Clone)]
pub struct ActivityService {
    db: Arc<Database>,
    master: MasterDataService,
    opportunities: OpportunityService,
}

impl ActivityService {
    pub async fn new(
        db: Arc<Database>,
        master: MasterDataService,
        opportunities: OpportunityService,
    ) -> Result<Self> {
        Ok(Self {
            db,
            master,
            opportunities,
        })
    }

    pub async fn create_activity_log(&self, request: CreateActivityLogRequest) -> Result<ActivityLog> {
        debug!(
            "Recording activity for opportunity {} by {}",
            request.opportunity_id, request.user_id
        );

        request.validate()?;

        if !self.opportunities.exists(request.opportunity_id).await? {
            return Err(AppError::NotFound(format!(
                "Opportunity {} not found",
                request.opportunity_id
            )));
        }
        self.master.get_user(request.user_id).await?;
        self.master.get_activity_type(request.activity_type_id).await?;

        let now = Utc::now();
        let log = ActivityLog {
            id: Uuid::new_v4(),
            opportunity_id: request.opportunity_id,
            user_id: request.user_id,
            activity_type_id: request.activity_type_id,
            action_date: request.action_date,
            comment: request.comment.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"INSERT INTO activity_log
               (id, opportunity_id, user_id, activity_type_id, action_date, comment, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(log.id.to_string())
        .bind(log.opportunity_id.to_string())
        .bind(log.user_id.to_string())
        .bind(log.activity_type_id)
        .bind(log.action_date)
        .bind(&log.comment)
        .bind(log.created_at)
        .bind(log.updated_at)
        .execute(self.db.pool())
        .await?;

        info!(
            activity_id = %log.id,
            opportunity_id = %log.opportunity_id,
            action_date = %log.action_date,
            "Recorded activity"
        );
        Ok(log)
    }

    /// Date of the most recent activity on an opportunity, if any.
    pub async fn latest_activity_date(&self, opportunity_id: Uuid) -> Result<Option<NaiveDate>> {
        let date: Option<NaiveDate> = sqlx::query_scalar(
            r#"SELECT action_date FROM activity_log
               WHERE opportunity_id = ?
               ORDER BY action_date DESC
               LIMIT 1"#,
        )
        .bind(opportunity_id.to_string())
        .fetch_optional(self.db.pool())
        .await?;

        Ok(date)
    }

    pub async fn list_for_opportunity(&self, opportunity_id: Uuid) -> Result<Vec<ActivityLog>> {
        let rows: Vec<ActivityLogRow> = sqlx::query_as(
            r#"SELECT id, opportunity_id, user_id, activity_type_id, action_date, comment, created_at, updated_at
               FROM activity_log
               WHERE opportunity_id = ?
               ORDER BY action_date DESC, created_at DESC"#,
        )
        .bind(opportunity_id.to_string())
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter().map(ActivityLog::try_from).collect()
    }
}
