use crate::{
    error::{AppError, Result},
    models::{master::StageSummary, opportunity::*, user::*},
    services::{
        database::{parse_uuid, Database},
        master::MasterDataService,
    },
};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

#[derive(sqlx::FromRow)]
struct OpportunityRow {
    id: String,
    customer_id: String,
    title: String,
    amount: f64,
    stage_id: i64,
    expected_close_date: NaiveDate,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OpportunityRow> for Opportunity {
    type Error = AppError;

    fn try_from(row: OpportunityRow) -> Result<Self> {
        Ok(Opportunity {
            id: parse_uuid(&row.id)?,
            customer_id: parse_uuid(&row.customer_id)?,
            title: row.title,
            amount: row.amount,
            stage_id: row.stage_id,
            expected_close_date: row.expected_close_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SearchRow {
    id: String,
    customer_id: String,
    customer_name: String,
    title: String,
    amount: f64,
    stage_id: i64,
    stage_name: String,
    expected_close_date: NaiveDate,
}

impl TryFrom<SearchRow> for OpportunitySearchResult {
    type Error = AppError;

    fn try_from(row: SearchRow) -> Result<Self> {
        Ok(OpportunitySearchResult {
            id: parse_uuid(&row.id)?,
            customer: CustomerSummary {
                id: parse_uuid(&row.customer_id)?,
                name: row.customer_name,
            },
            title: row.title,
            amount: row.amount,
            stage: StageSummary {
                id: row.stage_id,
                name: row.stage_name,
            },
            expected_close_date: row.expected_close_date,
        })
    }
}

/// An owner of an opportunity and where to reach them.
#[derive(Debug, Clone, PartialEq)]
pub struct OpportunityOwner {
    pub user_id: Uuid,
    pub slack_id: Option<String>,
}

const SEARCH_SELECT: &str = r#"
    SELECT o.id, o.customer_id, c.name AS customer_name, o.title, o.amount,
           o.stage_id, s.name AS stage_name, o.expected_close_date
    FROM opportunity o
    JOIN customer c ON c.id = o.customer_id
    JOIN stage s ON s.id = o.stage_id
    WHERE 1 = 1"#;

fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AppError::Validation("amount must be greater than 0".to_string()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct OpportunityService {
    db: Arc<Database>,
    master: MasterDataService,
}

impl OpportunityService {
    pub async fn new(db: Arc<Database>, master: MasterDataService) -> Result<Self> {
        Ok(Self { db, master })
    }

    async fn find_opportunity(&self, opportunity_id: Uuid) -> Result<Option<Opportunity>> {
        let row: Option<OpportunityRow> = sqlx::query_as(
            r#"SELECT id, customer_id, title, amount, stage_id, expected_close_date, created_at, updated_at
               FROM opportunity WHERE id = ?"#,
        )
        .bind(opportunity_id.to_string())
        .fetch_optional(self.db.pool())
        .await?;

        row.map(Opportunity::try_from).transpose()
    }

    pub async fn get_opportunity_record(&self, opportunity_id: Uuid) -> Result<Opportunity> {
        self.find_opportunity(opportunity_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Opportunity {} not found", opportunity_id)))
    }

    pub async fn exists(&self, opportunity_id: Uuid) -> Result<bool> {
        Ok(self.find_opportunity(opportunity_id).await?.is_some())
    }

    /// Opportunity with its customer, stage and members resolved.
    pub async fn get_opportunity(&self, opportunity_id: Uuid) -> Result<OpportunityDetail> {
        debug!("Getting opportunity: {}", opportunity_id);

        let opportunity = self.get_opportunity_record(opportunity_id).await?;
        let customer = self.master.get_customer(opportunity.customer_id).await?;
        let stage = self.master.get_stage(opportunity.stage_id).await?;

        let members: Vec<(String, String, String)> = sqlx::query_as(
            r#"SELECT u.id, u.name, ou.role
               FROM opportunity_user ou
               JOIN "user" u ON u.id = ou.user_id
               WHERE ou.opportunity_id = ?
               ORDER BY ou.created_at, ou.id"#,
        )
        .bind(opportunity_id.to_string())
        .fetch_all(self.db.pool())
        .await?;

        let mut owners = Vec::new();
        let mut collaborators = Vec::new();
        for (user_id, name, role) in members {
            let summary = UserSummary {
                id: parse_uuid(&user_id)?,
                name,
            };
            if role == OpportunityRole::Owner.as_str() {
                owners.push(summary);
            } else {
                collaborators.push(summary);
            }
        }

        Ok(OpportunityDetail {
            id: opportunity.id,
            customer: CustomerSummary {
                id: customer.id,
                name: customer.name,
            },
            title: opportunity.title,
            amount: opportunity.amount,
            stage: StageSummary {
                id: stage.id,
                name: stage.name,
            },
            expected_close_date: opportunity.expected_close_date,
            owners,
            collaborators,
            created_at: opportunity.created_at,
            updated_at: opportunity.updated_at,
        })
    }

    pub async fn create_opportunity(&self, request: CreateOpportunityRequest) -> Result<Uuid> {
        debug!("Creating opportunity: {}", request.title);

        request.validate()?;
        validate_amount(request.amount)?;

        self.master.get_customer(request.customer_id).await?;
        self.master.get_stage(request.stage_id).await?;

        // A user listed as both owner and collaborator is an owner.
        let mut seen = HashSet::new();
        let mut members = Vec::new();
        for user_id in &request.owners {
            if seen.insert(*user_id) {
                members.push((*user_id, OpportunityRole::Owner));
            }
        }
        for user_id in &request.collaborators {
            if seen.insert(*user_id) {
                members.push((*user_id, OpportunityRole::Collaborator));
            }
        }

        for (user_id, _) in &members {
            self.master.get_user(*user_id).await?;
        }

        let now = Utc::now();
        let opportunity_id = Uuid::new_v4();
        let mut tx = self.db.begin_transaction().await?;

        sqlx::query(
            r#"INSERT INTO opportunity
               (id, customer_id, title, amount, stage_id, expected_close_date, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(opportunity_id.to_string())
        .bind(request.customer_id.to_string())
        .bind(&request.title)
        .bind(request.amount)
        .bind(request.stage_id)
        .bind(request.expected_close_date)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (user_id, role) in &members {
            sqlx::query(
                r#"INSERT INTO opportunity_user (id, opportunity_id, user_id, role, created_at, updated_at)
                   VALUES (?, ?, ?, ?, ?, ?)"#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(opportunity_id.to_string())
            .bind(user_id.to_string())
            .bind(role.as_str())
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            opportunity_id = %opportunity_id,
            owners = request.owners.len(),
            "Created opportunity: {}",
            request.title
        );
        Ok(opportunity_id)
    }

    /// Apply the mutable fields. `updated_at` moves only when a value actually changes.
    pub async fn update_opportunity(
        &self,
        opportunity_id: Uuid,
        request: UpdateOpportunityRequest,
    ) -> Result<()> {
        debug!("Updating opportunity: {}", opportunity_id);

        let current = self.get_opportunity_record(opportunity_id).await?;
        if request.is_empty() {
            return Ok(());
        }

        request.validate()?;
        if let Some(amount) = request.amount {
            validate_amount(amount)?;
        }
        if let Some(stage_id) = request.stage_id {
            self.master.get_stage(stage_id).await?;
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE opportunity SET ");
        let mut changed = false;
        {
            let mut fields = builder.separated(", ");
            if let Some(title) = request.title.filter(|t| *t != current.title) {
                fields.push("title = ").push_bind_unseparated(title);
                changed = true;
            }
            if let Some(amount) = request.amount.filter(|a| *a != current.amount) {
                fields.push("amount = ").push_bind_unseparated(amount);
                changed = true;
            }
            if let Some(stage_id) = request.stage_id.filter(|s| *s != current.stage_id) {
                fields.push("stage_id = ").push_bind_unseparated(stage_id);
                changed = true;
            }
            if let Some(date) = request
                .expected_close_date
                .filter(|d| *d != current.expected_close_date)
            {
                fields.push("expected_close_date = ").push_bind_unseparated(date);
                changed = true;
            }
            if changed {
                fields.push("updated_at = ").push_bind_unseparated(Utc::now());
            }
        }

        if !changed {
            debug!("Opportunity {} unchanged", opportunity_id);
            return Ok(());
        }

        builder.push(" WHERE id = ").push_bind(opportunity_id.to_string());
        builder.build().execute(self.db.pool()).await?;

        info!(opportunity_id = %opportunity_id, "Updated opportunity");
        Ok(())
    }

    /// Remove the opportunity and its memberships. Activity logs are kept.
    pub async fn delete_opportunity(&self, opportunity_id: Uuid) -> Result<()> {
        debug!("Deleting opportunity: {}", opportunity_id);

        let mut tx = self.db.begin_transaction().await?;

        sqlx::query("DELETE FROM opportunity_user WHERE opportunity_id = ?")
            .bind(opportunity_id.to_string())
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM opportunity WHERE id = ?")
            .bind(opportunity_id.to_string())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await?;
            return Err(AppError::NotFound(format!("Opportunity {} not found", opportunity_id)));
        }

        tx.commit().await?;
        info!(opportunity_id = %opportunity_id, "Deleted opportunity");
        Ok(())
    }

    /// Filter opportunities. Every criterion is optional and they combine with AND.
    pub async fn search_opportunities(
        &self,
        query: &OpportunitySearchQuery,
    ) -> Result<Vec<OpportunitySearchResult>> {
        debug!("Searching opportunities with query: {:?}", query);

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SEARCH_SELECT);

        if let Some(customer_id) = query.customer_id {
            builder.push(" AND o.customer_id = ").push_bind(customer_id.to_string());
        }
        if let Some(title) = query.title.as_deref().filter(|t| !t.is_empty()) {
            builder.push(" AND instr(o.title, ").push_bind(title.to_string()).push(") > 0");
        }
        if let Some(stage_id) = query.stage_id {
            builder.push(" AND o.stage_id = ").push_bind(stage_id);
        }
        if let Some(from_date) = query.from_date {
            builder.push(" AND o.expected_close_date >= ").push_bind(from_date);
        }
        if let Some(to_date) = query.to_date {
            builder.push(" AND o.expected_close_date <= ").push_bind(to_date);
        }
        if let Some(min_amount) = query.min_amount {
            builder.push(" AND o.amount >= ").push_bind(min_amount);
        }
        if let Some(max_amount) = query.max_amount {
            builder.push(" AND o.amount <= ").push_bind(max_amount);
        }

        let rows: Vec<SearchRow> = builder.build_query_as().fetch_all(self.db.pool()).await?;
        rows.into_iter().map(OpportunitySearchResult::try_from).collect()
    }

    pub async fn list_opportunities(&self) -> Result<Vec<Opportunity>> {
        let rows: Vec<OpportunityRow> = sqlx::query_as(
            r#"SELECT id, customer_id, title, amount, stage_id, expected_close_date, created_at, updated_at
               FROM opportunity ORDER BY created_at, id"#,
        )
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter().map(Opportunity::try_from).collect()
    }

    /// Users holding the owner role, in the order they were attached.
    pub async fn get_owners(&self, opportunity_id: Uuid) -> Result<Vec<OpportunityOwner>> {
        let rows: Vec<(String, Option<String>)> = sqlx::query_as(
            r#"SELECT u.id, u.slack_id
               FROM opportunity_user ou
               JOIN "user" u ON u.id = ou.user_id
               WHERE ou.opportunity_id = ? AND ou.role = ?
               ORDER BY ou.created_at, ou.id"#,
        )
        .bind(opportunity_id.to_string())
        .bind(OpportunityRole::Owner.as_str())
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter()
            .map(|(user_id, slack_id)| {
                Ok(OpportunityOwner {
                    user_id: parse_uuid(&user_id)?,
                    slack_id,
                })
            })
            .collect()
    }
}
