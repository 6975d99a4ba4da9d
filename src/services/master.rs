use crate::{
    error::{AppError, Result},
    models::{master::*, user::*},
    services::database::{map_unique_violation, parse_uuid, Database},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    slack_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: parse_uuid(&row.id)?,
            name: row.name,
            email: row.email,
            slack_id: row.slack_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: String,
    name: String,
    industry: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = AppError;

    fn try_from(row: CustomerRow) -> Result<Self> {
        Ok(Customer {
            id: parse_uuid(&row.id)?,
            name: row.name,
            industry: row.industry,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Users, customers, stages and activity types.
///
/// Everything an opportunity or activity log points at lives here, so the
/// other services come to this one to check references before writing.
#[derive(Clone)]
pub struct MasterDataService {
    db: Arc<Database>,
}

impl MasterDataService {
    pub async fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self { db })
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User> {
        debug!("Creating user: {}", request.email);
        request.validate()?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: request.name,
            email: request.email,
            slack_id: request.slack_id,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"INSERT INTO "user" (id, name, email, slack_id, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.slack_id)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(self.db.pool())
        .await
        .map_err(|e| map_unique_violation(e, "email or slack_id already registered"))?;

        info!("Created user: {} ({})", user.name, user.id);
        Ok(user)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<User> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"SELECT id, name, email, slack_id, created_at, updated_at FROM "user" WHERE id = ?"#,
        )
        .bind(user_id.to_string())
        .fetch_optional(self.db.pool())
        .await?;

        row.ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?
            .try_into()
    }

    pub async fn create_customer(&self, request: CreateCustomerRequest) -> Result<Customer> {
        debug!("Creating customer: {}", request.name);
        request.validate()?;

        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4(),
            name: request.name,
            industry: request.industry,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO customer (id, name, industry, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(customer.id.to_string())
        .bind(&customer.name)
        .bind(&customer.industry)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(self.db.pool())
        .await?;

        info!("Created customer: {} ({})", customer.name, customer.id);
        Ok(customer)
    }

    pub async fn get_customer(&self, customer_id: Uuid) -> Result<Customer> {
        let row: Option<CustomerRow> = sqlx::query_as(
            "SELECT id, name, industry, created_at, updated_at FROM customer WHERE id = ?",
        )
        .bind(customer_id.to_string())
        .fetch_optional(self.db.pool())
        .await?;

        row.ok_or_else(|| AppError::NotFound(format!("Customer {} not found", customer_id)))?
            .try_into()
    }

    pub async fn create_stage(&self, request: CreateStageRequest) -> Result<Stage> {
        request.validate()?;

        let now = Utc::now();
        let id = sqlx::query(
            "INSERT INTO stage (name, order_no, is_active, created_at, updated_at) VALUES (?, ?, 1, ?, ?)",
        )
        .bind(&request.name)
        .bind(request.order_no)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await?
        .last_insert_rowid();

        info!("Created stage: {} ({})", request.name, id);
        Ok(Stage {
            id,
            name: request.name,
            order_no: request.order_no,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_stage(&self, stage_id: i64) -> Result<Stage> {
        sqlx::query_as::<_, (i64, String, i64, bool, DateTime<Utc>, DateTime<Utc>)>(
            "SELECT id, name, order_no, is_active, created_at, updated_at FROM stage WHERE id = ?",
        )
        .bind(stage_id)
        .fetch_optional(self.db.pool())
        .await?
        .map(|(id, name, order_no, is_active, created_at, updated_at)| Stage {
            id,
            name,
            order_no,
            is_active,
            created_at,
            updated_at,
        })
        .ok_or_else(|| AppError::NotFound(format!("Stage {} not found", stage_id)))
    }

    pub async fn list_stages(&self) -> Result<Vec<Stage>> {
        let rows = sqlx::query_as::<_, (i64, String, i64, bool, DateTime<Utc>, DateTime<Utc>)>(
            "SELECT id, name, order_no, is_active, created_at, updated_at FROM stage ORDER BY order_no",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, order_no, is_active, created_at, updated_at)| Stage {
                id,
                name,
                order_no,
                is_active,
                created_at,
                updated_at,
            })
            .collect())
    }

    pub async fn create_activity_type(&self, request: CreateActivityTypeRequest) -> Result<ActivityType> {
        request.validate()?;

        let now = Utc::now();
        let id = sqlx::query(
            "INSERT INTO activity_type (name, is_active, created_at, updated_at) VALUES (?, 1, ?, ?)",
        )
        .bind(&request.name)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await?
        .last_insert_rowid();

        info!("Created activity type: {} ({})", request.name, id);
        Ok(ActivityType {
            id,
            name: request.name,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_activity_type(&self, activity_type_id: i64) -> Result<ActivityType> {
        sqlx::query_as::<_, (i64, String, bool, DateTime<Utc>, DateTime<Utc>)>(
            "SELECT id, name, is_active, created_at, updated_at FROM activity_type WHERE id = ?",
        )
        .bind(activity_type_id)
        .fetch_optional(self.db.pool())
        .await?
        .map(|(id, name, is_active, created_at, updated_at)| ActivityType {
            id,
            name,
            is_active,
            created_at,
            updated_at,
        })
        .ok_or_else(|| AppError::NotFound(format!("Activity type {} not found", activity_type_id)))
    }
}
