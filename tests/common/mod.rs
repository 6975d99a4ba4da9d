#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use opportunity_tracker::{
    config::Config,
    create_router,
    models::{
        activity::CreateActivityLogRequest,
        master::{CreateActivityTypeRequest, CreateStageRequest},
        user::{CreateCustomerRequest, CreateUserRequest},
    },
    services::Database,
    slack::{MessagingGateway, MockGateway},
    state::AppState,
};

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub customer_id: Uuid,
    pub stage_id: i64,
    pub activity_type_id: i64,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_gateway(Arc::new(MockGateway::new())).await
    }

    pub async fn with_gateway(gateway: Arc<dyn MessagingGateway>) -> Self {
        let config = Config::default();
        let db = Arc::new(Database::connect_and_migrate(&config).await.unwrap());
        let state = Arc::new(AppState::build(config, db, gateway).await.unwrap());

        let customer = state
            .master_service
            .create_customer(CreateCustomerRequest {
                name: "株式会社テスト".into(),
                industry: "製造".into(),
            })
            .await
            .unwrap();
        let stage = state
            .master_service
            .create_stage(CreateStageRequest { name: "提案".into(), order_no: 1 })
            .await
            .unwrap();
        let activity_type = state
            .master_service
            .create_activity_type(CreateActivityTypeRequest { name: "訪問".into() })
            .await
            .unwrap();

        Self {
            router: create_router(state.clone()),
            state,
            customer_id: customer.id,
            stage_id: stage.id,
            activity_type_id: activity_type.id,
        }
    }

    pub async fn user(&self, slack_id: Option<&str>) -> Uuid {
        let email: String = SafeEmail().fake();
        self.state
            .master_service
            .create_user(CreateUserRequest {
                name: Name().fake(),
                email: format!("{}.{}", Uuid::new_v4().simple(), email),
                slack_id: slack_id.map(str::to_string),
            })
            .await
            .unwrap()
            .id
    }

    pub async fn activity(&self, opportunity_id: Uuid, user_id: Uuid, on: NaiveDate) {
        self.state
            .activity_service
            .create_activity_log(CreateActivityLogRequest {
                opportunity_id,
                user_id,
                activity_type_id: self.activity_type_id,
                action_date: on,
                comment: Some("定例訪問".into()),
            })
            .await
            .unwrap();
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
