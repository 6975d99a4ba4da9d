use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opportunity_tracker::{
    config::Config,
    routes,
    scheduler,
    services::Database,
    slack::build_gateway,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // 初始化日志
    let filter = tracing_subscriber::EnvFilter::new(&config.log_level);
    if config.log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting opportunity-tracker service...");
    if config.is_production() && config.slack_mock_mode {
        warn!("SLACK_MOCK_MODE is enabled in production; no Slack messages will be delivered");
    }

    // 初始化数据库连接
    let db = match Database::new(&config).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to create database connection: {}", e);
            return Err(anyhow::anyhow!("Database initialization failed"));
        }
    };
    db.verify_connection().await?;
    db.migrate().await?;
    let db = Arc::new(db);

    let gateway = build_gateway(&config)?;

    // 创建应用状态
    let app_state = Arc::new(AppState::build(config.clone(), db, gateway).await?);

    // 启动后台任务
    scheduler::start_background_tasks(&config)?;

    let app = routes::create_router(app_state);

    // 启动主服务器
    let addr = format!("{}:{}", config.server_host, config.server_port);
    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr.parse()?)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
