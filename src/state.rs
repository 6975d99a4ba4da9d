use std::sync::Arc;

use crate::{
    config::Config,
    error::Result,
    services::{ActivityService, Database, MasterDataService, NotificationService, OpportunityService},
    slack::MessagingGateway,
};

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 数据库连接
    pub db: Arc<Database>,

    /// 主数据服务 (users, customers, stages, activity types)
    pub master_service: MasterDataService,

    pub opportunity_service: OpportunityService,

    pub activity_service: ActivityService,

    /// 通知服务
    pub notification_service: NotificationService,
}

impl AppState {
    /// Wire every service on top of one database and one messaging gateway.
    pub async fn build(
        config: Config,
        db: Arc<Database>,
        gateway: Arc<dyn MessagingGateway>,
    ) -> Result<Self> {
        let master_service = MasterDataService::new(db.clone()).await?;
        let opportunity_service = OpportunityService::new(db.clone(), master_service.clone()).await?;
        let activity_service = ActivityService::new(
            db.clone(),
            master_service.clone(),
            opportunity_service.clone(),
        )
        .await?;
        let notification_service = NotificationService::new(
            opportunity_service.clone(),
            activity_service.clone(),
            gateway,
            &config,
        )
        .await?;

        Ok(Self {
            config,
            db,
            master_service,
            opportunity_service,
            activity_service,
            notification_service,
        })
    }
}
