pub mod activity;
pub mod database;
pub mod master;
pub mod notification;
pub mod opportunity;

// 重新导出常用类型
pub use activity::ActivityService;
pub use database::Database;
pub use master::MasterDataService;
pub use notification::NotificationService;
pub use opportunity::OpportunityService;
