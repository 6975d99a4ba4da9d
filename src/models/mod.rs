pub mod activity;
pub mod master;
pub mod notification;
pub mod opportunity;
pub mod response;
pub mod user;
