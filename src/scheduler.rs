//! Time-based triggers for the notification pipeline.
//!
//! The loops here do not touch the services directly. Each run goes through
//! the public HTTP API, so a scheduled run and a manual `curl` take the same
//! path.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, FixedOffset, NaiveDate, NaiveTime, Utc, Weekday};
use reqwest::Client;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::{
    config::Config,
    error::{AppError, Result},
    models::{
        notification::{
            KpiNotificationRequest, KpiNotificationResponse, KpiTarget, ProgressNotificationRequest,
            ProgressNotificationResponse,
        },
        response::ApiResponse,
    },
};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);
const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Calls the notification endpoints the way an external cron would.
#[derive(Clone)]
pub struct TaskRunner {
    client: Client,
    api_base_url: String,
    offset: FixedOffset,
}

impl TaskRunner {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            offset: utc_offset(config.scheduler_utc_offset_hours)?,
        })
    }

    /// Today's date in the scheduler's time zone.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }

    /// Trigger the progress check for today. Returns the number of DMs sent, 0 on failure.
    pub async fn run_progress_notification_check(&self) -> usize {
        self.run_progress_notification_check_for(self.today()).await
    }

    pub async fn run_progress_notification_check_for(&self, target_date: NaiveDate) -> usize {
        info!(%target_date, "Running progress notification check");

        match self.post_progress(target_date).await {
            Ok(result) => {
                info!(
                    %target_date,
                    notifications_count = result.notifications_count,
                    notifications_sent = result.notifications_sent,
                    "Progress notification check finished"
                );
                result.notifications_sent
            }
            Err(e) => {
                error!(%target_date, "Progress notification check failed: {}", e);
                0
            }
        }
    }

    async fn post_progress(&self, target_date: NaiveDate) -> Result<ProgressNotificationResponse> {
        let response = self
            .client
            .post(format!("{}/api/notification/progress", self.api_base_url))
            .json(&ProgressNotificationRequest { target_date })
            .send()
            .await?
            .error_for_status()?;

        let body: ApiResponse<ProgressNotificationResponse> = response.json().await?;
        Ok(body.data)
    }

    /// Send a KPI nudge to every target with both a Slack ID and a message.
    /// Returns how many were delivered.
    pub async fn run_kpi_action_notification(&self, targets: &[KpiTarget]) -> usize {
        info!(targets = targets.len(), "Running KPI action notification");

        let mut sent = 0;
        for target in targets {
            let (Some(slack_id), Some(message)) = (
                target.slack_id.as_deref().filter(|s| !s.trim().is_empty()),
                target.message.as_deref().filter(|m| !m.trim().is_empty()),
            ) else {
                warn!(kpi_status = ?target.kpi_status, "KPI target without slack_id or message, skipping");
                continue;
            };

            let request = KpiNotificationRequest {
                user_slack_id: slack_id.to_string(),
                message: message.to_string(),
                opportunity_id: None,
                opportunity_title: None,
            };

            match self.post_kpi(&request).await {
                Ok(result) if result.success => sent += 1,
                Ok(_) => warn!(slack_id, "KPI notification was not delivered"),
                Err(e) => error!(slack_id, "KPI notification request failed: {}", e),
            }
        }

        info!(sent, "KPI action notification finished");
        sent
    }

    async fn post_kpi(&self, request: &KpiNotificationRequest) -> Result<KpiNotificationResponse> {
        let response = self
            .client
            .post(format!("{}/api/notification/kpi", self.api_base_url))
            .json(request)
            .send()
            .await?
            .error_for_status()?;

        let body: ApiResponse<KpiNotificationResponse> = response.json().await?;
        Ok(body.data)
    }
}

fn utc_offset(hours: i32) -> Result<FixedOffset> {
    FixedOffset::east_opt(hours * 3600)
        .ok_or_else(|| AppError::validation("SCHEDULER_UTC_OFFSET_HOURS must be between -23 and 23"))
}

fn at_hour(hour: u32) -> Result<NaiveTime> {
    NaiveTime::from_hms_opt(hour, 0, 0)
        .ok_or_else(|| AppError::Validation(format!("invalid schedule hour: {}", hour)))
}

fn until(now: DateTime<FixedOffset>, next: chrono::NaiveDateTime) -> Duration {
    (next - now.naive_local()).to_std().unwrap_or(Duration::ZERO)
}

/// Time left until the next `at` strictly after `now`.
pub fn duration_until_next_daily(now: DateTime<FixedOffset>, at: NaiveTime) -> Duration {
    let mut next = now.date_naive().and_time(at);
    if next <= now.naive_local() {
        next += ChronoDuration::days(1);
    }
    until(now, next)
}

/// Time left until the next `weekday` at `at`, strictly after `now`.
pub fn duration_until_next_weekly(now: DateTime<FixedOffset>, weekday: Weekday, at: NaiveTime) -> Duration {
    let days_ahead = (7 + weekday.num_days_from_monday() as i64
        - now.weekday().num_days_from_monday() as i64)
        % 7;
    let mut next = (now.date_naive() + ChronoDuration::days(days_ahead)).and_time(at);
    if next <= now.naive_local() {
        next += ChronoDuration::days(7);
    }
    until(now, next)
}

/// 启动后台任务
pub fn start_background_tasks(config: &Config) -> Result<()> {
    if !config.scheduler_enabled {
        info!("Scheduler disabled, background tasks not started");
        return Ok(());
    }

    info!("Starting background tasks...");

    let runner = TaskRunner::new(config)?;
    let offset = runner.offset;
    let progress_at = at_hour(config.progress_check_hour)?;
    let kpi_at = at_hour(config.kpi_check_hour)?;
    let kpi_weekday = config.kpi_check_weekday;
    let kpi_targets = config.kpi_targets.clone();

    // 每日进度检查
    let progress_runner = runner.clone();
    tokio::spawn(async move {
        let delay = duration_until_next_daily(Utc::now().with_timezone(&offset), progress_at);
        debug!(delay_secs = delay.as_secs(), "Progress check scheduled");

        let mut interval = interval_at(Instant::now() + delay, DAY);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            progress_runner.run_progress_notification_check().await;
        }
    });

    // 每周KPI提醒
    if kpi_targets.is_empty() {
        info!("No KPI targets configured, weekly KPI notification disabled");
    } else {
        tokio::spawn(async move {
            let delay = duration_until_next_weekly(Utc::now().with_timezone(&offset), kpi_weekday, kpi_at);
            debug!(delay_secs = delay.as_secs(), "KPI notification scheduled");

            let mut interval = interval_at(Instant::now() + delay, WEEK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                runner.run_kpi_action_notification(&kpi_targets).await;
            }
        });
    }

    info!("Background tasks started successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tokyo(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
    }

    fn nine() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap()
    }

    fn runner(server: &MockServer) -> TaskRunner {
        let config = Config {
            api_base_url: server.uri(),
            ..Config::default()
        };
        TaskRunner::new(&config).unwrap()
    }

    #[test]
    fn test_daily_later_today() {
        let wait = duration_until_next_daily(tokyo(2025, 5, 13, 8, 30), nine());
        assert_eq!(wait, Duration::from_secs(30 * 60));
    }

    #[test]
    fn test_daily_rolls_over_to_tomorrow() {
        let wait = duration_until_next_daily(tokyo(2025, 5, 13, 9, 0), nine());
        assert_eq!(wait, DAY);
    }

    #[test]
    fn test_weekly_next_monday() {
        // 2025-05-13 is a Tuesday
        let wait = duration_until_next_weekly(tokyo(2025, 5, 13, 9, 0), Weekday::Mon, nine());
        assert_eq!(wait, Duration::from_secs(6 * 24 * 3600));
    }

    #[test]
    fn test_weekly_same_day_before_hour() {
        let wait = duration_until_next_weekly(tokyo(2025, 5, 12, 7, 0), Weekday::Mon, nine());
        assert_eq!(wait, Duration::from_secs(2 * 3600));
    }

    #[test]
    fn test_invalid_schedule_settings() {
        assert!(at_hour(24).is_err());
        assert!(utc_offset(30).is_err());
        assert!(utc_offset(-5).is_ok());
    }

    #[tokio::test]
    async fn test_progress_check_returns_sent_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/notification/progress"))
            .and(body_json(json!({"target_date": "2025-05-13"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "status": "completed",
                    "target_date": "2025-05-13",
                    "notifications_count": 3,
                    "notifications_sent": 2,
                    "notifications": []
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let sent = runner(&server)
            .run_progress_notification_check_for(NaiveDate::from_ymd_opt(2025, 5, 13).unwrap())
            .await;
        assert_eq!(sent, 2);
    }

    #[tokio::test]
    async fn test_progress_check_failure_returns_zero() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/notification/progress"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let sent = runner(&server)
            .run_progress_notification_check_for(NaiveDate::from_ymd_opt(2025, 5, 13).unwrap())
            .await;
        assert_eq!(sent, 0);
    }

    #[tokio::test]
    async fn test_kpi_notification_counts_successes_and_skips_incomplete_targets() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/notification/kpi"))
            .and(wiremock::matchers::body_partial_json(json!({"user_slack_id": "UOK"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"status": "completed", "success": true, "user_slack_id": "UOK"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/notification/kpi"))
            .and(wiremock::matchers::body_partial_json(json!({"user_slack_id": "UNG"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"status": "failed", "success": false, "user_slack_id": "UNG"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let targets = vec![
            KpiTarget {
                slack_id: Some("UOK".into()),
                kpi_status: Some("behind".into()),
                message: Some("訪問件数が不足しています".into()),
            },
            KpiTarget {
                slack_id: Some("UNG".into()),
                kpi_status: None,
                message: Some("訪問件数が不足しています".into()),
            },
            KpiTarget {
                slack_id: None,
                kpi_status: None,
                message: Some("no recipient".into()),
            },
            KpiTarget {
                slack_id: Some("UEMPTY".into()),
                kpi_status: None,
                message: None,
            },
        ];

        assert_eq!(runner(&server).run_kpi_action_notification(&targets).await, 1);
    }

    #[test]
    fn test_disabled_scheduler_starts_nothing() {
        assert!(start_background_tasks(&Config::default()).is_ok());
    }
}
