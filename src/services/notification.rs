use crate::{
    config::Config,
    error::{AppError, Result},
    models::notification::*,
    services::{activity::ActivityService, opportunity::OpportunityService},
    slack::{
        messages::{build_notification, progress_reminder_text},
        MessagingGateway, NotificationContext, SlackResponse,
    },
};
use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use validator::Validate;

/// Longest inactivity window accepted from configuration, about a century.
pub const MAX_INACTIVITY_DAYS: i64 = 36_500;

/// Stale-opportunity scanning and Slack dispatch.
#[derive(Clone)]
pub struct NotificationService {
    opportunities: OpportunityService,
    activities: ActivityService,
    gateway: Arc<dyn MessagingGateway>,
    inactivity_days: i64,
    inactivity: Duration,
}

impl NotificationService {
    pub async fn new(
        opportunities: OpportunityService,
        activities: ActivityService,
        gateway: Arc<dyn MessagingGateway>,
        config: &Config,
    ) -> Result<Self> {
        let days = config.notification_inactivity_days;
        if !(0..=MAX_INACTIVITY_DAYS).contains(&days) {
            return Err(AppError::Validation(format!(
                "NOTIFICATION_INACTIVITY_DAYS must be between 0 and {}, got {}",
                MAX_INACTIVITY_DAYS, days
            )));
        }

        Ok(Self {
            opportunities,
            activities,
            gateway,
            inactivity_days: days,
            inactivity: Duration::days(days),
        })
    }

    /// Owners of every opportunity whose latest activity is before
    /// `target_date - inactivity_days`, or that has no activity at all.
    ///
    /// Storage errors abort the scan.
    pub async fn check_progress_notifications(
        &self,
        target_date: NaiveDate,
    ) -> Result<Vec<NotificationCandidate>> {
        let cutoff = target_date
            .checked_sub_signed(self.inactivity)
            .ok_or_else(|| AppError::bad_request("target_date is out of range"))?;

        debug!(%target_date, %cutoff, "Scanning opportunities for inactivity");

        let mut candidates = Vec::new();
        for opportunity in self.opportunities.list_opportunities().await? {
            let last_activity = LastActivity::from(
                self.activities.latest_activity_date(opportunity.id).await?,
            );

            let stale = match last_activity {
                LastActivity::Never => true,
                LastActivity::On(date) => date < cutoff,
            };
            if !stale {
                continue;
            }

            for owner in self.opportunities.get_owners(opportunity.id).await? {
                candidates.push(NotificationCandidate {
                    user_id: owner.user_id,
                    slack_id: owner.slack_id,
                    opportunity_id: opportunity.id,
                    opportunity_title: opportunity.title.clone(),
                    last_activity_date: last_activity,
                });
            }
        }

        info!(
            %target_date,
            notifications_count = candidates.len(),
            "Progress check found stale opportunities"
        );
        Ok(candidates)
    }

    /// Send one DM per candidate in order and return how many Slack accepted.
    ///
    /// Candidates without a handle are skipped. A failed delivery never stops
    /// the remaining ones.
    pub async fn send_progress_notifications(&self, candidates: &[NotificationCandidate]) -> usize {
        let mut sent = 0;

        for candidate in candidates {
            let Some(handle) = candidate.messaging_handle() else {
                warn!(
                    user_id = %candidate.user_id,
                    opportunity_id = %candidate.opportunity_id,
                    "Owner has no Slack ID, skipping notification"
                );
                continue;
            };

            let message = progress_reminder_text(&candidate.opportunity_title, self.inactivity_days);
            let context = NotificationContext::from(candidate);
            let content = build_notification(&message, Some(&context));

            match self.gateway.send_message(handle, &content).await {
                Ok(response) if response.ok => {
                    sent += 1;
                    debug!(slack_id = handle, opportunity_id = %candidate.opportunity_id, "Notification sent");
                }
                Ok(response) => {
                    warn!(
                        slack_id = handle,
                        opportunity_id = %candidate.opportunity_id,
                        error = response.error.as_deref().unwrap_or("unknown_error"),
                        "Slack rejected notification"
                    );
                }
                Err(e) => {
                    error!(
                        slack_id = handle,
                        opportunity_id = %candidate.opportunity_id,
                        "Failed to send notification: {}",
                        e
                    );
                }
            }
        }

        info!(
            notifications_count = candidates.len(),
            notifications_sent = sent,
            "Progress notifications dispatched"
        );
        sent
    }

    /// Scan and dispatch in one go.
    pub async fn run_progress_check(&self, target_date: NaiveDate) -> Result<ProgressNotificationResponse> {
        let notifications = self.check_progress_notifications(target_date).await?;
        let notifications_sent = self.send_progress_notifications(&notifications).await;

        Ok(ProgressNotificationResponse {
            status: "completed".to_string(),
            target_date,
            notifications_count: notifications.len(),
            notifications_sent,
            notifications,
        })
    }

    /// Deliver a KPI message verbatim. Gateway failures come back as `success: false`.
    pub async fn send_kpi_notification(
        &self,
        request: &KpiNotificationRequest,
    ) -> Result<KpiNotificationResponse> {
        request.validate()?;

        let context = if request.opportunity_id.is_some() || request.opportunity_title.is_some() {
            Some(NotificationContext {
                opportunity_id: request.opportunity_id,
                opportunity_title: request.opportunity_title.clone(),
                last_activity_date: None,
            })
        } else {
            None
        };
        let content = build_notification(&request.message, context.as_ref());

        let success = match self.gateway.send_message(&request.user_slack_id, &content).await {
            Ok(response) => {
                if !response.ok {
                    warn!(
                        slack_id = %request.user_slack_id,
                        error = response.error.as_deref().unwrap_or("unknown_error"),
                        "Slack rejected KPI notification"
                    );
                }
                response.ok
            }
            Err(e) => {
                error!(slack_id = %request.user_slack_id, "Failed to send KPI notification: {}", e);
                false
            }
        };

        Ok(KpiNotificationResponse {
            status: if success { "completed" } else { "failed" }.to_string(),
            success,
            user_slack_id: request.user_slack_id.clone(),
        })
    }

    pub async fn get_slack_user(&self, slack_id: &str) -> Result<SlackResponse> {
        if slack_id.trim().is_empty() {
            return Err(AppError::bad_request("slack_id must not be empty"));
        }

        self.gateway
            .get_user_info(slack_id)
            .await
            .map_err(|e| AppError::ExternalService(e.to_string()))
    }
}
