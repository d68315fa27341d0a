//! The weekly visit-plan run: load roster, aggregate per user, write the
//! report, publish it, remind users with no plans.
//!
//! Steps run strictly in order: roster, per-user fetch/aggregate, report,
//! publish, notify. Only a roster failure is fatal; a failed task fetch
//! skips that user, and publish/notify failures degrade the run without
//! aborting it. Dry run computes everything but replaces both side effects
//! with log lines.

use std::path::PathBuf;
use std::thread;

use chrono::Utc;
use tracing::{error, info, warn};

use send_emails_module::{send_reminder, ReminderEmail};

use crate::config::AppConfig;
use crate::crm::{CrmClient, CrmError};
use crate::report::{report_filename, write_report, UserReportRow};
use crate::storage::{object_name, ObjectStorageClient};
use crate::users::{load_users, SalesUser, UserSourceError};
use crate::week::{DailyTaskCounts, WeekWindow};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("could not retrieve user list: {0}")]
    Users(#[from] UserSourceError),
    #[error("crm client setup failed: {0}")]
    Crm(#[from] CrmError),
}

/// Outcome of one run, for the final status log and for tests.
#[derive(Debug)]
pub struct RunSummary {
    pub window: WeekWindow,
    pub users_processed: usize,
    pub users_skipped: usize,
    pub report_path: Option<PathBuf>,
    pub uploaded: bool,
    pub notified: usize,
    pub notification_candidates: Vec<SalesUser>,
}

pub struct Runner {
    config: AppConfig,
    crm: CrmClient,
    storage: Option<ObjectStorageClient>,
}

impl Runner {
    /// Wire up the collaborators from config. A storage init failure is
    /// logged and disables publishing; dry run never builds the client.
    pub fn from_config(config: AppConfig) -> Result<Self, RunError> {
        let crm = CrmClient::new(
            config.crm.host.clone(),
            config.crm.access_key.clone(),
            config.crm.secret_key.clone(),
            config.crm.visit_plan_type.clone(),
            config.crm.user_filter.clone(),
        )?;

        let storage = if config.dry_run {
            info!("dry run: skipping object storage client init");
            None
        } else {
            match ObjectStorageClient::new(&config.storage) {
                Ok(client) => Some(client),
                Err(err) => {
                    error!("failed to initialize object storage client: {err}");
                    None
                }
            }
        };

        Ok(Self::new(config, crm, storage))
    }

    pub fn new(config: AppConfig, crm: CrmClient, storage: Option<ObjectStorageClient>) -> Self {
        Self {
            config,
            crm,
            storage,
        }
    }

    pub fn run(&self) -> Result<RunSummary, RunError> {
        info!("---- starting visit plan check");
        if self.config.dry_run {
            warn!("running in DRY RUN mode, no emails or uploads will occur");
        } else {
            info!("running in LIVE mode, emails and uploads will occur");
        }

        let window = WeekWindow::compute(Utc::now(), self.config.tz_offset);
        info!(
            "checking visit plans for the week {} to {}",
            window.from_date_str(),
            window.to_date_str()
        );

        let users = load_users(self.config.db.as_ref(), &self.crm)?;

        let mut rows: Vec<UserReportRow> = Vec::new();
        let mut candidates: Vec<SalesUser> = Vec::new();
        let mut skipped = 0usize;

        for user in users {
            let email = user.email_address.trim();
            if email.is_empty() {
                continue;
            }
            info!("checking user {} ({})", user.full_name(), email);

            // Spacing between CRM calls, to stay under the API rate limit.
            thread::sleep(self.config.user_pause);

            let page = match self.crm.retrieve_tasks(email, &window) {
                Ok(page) => page,
                Err(err) => {
                    error!("skipping user {email}: task fetch failed: {err}");
                    skipped += 1;
                    continue;
                }
            };

            info!(
                "total incomplete tasks for user {}: {}",
                email, page.record_count
            );
            if page.record_count == 0 {
                candidates.push(user.clone());
            }

            let mut daily = DailyTaskCounts::new(&window);
            for task in &page.list {
                let Some(due_date) = task.due_date.as_deref() else {
                    warn!(
                        "task '{}' for user {} has no due date, skipping",
                        task.name.as_deref().unwrap_or("<unnamed>"),
                        email
                    );
                    continue;
                };
                if let Err(err) = daily.record(due_date) {
                    warn!(
                        "could not parse due date '{}' for task '{}' for user {}: {}",
                        due_date,
                        task.name.as_deref().unwrap_or("<unnamed>"),
                        email,
                        err
                    );
                }
            }

            rows.push(UserReportRow {
                user,
                daily,
                total_incomplete: page.record_count,
            });
        }

        let report_path = if rows.is_empty() {
            info!("no user task data to save, skipping report");
            None
        } else {
            match write_report(&rows, &window, &self.config.report_dir) {
                Ok(path) => Some(path),
                Err(err) => {
                    error!("failed to write report: {err}");
                    None
                }
            }
        };

        let uploaded = match &report_path {
            Some(path) => self.publish(path, &window),
            None => false,
        };

        let notified = self.notify(&candidates, &window);

        info!(
            "---- run finished: {} rows, {} skipped, uploaded={}, notified={}",
            rows.len(),
            skipped,
            uploaded,
            notified
        );

        Ok(RunSummary {
            window,
            users_processed: rows.len(),
            users_skipped: skipped,
            report_path,
            uploaded,
            notified,
            notification_candidates: candidates,
        })
    }

    fn publish(&self, path: &std::path::Path, window: &WeekWindow) -> bool {
        let object = object_name(&self.config.storage.folder_prefix, &report_filename(window));
        if self.config.dry_run {
            warn!(
                "dry run: upload skipped, file would be uploaded as {}",
                object
            );
            return false;
        }
        let Some(storage) = &self.storage else {
            warn!("object storage client unavailable, upload skipped");
            return false;
        };
        match storage.put_object(path, &object) {
            Ok(()) => true,
            Err(err) => {
                error!("failed to upload report: {err}");
                false
            }
        }
    }

    fn notify(&self, candidates: &[SalesUser], window: &WeekWindow) -> usize {
        if candidates.is_empty() {
            info!("all users have visit plans, no notifications needed");
            return 0;
        }
        if self.config.dry_run {
            warn!("dry run: the following users would receive a reminder:");
            for user in candidates {
                info!(
                    "  [would send to] {} ({})",
                    user.full_name(),
                    user.email_address
                );
            }
            return 0;
        }

        info!("sending reminder emails to {} users", candidates.len());
        let mut sent = 0;
        for user in candidates {
            let email = ReminderEmail {
                to: user.email_address.clone(),
                first_name: user.first_name.clone(),
                week_start: window.start_local,
                week_end: window.end_local,
            };
            match send_reminder(&self.config.smtp, &email) {
                Ok(()) => sent += 1,
                Err(err) => error!("failed to send reminder to {}: {err}", user.email_address),
            }
        }
        sent
    }
}
