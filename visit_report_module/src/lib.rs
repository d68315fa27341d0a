pub mod config;
pub mod crm;
pub mod report;
pub mod run;
pub mod storage;
pub mod users;
pub mod week;

pub use config::{AppConfig, ConfigError};
pub use crm::{CrmClient, CrmError};
pub use run::{RunError, RunSummary, Runner};
pub use users::SalesUser;
pub use week::{DailyTaskCounts, WeekWindow};
