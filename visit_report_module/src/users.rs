//! Active sales roster loading.
//!
//! Two interchangeable strategies: a single externally-configured SQL query
//! against the relational store (preferred), or the CRM's advanced user
//! search when no database is configured. Either way a failure is an error,
//! never an empty list - the run cannot proceed without a roster.

use postgres_native_tls::MakeTlsConnector;
use tracing::info;

use crate::config::DbConfig;
use crate::crm::{CrmClient, CrmError, CrmUser};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesUser {
    pub email_address: String,
    pub first_name: String,
    pub last_name: String,
}

impl SalesUser {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

impl From<CrmUser> for SalesUser {
    fn from(user: CrmUser) -> Self {
        Self {
            email_address: user.email_address.unwrap_or_default(),
            first_name: user.first_name.unwrap_or_default(),
            last_name: user.last_name.unwrap_or_default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UserSourceError {
    #[error("database error: {0}")]
    Postgres(#[from] postgres::Error),
    #[error("tls setup failed: {0}")]
    Tls(#[from] native_tls::Error),
    #[error("crm user search failed: {0}")]
    Crm(#[from] CrmError),
}

/// Run the configured roster query against the relational store. The
/// connection lives only for this call.
pub fn fetch_users_from_db(db: &DbConfig) -> Result<Vec<SalesUser>, UserSourceError> {
    let connector = MakeTlsConnector::new(native_tls::TlsConnector::new()?);
    let mut client = postgres::Config::new()
        .host(&db.host)
        .port(db.port)
        .user(&db.user)
        .password(&db.password)
        .dbname(&db.name)
        .connect(connector)?;

    let rows = client.query(db.query.as_str(), &[])?;
    let mut users = Vec::with_capacity(rows.len());
    for row in &rows {
        users.push(SalesUser {
            email_address: row.try_get("email_address")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
        });
    }
    info!("found {} total active sales users from database", users.len());
    Ok(users)
}

/// Fallback roster via the CRM advanced search.
pub fn fetch_users_from_api(crm: &CrmClient) -> Result<Vec<SalesUser>, UserSourceError> {
    let users: Vec<SalesUser> = crm
        .advanced_user_search()?
        .into_iter()
        .map(SalesUser::from)
        .collect();
    info!("found {} total active sales users from crm", users.len());
    Ok(users)
}

/// Load the roster with whichever strategy is configured.
pub fn load_users(
    db: Option<&DbConfig>,
    crm: &CrmClient,
) -> Result<Vec<SalesUser>, UserSourceError> {
    match db {
        Some(db) => fetch_users_from_db(db),
        None => fetch_users_from_api(crm),
    }
}
