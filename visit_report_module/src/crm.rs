//! Blocking client for the LeadSquared REST API.
//!
//! Two endpoints are consumed: advanced user search and task retrieval. Both
//! authenticate with an access/secret key pair passed as query parameters and
//! respond with PascalCase JSON.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::week::WeekWindow;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "CaptainSteel-LSQ-Notifier/1.0";

/// Task rows requested per user. The CRM caps a week of visit plans well
/// below this.
const TASK_ROW_COUNT: u32 = 200;
const USER_PAGE_SIZE: u32 = 1000;

/// Columns the task retrieval drops from the response payload.
const TASK_EXCLUDE_CSV: &str = "Category,Description,RelatedEntity,RelatedEntityId,RelatedEntityIdName,RelatedSubEntityId,\
Reminder,ReminderBeforeDays,ReminderTime,NotifyBy,\
OwnerId,OwnerName,OwnerEmailAddress,\
CreatedBy,CreatedByName,CreatedOn,\
ModifiedBy,ModifiedByName,ModifiedOn,\
CompletedOn,CompletedBy,CompletedByName,\
EndDate,EffortEstimateUnit,PercentCompleted,Priority,\
Location,Latitude,Longitude,\
TaskType,CustomFields";

const USER_INCLUDE_CSV: &str =
    "UserID,FirstName,LastName,EmailAddress,Role,StatusCode,Team,TeamId,EmployeeId";

#[derive(Debug, thiserror::Error)]
pub enum CrmError {
    #[error("crm request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Filter applied by the advanced user search: active users in one region,
/// minus administrative roles and the head-office team.
#[derive(Debug, Clone)]
pub struct UserSearchFilter {
    pub region: String,
    pub excluded_roles: Vec<String>,
    pub excluded_team: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrmUser {
    #[serde(rename = "UserID")]
    pub user_id: Option<String>,
    #[serde(rename = "FirstName")]
    pub first_name: Option<String>,
    #[serde(rename = "LastName")]
    pub last_name: Option<String>,
    #[serde(rename = "EmailAddress")]
    pub email_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserSearchResponse {
    #[serde(rename = "SearchInfo")]
    search_info: Option<serde_json::Value>,
    #[serde(rename = "Users", default)]
    users: Vec<CrmUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrmTask {
    #[serde(rename = "DueDate")]
    pub due_date: Option<String>,
    #[serde(rename = "Name")]
    pub name: Option<String>,
    #[serde(rename = "StatusCode")]
    pub status_code: Option<i64>,
}

/// One page of open visit-plan tasks for a user.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskPage {
    #[serde(rename = "RecordCount", default)]
    pub record_count: i64,
    #[serde(rename = "List", default)]
    pub list: Vec<CrmTask>,
}

pub struct CrmClient {
    client: reqwest::blocking::Client,
    host: String,
    access_key: String,
    secret_key: String,
    visit_plan_type: String,
    user_filter: UserSearchFilter,
}

impl CrmClient {
    pub fn new(
        host: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        visit_plan_type: impl Into<String>,
        user_filter: UserSearchFilter,
    ) -> Result<Self, CrmError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            host: host.into().trim_end_matches('/').to_string(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            visit_plan_type: visit_plan_type.into(),
            user_filter,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        payload: &serde_json::Value,
    ) -> Result<T, CrmError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .query(&[
                ("accessKey", self.access_key.as_str()),
                ("secretKey", self.secret_key.as_str()),
            ])
            .json(payload)
            .send()?
            .error_for_status()?;
        Ok(response.json()?)
    }

    /// Fetch the active sales roster via the advanced search endpoint.
    pub fn advanced_user_search(&self) -> Result<Vec<CrmUser>, CrmError> {
        let mut conditions: Vec<serde_json::Value> = vec![
            json!({
                "LookupName": "StatusCode",
                "Operator": "eq",
                "LookupValue": 0,
                "ConditionOperator": "AND"
            }),
            json!({
                "LookupName": "State",
                "Operator": "eq",
                "LookupValue": self.user_filter.region,
                "ConditionOperator": "AND"
            }),
        ];
        for role in &self.user_filter.excluded_roles {
            conditions.push(json!({
                "LookupName": "Role",
                "Operator": "neq",
                "LookupValue": role,
                "ConditionOperator": "AND"
            }));
        }
        conditions.push(json!({
            "LookupName": "Team",
            "Operator": "neq",
            "LookupValue": self.user_filter.excluded_team,
            "ConditionOperator": null
        }));

        let payload = json!({
            "Columns": { "Include_CSV": USER_INCLUDE_CSV },
            "GroupConditions": [
                { "Condition": conditions, "GroupOperator": null }
            ],
            "Paging": { "PageIndex": 1, "PageSize": USER_PAGE_SIZE }
        });

        let response: UserSearchResponse =
            self.post_json("/v2/UserManagement.svc/User.AdvancedSearch", &payload)?;
        if let Some(info) = &response.search_info {
            tracing::info!("user search info: {}", info);
        }
        Ok(response.users)
    }

    /// Fetch the open visit-plan tasks for one user inside the week window,
    /// sorted ascending by due date.
    pub fn retrieve_tasks(&self, email: &str, window: &WeekWindow) -> Result<TaskPage, CrmError> {
        let payload = json!({
            "Parameter": {
                "LookupName": "OwnerEmailAddress",
                "LookupValue": email,
                "FromDate": window.from_date_str(),
                "ToDate": window.to_date_str(),
                "StatusCode": 0,
                "TypeName": self.visit_plan_type,
            },
            "Columns": { "Exclude_CSV": TASK_EXCLUDE_CSV },
            "Sorting": { "ColumnName": "Duedate", "Direction": 1 },
            "Paging": { "Offset": 0, "RowCount": TASK_ROW_COUNT }
        });

        self.post_json("/v2/Task.svc/Retrieve", &payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone, Utc};
    use mockito::{Matcher, Server};

    fn test_filter() -> UserSearchFilter {
        UserSearchFilter {
            region: "West Bengal".to_string(),
            excluded_roles: vec!["Administrator".to_string(), "Marketing_User".to_string()],
            excluded_team: "Captain Steel India Limited".to_string(),
        }
    }

    fn test_window() -> WeekWindow {
        let offset = FixedOffset::east_opt(330 * 60).unwrap();
        WeekWindow::compute(Utc.with_ymd_and_hms(2025, 3, 12, 10, 0, 0).unwrap(), offset)
    }

    fn client(server: &Server) -> CrmClient {
        CrmClient::new(server.url(), "ak", "sk", "visit-plan-type", test_filter())
            .expect("client builds")
    }

    #[test]
    fn user_search_sends_filter_and_parses_users() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/v2/UserManagement.svc/User.AdvancedSearch")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("accessKey".into(), "ak".into()),
                Matcher::UrlEncoded("secretKey".into(), "sk".into()),
            ]))
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(serde_json::json!({
                    "Paging": { "PageIndex": 1, "PageSize": 1000 }
                })),
                Matcher::Regex("West Bengal".to_string()),
                Matcher::Regex("Marketing_User".to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"SearchInfo":{"TotalRecords":2},"Users":[
                    {"UserID":"u1","FirstName":"Asha","LastName":"Rao","EmailAddress":"asha@example.com"},
                    {"UserID":"u2","FirstName":"Dev","LastName":"Sen","EmailAddress":"dev@example.com"}
                ]}"#,
            )
            .expect(1)
            .create();

        let users = client(&server).advanced_user_search().expect("search users");
        mock.assert();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].email_address.as_deref(), Some("asha@example.com"));
    }

    #[test]
    fn user_search_http_failure_is_an_error_not_an_empty_list() {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/v2/UserManagement.svc/User.AdvancedSearch")
            .match_query(Matcher::Any)
            .with_status(500)
            .create();

        let err = client(&server).advanced_user_search().unwrap_err();
        assert!(matches!(err, CrmError::Http(_)));
    }

    #[test]
    fn task_retrieve_sends_window_and_parses_page() {
        let mut server = Server::new();
        let window = test_window();
        let mock = server
            .mock("POST", "/v2/Task.svc/Retrieve")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "Parameter": {
                    "LookupName": "OwnerEmailAddress",
                    "LookupValue": "asha@example.com",
                    "FromDate": "2025-03-09 18:30:00",
                    "ToDate": "2025-03-15 18:29:59",
                    "StatusCode": 0,
                    "TypeName": "visit-plan-type"
                },
                "Sorting": { "ColumnName": "Duedate", "Direction": 1 },
                "Paging": { "Offset": 0, "RowCount": 200 }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"RecordCount":1,"List":[
                    {"Name":"Visit dealer","DueDate":"2025-03-11 04:30:00.0000000","StatusCode":0}
                ]}"#,
            )
            .expect(1)
            .create();

        let page = client(&server)
            .retrieve_tasks("asha@example.com", &window)
            .expect("retrieve tasks");
        mock.assert();
        assert_eq!(page.record_count, 1);
        assert_eq!(page.list[0].due_date.as_deref(), Some("2025-03-11 04:30:00.0000000"));
    }

    #[test]
    fn task_retrieve_maps_transport_failure_to_error() {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/v2/Task.svc/Retrieve")
            .match_query(Matcher::Any)
            .with_status(502)
            .create();

        let err = client(&server)
            .retrieve_tasks("asha@example.com", &test_window())
            .unwrap_err();
        assert!(matches!(err, CrmError::Http(_)));
    }
}
