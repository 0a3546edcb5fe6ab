//! Ticket plans produced by the ticket agent, and publishing them to Jira.
//!
//! A [`TicketPlan`] is one epic, its stories, and the tasks and tests that
//! hang off the first story. Publishing goes through the [`IssueTracker`]
//! trait so the ordering logic in [`publish_plan`] is testable without a
//! server; [`JiraClient`] is the REST v3 implementation.

use crate::error::{GenieError, Result, ValidationError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

pub const STORY_POINT_SCALE: [u8; 6] = [1, 2, 3, 5, 8, 13];

const STORY_POINTS_FIELD: &str = "customfield_10014";
const EPIC_LINK_FIELD: &str = "customfield_10011";

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub summary: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryTicket {
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_points: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketPlan {
    pub epic: Ticket,
    #[serde(default)]
    pub stories: Vec<StoryTicket>,
    #[serde(default)]
    pub tasks: Vec<Ticket>,
    #[serde(default)]
    pub tests: Vec<Ticket>,
}

impl TicketPlan {
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.epic.summary.trim().is_empty() {
            return Err(ValidationError::new("epic summary is empty"));
        }
        for story in &self.stories {
            if story.summary.trim().is_empty() {
                return Err(ValidationError::new("story summary is empty"));
            }
            if let Some(points) = story.story_points {
                if !STORY_POINT_SCALE.contains(&points) {
                    return Err(ValidationError::at_line(
                        format!(
                            "story points must be one of 1, 2, 3, 5, 8, 13 (got {points})"
                        ),
                        story.summary.clone(),
                    ));
                }
            }
        }
        if self.stories.is_empty() && !(self.tasks.is_empty() && self.tests.is_empty()) {
            return Err(ValidationError::new(
                "tasks and tests need at least one story to attach to",
            ));
        }
        Ok(())
    }

    pub fn issue_count(&self) -> usize {
        1 + self.stories.len() + self.tasks.len() + self.tests.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishedTickets {
    pub epic: String,
    pub stories: Vec<String>,
    pub tasks: Vec<String>,
    pub tests: Vec<String>,
}

// ---------------------------------------------------------------------------
// IssueTracker
// ---------------------------------------------------------------------------

/// The issue operations publishing needs. Each returns the new issue key.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn create_epic(&self, project: &str, epic: &Ticket) -> Result<String>;
    async fn create_story(&self, project: &str, story: &StoryTicket, epic_key: &str) -> Result<String>;
    async fn create_subtask(&self, project: &str, ticket: &Ticket, parent_key: &str, labels: &[&str]) -> Result<String>;
}

/// Create every issue in `plan`: epic, then stories linked to it, then
/// tasks and tests as sub-tasks of the first story. Stops at the first
/// failure; issues already created are not rolled back.
pub async fn publish_plan(
    tracker: &dyn IssueTracker,
    project: &str,
    plan: &TicketPlan,
) -> Result<PublishedTickets> {
    if project.trim().is_empty() {
        return Err(GenieError::Configuration("a Jira project key is required".into()));
    }
    plan.validate()?;

    let mut out = PublishedTickets {
        epic: tracker.create_epic(project, &plan.epic).await?,
        ..Default::default()
    };
    tracing::info!(epic = %out.epic, "created epic");

    for story in &plan.stories {
        out.stories.push(tracker.create_story(project, story, &out.epic).await?);
    }
    if let Some(parent) = out.stories.first().cloned() {
        for task in &plan.tasks {
            out.tasks.push(tracker.create_subtask(project, task, &parent, &[]).await?);
        }
        for test in &plan.tests {
            out.tests.push(tracker.create_subtask(project, test, &parent, &["test"]).await?);
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// JiraClient
// ---------------------------------------------------------------------------

/// Jira Cloud REST v3 client using basic auth (email + API token).
pub struct JiraClient {
    client: reqwest::Client,
    base_url: String,
    email: String,
    token: String,
}

fn read_env(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| GenieError::Configuration(format!("{name} is not set")))
}

/// Atlassian Document Format body holding a single paragraph.
fn adf(text: &str) -> Value {
    json!({
        "type": "doc",
        "version": 1,
        "content": [{
            "type": "paragraph",
            "content": [{ "type": "text", "text": text }]
        }]
    })
}

impl JiraClient {
    pub fn new(base_url: impl Into<String>, email: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            email: email.into(),
            token: token.into(),
        }
    }

    /// Build from the named environment variables.
    pub fn from_env(base_url_env: &str, email_env: &str, token_env: &str) -> Result<Self> {
        Ok(Self::new(
            read_env(base_url_env)?,
            read_env(email_env)?,
            read_env(token_env)?,
        ))
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Option<Value>> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.email, Some(&self.token))
            .header("Accept", "application/json")
            .timeout(Duration::from_secs(30))
            .json(body)
            .send()
            .await
            .map_err(|e| GenieError::Upstream(format!("Jira request failed: {e}")))?;

        let status = resp.status().as_u16();
        tracing::debug!(%url, status, "jira response");
        let text = resp.text().await.unwrap_or_default();
        match status {
            200..=299 if text.trim().is_empty() => Ok(None),
            200..=299 => Ok(Some(serde_json::from_str(&text)?)),
            401 | 403 => Err(GenieError::Upstream(format!(
                "Jira authentication failed ({status}): check the configured email and API token"
            ))),
            404 => Err(GenieError::NotFound(format!("Jira resource {path}: {text}"))),
            400 => Err(GenieError::Upstream(format!("Jira rejected the request (400): {text}"))),
            _ => Err(GenieError::Upstream(format!("Jira returned {status}: {text}"))),
        }
    }

    async fn create_issue(&self, fields: Value) -> Result<String> {
        let created = self
            .post("/rest/api/3/issue", &json!({ "fields": fields }))
            .await?
            .ok_or_else(|| GenieError::Upstream("Jira returned an empty issue response".into()))?;
        created["key"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GenieError::Upstream(format!("Jira issue response has no key: {created}")))
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn create_epic(&self, project: &str, epic: &Ticket) -> Result<String> {
        self.create_issue(json!({
            "project": { "key": project },
            "summary": epic.summary,
            "description": adf(&epic.description),
            "issuetype": { "name": "Epic" }
        }))
        .await
    }

    async fn create_story(&self, project: &str, story: &StoryTicket, epic_key: &str) -> Result<String> {
        let mut fields = json!({
            "project": { "key": project },
            "summary": story.summary,
            "description": adf(&story.description),
            "issuetype": { "name": "Story" }
        });
        fields[EPIC_LINK_FIELD] = json!(epic_key);
        if let Some(points) = story.story_points {
            fields[STORY_POINTS_FIELD] = json!(points);
        }
        if let Some(priority) = &story.priority {
            fields["priority"] = json!({ "name": priority });
        }
        self.create_issue(fields).await
    }

    async fn create_subtask(&self, project: &str, ticket: &Ticket, parent_key: &str, labels: &[&str]) -> Result<String> {
        let mut fields = json!({
            "project": { "key": project },
            "summary": ticket.summary,
            "description": adf(&ticket.description),
            "issuetype": { "name": "Sub-task" },
            "parent": { "key": parent_key }
        });
        if !labels.is_empty() {
            fields["labels"] = json!(labels);
        }
        self.create_issue(fields).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn plan() -> TicketPlan {
        serde_json::from_str(
            r#"{
                "epic": {"summary": "Two-factor login", "description": "2FA for all users"},
                "stories": [
                    {"summary": "Enroll TOTP", "description": "As a user...", "story_points": 5, "priority": "High"},
                    {"summary": "Recovery codes", "description": "As a user...", "story_points": 3}
                ],
                "tasks": [{"summary": "OTP verifier", "description": "RFC 6238"}],
                "tests": [{"summary": "Rejects expired OTP", "description": "..."}]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn story_points_must_be_on_scale() {
        let mut p = plan();
        p.stories[0].story_points = Some(4);
        let err = p.validate().unwrap_err();
        assert!(err.message.contains("got 4"));
        assert_eq!(err.offending_line.as_deref(), Some("Enroll TOTP"));
    }

    #[test]
    fn tasks_without_stories_are_rejected() {
        let mut p = plan();
        p.stories.clear();
        assert!(p.validate().is_err());
        assert_eq!(plan().issue_count(), 5);
    }

    #[tokio::test]
    async fn publishes_in_dependency_order() {
        let mut server = mockito::Server::new_async().await;
        let epic = server
            .mock("POST", "/rest/api/3/issue")
            .match_header("authorization", Matcher::Regex("^Basic ".into()))
            .match_body(Matcher::PartialJson(json!({"fields": {"issuetype": {"name": "Epic"}}})))
            .with_status(201)
            .with_body(r#"{"key": "GEN-1"}"#)
            .expect(1)
            .create_async()
            .await;
        let stories = server
            .mock("POST", "/rest/api/3/issue")
            .match_body(Matcher::PartialJson(json!({
                "fields": {"issuetype": {"name": "Story"}, "customfield_10011": "GEN-1"}
            })))
            .with_status(201)
            .with_body(r#"{"key": "GEN-2"}"#)
            .expect(2)
            .create_async()
            .await;
        let subtasks = server
            .mock("POST", "/rest/api/3/issue")
            .match_body(Matcher::PartialJson(json!({
                "fields": {"issuetype": {"name": "Sub-task"}, "parent": {"key": "GEN-2"}}
            })))
            .with_status(201)
            .with_body(r#"{"key": "GEN-9"}"#)
            .expect(2)
            .create_async()
            .await;

        let client = JiraClient::new(server.url(), "me@example.com", "tok");
        let out = publish_plan(&client, "GEN", &plan()).await.unwrap();
        assert_eq!(out.epic, "GEN-1");
        assert_eq!(out.stories.len(), 2);
        assert_eq!(out.tests, vec!["GEN-9"]);
        epic.assert_async().await;
        stories.assert_async().await;
        subtasks.assert_async().await;
    }

    #[tokio::test]
    async fn auth_failure_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/api/3/issue")
            .with_status(401)
            .create_async()
            .await;
        let client = JiraClient::new(server.url(), "me@example.com", "bad");
        let err = publish_plan(&client, "GEN", &plan()).await.unwrap_err();
        assert!(err.to_string().contains("authentication failed (401)"));
    }

    #[tokio::test]
    async fn missing_project_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/api/3/issue")
            .with_status(404)
            .with_body("no project")
            .create_async()
            .await;
        let client = JiraClient::new(server.url(), "me@example.com", "tok");
        let err = publish_plan(&client, "NOPE", &plan()).await.unwrap_err();
        assert!(matches!(err, GenieError::NotFound(_)));
    }

    #[test]
    fn from_env_requires_credentials() {
        let err = JiraClient::from_env(
            "REQGENIE_TEST_UNSET_JIRA_URL",
            "REQGENIE_TEST_UNSET_JIRA_EMAIL",
            "REQGENIE_TEST_UNSET_JIRA_TOKEN",
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("REQGENIE_TEST_UNSET_JIRA_URL is not set"));
    }
}
