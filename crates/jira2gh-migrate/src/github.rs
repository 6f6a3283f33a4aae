//! GitHub target client.

use crate::error::{MigrationError, Result};
use crate::payload::{CommentCreatePayload, IssueCreatePayload, IssueUpdatePayload};

use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: Option<String>,
}

/// Client for the target GitHub repository.
///
/// Every write authenticates with a bearer token chosen by the acting
/// author's username, falling back to the default token when no per-author
/// entry exists.
pub struct GitHubClient {
    client: Client,
    api_url: String,
    owner: String,
    repo: String,
    tokens: HashMap<String, String>,
    default_token: String,
}

impl GitHubClient {
    /// Create a new client against the public GitHub API.
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        default_token: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent("jira2gh-migrate")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| MigrationError::NetworkError(e.to_string()))?;

        Ok(Self {
            client,
            api_url: "https://api.github.com".to_string(),
            owner: owner.into(),
            repo: repo.into(),
            tokens: HashMap::new(),
            default_token: default_token.into(),
        })
    }

    /// Override the API base URL.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Add a token used when acting as the given GitHub user.
    pub fn with_author_token(
        mut self,
        author: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        self.tokens.insert(author.into(), token.into());
        self
    }

    /// Replace the whole per-author token table.
    pub fn with_author_tokens(mut self, tokens: HashMap<String, String>) -> Self {
        self.tokens = tokens;
        self
    }

    fn token_for(&self, author: &str) -> &str {
        self.tokens.get(author).unwrap_or(&self.default_token)
    }

    /// Create an issue, acting as `author`. Returns the assigned number.
    pub async fn create_issue(&self, author: &str, payload: &IssueCreatePayload) -> Result<u64> {
        let url = format!("{}/repos/{}/{}/issues", self.api_url, self.owner, self.repo);
        let request = self.client.post(&url).json(payload);
        let (status, body) = self.execute(request, self.token_for(author)).await?;

        if status != 201 {
            return Err(MigrationError::CreateFailed {
                status,
                message: error_message(&body),
            });
        }

        let created: CreatedIssue = serde_json::from_str(&body)?;
        debug!("Created issue #{} from {url}", created.number);
        Ok(created.number)
    }

    /// Create a comment on an already-created issue, acting as `author`.
    pub async fn create_comment(
        &self,
        author: &str,
        number: u64,
        payload: &CommentCreatePayload,
    ) -> Result<()> {
        let url = format!(
            "{}/repos/{}/{}/issues/{number}/comments",
            self.api_url, self.owner, self.repo
        );
        let request = self.client.post(&url).json(payload);
        let (status, body) = self.execute(request, self.token_for(author)).await?;

        if status != 201 {
            return Err(MigrationError::CreateFailed {
                status,
                message: error_message(&body),
            });
        }
        Ok(())
    }

    /// Replace an issue's body. Authenticated with the default token.
    pub async fn update_issue(&self, number: u64, payload: &IssueUpdatePayload) -> Result<()> {
        let url = format!(
            "{}/repos/{}/{}/issues/{number}",
            self.api_url, self.owner, self.repo
        );
        let request = self.client.patch(&url).json(payload);
        let (status, body) = self.execute(request, &self.default_token).await?;

        if !(200..300).contains(&status) {
            return Err(MigrationError::UpdateFailed {
                status,
                message: error_message(&body),
            });
        }
        Ok(())
    }

    async fn execute(&self, request: RequestBuilder, token: &str) -> Result<(u16, String)> {
        let response = request
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {token}"))
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await
            .map_err(|e| MigrationError::NetworkError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| MigrationError::NetworkError(e.to_string()))?;
        Ok((status, body))
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiMessage>(body)
        .ok()
        .and_then(|m| m.message)
        .unwrap_or_else(|| "<no message>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_payload() -> IssueCreatePayload {
        IssueCreatePayload {
            title: "Something is broken".to_string(),
            body: "imported".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_issue_returns_assigned_number() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/repos/owner/repo/issues"))
            .and(header("Authorization", "Bearer ghp_default"))
            .and(header("X-GitHub-Api-Version", "2022-11-28"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "number": 42
            })))
            .mount(&mock_server)
            .await;

        let client = GitHubClient::new("owner", "repo", "ghp_default")
            .unwrap()
            .with_api_url(mock_server.uri());
        let number = client.create_issue("anyone", &create_payload()).await.unwrap();
        assert_eq!(number, 42);
    }

    #[tokio::test]
    async fn test_create_issue_uses_author_token_when_present() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/repos/owner/repo/issues"))
            .and(header("Authorization", "Bearer ghp_john"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "number": 7
            })))
            .mount(&mock_server)
            .await;

        let client = GitHubClient::new("owner", "repo", "ghp_default")
            .unwrap()
            .with_api_url(mock_server.uri())
            .with_author_token("john-doe", "ghp_john");
        let number = client.create_issue("john-doe", &create_payload()).await.unwrap();
        assert_eq!(number, 7);
    }

    #[tokio::test]
    async fn test_create_issue_failure_carries_status_and_message() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/repos/owner/repo/issues"))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
                "message": "Validation Failed"
            })))
            .mount(&mock_server)
            .await;

        let client = GitHubClient::new("owner", "repo", "ghp_default")
            .unwrap()
            .with_api_url(mock_server.uri());
        match client.create_issue("anyone", &create_payload()).await.unwrap_err() {
            MigrationError::CreateFailed { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "Validation Failed");
            }
            other => panic!("expected CreateFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_comment_posts_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/repos/owner/repo/issues/42/comments"))
            .and(body_json_string(r#"{"body": "a comment"}"#))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 1})))
            .mount(&mock_server)
            .await;

        let client = GitHubClient::new("owner", "repo", "ghp_default")
            .unwrap()
            .with_api_url(mock_server.uri());
        let payload = CommentCreatePayload {
            body: "a comment".to_string(),
        };
        client.create_comment("anyone", 42, &payload).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_issue_patches_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/repos/owner/repo/issues/42"))
            .and(body_json_string(r#"{"body": "fixed #11"}"#))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "number": 42
            })))
            .mount(&mock_server)
            .await;

        let client = GitHubClient::new("owner", "repo", "ghp_default")
            .unwrap()
            .with_api_url(mock_server.uri());
        let payload = IssueUpdatePayload {
            body: "fixed #11".to_string(),
        };
        client.update_issue(42, &payload).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_issue_failure_carries_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/repos/owner/repo/issues/42"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "message": "Not Found"
            })))
            .mount(&mock_server)
            .await;

        let client = GitHubClient::new("owner", "repo", "ghp_default")
            .unwrap()
            .with_api_url(mock_server.uri());
        let payload = IssueUpdatePayload {
            body: "body".to_string(),
        };
        match client.update_issue(42, &payload).await.unwrap_err() {
            MigrationError::UpdateFailed { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Not Found");
            }
            other => panic!("expected UpdateFailed, got {other:?}"),
        }
    }
}
