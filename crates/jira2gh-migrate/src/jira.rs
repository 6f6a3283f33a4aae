//! JIRA source fetch pipeline.
//!
//! Fetches a project's issue keys, retrieves each issue's full JSON, and
//! parses the documents into the normalized issue model. The same parser
//! also consumes offline caches produced by [`JiraClient::download`].

use crate::error::{MigrationError, Result};
use crate::render::Render;
use crate::types::{Comment, Issue, Status, StatusReason};
use crate::users::UserMapper;

use chrono::{DateTime, FixedOffset};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

/// Timestamp format used by the JIRA REST API (`yyyy-MM-dd'T'HH:mm:ss.SSSZ`).
const JIRA_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

fn jira_date<'de, D>(deserializer: D) -> std::result::Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    DateTime::parse_from_str(&raw, JIRA_DATE_FORMAT).map_err(serde::de::Error::custom)
}

fn jira_date_opt<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<FixedOffset>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|s| DateTime::parse_from_str(&s, JIRA_DATE_FORMAT).map_err(serde::de::Error::custom))
        .transpose()
}

/// JIRA REST API response types
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct SearchResult {
    #[serde(rename = "startAt")]
    start_at: u64,
    total: u64,
    issues: Vec<IssueKey>,
}

#[derive(Debug, Deserialize)]
struct IssueKey {
    key: String,
}

#[derive(Debug, Deserialize)]
struct IssueDoc {
    key: String,
    fields: IssueFields,
}

#[derive(Debug, Deserialize)]
struct IssueFields {
    assignee: Option<JiraUser>,
    creator: Option<JiraUser>,
    reporter: Option<JiraUser>,
    #[serde(deserialize_with = "jira_date")]
    created: DateTime<FixedOffset>,
    #[serde(deserialize_with = "jira_date")]
    updated: DateTime<FixedOffset>,
    #[serde(default, rename = "resolutiondate", deserialize_with = "jira_date_opt")]
    resolution_date: Option<DateTime<FixedOffset>>,
    #[serde(rename = "issuetype")]
    #[allow(dead_code)]
    issue_type: Option<IssueType>,
    description: Option<String>,
    summary: String,
    comment: Option<CommentContainer>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct IssueType {
    id: String,
    name: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentContainer {
    comments: Vec<CommentDoc>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct CommentDoc {
    author: JiraUser,
    #[serde(rename = "updateAuthor")]
    update_author: Option<JiraUser>,
    #[serde(deserialize_with = "jira_date")]
    created: DateTime<FixedOffset>,
    #[serde(default, deserialize_with = "jira_date_opt")]
    updated: Option<DateTime<FixedOffset>>,
    body: String,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct JiraUser {
    key: Option<String>,
    name: String,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    #[serde(default)]
    active: bool,
}

/// Parses JIRA issue JSON into the normalized issue model.
///
/// Normalization happens here: every embedded user goes through the
/// [`UserMapper`] and every markup field through the [`Render`] seam, so
/// downstream components only see GitHub usernames and rendered text.
pub struct IssueParser {
    users: UserMapper,
    render: Box<dyn Render>,
}

impl IssueParser {
    /// Create a new parser.
    pub fn new(users: UserMapper, render: Box<dyn Render>) -> Self {
        Self { users, render }
    }

    /// Parse one JIRA issue document. `origin` names the source of the JSON
    /// (a URL or a file path) for error reporting.
    pub fn parse_str(&self, json: &str, origin: &str) -> Result<Issue> {
        let doc: IssueDoc = serde_json::from_str(json).map_err(|e| MigrationError::ParseFailed {
            origin: origin.to_string(),
            message: e.to_string(),
        })?;
        self.normalize(doc, origin)
    }

    /// Parse issues from a path. A directory yields one issue per `*.json`
    /// file (scanned in file-name order); a single file yields exactly one.
    pub fn parse_path(&self, path: &Path) -> Result<Vec<Issue>> {
        if path.is_dir() {
            let mut files: Vec<PathBuf> = fs::read_dir(path)?
                .collect::<std::io::Result<Vec<_>>>()?
                .into_iter()
                .map(|entry| entry.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect();
            files.sort();

            let mut issues = Vec::with_capacity(files.len());
            for file in &files {
                let content = fs::read_to_string(file)?;
                issues.push(self.parse_str(&content, &file.display().to_string())?);
            }
            Ok(issues)
        } else {
            let content = fs::read_to_string(path)?;
            Ok(vec![self.parse_str(&content, &path.display().to_string())?])
        }
    }

    fn normalize(&self, doc: IssueDoc, origin: &str) -> Result<Issue> {
        if doc.key.is_empty() {
            return Err(MigrationError::ParseFailed {
                origin: origin.to_string(),
                message: "issue key is empty".to_string(),
            });
        }

        let fields = doc.fields;
        let reporter = fields.reporter.or(fields.creator).ok_or_else(|| {
            MigrationError::ParseFailed {
                origin: origin.to_string(),
                message: format!("issue {} has neither reporter nor creator", doc.key),
            }
        })?;

        let status = if fields.resolution_date.is_some() {
            Status::Closed
        } else {
            Status::Open
        };
        let status_reason = fields.resolution_date.map(|_| StatusReason::Completed);

        let comments = fields
            .comment
            .map(|container| container.comments)
            .unwrap_or_default()
            .into_iter()
            .map(|c| Comment {
                author: self.users.map(&c.author.name),
                created: c.created,
                body: self.render.render(&c.body),
            })
            .collect();

        Ok(Issue {
            key: doc.key,
            summary: fields.summary,
            description: self.render.render(fields.description.as_deref().unwrap_or("")),
            created_by: self.users.map(&reporter.name),
            assignee: fields.assignee.map(|u| self.users.map(&u.name)),
            status,
            status_reason,
            created: fields.created,
            updated: fields.updated,
            resolved: fields.resolution_date,
            comments,
        })
    }
}

/// Client for the source JIRA instance.
pub struct JiraClient {
    client: Client,
    base_url: Url,
    project: String,
    parser: IssueParser,
}

impl JiraClient {
    /// Create a new client. The base URL must be absolute; its path is
    /// normalized to a trailing slash.
    pub fn new(base_url: &str, project: impl Into<String>, parser: IssueParser) -> Result<Self> {
        let base_url = normalize_base_url(base_url)?;
        let client = Client::builder()
            .user_agent("jira2gh-migrate")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| MigrationError::NetworkError(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            project: project.into(),
            parser,
        })
    }

    /// The browse URL for an issue key on this instance.
    pub fn browse_url(&self, key: &str) -> String {
        format!("{}browse/{key}", self.base_url)
    }

    /// The parser used for issue documents, also usable for offline caches.
    pub fn parser(&self) -> &IssueParser {
        &self.parser
    }

    /// List the project's issue keys, ordered by priority descending then
    /// last-updated descending (the order the search endpoint returns).
    pub async fn list_issue_keys(&self) -> Result<Vec<String>> {
        let url = self.search_url();
        debug!("Listing issue keys from {url}");
        let (status, body) = self.get_raw(&url).await?;
        let result: SearchResult =
            serde_json::from_str(&body).map_err(|_| MigrationError::FetchFailed {
                url,
                status: status.as_u16(),
                body: body.clone(),
            })?;
        Ok(result.issues.into_iter().map(|i| i.key).collect())
    }

    /// Fetch and parse one issue's full detail.
    pub async fn fetch_issue(&self, key: &str) -> Result<Issue> {
        let url = self.issue_url(key);
        let (_, body) = self.get_raw(&url).await?;
        self.parser.parse_str(&body, &url)
    }

    /// Fetch every issue of the project. Fail-fast: the first per-issue
    /// error aborts the whole operation and discards anything already
    /// fetched, so a partial issue set can never reach creation.
    pub async fn fetch(&self) -> Result<Vec<Issue>> {
        let keys = self.list_issue_keys().await?;
        info!("Fetching {} issues from project {}", keys.len(), self.project);

        let mut issues = Vec::with_capacity(keys.len());
        for key in &keys {
            issues.push(self.fetch_issue(key).await?);
        }
        Ok(issues)
    }

    /// Download every issue's raw JSON into `dir` as `<key>.json`, for later
    /// offline runs via [`IssueParser::parse_path`].
    pub async fn download(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let keys = self.list_issue_keys().await?;
        info!("Downloading {} issues to {}", keys.len(), dir.display());
        fs::create_dir_all(dir)?;

        let mut written = Vec::with_capacity(keys.len());
        for key in &keys {
            let url = self.issue_url(key);
            let (_, body) = self.get_raw(&url).await?;
            let file = dir.join(format!("{key}.json"));
            fs::write(&file, &body)?;
            debug!("Wrote {}", file.display());
            written.push(file);
        }
        Ok(written)
    }

    async fn get_raw(&self, url: &str) -> Result<(StatusCode, String)> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| MigrationError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MigrationError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            return Err(MigrationError::FetchFailed {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok((status, body))
    }

    fn search_url(&self) -> String {
        format!(
            "{}rest/api/2/search?jql=project+%3D+{}+AND+resolution+%3D+Unresolved+ORDER+BY+priority+DESC%2C+updated+DESC",
            self.base_url, self.project
        )
    }

    fn issue_url(&self, key: &str) -> String {
        format!("{}rest/api/2/issue/{key}", self.base_url)
    }
}

fn normalize_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)
        .map_err(|e| MigrationError::InvalidConfig(format!("invalid JIRA URL {raw}: {e}")))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
