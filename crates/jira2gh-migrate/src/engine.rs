//! Two-pass migration engine.
//!
//! Pass 1 creates every issue (and its comments) on GitHub with bodies that
//! may still hold unresolved JIRA keys, growing the key-to-number mapping as
//! numbers are assigned. Pass 2 runs only after pass 1 has finished for the
//! whole set, and replays each created issue's stored pass-1 body through the
//! resolver against the now-complete mapping. Forward references are
//! impossible to resolve at creation time, which is what forces the split.

use crate::error::{MigrationError, Result};
use crate::github::GitHubClient;
use crate::jira::{IssueParser, JiraClient};
use crate::mapping::IssueMapping;
use crate::payload;
use crate::progress::{MigrationPhase, MigrationProgress};
use crate::render::{Render, VerbatimRenderer};
use crate::types::{
    Comment, FailurePhase, Issue, MigrationConfig, MigrationOptions, MigrationReport,
};
use crate::users::UserMapper;

use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Per-issue migration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueState {
    /// Not yet submitted to the target.
    Pending,
    /// Created on the target; the body may still hold unresolved references.
    Created,
    /// Body corrected against the complete mapping. Terminal.
    Corrected,
    /// A step failed; the report carries the context.
    Failed,
}

#[derive(Debug)]
struct IssueRecord {
    state: IssueState,
    number: Option<u64>,
    /// Body submitted in pass 1, replayed verbatim through the resolver in
    /// pass 2 so the preamble and rendered markup are rewritten identically.
    original_body: Option<String>,
}

/// Migrator for JIRA projects.
pub struct JiraMigrator {
    jira: JiraClient,
    github: GitHubClient,
    config: MigrationConfig,
    options: MigrationOptions,
    mapping: IssueMapping,
    records: HashMap<String, IssueRecord>,
    dry_run_counter: u64,
    progress: MigrationProgress,
}

impl JiraMigrator {
    /// Create a new migrator with the verbatim markup renderer.
    pub fn new(config: MigrationConfig, options: MigrationOptions) -> Result<Self> {
        Self::with_renderer(config, options, Box::new(VerbatimRenderer))
    }

    /// Create a new migrator with an explicit markup renderer.
    pub fn with_renderer(
        config: MigrationConfig,
        options: MigrationOptions,
        render: Box<dyn Render>,
    ) -> Result<Self> {
        let token = match (&config.default_token, options.dry_run) {
            (Some(token), _) => token.clone(),
            (None, true) => String::new(),
            (None, false) => {
                return Err(MigrationError::InvalidConfig(
                    "a GitHub token is required unless running dry".to_string(),
                ))
            }
        };

        let users = UserMapper::new(options.user_mapping.clone());
        let parser = IssueParser::new(users, render);
        let jira = JiraClient::new(&config.jira_url, config.project.clone(), parser)?;
        let github = GitHubClient::new(config.owner.clone(), config.repo.clone(), token)?
            .with_api_url(config.github_api.clone())
            .with_author_tokens(options.author_tokens.clone());

        Ok(Self {
            jira,
            github,
            config,
            options,
            mapping: IssueMapping::new(),
            records: HashMap::new(),
            dry_run_counter: 0,
            progress: MigrationProgress::new(),
        })
    }

    /// Set a progress tracker.
    pub fn with_progress(mut self, progress: MigrationProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Read-only view of the mapping built so far.
    pub fn mapping(&self) -> &IssueMapping {
        &self.mapping
    }

    /// Migration state of one issue, if it was part of this run.
    pub fn issue_state(&self, key: &str) -> Option<IssueState> {
        self.records.get(key).map(|record| record.state)
    }

    /// Fetch the project from JIRA and migrate it.
    pub async fn run(&mut self) -> Result<MigrationReport> {
        self.progress.set_phase(MigrationPhase::FetchingIssues, 1);
        let issues = self.jira.fetch().await?;
        self.migrate(&issues).await
    }

    /// Parse an offline cache (a `<key>.json` directory or a single file)
    /// and migrate it.
    pub async fn run_from_path(&mut self, path: &Path) -> Result<MigrationReport> {
        let issues = self.jira.parser().parse_path(path)?;
        self.migrate(&issues).await
    }

    /// Run the two-pass protocol over an already-fetched issue set,
    /// processed in input order.
    pub async fn migrate(&mut self, issues: &[Issue]) -> Result<MigrationReport> {
        let mut report = MigrationReport::new();
        report.dry_run = self.options.dry_run;
        report.issues_total = issues.len();

        info!(
            "Migrating {} issues from {} to {}/{}",
            issues.len(),
            self.config.project,
            self.config.owner,
            self.config.repo
        );

        for issue in issues {
            self.records.insert(
                issue.key.clone(),
                IssueRecord {
                    state: IssueState::Pending,
                    number: None,
                    original_body: None,
                },
            );
        }

        // Pass 1: create issues and comments. The mapping grows one entry
        // per created issue.
        self.progress
            .set_phase(MigrationPhase::CreatingIssues, issues.len() as u64);
        for issue in issues {
            if let Err(e) = self.create_issue(issue).await {
                self.set_state(&issue.key, IssueState::Failed);
                report.add_failure(&issue.key, FailurePhase::Create, &e.to_string());
                if self.options.fail_fast {
                    report.complete();
                    return Err(e);
                }
                warn!("Skipping {} after create failure: {e}", issue.key);
                self.progress.increment(Some(&issue.key));
                continue;
            }
            report.issues_created += 1;

            for (index, comment) in issue.comments.iter().enumerate() {
                match self.create_comment(issue, comment).await {
                    Ok(()) => report.comments_created += 1,
                    Err(e) => {
                        report.add_failure(&issue.key, FailurePhase::Comment, &e.to_string());
                        if self.options.fail_fast {
                            report.complete();
                            return Err(e);
                        }
                        warn!("Comment {index} of {} failed: {e}", issue.key);
                    }
                }
            }
            self.progress.increment(Some(&issue.key));
        }

        // Strict barrier: pass 2 only starts once pass 1 has finished for
        // the whole set, so the mapping is as complete as it will get.
        let created = issues
            .iter()
            .filter(|i| self.issue_state(&i.key) == Some(IssueState::Created))
            .count();
        self.progress
            .set_phase(MigrationPhase::CorrectingIssues, created as u64);
        for issue in issues {
            let Some(record) = self.records.get(&issue.key) else {
                continue;
            };
            if record.state != IssueState::Created {
                continue;
            }
            let (Some(number), Some(original_body)) =
                (record.number, record.original_body.clone())
            else {
                continue;
            };

            match self.correct_issue(issue, number, &original_body).await {
                Ok(()) => {
                    self.set_state(&issue.key, IssueState::Corrected);
                    report.issues_corrected += 1;
                }
                Err(e) => {
                    // Stays Created: the update is idempotent, so retrying
                    // pass 2 for just this issue later is safe.
                    report.add_failure(&issue.key, FailurePhase::Correct, &e.to_string());
                    if self.options.fail_fast {
                        report.complete();
                        return Err(e);
                    }
                    warn!("Correction of {} failed: {e}", issue.key);
                }
            }
            self.progress.increment(Some(&issue.key));
        }

        self.progress.set_phase(MigrationPhase::Complete, 1);
        report.complete();
        info!(
            "Migration finished: {} created, {} corrected, {} failures",
            report.issues_created,
            report.issues_corrected,
            report.failures.len()
        );
        Ok(report)
    }

    async fn create_issue(&mut self, issue: &Issue) -> Result<()> {
        let payload = payload::issue_create_payload(issue, &self.jira.browse_url(&issue.key));
        let number = if self.options.dry_run {
            self.dry_run_counter += 1;
            debug!("[dry-run] would create {} as #{}", issue.key, self.dry_run_counter);
            self.dry_run_counter
        } else {
            self.github.create_issue(&issue.created_by, &payload).await?
        };

        self.mapping.record(issue.key.clone(), number);
        if let Some(record) = self.records.get_mut(&issue.key) {
            record.state = IssueState::Created;
            record.number = Some(number);
            record.original_body = Some(payload.body);
        }
        info!("Created {} as issue #{number}", issue.key);
        Ok(())
    }

    async fn create_comment(&self, issue: &Issue, comment: &Comment) -> Result<()> {
        // Building the payload validates the mapping invariant, so an
        // unmapped key fails here before any network call.
        let payload = payload::comment_create_payload(issue, comment, &self.mapping)?;
        let number = self
            .mapping
            .lookup(&issue.key)
            .ok_or_else(|| MigrationError::UnmappedKey(issue.key.clone()))?;

        if self.options.dry_run {
            debug!("[dry-run] would comment on #{number}");
            return Ok(());
        }
        self.github.create_comment(&comment.author, number, &payload).await
    }

    async fn correct_issue(&self, issue: &Issue, number: u64, original_body: &str) -> Result<()> {
        let payload = payload::issue_update_payload(issue, original_body, &self.mapping)?;
        if self.options.dry_run {
            debug!("[dry-run] would update #{number} for {}", issue.key);
            return Ok(());
        }
        self.github.update_issue(number, &payload).await
    }

    fn set_state(&mut self, key: &str, state: IssueState) {
        if let Some(record) = self.records.get_mut(key) {
            record.state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Status;
    use chrono::DateTime;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn issue(key: &str, summary: &str, description: &str, comments: Vec<Comment>) -> Issue {
        Issue {
            key: key.to_string(),
            summary: summary.to_string(),
            description: description.to_string(),
            created_by: "john-doe".to_string(),
            assignee: None,
            status: Status::Open,
            status_reason: None,
            created: DateTime::parse_from_rfc3339("2013-05-21T09:52:13+00:00").unwrap(),
            updated: DateTime::parse_from_rfc3339("2014-01-02T10:00:00+00:00").unwrap(),
            resolved: None,
            comments,
        }
    }

    fn comment(body: &str) -> Comment {
        Comment {
            author: "rsmith".to_string(),
            created: DateTime::parse_from_rfc3339("2013-06-01T08:00:00+00:00").unwrap(),
            body: body.to_string(),
        }
    }

    fn config(server: &MockServer) -> MigrationConfig {
        MigrationConfig::new(server.uri(), "PROJ", "owner", "repo")
            .with_token("ghp_default")
            .with_github_api(server.uri())
    }

    async fn mount_create(server: &MockServer, title: &str, number: u64) {
        Mock::given(method("POST"))
            .and(path("/repos/owner/repo/issues"))
            .and(body_partial_json(serde_json::json!({ "title": title })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({ "number": number })),
            )
            .mount(server)
            .await;
    }

    async fn mount_update(server: &MockServer, number: u64) {
        Mock::given(method("PATCH"))
            .and(path(format!("/repos/owner/repo/issues/{number}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "number": number })),
            )
            .mount(server)
            .await;
    }

    fn patched_body(requests: &[wiremock::Request], issue_path: &str) -> String {
        let request = requests
            .iter()
            .find(|r| r.method.as_str() == "PATCH" && r.url.path() == issue_path)
            .unwrap_or_else(|| panic!("no PATCH to {issue_path}"));
        let value: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        value["body"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_two_pass_migration_repairs_forward_references() {
        let server = MockServer::start().await;
        mount_create(&server, "First issue", 1).await;
        mount_create(&server, "Second issue", 2).await;
        Mock::given(method("POST"))
            .and(path("/repos/owner/repo/issues/1/comments"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 1})))
            .mount(&server)
            .await;
        mount_update(&server, 1).await;
        mount_update(&server, 2).await;

        let issues = vec![
            issue(
                "PROJ-1",
                "First issue",
                "blocked by PROJ-2",
                vec![comment("see PROJ-2 as well")],
            ),
            issue("PROJ-2", "Second issue", "duplicate of PROJ-1", vec![]),
        ];

        let mut migrator =
            JiraMigrator::new(config(&server), MigrationOptions::default()).unwrap();
        let report = migrator.migrate(&issues).await.unwrap();

        assert!(report.is_successful());
        assert_eq!(report.issues_created, 2);
        assert_eq!(report.comments_created, 1);
        assert_eq!(report.issues_corrected, 2);

        // Mapping is complete and unique after pass 1.
        assert_eq!(migrator.mapping().lookup("PROJ-1"), Some(1));
        assert_eq!(migrator.mapping().lookup("PROJ-2"), Some(2));
        assert_eq!(migrator.issue_state("PROJ-1"), Some(IssueState::Corrected));
        assert_eq!(migrator.issue_state("PROJ-2"), Some(IssueState::Corrected));

        let requests = server.received_requests().await.unwrap();

        // The forward reference was unresolvable during pass 1 and is
        // repaired by the pass-2 update.
        let created_body = requests
            .iter()
            .find(|r| r.method.as_str() == "POST" && r.url.path() == "/repos/owner/repo/issues")
            .map(|r| serde_json::from_slice::<serde_json::Value>(&r.body).unwrap())
            .unwrap();
        assert!(created_body["body"].as_str().unwrap().contains("blocked by PROJ-2"));

        assert!(patched_body(&requests, "/repos/owner/repo/issues/1").contains("blocked by #2"));
        assert!(patched_body(&requests, "/repos/owner/repo/issues/2").contains("duplicate of #1"));

        // The comment was created while only PROJ-1 was mapped, so its
        // reference stays unresolved (comments are never revisited).
        let comment_body = requests
            .iter()
            .find(|r| r.url.path() == "/repos/owner/repo/issues/1/comments")
            .map(|r| serde_json::from_slice::<serde_json::Value>(&r.body).unwrap())
            .unwrap();
        assert!(comment_body["body"].as_str().unwrap().contains("see PROJ-2 as well"));
    }

    #[tokio::test]
    async fn test_created_number_is_recorded_in_mapping() {
        let server = MockServer::start().await;
        mount_create(&server, "Lucky", 42).await;
        mount_update(&server, 42).await;

        let issues = vec![issue("PROJ-7", "Lucky", "no references", vec![])];
        let mut migrator =
            JiraMigrator::new(config(&server), MigrationOptions::default()).unwrap();
        migrator.migrate(&issues).await.unwrap();

        assert_eq!(migrator.mapping().lookup("PROJ-7"), Some(42));
    }

    #[tokio::test]
    async fn test_pass1_failure_aborts_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/owner/repo/issues"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "message": "boom"
            })))
            .mount(&server)
            .await;

        let issues = vec![
            issue("PROJ-1", "First issue", "", vec![comment("never created")]),
            issue("PROJ-2", "Second issue", "", vec![]),
        ];
        let mut migrator =
            JiraMigrator::new(config(&server), MigrationOptions::default()).unwrap();
        let err = migrator.migrate(&issues).await.unwrap_err();

        assert!(matches!(err, MigrationError::CreateFailed { status: 500, .. }));
        assert_eq!(migrator.issue_state("PROJ-1"), Some(IssueState::Failed));
        assert_eq!(migrator.issue_state("PROJ-2"), Some(IssueState::Pending));

        // Nothing was written beyond the failed create: no comments, no pass 2.
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn test_best_effort_continues_past_failed_issue() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/owner/repo/issues"))
            .and(body_partial_json(serde_json::json!({ "title": "First issue" })))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "message": "boom"
            })))
            .mount(&server)
            .await;
        mount_create(&server, "Second issue", 2).await;
        mount_update(&server, 2).await;

        let issues = vec![
            issue("PROJ-1", "First issue", "", vec![comment("skipped with its issue")]),
            issue("PROJ-2", "Second issue", "refers to PROJ-1", vec![]),
        ];
        let options = MigrationOptions::default().with_fail_fast(false);
        let mut migrator = JiraMigrator::new(config(&server), options).unwrap();
        let report = migrator.migrate(&issues).await.unwrap();

        assert!(!report.is_successful());
        assert_eq!(report.issues_created, 1);
        assert_eq!(report.comments_created, 0);
        assert_eq!(report.issues_corrected, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].key, "PROJ-1");
        assert_eq!(report.failures[0].phase, FailurePhase::Create);

        assert_eq!(migrator.issue_state("PROJ-1"), Some(IssueState::Failed));
        assert_eq!(migrator.issue_state("PROJ-2"), Some(IssueState::Corrected));

        // The failed issue's comments were skipped, and PROJ-1 stayed
        // unmapped, so the reference to it survives pass 2 unchanged.
        let requests = server.received_requests().await.unwrap();
        assert!(!requests.iter().any(|r| r.url.path().ends_with("/comments")));
        assert!(patched_body(&requests, "/repos/owner/repo/issues/2").contains("refers to PROJ-1"));
    }

    #[tokio::test]
    async fn test_dry_run_performs_no_writes() {
        let server = MockServer::start().await;

        let issues = vec![
            issue("PROJ-1", "First issue", "see PROJ-2", vec![comment("hello")]),
            issue("PROJ-2", "Second issue", "", vec![]),
        ];
        let options = MigrationOptions::default().with_dry_run(true);
        let mut migrator = JiraMigrator::new(config(&server), options).unwrap();
        let report = migrator.migrate(&issues).await.unwrap();

        assert!(report.dry_run);
        assert!(report.is_successful());
        assert_eq!(report.issues_created, 2);
        assert_eq!(report.comments_created, 1);
        assert_eq!(report.issues_corrected, 2);

        // Numbers are synthesized so the rewrite can still be previewed.
        assert_eq!(migrator.mapping().lookup("PROJ-1"), Some(1));
        assert_eq!(migrator.mapping().lookup("PROJ-2"), Some(2));

        let requests = server.received_requests().await.unwrap();
        assert!(requests.is_empty());
    }

    #[tokio::test]
    async fn test_run_fetches_then_migrates() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "startAt": 0,
                "total": 1,
                "issues": [{"key": "PROJ-1"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/issue/PROJ-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "key": "PROJ-1",
                "fields": {
                    "reporter": {"name": "jdoe"},
                    "created": "2013-05-21T09:52:13.000+0000",
                    "updated": "2014-01-02T10:00:00.000+0000",
                    "summary": "Fetched issue",
                    "description": "mentions PROJ-1 itself"
                }
            })))
            .mount(&server)
            .await;
        mount_create(&server, "Fetched issue", 5).await;
        mount_update(&server, 5).await;

        let mut migrator =
            JiraMigrator::new(config(&server), MigrationOptions::default()).unwrap();
        let report = migrator.run().await.unwrap();

        assert!(report.is_successful());
        assert_eq!(report.issues_total, 1);
        assert_eq!(migrator.mapping().lookup("PROJ-1"), Some(5));

        // The self-reference resolves once pass 2 runs.
        let requests = server.received_requests().await.unwrap();
        assert!(patched_body(&requests, "/repos/owner/repo/issues/5").contains("mentions #5 itself"));
    }

    #[tokio::test]
    async fn test_missing_token_is_rejected_unless_dry_run() {
        let server = MockServer::start().await;
        let config = MigrationConfig::new(server.uri(), "PROJ", "owner", "repo")
            .with_github_api(server.uri());

        assert!(matches!(
            JiraMigrator::new(config.clone(), MigrationOptions::default()),
            Err(MigrationError::InvalidConfig(_))
        ));
        assert!(
            JiraMigrator::new(config, MigrationOptions::default().with_dry_run(true)).is_ok()
        );
    }
}
