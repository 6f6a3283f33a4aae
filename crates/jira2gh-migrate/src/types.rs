//! Common types for migration operations.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An issue in the normalized, tracker-independent form.
///
/// Built once per run from fetched JIRA data and immutable thereafter. The
/// comment vector is owned by the issue, so the snapshot taken at
/// construction time cannot alias any caller-held collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    /// Source-system key (e.g. "PROJ-42"). Never empty; stable for the run.
    pub key: String,

    /// One-line summary, used as the target issue title.
    pub summary: String,

    /// Issue description, already rendered to target markup.
    pub description: String,

    /// Target-system username of the reporter (already mapped).
    pub created_by: String,

    /// Target-system username of the assignee, if any (already mapped).
    pub assignee: Option<String>,

    /// Workflow status. Data field only; not replicated into target workflow.
    pub status: Status,

    /// Reason the issue reached its status, if known.
    pub status_reason: Option<StatusReason>,

    /// Creation timestamp from the source tracker.
    pub created: DateTime<FixedOffset>,

    /// Last-updated timestamp from the source tracker.
    pub updated: DateTime<FixedOffset>,

    /// Resolution timestamp, if the issue was resolved.
    pub resolved: Option<DateTime<FixedOffset>>,

    /// Comments in source order.
    pub comments: Vec<Comment>,
}

/// A single issue comment.
///
/// Has no identity beyond its position in the parent issue's comment
/// sequence. Comments are created once on the target and never updated.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    /// Target-system username of the comment author (already mapped).
    pub author: String,

    /// Creation timestamp from the source tracker.
    pub created: DateTime<FixedOffset>,

    /// Comment body, already rendered to target markup.
    pub body: String,
}

/// Issue workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Open,
    Closed,
}

/// Reason an issue reached its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusReason {
    Completed,
    NotPlanned,
    Reopened,
}

/// Configuration for a migration run.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Base URL of the source JIRA instance.
    pub jira_url: String,

    /// JIRA project identifier to migrate.
    pub project: String,

    /// Target GitHub repository owner.
    pub owner: String,

    /// Target GitHub repository name.
    pub repo: String,

    /// GitHub API base URL. Overridable for testing.
    pub github_api: String,

    /// Default GitHub token, used when no per-author token matches.
    pub default_token: Option<String>,
}

impl MigrationConfig {
    /// Create a new migration configuration.
    pub fn new(
        jira_url: impl Into<String>,
        project: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            jira_url: jira_url.into(),
            project: project.into(),
            owner: owner.into(),
            repo: repo.into(),
            github_api: "https://api.github.com".to_string(),
            default_token: None,
        }
    }

    /// Set the default GitHub token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.default_token = Some(token.into());
        self
    }

    /// Override the GitHub API base URL.
    pub fn with_github_api(mut self, url: impl Into<String>) -> Self {
        self.github_api = url.into();
        self
    }
}

/// Options controlling how the migration run behaves.
#[derive(Debug, Clone)]
pub struct MigrationOptions {
    /// Abort the whole run on the first per-issue failure. When false, a
    /// failed issue is recorded and the run continues with the next one.
    pub fail_fast: bool,

    /// Build every payload but perform no writes against GitHub.
    pub dry_run: bool,

    /// Map of JIRA usernames to GitHub usernames.
    pub user_mapping: HashMap<String, String>,

    /// Map of GitHub usernames to the token used when acting as that user.
    pub author_tokens: HashMap<String, String>,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            fail_fast: true,
            dry_run: false,
            user_mapping: HashMap::new(),
            author_tokens: HashMap::new(),
        }
    }
}

impl MigrationOptions {
    /// Enable or disable abort-on-first-failure.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Enable or disable dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Add a JIRA-to-GitHub user mapping.
    pub fn with_user_mapping(
        mut self,
        jira_user: impl Into<String>,
        github_user: impl Into<String>,
    ) -> Self {
        self.user_mapping.insert(jira_user.into(), github_user.into());
        self
    }

    /// Replace the whole user mapping table.
    pub fn with_user_mappings(mut self, mapping: HashMap<String, String>) -> Self {
        self.user_mapping = mapping;
        self
    }

    /// Add a per-author GitHub token.
    pub fn with_author_token(
        mut self,
        github_user: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        self.author_tokens.insert(github_user.into(), token.into());
        self
    }
}

/// The step of the run in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePhase {
    /// Fetching or parsing source data.
    Fetch,
    /// Creating an issue on the target (pass 1).
    Create,
    /// Creating a comment on the target (pass 1).
    Comment,
    /// Correcting an issue body on the target (pass 2).
    Correct,
}

impl std::fmt::Display for FailurePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch => write!(f, "fetch"),
            Self::Create => write!(f, "create"),
            Self::Comment => write!(f, "comment"),
            Self::Correct => write!(f, "correct"),
        }
    }
}

/// A per-issue failure with enough context to resume manually.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationFailure {
    /// Source issue key.
    pub key: String,

    /// Step that failed.
    pub phase: FailurePhase,

    /// Error message.
    pub message: String,
}

/// Report of a completed migration run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Number of issues in the input set.
    pub issues_total: usize,

    /// Number of issues created on the target (pass 1).
    pub issues_created: usize,

    /// Number of comments created on the target (pass 1).
    pub comments_created: usize,

    /// Number of issue bodies corrected (pass 2).
    pub issues_corrected: usize,

    /// Whether this was a dry run.
    pub dry_run: bool,

    /// Per-issue failures.
    pub failures: Vec<MigrationFailure>,

    /// Start time of the run.
    pub started_at: Option<DateTime<Utc>>,

    /// End time of the run.
    pub completed_at: Option<DateTime<Utc>>,
}

impl MigrationReport {
    /// Create a new empty report.
    pub fn new() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Mark the run as complete.
    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    /// Check if the run finished without any failure.
    pub fn is_successful(&self) -> bool {
        self.failures.is_empty()
    }

    /// Record a per-issue failure.
    pub fn add_failure(&mut self, key: &str, phase: FailurePhase, message: &str) {
        self.failures.push(MigrationFailure {
            key: key.to_string(),
            phase,
            message: message.to_string(),
        });
    }

    /// Get the duration of the run.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Print a summary of the run.
    pub fn print_summary(&self) {
        println!("\n=== Migration Summary ===\n");
        if self.dry_run {
            println!("(dry run, nothing was written)\n");
        }
        println!("Issues in input:    {}", self.issues_total);
        println!("Issues created:     {}", self.issues_created);
        println!("Comments created:   {}", self.comments_created);
        println!("Issues corrected:   {}", self.issues_corrected);

        if let Some(duration) = self.duration() {
            println!("\nCompleted in {} seconds", duration.num_seconds());
        }

        if !self.failures.is_empty() {
            println!("\nFailures ({}):", self.failures.len());
            for failure in &self.failures {
                println!("  [{}] {}: {}", failure.phase, failure.key, failure.message);
            }
        }

        let status = if self.is_successful() {
            "SUCCESS"
        } else {
            "FAILED"
        };
        println!("\nOverall Status: {status}");
    }
}
