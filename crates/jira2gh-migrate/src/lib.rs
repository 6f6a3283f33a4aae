//! # jira2gh
//!
//! Migrates a JIRA project's issues, comments, authorship, and timestamps
//! into a GitHub repository.
//!
//! GitHub assigns issue numbers only at creation time, while JIRA issues
//! freely reference each other by key, including forward references. The
//! migration therefore runs in two passes: pass 1 creates every issue and
//! comment with bodies that may still hold raw JIRA keys, building up the
//! key-to-number mapping; pass 2 patches every created issue body once the
//! mapping is complete.
//!
//! ## Example
//!
//! ```rust,ignore
//! use jira2gh_migrate::{JiraMigrator, MigrationConfig, MigrationOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = MigrationConfig::new(
//!         "https://issues.example.com",
//!         "PROJ",
//!         "owner",
//!         "repo",
//!     )
//!     .with_token("ghp_xxx");
//!
//!     let options = MigrationOptions::default()
//!         .with_user_mapping("jdoe", "john-doe");
//!
//!     let mut migrator = JiraMigrator::new(config, options)?;
//!     let report = migrator.run().await?;
//!
//!     report.print_summary();
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod error;
pub mod github;
pub mod jira;
pub mod mapping;
pub mod payload;
pub mod progress;
pub mod render;
pub mod resolve;
pub mod types;
pub mod users;

// Re-export main types
pub use engine::{IssueState, JiraMigrator};
pub use error::{MigrationError, Result};
pub use github::GitHubClient;
pub use jira::{IssueParser, JiraClient};
pub use mapping::IssueMapping;
pub use progress::{ConsoleProgressReporter, MigrationProgress, ProgressCallback};
pub use render::{Render, VerbatimRenderer};
pub use resolve::rewrite;
pub use types::*;
pub use users::UserMapper;

/// Version of the migration tools.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_is_reachable_through_the_crate_root() {
        let mapping: IssueMapping = [("PROJ-1".to_string(), 10)].into_iter().collect();
        assert_eq!(rewrite("fixes PROJ-1", &mapping), "fixes #10");
    }

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
