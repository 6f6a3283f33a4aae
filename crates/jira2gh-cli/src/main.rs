//! jira2gh - Command-line interface for JIRA-to-GitHub issue migration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use jira2gh_migrate::{
    ConsoleProgressReporter, IssueParser, JiraClient, JiraMigrator, MigrationConfig,
    MigrationOptions, MigrationProgress, UserMapper, VerbatimRenderer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// jira2gh - Migrate JIRA projects to GitHub issues
#[derive(Parser, Debug)]
#[command(name = "jira2gh")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Migrate a JIRA project into a GitHub repository
    Migrate {
        /// Base URL of the JIRA service
        #[arg(long)]
        jira_url: String,

        /// JIRA project id
        #[arg(long)]
        project: String,

        /// Target GitHub repository owner
        #[arg(long)]
        owner: String,

        /// Target GitHub repository name
        #[arg(long)]
        repo: String,

        /// Read issues from a local JSON file or directory instead of JIRA
        #[arg(long)]
        input: Option<PathBuf>,

        /// GitHub token (defaults to $GITHUB_TOKEN)
        #[arg(long)]
        token: Option<String>,

        /// JSON file mapping JIRA usernames to GitHub usernames
        #[arg(long)]
        user_map: Option<PathBuf>,

        /// JSON file mapping GitHub usernames to the tokens used when
        /// acting as them
        #[arg(long)]
        tokens: Option<PathBuf>,

        /// Keep going past a failed issue instead of aborting
        #[arg(long)]
        best_effort: bool,

        /// Build every request but write nothing to GitHub
        #[arg(long)]
        dry_run: bool,
    },

    /// Download a project's issues as <key>.json files for offline runs
    Fetch {
        /// Base URL of the JIRA service
        #[arg(long)]
        jira_url: String,

        /// JIRA project id
        #[arg(long)]
        project: String,

        /// Directory to write the JSON files to
        #[arg(long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("jira2gh={log_level},jira2gh_migrate={log_level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = match cli.command {
        Commands::Migrate {
            jira_url,
            project,
            owner,
            repo,
            input,
            token,
            user_map,
            tokens,
            best_effort,
            dry_run,
        } => {
            migrate(
                jira_url,
                project,
                owner,
                repo,
                input,
                token,
                user_map,
                tokens,
                best_effort,
                dry_run,
            )
            .await
        }
        Commands::Fetch {
            jira_url,
            project,
            output,
        } => fetch(jira_url, project, output).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
async fn migrate(
    jira_url: String,
    project: String,
    owner: String,
    repo: String,
    input: Option<PathBuf>,
    token: Option<String>,
    user_map: Option<PathBuf>,
    tokens: Option<PathBuf>,
    best_effort: bool,
    dry_run: bool,
) -> anyhow::Result<()> {
    let token = token.or_else(|| std::env::var("GITHUB_TOKEN").ok());

    let mut config = MigrationConfig::new(jira_url, project.clone(), owner, repo);
    if let Some(token) = token {
        config = config.with_token(token);
    }

    let mut options = MigrationOptions::default()
        .with_fail_fast(!best_effort)
        .with_dry_run(dry_run);
    if let Some(path) = user_map {
        options = options.with_user_mappings(load_json_map(&path)?);
    }
    if let Some(path) = tokens {
        for (user, token) in load_json_map(&path)? {
            options = options.with_author_token(user, token);
        }
    }

    let reporter = ConsoleProgressReporter::new();
    let progress = MigrationProgress::with_callback(reporter.callback());
    let mut migrator = JiraMigrator::new(config, options)?.with_progress(progress);

    let report = match input {
        Some(path) => {
            info!("Reading issues from {}", path.display());
            migrator.run_from_path(&path).await?
        }
        None => migrator.run().await?,
    };
    reporter.finish("done");

    if report.issues_total == 0 {
        bail!("no issues found for project {project}");
    }

    report.print_summary();
    if !report.is_successful() {
        bail!("migration finished with {} failure(s)", report.failures.len());
    }
    Ok(())
}

async fn fetch(jira_url: String, project: String, output: PathBuf) -> anyhow::Result<()> {
    let parser = IssueParser::new(UserMapper::empty(), Box::new(VerbatimRenderer));
    let client = JiraClient::new(&jira_url, project.clone(), parser)?;

    let written = client.download(&output).await?;
    if written.is_empty() {
        bail!("no issues found for project {project}");
    }

    println!("Downloaded {} issues to {}", written.len(), output.display());
    Ok(())
}

fn load_json_map(path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("invalid JSON map in {}", path.display()))
}
