//! Request factories for the GitHub write protocol.
//!
//! Stateless, side-effect-free payload builders. Pass 1 uses the create
//! factories; pass 2 replays the stored pass-1 body through
//! [`issue_update_payload`] once the mapping is complete.

use crate::error::{MigrationError, Result};
use crate::mapping::IssueMapping;
use crate::resolve;
use crate::types::{Comment, Issue};
use serde::Serialize;

/// Body of an issue-create request.
#[derive(Debug, Clone, Serialize)]
pub struct IssueCreatePayload {
    pub title: String,
    pub body: String,
}

/// Body of a comment-create request.
#[derive(Debug, Clone, Serialize)]
pub struct CommentCreatePayload {
    pub body: String,
}

/// Body of an issue-update request.
#[derive(Debug, Clone, Serialize)]
pub struct IssueUpdatePayload {
    pub body: String,
}

/// Build the pass-1 create payload for an issue.
///
/// The body is a provenance preamble (import note, backlink to the source
/// issue, original timestamps) followed by the rendered description. No
/// reference resolution happens here: the mapping is incomplete by
/// construction during pass 1, and pass 2 repairs the body wholesale.
pub fn issue_create_payload(issue: &Issue, browse_url: &str) -> IssueCreatePayload {
    let mut body = String::with_capacity(issue.description.len() + 256);
    body.push_str("This issue was imported from JIRA. The original issue was: ");
    body.push_str(&format!("[{}]({browse_url})\n", issue.key));
    body.push_str(&format!("Original issue creation date: {}\n", issue.created.to_rfc3339()));
    body.push_str(&format!("Original issue updated date: {}\n", issue.updated.to_rfc3339()));
    if let Some(resolved) = issue.resolved {
        body.push_str(&format!("Original issue resolved date: {}\n", resolved.to_rfc3339()));
    }
    body.push('\n');
    body.push_str(&issue.description);

    IssueCreatePayload {
        title: issue.summary.clone(),
        body,
    }
}

/// Build the create payload for one comment of an already-created issue.
///
/// Fails with [`MigrationError::UnmappedKey`] when the parent issue has not
/// been created yet. Reference resolution is applied with whatever portion
/// of the mapping exists at this point; comments are never revisited, so
/// this is best-effort by design.
pub fn comment_create_payload(
    issue: &Issue,
    comment: &Comment,
    mapping: &IssueMapping,
) -> Result<CommentCreatePayload> {
    if !mapping.contains(&issue.key) {
        return Err(MigrationError::UnmappedKey(issue.key.clone()));
    }

    let mut body = String::with_capacity(comment.body.len() + 128);
    body.push_str("This comment was imported from JIRA.\n\n");
    body.push_str(&comment.body);
    body.push_str(&format!(
        "\n\nOriginal comment creation date: {}",
        comment.created.to_rfc3339()
    ));

    Ok(CommentCreatePayload {
        body: resolve::rewrite(&body, mapping),
    })
}

/// Build the pass-2 update payload for an issue.
///
/// `original_body` must be the exact body submitted in pass 1; it is passed
/// through the resolver against the now-complete mapping, which is what
/// repairs forward references left unresolved during creation. Fails with
/// [`MigrationError::UnmappedKey`] when the issue's own key is unmapped.
pub fn issue_update_payload(
    issue: &Issue,
    original_body: &str,
    mapping: &IssueMapping,
) -> Result<IssueUpdatePayload> {
    if !mapping.contains(&issue.key) {
        return Err(MigrationError::UnmappedKey(issue.key.clone()));
    }

    Ok(IssueUpdatePayload {
        body: resolve::rewrite(original_body, mapping),
    })
}
