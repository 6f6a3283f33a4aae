//! Markup rendering seam.

/// Converts source-tracker markup into target-tracker markup.
///
/// The conversion itself is an external collaborator; the pipeline only
/// depends on this seam, which keeps parsing testable without a converter.
pub trait Render: Send + Sync {
    /// Render one block of source markup to target markup.
    fn render(&self, markup: &str) -> String;
}

/// Passes markup through unchanged. Suitable when the JIRA instance stores
/// plain text or Markdown-compatible descriptions, and as the test default.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerbatimRenderer;

impl Render for VerbatimRenderer {
    fn render(&self, markup: &str) -> String {
        markup.to_string()
    }
}
