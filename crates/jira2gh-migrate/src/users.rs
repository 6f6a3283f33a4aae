//! JIRA-to-GitHub username mapping.

use std::collections::HashMap;

/// Maps JIRA usernames to GitHub usernames.
///
/// Backed by an explicit table supplied at construction time and scoped to
/// the run. A lookup miss returns the JIRA name unchanged, so mapping never
/// fails. Applied eagerly while building the normalized issue model;
/// downstream components only ever see GitHub usernames.
#[derive(Debug, Clone, Default)]
pub struct UserMapper {
    mapping: HashMap<String, String>,
}

impl UserMapper {
    /// Create a mapper from an explicit table.
    pub fn new(mapping: HashMap<String, String>) -> Self {
        Self { mapping }
    }

    /// Create a mapper that passes every name through unchanged.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Map a JIRA username to a GitHub username, falling back to the JIRA
    /// name when no entry exists.
    pub fn map(&self, jira_name: &str) -> String {
        self.mapping
            .get(jira_name)
            .cloned()
            .unwrap_or_else(|| jira_name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapped_name() {
        let mapper = UserMapper::new(HashMap::from([("jdoe".to_string(), "john-doe".to_string())]));
        assert_eq!(mapper.map("jdoe"), "john-doe");
    }

    #[test]
    fn test_miss_falls_back_to_input() {
        let mapper = UserMapper::empty();
        assert_eq!(mapper.map("unknown"), "unknown");
    }
}
