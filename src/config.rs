//! Runtime settings for the git backed services.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Settings for [`GitCli`](crate::GitCli)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Working directory git runs in
    pub repo_path: PathBuf,
    /// Unchanged lines shown around each change (`git diff -U<n>`)
    pub context_lines: u32,
    /// Compute word segments for paired deletions and additions
    pub word_diff: bool,
    /// git executable to invoke
    pub git_binary: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo_path: PathBuf::from("."),
            context_lines: 3,
            word_diff: true,
            git_binary: "git".to_string(),
        }
    }
}

impl Config {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_context_lines(mut self, context_lines: u32) -> Self {
        self.context_lines = context_lines;
        self
    }

    #[must_use]
    pub fn with_word_diff(mut self, word_diff: bool) -> Self {
        self.word_diff = word_diff;
        self
    }

    #[must_use]
    pub fn with_git_binary(mut self, git_binary: impl Into<String>) -> Self {
        self.git_binary = git_binary.into();
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.context_lines, 3);
        assert!(config.word_diff);
        assert_eq!(config.git_binary, "git");
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: Config = serde_json::from_str(r#"{"context_lines": 0}"#).unwrap();
        assert_eq!(config, Config::default().with_context_lines(0));
    }
}
