use crate::identity::presets::MIN_USER_AGENT_LEN;
use crate::identity::IdentityError;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// An external generator of user-agent strings
///
/// The rotator consults it on every draw and falls back to the static pool
/// whenever it returns an error.
pub trait UserAgentSource: Send + Sync {
    fn generate(&self) -> Result<String, IdentityError>;

    /// Short description for log lines
    fn describe(&self) -> String;
}

/// Reads user agents from a text file, one per line
///
/// Blank lines and `#` comments are ignored. The file is read on first use
/// and the outcome (list or error) is kept for the rest of the run.
pub struct FileUserAgentSource {
    path: PathBuf,
    loaded: OnceLock<Result<Vec<String>, String>>,
}

impl FileUserAgentSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            loaded: OnceLock::new(),
        }
    }

    fn load(&self) -> Result<Vec<String>, IdentityError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| IdentityError::Source {
            source_name: self.describe(),
            reason: e.to_string(),
        })?;

        let agents: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();

        if agents.is_empty() {
            return Err(IdentityError::Source {
                source_name: self.describe(),
                reason: "no user agents found".to_string(),
            });
        }

        if let Some(bad) = agents.iter().find(|ua| ua.len() < MIN_USER_AGENT_LEN) {
            return Err(IdentityError::Implausible(bad.clone()));
        }

        Ok(agents)
    }
}

impl UserAgentSource for FileUserAgentSource {
    fn generate(&self) -> Result<String, IdentityError> {
        let loaded = self
            .loaded
            .get_or_init(|| self.load().map_err(|e| e.to_string()));

        match loaded {
            Ok(agents) => Ok(agents[rand::random_range(0..agents.len())].clone()),
            Err(reason) => Err(IdentityError::Source {
                source_name: self.describe(),
                reason: reason.clone(),
            }),
        }
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}
