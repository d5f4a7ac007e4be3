use anyhow::Context;
use histscrub_core::{
    CommitRef, DEFAULT_REDACTION_MARKER, DEFAULT_SEPARATORS, Result, ScrubError, SecretSource,
    check_marker,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "histscrub.toml";

// ============================================================================
// Run configuration (histscrub.toml)
// ============================================================================

/// Configuration for one remediation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_marker")]
    pub redaction_marker: String,

    #[serde(default)]
    pub snapshot: SnapshotConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub reclaim: ReclaimConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    /// `[[source]]` tables
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SnapshotConfig {
    /// Where the disposable mirror clone goes (relative paths resolve
    /// against the repository root)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_engine_program")]
    pub program: String,

    /// Also scrub commit and tag messages
    #[serde(default = "default_true")]
    pub replace_messages: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReclaimConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_separators")]
    pub separators: String,
}

/// One secret location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Commit hash or ref where the secret was committed
    pub commit: String,

    /// File path relative to the repository root
    pub path: String,

    /// Key the secret is assigned to; any identifier when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Shortest value accepted for this credential kind
    pub min_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redaction_marker: default_marker(),
            snapshot: SnapshotConfig::default(),
            engine: EngineConfig::default(),
            reclaim: ReclaimConfig::default(),
            validation: ValidationConfig::default(),
            sources: Vec::new(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: default_engine_program(),
            replace_messages: true,
        }
    }
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            separators: default_separators(),
        }
    }
}

fn default_marker() -> String {
    DEFAULT_REDACTION_MARKER.to_string()
}

fn default_engine_program() -> String {
    "git-filter-repo".to_string()
}

fn default_separators() -> String {
    DEFAULT_SEPARATORS.to_string()
}

fn default_true() -> bool {
    true
}

impl SourceDefinition {
    pub fn label(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => match &self.key {
                Some(key) => format!("{}:{}", self.path, key),
                None => self.path.clone(),
            },
        }
    }

    pub fn to_source(&self) -> SecretSource {
        SecretSource {
            label: self.label(),
            commit: CommitRef::new(self.commit.trim()),
            path: self.path.trim().to_string(),
            key: self.key.clone(),
            min_length: self.min_length,
        }
    }
}

impl Config {
    /// Load and validate a config file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Locate the config: explicit path, then `histscrub.toml` in the
    /// repository root, then the user config directory
    pub fn discover(repo_root: &Path, explicit: Option<&Path>) -> anyhow::Result<(PathBuf, Self)> {
        if let Some(path) = explicit {
            return Ok((path.to_path_buf(), Self::load(path)?));
        }

        let local = repo_root.join(CONFIG_FILE_NAME);
        if local.exists() {
            return Ok((local.clone(), Self::load(&local)?));
        }

        if let Some(global) = Self::global_config_path()
            && global.exists()
        {
            return Ok((global.clone(), Self::load(&global)?));
        }

        anyhow::bail!(
            "No {} found in {}; run `histscrub init` to create one",
            CONFIG_FILE_NAME,
            repo_root.display()
        )
    }

    /// `~/.config/histscrub/histscrub.toml` or the platform equivalent
    pub fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "histscrub", "histscrub")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    pub fn validate(&self) -> Result<()> {
        check_marker(&self.redaction_marker)
            .map_err(|e| ScrubError::Config(format!("redaction_marker: {}", e)))?;

        if self.engine.program.trim().is_empty() {
            return Err(ScrubError::Config("engine.program is empty".to_string()));
        }

        if self.sources.is_empty() {
            return Err(ScrubError::Config(
                "no [[source]] entries configured; nothing to scrub".to_string(),
            ));
        }

        let mut labels = HashSet::new();
        for (index, source) in self.sources.iter().enumerate() {
            let label = source.label();
            let context = format!("source #{} ({})", index + 1, label);

            let commit = source.commit.trim();
            if commit.is_empty() || commit.starts_with('-') {
                return Err(ScrubError::Config(format!(
                    "{}: invalid commit '{}'",
                    context, source.commit
                )));
            }

            let path = source.path.trim();
            if path.is_empty() || path.starts_with('-') || Path::new(path).is_absolute() {
                return Err(ScrubError::Config(format!(
                    "{}: path must be relative to the repository root, got '{}'",
                    context, source.path
                )));
            }

            if source.min_length == 0 {
                return Err(ScrubError::Config(format!(
                    "{}: min_length must be at least 1",
                    context
                )));
            }

            if !labels.insert(label.clone()) {
                return Err(ScrubError::Config(format!(
                    "{}: duplicate label '{}'",
                    context, label
                )));
            }
        }

        Ok(())
    }

    pub fn secret_sources(&self) -> Vec<SecretSource> {
        self.sources.iter().map(SourceDefinition::to_source).collect()
    }

    /// Snapshot location for `repo_root`: the configured directory, or a
    /// per-repository directory in the user cache keyed by a path fingerprint
    pub fn snapshot_dir(&self, repo_root: &Path) -> PathBuf {
        if let Some(dir) = &self.snapshot.dir {
            return if dir.is_absolute() {
                dir.clone()
            } else {
                repo_root.join(dir)
            };
        }

        let fingerprint = blake3::hash(repo_root.to_string_lossy().as_bytes()).to_hex();
        let name = repo_root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("repo");
        let leaf = format!("{}-{}.git", name, &fingerprint.as_str()[..12]);

        match directories::ProjectDirs::from("com", "histscrub", "histscrub") {
            Some(dirs) => dirs.cache_dir().join("snapshots").join(leaf),
            None => std::env::temp_dir().join("histscrub").join(leaf),
        }
    }

    /// Commented starter config written by `histscrub init`
    pub fn template() -> &'static str {
        TEMPLATE
    }
}

const TEMPLATE: &str = r#"# histscrub configuration
#
# Each [[source]] names a file at a commit that is known to contain a secret
# assigned as KEY = "value" or KEY = 'value'. The value is read from history,
# validated, and replaced across every branch and tag.

# Fixed marker written in place of every secret
redaction_marker = "***REMOVED***"

[snapshot]
# Disposable mirror clone used for the rewrite. Defaults to the user cache dir.
# dir = "../repo-scrubbed.git"

[engine]
program = "git-filter-repo"
replace_messages = true

[reclaim]
enabled = true

[validation]
# Characters accepted next to letters and digits before a warning is raised
separators = "-_./+="

# [[source]]
# label = "gemini"
# commit = "<commit that introduced the secret>"
# path = "config.py"
# key = "GEMINI_API_KEY"
# min_length = 30
"#;
