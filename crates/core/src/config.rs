//! Configuration management for cardgraph.
//!
//! Configuration is assembled in layers, later layers winning:
//! - Built-in defaults
//! - Config file (`.cardgraph/config.yaml` in the workspace)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric; the persisted store lives in `.cardgraph/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .cardgraph/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Explicit API key for the labeling provider (overrides `apiKeyEnv`)
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Remote labeling settings
    pub labeling: LabelingConfig,

    /// Neighbor graph settings
    pub graph: GraphConfig,
}

/// What to do with a returned label that is outside the relation taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabelPolicy {
    /// Cache whatever the model returned.
    #[default]
    PassThrough,
    /// Drop unknown labels; the edge falls back to the default label.
    Strict,
}

/// Settings for the OpenAI-compatible labeling endpoint and its request queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelingConfig {
    /// Provider base URL, e.g. `https://api.openai.com/v1`
    pub base_url: String,

    /// Chat model name
    pub model: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Maximum number of outstanding remote calls
    pub max_concurrent: usize,

    /// First retry delay; doubles per attempt
    pub backoff_base_ms: u64,

    /// Upper bound for the retry delay (before jitter)
    pub backoff_max_ms: u64,

    /// Upper bound for the random jitter added to each retry delay
    pub jitter_ms: u64,

    /// Timeout for a single HTTP call
    pub request_timeout_secs: u64,

    /// Optional deadline for a whole submission, retries included
    pub deadline_secs: Option<u64>,

    /// Handling of labels outside the taxonomy
    pub label_policy: LabelPolicy,

    /// Split cache misses into batches of at most this many edges
    pub max_batch_size: Option<usize>,
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_concurrent: 1,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
            jitter_ms: 250,
            request_timeout_secs: 60,
            deadline_secs: None,
            label_policy: LabelPolicy::PassThrough,
            max_batch_size: None,
        }
    }
}

/// Settings for the neighbor graph build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphConfig {
    /// Neighbors per card
    pub k: usize,

    /// Rows scanned between cooperative yields
    pub yield_every: usize,

    /// Similarity floor for candidate edges
    pub min_score: Option<f32>,

    /// Prefix for persisted KNN table keys
    pub cache_prefix: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            k: 8,
            yield_every: 64,
            min_score: None,
            cache_prefix: "knn".to_string(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    labeling: Option<LabelingConfig>,
    graph: Option<GraphConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            labeling: LabelingConfig::default(),
            graph: GraphConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the workspace config file, and environment variables.
    ///
    /// `workspace` and `config_file` come from the command line and take
    /// precedence over their environment variables, so the config file is read
    /// from the workspace that will actually be used.
    ///
    /// Environment variables:
    /// - `CARDGRAPH_WORKSPACE`: Override workspace path
    /// - `CARDGRAPH_CONFIG`: Path to config file
    /// - `CARDGRAPH_BASE_URL`: Labeling provider base URL
    /// - `CARDGRAPH_MODEL`: Labeling model
    /// - `CARDGRAPH_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use cardgraph_core::config::AppConfig;
    ///
    /// let config = AppConfig::load(None, None).expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace
            .or_else(|| std::env::var("CARDGRAPH_WORKSPACE").ok().map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        config.config_file = config_file
            .or_else(|| std::env::var("CARDGRAPH_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        // A named config file must exist; the workspace default is optional.
        match config.config_file.clone() {
            Some(path) => config = config.merge_yaml(&path)?,
            None => {
                let default_path = config.cardgraph_dir().join("config.yaml");
                if default_path.exists() {
                    config = config.merge_yaml(&default_path)?;
                }
            }
        }

        if let Ok(base_url) = std::env::var("CARDGRAPH_BASE_URL") {
            config.labeling.base_url = base_url;
        }

        if let Ok(model) = std::env::var("CARDGRAPH_MODEL") {
            config.labeling.model = model;
        }

        config.api_key = std::env::var("CARDGRAPH_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into a copy of this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();
        result.apply_file(Self::parse_file(&contents, path)?);
        Ok(result)
    }

    fn parse_file(contents: &str, path: &Path) -> AppResult<ConfigFile> {
        serde_yaml::from_str(contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if let Some(path) = file.workspace.and_then(|ws| ws.path) {
            self.workspace = PathBuf::from(path);
        }

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
        }

        if let Some(labeling) = file.labeling {
            self.labeling = labeling;
        }

        if let Some(graph) = file.graph {
            self.graph = graph;
        }
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over the file and environment.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        base_url: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(base_url) = base_url {
            self.labeling.base_url = base_url;
        }

        if let Some(model) = model {
            self.labeling.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .cardgraph directory.
    pub fn cardgraph_dir(&self) -> PathBuf {
        self.workspace.join(".cardgraph")
    }

    /// Path of the SQLite file backing the KNN and relation caches.
    pub fn store_path(&self) -> PathBuf {
        self.cardgraph_dir().join("store.sqlite")
    }

    /// Ensure the .cardgraph directory exists.
    pub fn ensure_cardgraph_dir(&self) -> AppResult<()> {
        let dir = self.cardgraph_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .cardgraph directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Resolve the labeling API key.
    ///
    /// `CARDGRAPH_API_KEY` wins; otherwise the variable named by `apiKeyEnv` is read.
    /// A missing key is not an error: labeling then degrades to default labels.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|key| !key.trim().is_empty()) {
            return Some(key.clone());
        }

        std::env::var(&self.labeling.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    /// Validate settings that would otherwise fail deep inside a run.
    pub fn validate(&self) -> AppResult<()> {
        let labeling = &self.labeling;

        if !labeling.base_url.starts_with("http://") && !labeling.base_url.starts_with("https://")
        {
            return Err(AppError::Config(format!(
                "Labeling base URL must be http(s): {}",
                labeling.base_url
            )));
        }

        if labeling.model.trim().is_empty() {
            return Err(AppError::Config("Labeling model must not be empty".to_string()));
        }

        if labeling.max_concurrent == 0 {
            return Err(AppError::Config(
                "maxConcurrent must be at least 1".to_string(),
            ));
        }

        if labeling.backoff_base_ms > labeling.backoff_max_ms {
            return Err(AppError::Config(format!(
                "backoffBaseMs ({}) exceeds backoffMaxMs ({})",
                labeling.backoff_base_ms, labeling.backoff_max_ms
            )));
        }

        if labeling.max_batch_size == Some(0) {
            return Err(AppError::Config("maxBatchSize must be at least 1".to_string()));
        }

        if self.graph.k == 0 {
            return Err(AppError::Config("graph.k must be at least 1".to_string()));
        }

        Ok(())
    }
}
