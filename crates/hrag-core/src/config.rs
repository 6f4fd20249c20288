//! Layered configuration: file (`hrag.toml`), then environment overrides.
//!
//! Graph credentials are the one exception to file-based config: the password
//! is only ever read from `NEO4J_PASSWORD` and is held in a [`Secret`] that
//! never prints its value.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Hard cap on graph rows and headlines carried into a report.
pub const MAX_GRAPH_RECORDS: usize = 5;
pub const MAX_HEADLINES: usize = 5;

const CONFIG_FILE_NAME: &str = "hrag.toml";

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// A credential that must not reach logs, errors, or serialized output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw value. Only the wire layer should call this.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedder: EmbedderConfig,
    #[serde(default)]
    pub vector: VectorConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Per-source ceiling covering the first attempt and any retry.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            top_k: default_top_k(),
        }
    }
}

impl RetrievalConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub const fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderBackend {
    Hashing,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderConfig {
    #[serde(default = "default_embedder_backend")]
    pub backend: EmbedderBackend,
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            backend: default_embedder_backend(),
            base_url: default_ollama_url(),
            model: default_embedding_model(),
            dimension: default_dimension(),
        }
    }
}

/// An `(id, text)` pair destined for the vector index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedDocument {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorConfig {
    /// SQLite file for the index. In-memory when unset.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub documents: Vec<SeedDocument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphBackend {
    Neo4j,
    Memory,
}

/// The single fixed traversal the graph reasoner issues.
///
/// Renders as
/// `MATCH (a:<from_label>)-[:<relationship>]->(b:<to_label>)
///  RETURN a.<from_key> AS <from_alias>, b.<to_key> AS <to_alias> LIMIT <limit>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphTraversal {
    #[serde(default = "default_from_label")]
    pub from_label: String,
    #[serde(default = "default_relationship")]
    pub relationship: String,
    #[serde(default = "default_to_label")]
    pub to_label: String,
    #[serde(default = "default_from_key")]
    pub from_key: String,
    #[serde(default = "default_to_key")]
    pub to_key: String,
    #[serde(default = "default_from_alias")]
    pub from_alias: String,
    #[serde(default = "default_to_alias")]
    pub to_alias: String,
    #[serde(default = "default_graph_limit")]
    pub limit: usize,
}

impl Default for GraphTraversal {
    fn default() -> Self {
        Self {
            from_label: default_from_label(),
            relationship: default_relationship(),
            to_label: default_to_label(),
            from_key: default_from_key(),
            to_key: default_to_key(),
            from_alias: default_from_alias(),
            to_alias: default_to_alias(),
            limit: default_graph_limit(),
        }
    }
}

impl GraphTraversal {
    /// Cypher text for the traversal. Call [`GraphTraversal::validate`] first.
    #[must_use]
    pub fn cypher(&self) -> String {
        format!(
            "MATCH (a:{})-[:{}]->(b:{}) RETURN a.{} AS {}, b.{} AS {} LIMIT {}",
            self.from_label,
            self.relationship,
            self.to_label,
            self.from_key,
            self.from_alias,
            self.to_key,
            self.to_alias,
            self.effective_limit()
        )
    }

    /// Human-readable relationship path, e.g. `Customer -> SUBSCRIBED_TO -> Plan`.
    #[must_use]
    pub fn path(&self) -> String {
        format!(
            "{} -> {} -> {}",
            self.from_label, self.relationship, self.to_label
        )
    }

    #[must_use]
    pub fn effective_limit(&self) -> usize {
        self.limit.clamp(1, MAX_GRAPH_RECORDS)
    }

    /// Reject identifiers that could change the shape of the query.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("from_label", &self.from_label),
            ("relationship", &self.relationship),
            ("to_label", &self.to_label),
            ("from_key", &self.from_key),
            ("to_key", &self.to_key),
            ("from_alias", &self.from_alias),
            ("to_alias", &self.to_alias),
        ] {
            if !is_identifier(value) {
                bail!("graph.traversal.{field} must be an identifier, got '{value}'");
            }
        }
        if self.limit == 0 || self.limit > MAX_GRAPH_RECORDS {
            bail!(
                "graph.traversal.limit must be in 1..={MAX_GRAPH_RECORDS}, got {}",
                self.limit
            );
        }
        Ok(())
    }
}

/// Seed edge for the in-memory graph backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSubscription {
    pub customer: String,
    pub plan: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_graph_backend")]
    pub backend: GraphBackend,
    /// HTTP endpoint of the store, e.g. `http://127.0.0.1:7474`.
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    /// Populated from `NEO4J_PASSWORD` only.
    #[serde(skip)]
    pub password: Secret,
    #[serde(default = "default_graph_database")]
    pub database: String,
    #[serde(default = "default_graph_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub traversal: GraphTraversal,
    #[serde(default)]
    pub subscriptions: Vec<SeedSubscription>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            backend: default_graph_backend(),
            uri: None,
            user: None,
            password: Secret::default(),
            database: default_graph_database(),
            timeout_ms: default_graph_timeout_ms(),
            traversal: GraphTraversal::default(),
            subscriptions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_web_endpoint")]
    pub endpoint: String,
    /// Appended to every query to keep results on-domain.
    #[serde(default = "default_web_topic")]
    pub topic: String,
    #[serde(default = "default_lookback_years")]
    pub lookback_years: i32,
    #[serde(default = "default_max_headlines")]
    pub max_headlines: usize,
    #[serde(default = "default_web_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            endpoint: default_web_endpoint(),
            topic: default_web_topic(),
            lookback_years: default_lookback_years(),
            max_headlines: default_max_headlines(),
            timeout_ms: default_web_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_risk_terms")]
    pub risk_terms: Vec<String>,
    #[serde(default = "default_opportunity_terms")]
    pub opportunity_terms: Vec<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            risk_terms: default_risk_terms(),
            opportunity_terms: default_opportunity_terms(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_timeout_ms() -> u64 {
    5_000
}

const fn default_retries() -> u32 {
    1
}

const fn default_retry_backoff_ms() -> u64 {
    200
}

const fn default_top_k() -> usize {
    3
}

const fn default_embedder_backend() -> EmbedderBackend {
    EmbedderBackend::Hashing
}

fn default_ollama_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_embedding_model() -> String {
    "all-minilm".to_string()
}

const fn default_dimension() -> usize {
    384
}

const fn default_graph_backend() -> GraphBackend {
    GraphBackend::Neo4j
}

fn default_graph_database() -> String {
    "neo4j".to_string()
}

const fn default_graph_timeout_ms() -> u64 {
    4_000
}

fn default_from_label() -> String {
    "Customer".to_string()
}

fn default_relationship() -> String {
    "SUBSCRIBED_TO".to_string()
}

fn default_to_label() -> String {
    "Plan".to_string()
}

fn default_from_key() -> String {
    "id".to_string()
}

fn default_to_key() -> String {
    "name".to_string()
}

fn default_from_alias() -> String {
    "customer".to_string()
}

fn default_to_alias() -> String {
    "plan".to_string()
}

const fn default_graph_limit() -> usize {
    MAX_GRAPH_RECORDS
}

fn default_web_endpoint() -> String {
    "https://news.google.com/search".to_string()
}

fn default_web_topic() -> String {
    "telecom".to_string()
}

const fn default_lookback_years() -> i32 {
    1
}

const fn default_max_headlines() -> usize {
    MAX_HEADLINES
}

const fn default_web_timeout_ms() -> u64 {
    4_000
}

fn default_risk_terms() -> Vec<String> {
    [
        "churn",
        "congestion",
        "constraint",
        "decline",
        "outage",
        "regulatory",
        "penalty",
        "loss",
        "shortage",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

fn default_opportunity_terms() -> Vec<String> {
    [
        "increase",
        "growth",
        "bundle",
        "upsell",
        "launch",
        "expansion",
        "partnership",
        "adoption",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parse a config file. Missing sections fall back to defaults.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config_file(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<AppConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Locate the config file to use, if any.
///
/// Precedence: explicit path, `HRAG_CONFIG`, `./hrag.toml`, then
/// `<config_dir>/hrag/config.toml`.
#[must_use]
pub fn discover_config_path(
    explicit: Option<&Path>,
    project_root: &Path,
    env: &dyn Fn(&str) -> Option<String>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env("HRAG_CONFIG").filter(|p| !p.trim().is_empty()) {
        return Some(PathBuf::from(path));
    }

    let local = project_root.join(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    let user = dirs::config_dir()?.join("hrag").join("config.toml");
    user.exists().then_some(user)
}

/// Resolve the effective configuration from file and environment.
///
/// # Errors
///
/// Returns an error if the chosen file cannot be parsed or the merged config
/// fails validation.
pub fn resolve_config(explicit: Option<&Path>, project_root: &Path) -> Result<AppConfig> {
    let env = |key: &str| std::env::var(key).ok();
    let mut config = match discover_config_path(explicit, project_root, &env) {
        Some(path) => load_config_file(&path)?,
        None => AppConfig::default(),
    };
    apply_env_overrides(&mut config, &env)?;
    config.validate()?;
    Ok(config)
}

/// Apply `NEO4J_*` and `HRAG_*` overrides.
///
/// # Errors
///
/// Returns an error when a numeric override does not parse.
pub fn apply_env_overrides(
    config: &mut AppConfig,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(uri) = env("NEO4J_URI").filter(|v| !v.trim().is_empty()) {
        config.graph.uri = Some(uri.trim().to_string());
    }
    if let Some(user) = env("NEO4J_USER").filter(|v| !v.trim().is_empty()) {
        config.graph.user = Some(user.trim().to_string());
    }
    if let Some(password) = env("NEO4J_PASSWORD") {
        config.graph.password = Secret::new(password);
    }
    if let Some(raw) = env("HRAG_TIMEOUT_MS") {
        config.retrieval.timeout_ms = raw
            .trim()
            .parse()
            .with_context(|| format!("HRAG_TIMEOUT_MS must be an integer, got '{raw}'"))?;
    }
    Ok(())
}

impl AppConfig {
    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns the first constraint that does not hold.
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.timeout_ms == 0 {
            bail!("retrieval.timeout_ms must be greater than zero");
        }
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be at least 1");
        }
        if self.embedder.dimension == 0 {
            bail!("embedder.dimension must be at least 1");
        }
        if self.web.max_headlines == 0 || self.web.max_headlines > MAX_HEADLINES {
            bail!(
                "web.max_headlines must be in 1..={MAX_HEADLINES}, got {}",
                self.web.max_headlines
            );
        }
        if self.web.lookback_years < 0 {
            bail!("web.lookback_years must not be negative");
        }
        self.graph.traversal.validate()
    }
}
