use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `MAILWISE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// Hosted language-model settings used by the agent layer.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// Empty disables the agent endpoint.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    /// Upper bound on model/tool round trips inside a single agent step.
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,
    /// How many times an unparseable plan is re-requested.
    #[serde(default = "default_plan_retries")]
    pub plan_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    #[serde(default = "default_seed_enabled")]
    pub enabled: bool,
    #[serde(default = "default_demo_user_id")]
    pub demo_user_id: String,
    #[serde(default = "default_customers_per_user")]
    pub customers_per_user: usize,
    #[serde(default = "default_rng_seed")]
    pub rng_seed: u64,
}

/// Hard ceiling for `max_tool_iterations`, regardless of configuration.
pub const MAX_TOOL_ITERATIONS_CAP: u32 = 10;

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_llm_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_llm_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}
fn default_llm_max_tokens() -> u32 {
    4096
}
fn default_llm_timeout_secs() -> u64 {
    120
}
fn default_max_tool_iterations() -> u32 {
    MAX_TOOL_ITERATIONS_CAP
}
fn default_plan_retries() -> u32 {
    1
}
fn default_seed_enabled() -> bool {
    true
}
fn default_demo_user_id() -> String {
    "demo-user".to_string()
}
fn default_customers_per_user() -> usize {
    1000
}
fn default_rng_seed() -> u64 {
    42
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: String::new(),
            model: default_llm_model(),
            max_tokens: default_llm_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
            max_tool_iterations: default_max_tool_iterations(),
            plan_retries: default_plan_retries(),
        }
    }
}

impl LlmConfig {
    /// Configured iteration bound, clamped to `1..=MAX_TOOL_ITERATIONS_CAP`.
    pub fn tool_iteration_limit(&self) -> u32 {
        self.max_tool_iterations.clamp(1, MAX_TOOL_ITERATIONS_CAP)
    }
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            enabled: default_seed_enabled(),
            demo_user_id: default_demo_user_id(),
            customers_per_user: default_customers_per_user(),
            rng_seed: default_rng_seed(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            llm: LlmConfig::default(),
            seed: SeedConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("MAILWISE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.api.http_port, 8080);
        assert_eq!(config.llm.max_tool_iterations, 10);
        assert_eq!(config.llm.plan_retries, 1);
        assert_eq!(config.seed.customers_per_user, 1000);
        assert!(config.llm.api_key.is_empty());
    }

    #[test]
    fn test_tool_iteration_limit_is_capped() {
        let mut llm = LlmConfig::default();
        llm.max_tool_iterations = 50;
        assert_eq!(llm.tool_iteration_limit(), MAX_TOOL_ITERATIONS_CAP);
        llm.max_tool_iterations = 0;
        assert_eq!(llm.tool_iteration_limit(), 1);
    }
}
