use muxsql_core::Datasource;
use muxsql_protocol::PlanOptions;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ClientConfig {
    pub session: SessionConfig,
    pub statements: StatementsConfig,
    pub sharding: ShardingConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub min_fetch_size: u32,
    pub response_timeout_ms: u64,
    pub datasource: Datasource,
    pub autocommit: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_fetch_size: 2,
            response_timeout_ms: 60_000,
            datasource: Datasource::Hera,
            autocommit: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StatementsConfig {
    pub escape_enabled: bool,
    pub param_name_binding_enabled: bool,
    pub date_null_fix_enabled: bool,
    pub cache_capacity: usize,
    pub column_metadata: bool,
}

impl Default for StatementsConfig {
    fn default() -> Self {
        Self {
            escape_enabled: true,
            param_name_binding_enabled: true,
            date_null_fix_enabled: false,
            cache_capacity: 1000,
            column_metadata: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ShardingConfig {
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct BatchConfig {
    pub enabled: bool,
}

impl ClientConfig {
    pub fn from_path(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        let config: ClientConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.statements.cache_capacity == 0 {
            return Err(anyhow::anyhow!("statements.cache_capacity must be positive"));
        }
        if self.session.response_timeout_ms == 0 {
            return Err(anyhow::anyhow!("session.response_timeout_ms must be positive"));
        }
        Ok(())
    }

    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            escape_enabled: self.statements.escape_enabled,
            sharding_enabled: self.sharding.enabled,
            param_name_binding_enabled: self.statements.param_name_binding_enabled,
            datasource: self.session.datasource,
        }
    }
}
