use cdbpool_protocol::codec::DEFAULT_MAX_FRAME_BYTES;
use cdbpool_sql::buffer::{DEFAULT_MAX_IDLE, DEFAULT_MAX_RETAINED_CAPACITY};
use cdbpool_sql::conn::CallContext;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub addr: String,
    pub db_name: String,
    /// Zero disables the per-call deadline.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PoolConfig {
    pub max_idle_connections: usize,
    pub max_idle_buffers: usize,
    pub max_buffer_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

fn default_call_timeout_ms() -> u64 {
    3000
}

fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_connections: 8,
            max_idle_buffers: DEFAULT_MAX_IDLE,
            max_buffer_capacity: DEFAULT_MAX_RETAINED_CAPACITY,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_path(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.backend.addr.trim().is_empty() {
            return Err(anyhow::anyhow!("backend addr missing"));
        }
        if self.backend.db_name.trim().is_empty() {
            return Err(anyhow::anyhow!("backend db_name missing"));
        }
        if self.backend.max_frame_bytes == 0 {
            return Err(anyhow::anyhow!("backend max_frame_bytes must be positive"));
        }
        self.log_level()?;
        Ok(())
    }

    pub fn log_level(&self) -> anyhow::Result<tracing::Level> {
        self.logging
            .level
            .parse()
            .map_err(|_| anyhow::anyhow!(format!("unknown log level {}", self.logging.level)))
    }

    pub fn call_context(&self) -> CallContext {
        match self.backend.call_timeout_ms {
            0 => CallContext::new(),
            ms => CallContext::new().with_timeout(Duration::from_millis(ms)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn loads_full_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"
[backend]
addr = "127.0.0.1:7070"
db_name = "orders"
call_timeout_ms = 250
max_frame_bytes = 4096

[pool]
max_idle_connections = 2
max_idle_buffers = 16
max_buffer_capacity = 1024

[logging]
level = "debug"
"#
        )
        .expect("write");
        let config = Config::from_path(file.path().to_str().expect("path")).expect("config");
        assert_eq!(config.backend.db_name, "orders");
        assert_eq!(config.pool.max_idle_connections, 2);
        assert_eq!(config.log_level().expect("level"), tracing::Level::DEBUG);
        assert_eq!(config.call_context().timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn optional_sections_take_defaults() {
        let config = Config::from_toml(
            r#"
[backend]
addr = "127.0.0.1:7070"
db_name = "orders"
"#,
        )
        .expect("config");
        assert_eq!(config.backend.call_timeout_ms, 3000);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.pool.max_idle_connections, 8);
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let config = Config::from_toml(
            r#"
[backend]
addr = "127.0.0.1:7070"
db_name = "orders"
call_timeout_ms = 0
"#,
        )
        .expect("config");
        assert!(config.call_context().timeout.is_none());
    }

    #[test]
    fn rejects_invalid_values() {
        for contents in [
            "[backend]\naddr = \"127.0.0.1:7070\"\ndb_name = \"\"\n",
            "[backend]\naddr = \"\"\ndb_name = \"orders\"\n",
            "[backend]\naddr = \"a:1\"\ndb_name = \"orders\"\nmax_frame_bytes = 0\n",
            "[backend]\naddr = \"a:1\"\ndb_name = \"orders\"\n[logging]\nlevel = \"loud\"\n",
        ] {
            assert!(Config::from_toml(contents).is_err(), "{contents} should fail");
        }
    }
}
