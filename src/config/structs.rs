use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::errors::{Result, ShortenerError};

/// 静态配置（启动时加载）
///
/// 包含：
/// - server: 监听地址、端口、base_url、worker 数量
/// - storage: 存储后端（内存 / 追加日志文件 / 数据库）
/// - shortener: 短码生成参数
/// - deletion: 批量删除的防抖参数
/// - identity: 匿名身份 Cookie 参数
/// - logging: 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub shortener: ShortenerConfig,
    #[serde(default)]
    pub deletion: DeletionConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > config.toml > 默认值
    /// ENV 前缀：SHORTENER，分隔符：__
    /// 示例：SHORTENER__SERVER__PORT=9999
    pub fn load(path: Option<&str>) -> Self {
        use config::{Config, Environment, File};

        let path = path.unwrap_or("config.toml");

        let builder = Config::builder()
            // 1. 从 TOML 文件加载（可选）
            .add_source(File::with_name(path).required(false))
            // 2. 从环境变量覆盖
            .add_source(
                Environment::with_prefix("SHORTENER")
                    .separator("__")
                    .try_parsing(true),
            );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<StaticConfig>() {
                Ok(config) => {
                    if std::path::Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// 兼容旧版的扁平环境变量（SERVER_ADDRESS / BASE_URL / FILE_STORAGE_PATH / DATABASE_DSN）
    pub fn apply_legacy_env(&mut self) -> Result<()> {
        self.apply_legacy_vars(|key| std::env::var(key).ok())
    }

    fn apply_legacy_vars<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("SERVER_ADDRESS").filter(|v| !v.is_empty()) {
            self.server.apply_address(&addr)?;
        }
        if let Some(base_url) = lookup("BASE_URL").filter(|v| !v.is_empty()) {
            self.server.base_url = base_url;
        }
        if let Some(path) = lookup("FILE_STORAGE_PATH").filter(|v| !v.is_empty()) {
            self.storage.file_path = Some(path);
        }
        if let Some(dsn) = lookup("DATABASE_DSN").filter(|v| !v.is_empty()) {
            self.storage.database_url = Some(dsn);
        }
        Ok(())
    }

    /// 命令行参数覆盖（最高优先级）
    pub fn apply_cli(&mut self, cli: &Cli) -> Result<()> {
        if let Some(addr) = cli.address.as_deref() {
            self.server.apply_address(addr)?;
        }
        if let Some(base_url) = &cli.base_url {
            self.server.base_url = base_url.clone();
        }
        if let Some(path) = &cli.file_storage_path {
            self.storage.file_path = Some(path.clone());
        }
        if let Some(dsn) = &cli.database_dsn {
            self.storage.database_url = Some(dsn.clone());
        }
        Ok(())
    }

    /// 启动前校验
    pub fn validate(&self) -> Result<()> {
        if self.shortener.code_length == 0 {
            return Err(ShortenerError::config(
                "shortener.code_length must be greater than 0",
            ));
        }
        if self.deletion.flush_threshold == 0 {
            return Err(ShortenerError::config(
                "deletion.flush_threshold must be greater than 0",
            ));
        }
        if self.deletion.debounce_secs == 0 {
            return Err(ShortenerError::config(
                "deletion.debounce_secs must be greater than 0",
            ));
        }
        if self.server.workers == 0 {
            return Err(ShortenerError::config("server.workers must be greater than 0"));
        }
        Ok(())
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// 短链接前缀，例如 http://127.0.0.1:8080/
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl ServerConfig {
    /// 解析 host:port 形式的监听地址
    pub fn apply_address(&mut self, addr: &str) -> Result<()> {
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| ShortenerError::config(format!("Invalid address '{}'", addr)))?;
        let port = port
            .parse::<u16>()
            .map_err(|e| ShortenerError::config(format!("Invalid port in '{}': {}", addr, e)))?;
        if !host.is_empty() {
            self.host = host.to_string();
        }
        self.port = port;
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 拼接完整短链接
    pub fn short_url(&self, alias: &str) -> String {
        if self.base_url.ends_with('/') {
            format!("{}{}", self.base_url, alias)
        } else {
            format!("{}/{}", self.base_url, alias)
        }
    }
}

/// 存储配置
///
/// database_url 优先；否则使用 file_path；都未设置时使用内存存储。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_database_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_database_timeout")]
    pub timeout: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

/// 短码生成配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortenerConfig {
    #[serde(default = "default_code_length")]
    pub code_length: usize,
}

/// 批量删除防抖配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionConfig {
    /// 防抖窗口（秒）
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: u64,
    /// 缓冲区达到该数量时立即刷盘
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,
}

/// 匿名身份 Cookie 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// 签名密钥；为空时启动时随机生成（重启后旧 Cookie 失效）
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_cookie_max_age")]
    pub max_age_secs: i64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

// ============================================================
// Default value functions
// ============================================================

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080/".to_string()
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_database_pool_size() -> u32 {
    10
}

fn default_database_timeout() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_code_length() -> usize {
    5
}

fn default_debounce_secs() -> u64 {
    5
}

fn default_flush_threshold() -> usize {
    3
}

fn default_cookie_name() -> String {
    "user_id".to_string()
}

fn default_cookie_max_age() -> i64 {
    3600 * 24
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            base_url: default_base_url(),
            workers: default_workers(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            file_path: None,
            database_url: None,
            pool_size: default_database_pool_size(),
            timeout: default_database_timeout(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self {
            code_length: default_code_length(),
        }
    }
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            debounce_secs: default_debounce_secs(),
            flush_threshold: default_flush_threshold(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            secret: String::new(),
            max_age_secs: default_cookie_max_age(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = StaticConfig::default();
        assert_eq!(config.shortener.code_length, 5);
        assert_eq!(config.deletion.debounce_secs, 5);
        assert_eq!(config.deletion.flush_threshold, 3);
        assert_eq!(config.identity.cookie_name, "user_id");
        assert!(config.storage.file_path.is_none());
        assert!(config.storage.database_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_address() {
        let mut server = ServerConfig::default();
        server.apply_address("0.0.0.0:9090").unwrap();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 9090);

        // 只给端口时保留 host
        server.apply_address(":7000").unwrap();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 7000);

        assert!(server.apply_address("localhost").is_err());
        assert!(server.apply_address("localhost:http").is_err());
    }

    #[test]
    fn test_short_url_joins_slash() {
        let mut server = ServerConfig::default();
        server.base_url = "http://sho.rt".to_string();
        assert_eq!(server.short_url("abcde"), "http://sho.rt/abcde");

        server.base_url = "http://sho.rt/".to_string();
        assert_eq!(server.short_url("abcde"), "http://sho.rt/abcde");
    }

    #[test]
    fn test_legacy_vars_override() {
        let vars: HashMap<&str, &str> = [
            ("SERVER_ADDRESS", "10.0.0.1:8181"),
            ("BASE_URL", "http://legacy/"),
            ("FILE_STORAGE_PATH", "/var/lib/urls.log"),
            ("DATABASE_DSN", ""),
        ]
        .into_iter()
        .collect();

        let mut config = StaticConfig::default();
        config
            .apply_legacy_vars(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.server.port, 8181);
        assert_eq!(config.server.base_url, "http://legacy/");
        assert_eq!(config.storage.file_path.as_deref(), Some("/var/lib/urls.log"));
        // 空值不覆盖
        assert!(config.storage.database_url.is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli {
            address: Some("127.0.0.1:3000".to_string()),
            database_dsn: Some("sqlite://test.db".to_string()),
            ..Default::default()
        };

        let mut config = StaticConfig::default();
        config.apply_cli(&cli).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(
            config.storage.database_url.as_deref(),
            Some("sqlite://test.db")
        );
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = StaticConfig::default();
        config.deletion.flush_threshold = 0;
        assert!(matches!(config.validate(), Err(ShortenerError::Config(_))));

        let mut config = StaticConfig::default();
        config.shortener.code_length = 0;
        assert!(config.validate().is_err());

        let mut config = StaticConfig::default();
        config.deletion.debounce_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sample_config_roundtrips_through_toml() {
        let sample = StaticConfig::generate_sample_config();
        assert!(sample.contains("[deletion]"));
        let parsed: StaticConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.deletion.flush_threshold, 3);
    }
}
