// ==========================================
// 安保业务后台 - 服务配置
// ==========================================
// 环境变量:
// - BACKOFFICE_SYNC_HOST                 监听地址（默认 127.0.0.1）
// - BACKOFFICE_SYNC_PORT                 监听端口（默认 8080）
// - BACKOFFICE_SYNC_DB_PATH              数据库路径（默认用户数据目录）
// - BACKOFFICE_SYNC_LOCALE               语言（默认 it）
// - BACKOFFICE_SYNC_IMPORT_TIMEOUT_SECS  批次超时秒数（默认 300，0 = 不限时）
// ==========================================

use crate::i18n::DEFAULT_LOCALE;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const ENV_HOST: &str = "BACKOFFICE_SYNC_HOST";
pub const ENV_PORT: &str = "BACKOFFICE_SYNC_PORT";
pub const ENV_DB_PATH: &str = "BACKOFFICE_SYNC_DB_PATH";
pub const ENV_LOCALE: &str = "BACKOFFICE_SYNC_LOCALE";
pub const ENV_IMPORT_TIMEOUT_SECS: &str = "BACKOFFICE_SYNC_IMPORT_TIMEOUT_SECS";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_IMPORT_TIMEOUT_SECS: u64 = 300;

/// 配置错误
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("配置项 {key} 无效: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// 服务配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub locale: String,
    /// 批次超时（None = 不限时）
    pub import_timeout: Option<Duration>,
}

impl ServerConfig {
    /// 从进程环境变量读取
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// 从键值表读取（空白值视为未设置）
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let port = match get(ENV_PORT) {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                key: ENV_PORT,
                value: raw.clone(),
            })?,
            None => DEFAULT_PORT,
        };

        let timeout_secs = match get(ENV_IMPORT_TIMEOUT_SECS) {
            Some(raw) => raw.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: ENV_IMPORT_TIMEOUT_SECS,
                value: raw.clone(),
            })?,
            None => DEFAULT_IMPORT_TIMEOUT_SECS,
        };

        Ok(Self {
            host: get(ENV_HOST).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            db_path: get(ENV_DB_PATH).unwrap_or_else(get_default_db_path),
            locale: get(ENV_LOCALE).unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
            import_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        })
    }

    /// 监听地址
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                key: ENV_HOST,
                value: self.host.clone(),
            })
    }
}

/// 默认数据库路径（用户数据目录下）
pub fn get_default_db_path() -> String {
    let mut path = PathBuf::from("./backoffice_sync.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("backoffice-sync");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("backoffice_sync.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_vars(&vars(&[(ENV_DB_PATH, "/tmp/test.db")])).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_path, "/tmp/test.db");
        assert_eq!(config.locale, "it");
        assert_eq!(config.import_timeout, Some(Duration::from_secs(300)));
        assert_eq!(config.bind_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_overrides_and_zero_timeout() {
        let config = ServerConfig::from_vars(&vars(&[
            (ENV_HOST, "0.0.0.0"),
            (ENV_PORT, "9090"),
            (ENV_DB_PATH, "/tmp/x.db"),
            (ENV_LOCALE, "en"),
            (ENV_IMPORT_TIMEOUT_SECS, "0"),
        ]))
        .unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9090);
        assert_eq!(config.locale, "en");
        assert_eq!(config.import_timeout, None);
    }

    #[test]
    fn test_invalid_port() {
        let err = ServerConfig::from_vars(&vars(&[(ENV_PORT, "porta"), (ENV_DB_PATH, "/tmp/x.db")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: ENV_PORT,
                value: "porta".to_string(),
            }
        );
    }

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(path.ends_with(".db"));
    }
}
