//! 分层配置
//!
//! 多个配置源按优先级叠加：环境变量 > 内存配置 > TOML 文件。
//! 键统一使用 `section.key` 的扁平形式，例如 `proxy.policy`、`logging.level`。

use crate::error::{CoreError, CoreResult};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "INTERPOSE_";

/// 配置值类型
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<ConfigValue>),
}

impl ConfigValue {
    /// 从环境变量等纯文本来源推断类型
    ///
    /// `true`/`false` 视为布尔值，能解析为整数/浮点数的视为数字，其余为字符串。
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_lowercase().as_str() {
            "true" => return ConfigValue::Bool(true),
            "false" => return ConfigValue::Bool(false),
            _ => {}
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return ConfigValue::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return ConfigValue::Float(f);
        }
        ConfigValue::String(raw.to_string())
    }

    /// 转换为字符串
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// 转换为整数
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            ConfigValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// 转换为布尔值
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            ConfigValue::String(s) => match s.to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    fn to_toml(&self) -> toml::Value {
        match self {
            ConfigValue::String(s) => toml::Value::String(s.clone()),
            ConfigValue::Int(i) => toml::Value::Integer(*i),
            ConfigValue::Float(f) => toml::Value::Float(*f),
            ConfigValue::Bool(b) => toml::Value::Boolean(*b),
            ConfigValue::Array(arr) => toml::Value::Array(arr.iter().map(Self::to_toml).collect()),
        }
    }

    fn from_toml(value: &toml::Value) -> Self {
        match value {
            toml::Value::String(s) => ConfigValue::String(s.clone()),
            toml::Value::Integer(i) => ConfigValue::Int(*i),
            toml::Value::Float(f) => ConfigValue::Float(*f),
            toml::Value::Boolean(b) => ConfigValue::Bool(*b),
            toml::Value::Array(arr) => ConfigValue::Array(arr.iter().map(Self::from_toml).collect()),
            toml::Value::Datetime(dt) => ConfigValue::String(dt.to_string()),
            toml::Value::Table(table) => ConfigValue::String(toml::Value::Table(table.clone()).to_string()),
        }
    }
}

/// 配置源 trait
pub trait PropertySource: Send + Sync {
    /// 配置源名称
    fn name(&self) -> &str;

    /// 获取配置值
    fn get(&self, key: &str) -> Option<ConfigValue>;

    /// 所有配置键
    fn keys(&self) -> Vec<String>;

    /// 优先级（数字越大优先级越高）
    fn priority(&self) -> i32 {
        0
    }
}

/// TOML 配置源
pub struct TomlPropertySource {
    name: String,
    properties: HashMap<String, ConfigValue>,
    priority: i32,
}

impl TomlPropertySource {
    /// 从文件加载
    pub fn from_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| CoreError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path.to_string_lossy())
    }

    /// 从字符串解析
    pub fn parse(content: &str, name: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        let value: toml::Value = toml::from_str(content).map_err(|source| CoreError::ConfigParse {
            name: name.clone(),
            source,
        })?;

        let mut properties = HashMap::new();
        Self::flatten(&value, String::new(), &mut properties);

        Ok(Self {
            name,
            properties,
            priority: 0,
        })
    }

    /// 展平 TOML 结构：`{ proxy: { policy: "x" } }` -> `{ "proxy.policy": "x" }`
    fn flatten(value: &toml::Value, prefix: String, result: &mut HashMap<String, ConfigValue>) {
        match value {
            toml::Value::Table(table) => {
                for (key, val) in table {
                    let next = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    Self::flatten(val, next, result);
                }
            }
            other => {
                result.insert(prefix, ConfigValue::from_toml(other));
            }
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl PropertySource for TomlPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.properties.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// 环境变量配置源
///
/// `INTERPOSE_PROXY_POLICY` 对应 `proxy.policy`，
/// `INTERPOSE_LOGGING_SHOW_TARGET` 对应 `logging.show_target`：
/// 去掉前缀后的第一个 `_` 分隔配置段与键名。
pub struct EnvironmentPropertySource {
    prefix: String,
    priority: i32,
}

impl EnvironmentPropertySource {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            priority: 100,
        }
    }

    fn env_to_key(&self, env_key: &str) -> Option<String> {
        let stripped = env_key.strip_prefix(&self.prefix)?.to_lowercase();
        match stripped.split_once('_') {
            Some((section, key)) if !section.is_empty() && !key.is_empty() => {
                Some(format!("{}.{}", section, key))
            }
            _ => None,
        }
    }

    fn key_to_env(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.replace('.', "_").to_uppercase())
    }
}

impl Default for EnvironmentPropertySource {
    fn default() -> Self {
        Self::new(ENV_PREFIX)
    }
}

impl PropertySource for EnvironmentPropertySource {
    fn name(&self) -> &str {
        "environment"
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        std::env::var(self.key_to_env(key))
            .ok()
            .map(|raw| ConfigValue::infer(&raw))
    }

    fn keys(&self) -> Vec<String> {
        std::env::vars()
            .filter_map(|(k, _)| self.env_to_key(&k))
            .collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// 内存配置源（用于测试或运行时覆盖）
pub struct MapPropertySource {
    name: String,
    properties: HashMap<String, ConfigValue>,
    priority: i32,
}

impl MapPropertySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
            priority: 50,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl PropertySource for MapPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.properties.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// Settings - 配置管理器
///
/// 按优先级聚合多个 [`PropertySource`]，并支持把一个配置段绑定到 serde 结构体。
pub struct Settings {
    sources: RwLock<Vec<Box<dyn PropertySource>>>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sources = self.sources.read();
        f.debug_struct("Settings")
            .field("sources", &sources.iter().map(|s| s.name().to_string()).collect::<Vec<_>>())
            .finish()
    }
}

impl Settings {
    /// 创建空配置
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(Vec::new()),
        }
    }

    /// 仅包含环境变量配置源
    pub fn from_env() -> Self {
        let settings = Self::new();
        settings.add_source(Box::new(EnvironmentPropertySource::default()));
        settings
    }

    /// 加载 TOML 文件，并叠加环境变量
    ///
    /// 文件不存在时只使用环境变量。
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let settings = Self::from_env();
        if path.exists() {
            settings.add_source(Box::new(TomlPropertySource::from_file(path)?));
            tracing::debug!("Loaded config file {:?}", path);
        } else {
            tracing::debug!("Config file {:?} not found, using environment only", path);
        }
        Ok(settings)
    }

    /// 添加配置源
    pub fn add_source(&self, source: Box<dyn PropertySource>) {
        let mut sources = self.sources.write();
        sources.push(source);
        sources.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    /// 获取配置值（高优先级配置源优先）
    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        let sources = self.sources.read();
        for source in sources.iter() {
            if let Some(value) = source.get(key) {
                tracing::trace!("Config '{}' found in source '{}'", key, source.name());
                return Some(value);
            }
        }
        None
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(String::from))
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    /// 以 `prefix.` 开头的所有键（去重、排序）
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let wanted = format!("{}.", prefix);
        let sources = self.sources.read();
        let mut keys: Vec<String> = sources
            .iter()
            .flat_map(|s| s.keys())
            .filter(|k| k.starts_with(&wanted))
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// 将 `prefix` 配置段绑定到结构体
    ///
    /// ```rust,ignore
    /// #[derive(Deserialize, Default)]
    /// #[serde(default)]
    /// struct ProxySection { policy: String }
    ///
    /// let section: ProxySection = settings.bind("proxy")?;
    /// ```
    pub fn bind<T: DeserializeOwned>(&self, prefix: &str) -> CoreResult<T> {
        let mut table = toml::Table::new();
        for key in self.keys_with_prefix(prefix) {
            let Some(value) = self.get(&key) else {
                continue;
            };
            let relative = &key[prefix.len() + 1..];
            insert_nested(&mut table, relative, value.to_toml());
        }

        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| CoreError::ConfigBind {
                prefix: prefix.to_string(),
                message: e.to_string(),
            })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

fn insert_nested(table: &mut toml::Table, key: &str, value: toml::Value) {
    match key.split_once('.') {
        None => {
            table.insert(key.to_string(), value);
        }
        Some((head, rest)) => {
            let child = table
                .entry(head.to_string())
                .or_insert_with(|| toml::Value::Table(toml::Table::new()));
            if let toml::Value::Table(child) = child {
                insert_nested(child, rest, value);
            }
        }
    }
}
