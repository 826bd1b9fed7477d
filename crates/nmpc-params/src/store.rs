//! 按命名空间查找的参数存储

use crate::error::ConfigError;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;
use toml::Value;
use tracing::{debug, error};

/// 展平后的参数存储
///
/// 键为 `/` 分隔的完整路径，例如 `arm/nmpc/shooting_nodes`。
/// 数组（包括表数组）作为叶子值整体保存。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterStore {
    values: BTreeMap<String, Value>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 TOML 文本构造
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(content)?;
        let mut store = Self::new();
        store.merge_table("", &table);
        Ok(store)
    }

    /// 从文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), keys = store.len(), "Parameter file loaded");
        Ok(store)
    }

    fn merge_table(&mut self, prefix: &str, table: &toml::Table) {
        for (key, value) in table {
            let full = join(prefix, key);
            match value {
                Value::Table(inner) => self.merge_table(&full, inner),
                other => {
                    self.values.insert(full, other.clone());
                },
            }
        }
    }

    /// 写入单个参数（覆盖已有值）
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// 删除参数
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 命名空间视图
    pub fn namespace<'a>(&'a self, prefix: &str) -> ParameterView<'a> {
        ParameterView {
            store: self,
            prefix: prefix.trim_matches('/').to_string(),
        }
    }
}

fn join(prefix: &str, key: &str) -> String {
    let key = key.trim_matches('/');
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", prefix, key)
    }
}

/// 命名空间下的只读参数视图
#[derive(Debug, Clone)]
pub struct ParameterView<'a> {
    store: &'a ParameterStore,
    prefix: String,
}

impl<'a> ParameterView<'a> {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// 相对键 → 完整键
    pub fn full_key(&self, key: &str) -> String {
        join(&self.prefix, key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.store.contains(&self.full_key(key))
    }

    pub fn raw(&self, key: &str) -> Option<&'a Value> {
        self.store.get(&self.full_key(key))
    }

    /// 读取可选参数
    pub fn get<T: FromParam>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.raw(key).map(|value| T::from_param(key, value)).transpose()
    }

    /// 读取必需参数；缺失时记录 error 日志
    pub fn require<T: FromParam>(&self, key: &str) -> Result<T, ConfigError> {
        match self.get(key)? {
            Some(value) => Ok(value),
            None => {
                error!(namespace = %self.prefix, "Parameter '{}' not set", key);
                Err(ConfigError::MissingKey(key.to_string()))
            },
        }
    }

    /// 读取可选参数，缺失时返回默认值
    pub fn get_or<T: FromParam>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// 用 serde 反序列化结构化参数（例如表数组）
    pub fn deserialize<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.raw(key)
            .map(|value| {
                value.clone().try_into().map_err(|e: toml::de::Error| ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }
}

/// 从 TOML 值转换
pub trait FromParam: Sized {
    fn from_param(key: &str, value: &Value) -> Result<Self, ConfigError>;
}

fn wrong_type(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::InvalidType {
        key: key.to_string(),
        expected,
    }
}

impl FromParam for f64 {
    /// 整数也被接受
    fn from_param(key: &str, value: &Value) -> Result<Self, ConfigError> {
        match value {
            Value::Float(v) => Ok(*v),
            Value::Integer(v) => Ok(*v as f64),
            _ => Err(wrong_type(key, "float")),
        }
    }
}

impl FromParam for i64 {
    fn from_param(key: &str, value: &Value) -> Result<Self, ConfigError> {
        value.as_integer().ok_or_else(|| wrong_type(key, "integer"))
    }
}

impl FromParam for usize {
    fn from_param(key: &str, value: &Value) -> Result<Self, ConfigError> {
        let v = i64::from_param(key, value)?;
        usize::try_from(v).map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("{} is negative", v),
        })
    }
}

impl FromParam for bool {
    fn from_param(key: &str, value: &Value) -> Result<Self, ConfigError> {
        value.as_bool().ok_or_else(|| wrong_type(key, "bool"))
    }
}

impl FromParam for String {
    fn from_param(key: &str, value: &Value) -> Result<Self, ConfigError> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| wrong_type(key, "string"))
    }
}

impl<T: FromParam> FromParam for Vec<T> {
    fn from_param(key: &str, value: &Value) -> Result<Self, ConfigError> {
        value
            .as_array()
            .ok_or_else(|| wrong_type(key, "array"))?
            .iter()
            .map(|item| T::from_param(key, item))
            .collect()
    }
}

impl FromParam for [f64; 3] {
    fn from_param(key: &str, value: &Value) -> Result<Self, ConfigError> {
        let items = Vec::<f64>::from_param(key, value)?;
        items.try_into().map_err(|items: Vec<f64>| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("expected 3 entries, got {}", items.len()),
        })
    }
}
