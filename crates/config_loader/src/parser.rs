//! 蓝图的文本格式
//!
//! TOML 为主，JSON 用于机器生成的配置。

use std::path::Path;

use contracts::{ContractError, ConversionBlueprint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// 按扩展名识别，大小写不敏感
    pub fn from_path(path: &Path) -> Result<Self, ContractError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            "" => Err(ContractError::config_parse(format!(
                "{}: no file extension, expected .toml or .json",
                path.display()
            ))),
            other => Err(ContractError::config_parse(format!(
                "{}: unsupported config format .{other}",
                path.display()
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }

    /// 只做反序列化，不校验
    pub fn decode(self, content: &str) -> Result<ConversionBlueprint, ContractError> {
        let parsed = match self {
            Self::Toml => toml::from_str(content).map_err(|e| Box::new(e) as BoxedError),
            Self::Json => serde_json::from_str(content).map_err(|e| Box::new(e) as BoxedError),
        };
        parsed.map_err(|e| ContractError::ConfigParse {
            message: format!("{} parse error: {e}", self.name()),
            source: Some(e),
        })
    }

    pub fn encode(self, blueprint: &ConversionBlueprint) -> Result<String, ContractError> {
        let text = match self {
            Self::Toml => toml::to_string_pretty(blueprint).map_err(|e| e.to_string()),
            Self::Json => serde_json::to_string_pretty(blueprint).map_err(|e| e.to_string()),
        };
        text.map_err(|e| ContractError::config_parse(format!("{} serialize error: {e}", self.name())))
    }
}

type BoxedError = Box<dyn std::error::Error + Send + Sync>;
