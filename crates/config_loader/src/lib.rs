//! # Config Loader
//!
//! 读取 dashtrack 的转换蓝图：TOML 或 JSON 文件，反序列化后做一次完整校验。
//! 缺省的字段取 `ConversionBlueprint` 的默认值，没有配置文件时整份使用默认值。
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("dashtrack.toml"))?;
//! println!("frames go to {}", blueprint.output.dir);
//! # Ok::<(), contracts::ContractError>(())
//! ```

mod parser;
mod validator;

use std::path::Path;

pub use contracts::ConversionBlueprint;
use contracts::ContractError;
pub use parser::ConfigFormat;

pub struct ConfigLoader;

impl ConfigLoader {
    /// 从文件加载配置，格式由扩展名 (.toml / .json) 决定
    ///
    /// 解析与校验错误的消息带上文件路径。
    ///
    /// # Errors
    /// - 文件读取失败
    /// - 不支持的格式
    /// - 解析或校验失败
    pub fn load_from_path(path: &Path) -> Result<ConversionBlueprint, ContractError> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format).map_err(|e| match e {
            ContractError::ConfigParse { message, source } => ContractError::ConfigParse {
                message: format!("{}: {message}", path.display()),
                source,
            },
            other => other,
        })
    }

    /// 有路径时加载文件，否则使用全部默认值
    ///
    /// # Errors
    /// 同 [`ConfigLoader::load_from_path`]
    pub fn load_or_default(path: Option<&Path>) -> Result<ConversionBlueprint, ContractError> {
        path.map_or_else(|| Ok(ConversionBlueprint::default()), Self::load_from_path)
    }

    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ConversionBlueprint, ContractError> {
        let blueprint = format.decode(content)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Re-check a blueprint changed in code, e.g. after CLI overrides
    pub fn validate(blueprint: &ConversionBlueprint) -> Result<(), ContractError> {
        validator::validate(blueprint)
    }

    pub fn to_toml(blueprint: &ConversionBlueprint) -> Result<String, ContractError> {
        ConfigFormat::Toml.encode(blueprint)
    }

    pub fn to_json(blueprint: &ConversionBlueprint) -> Result<String, ContractError> {
        ConfigFormat::Json.encode(blueprint)
    }
}
