//! Ingestion 错误类型

use contracts::ContractError;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 传输包不合法
    #[error("invalid transport packet: {0}")]
    InvalidPacket(String),

    /// PSI 表不合法
    #[error("invalid PSI section: {0}")]
    InvalidSection(String),

    /// PES 包不合法
    #[error("invalid PES packet: {0}")]
    InvalidPes(String),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestionError {
    pub fn invalid_packet(message: impl Into<String>) -> Self {
        Self::InvalidPacket(message.into())
    }

    pub fn invalid_section(message: impl Into<String>) -> Self {
        Self::InvalidSection(message.into())
    }

    pub fn invalid_pes(message: impl Into<String>) -> Self {
        Self::InvalidPes(message.into())
    }

    /// 转换为跨 crate 的错误，附带文件名
    pub fn into_contract(self, file: &str) -> ContractError {
        match self {
            Self::Io(e) => ContractError::Io(e),
            other => ContractError::container_corrupt(file, other.to_string()),
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
