//! 组合层错误类型定义

use thiserror::Error;
use weave_common::{CreationError, DescriptorError};

/// 组合层错误类型
#[derive(Error, Debug)]
pub enum CompositionError {
    #[error("上下文构建失败: {message}")]
    BootstrapFailed { message: String },

    #[error("描述符错误: {source}")]
    Descriptor {
        #[from]
        source: DescriptorError,
    },

    #[error("组件创建错误: {source}")]
    Creation {
        #[from]
        source: CreationError,
    },

    #[error("启动任务失败: {name}, 原因: {source}")]
    StartupTask {
        name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("上下文关闭失败: {message}")]
    ShutdownFailed { message: String },
}

/// 结果类型别名
pub type CompositionResult<T> = Result<T, CompositionError>;
