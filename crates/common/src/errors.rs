//! 错误类型定义

use thiserror::Error;

/// 描述符错误类型
///
/// 描述符格式错误或注册冲突，在注册时立即报告
#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("组件标识符重复: {identifier}")]
    DuplicateIdentifier { identifier: String },

    #[error("组件未注册: {identifier}")]
    NotRegistered { identifier: String },

    #[error("抽象描述符不能实例化: {identifier}")]
    AbstractInstantiation { identifier: String },

    #[error("不支持的作用域: {identifier}, 作用域: {scope}")]
    UnsupportedScope { identifier: String, scope: String },

    #[error("描述符无效: {identifier}, 原因: {message}")]
    InvalidDescriptor { identifier: String, message: String },

    #[error("类型模型未注册: {type_name}")]
    ModelMissing { type_name: String },
}

/// 类型转换错误类型
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("目标类型没有注册转换器: {type_name}")]
    UnsupportedTargetType { type_name: String },

    #[error("值无法转换为目标类型: {type_name}, 值: {value}")]
    ValueMismatch { type_name: String, value: String },

    #[error("反序列化失败: {type_name}, 原因: {source}")]
    Deserialization {
        type_name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 构造函数/工厂方法解析错误类型
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("找不到匹配的构造函数或工厂方法: {identifier} (类型 {type_name}): {message}")]
    NoMatchingExecutable {
        identifier: String,
        type_name: String,
        message: String,
    },

    #[error("构造函数解析不明确: {identifier}, 候选: {candidates:?}")]
    AmbiguousExecutable {
        identifier: String,
        candidates: Vec<String>,
    },

    #[error("依赖无法满足: {identifier}, 参数 '{parameter}': {source}")]
    UnsatisfiedDependency {
        identifier: String,
        parameter: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("按类型解析不明确: {type_name}, 候选: {candidates:?}")]
    AmbiguousDependency {
        type_name: String,
        candidates: Vec<String>,
    },

    #[error("参数值转换失败: {identifier}, 参数 '{parameter}': {source}")]
    ArgumentConversion {
        identifier: String,
        parameter: String,
        #[source]
        source: ConversionError,
    },
}

/// 循环引用错误类型
#[derive(Error, Debug)]
pub enum CircularReferenceError {
    #[error("检测到无法解决的构造注入循环: {}", path.join(" -> "))]
    ConstructorCycle { path: Vec<String> },

    #[error("组件正在创建中（意外的重入创建）: {identifier}")]
    CurrentlyInCreation { identifier: String },
}

/// 创建阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationStage {
    /// 构造函数/工厂方法解析
    Resolution,
    /// 原始实例化
    Instantiation,
    /// 属性填充
    Population,
    /// 初始化回调
    Initialization,
    /// 代理织入
    Proxying,
    /// 销毁回调
    Destruction,
}

impl std::fmt::Display for CreationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Resolution => "解析",
            Self::Instantiation => "实例化",
            Self::Population => "属性填充",
            Self::Initialization => "初始化",
            Self::Proxying => "代理织入",
            Self::Destruction => "销毁",
        };
        f.write_str(label)
    }
}

/// 组件创建错误
///
/// 包装创建过程中任意阶段的失败，携带组件标识符、失败阶段和嵌套原因。
/// 清理过程中出现的次级错误记录在 `suppressed` 中，不会替换主错误。
#[derive(Error, Debug)]
#[error("组件创建失败: {identifier}, 阶段: {stage}, 原因: {source}")]
pub struct CreationError {
    /// 失败组件的标识符
    pub identifier: String,
    /// 失败所处的创建阶段
    pub stage: CreationStage,
    /// 嵌套原因
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
    /// 展开期间捕获的次级错误
    pub suppressed: Vec<Box<dyn std::error::Error + Send + Sync>>,
}

impl CreationError {
    /// 创建新的创建错误
    pub fn new(
        identifier: impl Into<String>,
        stage: CreationStage,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            stage,
            source: source.into(),
            suppressed: Vec::new(),
        }
    }

    /// 使用纯文本消息创建创建错误
    pub fn from_message(
        identifier: impl Into<String>,
        stage: CreationStage,
        message: impl Into<String>,
    ) -> Self {
        Self::new(identifier, stage, PlainMessage(message.into()))
    }

    /// 附加一个展开期间捕获的次级错误
    pub fn push_suppressed(
        &mut self,
        error: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) {
        self.suppressed.push(error.into());
    }

    /// 判断嵌套原因是否为循环引用错误
    pub fn is_circular(&self) -> bool {
        self.source.downcast_ref::<CircularReferenceError>().is_some()
    }

    /// 沿错误链判断是否存在循环引用原因
    pub fn has_circular_cause(&self) -> bool {
        let mut cause: &(dyn std::error::Error + 'static) = self;
        loop {
            if cause.downcast_ref::<CircularReferenceError>().is_some() {
                return true;
            }
            match cause.source() {
                Some(next) => cause = next,
                None => return false,
            }
        }
    }
}

/// 纯文本错误消息
#[derive(Error, Debug)]
#[error("{0}")]
struct PlainMessage(String);

/// 方法调用错误类型
#[derive(Error, Debug)]
pub enum InvocationError {
    #[error("方法不存在: {type_name}::{method}")]
    MethodNotFound { type_name: String, method: String },

    #[error("方法参数数量不匹配: {method}, 期望 {expected}, 实际 {actual}")]
    ArgumentCount {
        method: String,
        expected: usize,
        actual: usize,
    },

    #[error("方法参数类型不匹配: {method}, 参数位置 {index}")]
    ArgumentType { method: String, index: usize },

    #[error("调用目标类型不匹配: {method}")]
    TargetTypeMismatch { method: String },

    #[error("方法执行失败: {method}, 原因: {source}")]
    Application {
        method: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl InvocationError {
    /// 包装业务方法抛出的应用错误
    pub fn application(
        method: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Application {
            method: method.into(),
            source: source.into(),
        }
    }

    /// 错误种类标签（供 after-throwing 通知过滤）
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MethodNotFound { .. } => "method_not_found",
            Self::ArgumentCount { .. } => "argument_count",
            Self::ArgumentType { .. } => "argument_type",
            Self::TargetTypeMismatch { .. } => "target_type_mismatch",
            Self::Application { .. } => "application",
        }
    }
}

/// 代理配置错误类型
#[derive(Error, Debug)]
pub enum ProxyConfigurationError {
    #[error("没有可应用的切面，无法创建代理: {identifier}")]
    NoAdvisors { identifier: String },

    #[error("代理目标不可用: {message}")]
    NoUsableTarget { message: String },

    #[error("能力接口缺少代理绑定器: {capability}")]
    MissingBinder { capability: String },
}

/// 结果类型别名
pub type DescriptorResult<T> = Result<T, DescriptorError>;
pub type ConversionResult<T> = Result<T, ConversionError>;
pub type ResolutionResult<T> = Result<T, ResolutionError>;
pub type CreationResult<T> = Result<T, CreationError>;
pub type ProxyResult<T> = Result<T, ProxyConfigurationError>;
