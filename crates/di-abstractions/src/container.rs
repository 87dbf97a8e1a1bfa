//! 对象图构建器抽象接口

use serde::{Deserialize, Serialize};
use weave_common::{ComponentDescriptor, ComponentValue, CreationError, DescriptorError};

/// 对象图 trait
///
/// 组合根协作方可见的核心操作：注册描述符、按标识符获取实例
pub trait ObjectGraph: Send + Sync {
    /// 获取或创建指定标识符的组件实例
    ///
    /// 单例作用域下，首次成功创建后幂等返回同一实例
    fn get_or_create(&self, identifier: &str) -> Result<ComponentValue, CreationError>;

    /// 检查标识符是否已注册
    fn contains(&self, identifier: &str) -> bool;

    /// 注册描述符
    fn register(&self, descriptor: ComponentDescriptor) -> Result<(), DescriptorError>;
}

/// 容器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// 宽松构造解析模式（类型差异加权评分）；关闭后为严格模式
    pub lenient_resolution: bool,
    /// 是否允许非公有的构造函数/工厂方法作为候选
    pub allow_non_public: bool,
    /// 早期引用已暴露给依赖方、而最终对象被替换（织入代理）时，
    /// 是否容忍依赖方持有原始引用。逃生舱口，默认关闭
    pub allow_raw_injection: bool,
    /// 最大解析递归深度
    pub max_resolution_depth: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            lenient_resolution: true,
            allow_non_public: false,
            allow_raw_injection: false,
            max_resolution_depth: 100,
        }
    }
}
