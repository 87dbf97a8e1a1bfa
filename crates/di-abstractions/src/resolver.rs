//! 构造函数/工厂方法解析抽象接口

use std::sync::Arc;
use weave_common::{
    ComponentDescriptor, ComponentValue, CreationError, ExecutableSpec, ParameterSpec,
};

/// 依赖提供者 trait
///
/// 解析器在装配参数时通过此接口回调对象图，递归获取依赖组件。
/// 对象图构建器是其标准实现；测试可提供桩实现。
pub trait DependencyProvider: Send + Sync {
    /// 解析显式引用的组件
    fn resolve_reference(
        &self,
        requesting: &str,
        identifier: &str,
    ) -> Result<ComponentValue, CreationError>;

    /// 按参数类型自动装配依赖组件
    fn resolve_dependency(
        &self,
        requesting: &str,
        parameter: &ParameterSpec,
    ) -> Result<ComponentValue, CreationError>;
}

/// 解析结果
///
/// 选中的可执行体和物化完成的参数值数组
#[derive(Clone)]
pub struct ResolvedInstantiation {
    /// 选中的构造函数或工厂方法
    pub executable: Arc<ExecutableSpec>,
    /// 物化后的参数值
    pub arguments: Vec<ComponentValue>,
}

impl std::fmt::Debug for ResolvedInstantiation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedInstantiation")
            .field("executable", &self.executable.signature())
            .field("arguments", &self.arguments.len())
            .finish()
    }
}

/// 构造函数/工厂方法解析器 trait
pub trait ConstructorResolver: Send + Sync {
    /// 解析描述符对应的可执行体并物化参数
    ///
    /// 提供 `explicit_args` 时仅考虑参数个数一致的候选；
    /// 否则按描述符声明的参数规格和自动装配组装参数。
    fn resolve(
        &self,
        descriptor: &ComponentDescriptor,
        explicit_args: Option<&[ComponentValue]>,
        dependencies: &dyn DependencyProvider,
    ) -> Result<ResolvedInstantiation, CreationError>;

    /// 清除指定标识符的解析缓存
    fn evict(&self, identifier: &str);
}
