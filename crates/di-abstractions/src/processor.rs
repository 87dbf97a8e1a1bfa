//! 组件扩展钩子抽象接口

use weave_common::{ComponentValue, CreationError};

/// 组件后置处理器 trait
///
/// 对象图构建器在创建流程的固定扩展点回调已注册的处理器。
/// 每个钩子返回（可能被替换的）实例；拦截引擎正是通过
/// `after_initialization` 和 `early_reference` 将原始实例替换为代理。
pub trait ComponentPostProcessor: Send + Sync {
    /// 处理器名称（日志与诊断用）
    fn processor_name(&self) -> &str;

    /// 初始化回调执行之前
    fn before_initialization(
        &self,
        instance: ComponentValue,
        _identifier: &str,
    ) -> Result<ComponentValue, CreationError> {
        Ok(instance)
    }

    /// 初始化回调执行之后（代理替换点）
    fn after_initialization(
        &self,
        instance: ComponentValue,
        _identifier: &str,
    ) -> Result<ComponentValue, CreationError> {
        Ok(instance)
    }

    /// 为尚在构建中的组件生成早期引用（循环依赖场景的代理替换点）
    fn early_reference(
        &self,
        instance: ComponentValue,
        _identifier: &str,
    ) -> Result<ComponentValue, CreationError> {
        Ok(instance)
    }
}
