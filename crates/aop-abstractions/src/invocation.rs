//! 方法调用上下文

use weave_common::{ComponentValue, InvocationError, MethodDescriptor};

/// 方法调用的结果
pub type InvocationOutcome = Result<ComponentValue, InvocationError>;

/// 方法调用上下文 trait
///
/// 携带代理引用、目标实例、方法描述符和实际参数；`proceed` 是
/// 进入链中下一个元素（或链尾真实方法）的续延。
pub trait Invocation: Send {
    /// 被调用的方法
    fn method(&self) -> &MethodDescriptor;

    /// 实际参数
    fn arguments(&self) -> &[ComponentValue];

    /// 目标实例（未包装的原始组件）
    fn target(&self) -> &ComponentValue;

    /// 发起调用的代理引用（直接调用目标时为 `None`）
    fn proxy(&self) -> Option<&ComponentValue>;

    /// 继续执行链中的下一个元素，链尾执行真实方法
    fn proceed(&mut self) -> InvocationOutcome;
}
