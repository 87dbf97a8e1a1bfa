//! 通知行为定义
//!
//! 五种通知行为：环绕（控制底层调用是否/何时执行）、前置、
//! 正常返回后、抛错后（可按错误种类过滤）、最终（无论结果如何）。

use crate::invocation::{Invocation, InvocationOutcome};
use std::sync::Arc;
use weave_common::{ComponentValue, InvocationError, MethodDescriptor};

/// 环绕通知 trait
///
/// 包裹整个调用，通过 `invocation.proceed()` 决定是否以及何时
/// 继续执行底层调用
pub trait AroundAdvice: Send + Sync {
    /// 执行环绕逻辑
    fn invoke(&self, invocation: &mut dyn Invocation) -> InvocationOutcome;
}

/// 前置通知 trait
///
/// 在底层调用前执行；返回错误会中止调用
pub trait BeforeAdvice: Send + Sync {
    /// 前置处理
    fn before(
        &self,
        method: &MethodDescriptor,
        arguments: &[ComponentValue],
        target: &ComponentValue,
    ) -> Result<(), InvocationError>;
}

/// 正常返回后通知 trait
pub trait AfterReturningAdvice: Send + Sync {
    /// 底层调用正常返回后处理（异常路径不执行）
    fn after_returning(
        &self,
        result: &ComponentValue,
        method: &MethodDescriptor,
        arguments: &[ComponentValue],
        target: &ComponentValue,
    ) -> Result<(), InvocationError>;
}

/// 抛错后通知 trait
pub trait AfterThrowingAdvice: Send + Sync {
    /// 是否处理该错误（按声明的错误种类过滤）
    fn handles(&self, _error: &InvocationError) -> bool {
        true
    }

    /// 底层调用出错后处理；错误继续向上传播
    fn after_throwing(
        &self,
        error: &InvocationError,
        method: &MethodDescriptor,
        arguments: &[ComponentValue],
        target: &ComponentValue,
    );
}

/// 最终通知 trait
pub trait AfterAdvice: Send + Sync {
    /// 无论调用结果如何都执行（等价于 finally 语义）
    fn after(
        &self,
        method: &MethodDescriptor,
        arguments: &[ComponentValue],
        target: &ComponentValue,
    );
}

/// 通知行为
///
/// 五种行为的带标签联合；切面注册后不可变
#[derive(Clone)]
pub enum Advice {
    /// 环绕通知
    Around(Arc<dyn AroundAdvice>),
    /// 前置通知
    Before(Arc<dyn BeforeAdvice>),
    /// 正常返回后通知
    AfterReturning(Arc<dyn AfterReturningAdvice>),
    /// 抛错后通知
    AfterThrowing(Arc<dyn AfterThrowingAdvice>),
    /// 最终通知
    After(Arc<dyn AfterAdvice>),
}

impl Advice {
    /// 行为种类标签
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Around(_) => "around",
            Self::Before(_) => "before",
            Self::AfterReturning(_) => "after_returning",
            Self::AfterThrowing(_) => "after_throwing",
            Self::After(_) => "after",
        }
    }
}

impl std::fmt::Debug for Advice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Advice::{}", self.kind())
    }
}
