//! 拦截链执行器

use crate::chain::InterceptionChain;
use std::sync::Arc;
use weave_aop_abstractions::{Invocation, InvocationOutcome};
use weave_common::{ComponentValue, MethodDescriptor, MethodModel};

/// 链式方法调用上下文
///
/// 持有链游标；`proceed` 执行下一个链元素，链尾通过方法表
/// 调用目标上的真实方法
pub struct ChainInvocation {
    proxy: Option<ComponentValue>,
    target: ComponentValue,
    method: Arc<MethodModel>,
    arguments: Vec<ComponentValue>,
    chain: InterceptionChain,
    index: usize,
}

impl ChainInvocation {
    /// 创建新的调用上下文
    pub fn new(
        proxy: Option<ComponentValue>,
        target: ComponentValue,
        method: Arc<MethodModel>,
        arguments: Vec<ComponentValue>,
        chain: InterceptionChain,
    ) -> Self {
        Self {
            proxy,
            target,
            method,
            arguments,
            chain,
            index: 0,
        }
    }
}

impl Invocation for ChainInvocation {
    fn method(&self) -> &MethodDescriptor {
        &self.method.descriptor
    }

    fn arguments(&self) -> &[ComponentValue] {
        &self.arguments
    }

    fn target(&self) -> &ComponentValue {
        &self.target
    }

    fn proxy(&self) -> Option<&ComponentValue> {
        self.proxy.as_ref()
    }

    fn proceed(&mut self) -> InvocationOutcome {
        if self.index < self.chain.len() {
            let element = self.chain[self.index].clone();
            self.index += 1;
            element.invoke(self)
        } else {
            (self.method.invoke)(&self.target, &self.arguments)
        }
    }
}
