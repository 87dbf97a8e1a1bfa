//! 拦截链构建
//!
//! 把匹配到的切面通知转换为统一的环绕语义链元素：非环绕通知经
//! 适配器包装；动态切点的元素再套一层按实际参数重新求值的包装。
//! 链内顺序即切面顺序，因而前置通知外层先执行、最终通知外层后
//! 执行，对应嵌套作用域语义。

use std::sync::Arc;
use tracing::trace;
use weave_aop_abstractions::{
    Advice, Advisor, AfterAdvice, AfterReturningAdvice, AfterThrowingAdvice, AroundAdvice,
    BeforeAdvice, Invocation, InvocationOutcome, Pointcut,
};
use weave_common::{MethodDescriptor, TypeInfo};

/// 拦截链：统一为环绕语义的有序元素
pub type InterceptionChain = Arc<Vec<Arc<dyn AroundAdvice>>>;

/// 前置通知适配器
struct BeforeAdviceInterceptor {
    advice: Arc<dyn BeforeAdvice>,
}

impl AroundAdvice for BeforeAdviceInterceptor {
    fn invoke(&self, invocation: &mut dyn Invocation) -> InvocationOutcome {
        self.advice
            .before(invocation.method(), invocation.arguments(), invocation.target())?;
        invocation.proceed()
    }
}

/// 正常返回后通知适配器
struct AfterReturningInterceptor {
    advice: Arc<dyn AfterReturningAdvice>,
}

impl AroundAdvice for AfterReturningInterceptor {
    fn invoke(&self, invocation: &mut dyn Invocation) -> InvocationOutcome {
        let result = invocation.proceed()?;
        self.advice.after_returning(
            &result,
            invocation.method(),
            invocation.arguments(),
            invocation.target(),
        )?;
        Ok(result)
    }
}

/// 抛错后通知适配器
struct AfterThrowingInterceptor {
    advice: Arc<dyn AfterThrowingAdvice>,
}

impl AroundAdvice for AfterThrowingInterceptor {
    fn invoke(&self, invocation: &mut dyn Invocation) -> InvocationOutcome {
        match invocation.proceed() {
            Ok(result) => Ok(result),
            Err(error) => {
                if self.advice.handles(&error) {
                    self.advice.after_throwing(
                        &error,
                        invocation.method(),
                        invocation.arguments(),
                        invocation.target(),
                    );
                }
                Err(error)
            }
        }
    }
}

/// 最终通知适配器
struct AfterInterceptor {
    advice: Arc<dyn AfterAdvice>,
}

impl AroundAdvice for AfterInterceptor {
    fn invoke(&self, invocation: &mut dyn Invocation) -> InvocationOutcome {
        let outcome = invocation.proceed();
        self.advice
            .after(invocation.method(), invocation.arguments(), invocation.target());
        outcome
    }
}

/// 动态切点包装
///
/// 静态匹配在链构建时定型；动态匹配保留切点，每次调用用实际参数
/// 重新求值，不命中时直接继续链的剩余部分
struct DynamicMatchInterceptor {
    pointcut: Arc<dyn Pointcut>,
    inner: Arc<dyn AroundAdvice>,
}

impl AroundAdvice for DynamicMatchInterceptor {
    fn invoke(&self, invocation: &mut dyn Invocation) -> InvocationOutcome {
        if self
            .pointcut
            .matches_arguments(invocation.method(), invocation.arguments())
        {
            self.inner.invoke(invocation)
        } else {
            invocation.proceed()
        }
    }
}

/// 为（目标类型, 方法）构建拦截链
///
/// 输入切面须已按优先级排序；切面状态不可变，结果可按
/// （类型, 方法）键缓存
pub fn build_chain(
    advisors: &[Advisor],
    type_info: &TypeInfo,
    method: &MethodDescriptor,
) -> Vec<Arc<dyn AroundAdvice>> {
    let mut chain: Vec<Arc<dyn AroundAdvice>> = Vec::new();
    for advisor in advisors {
        if !advisor.pointcut.matches_type(type_info)
            || !advisor.pointcut.matches_method(method, type_info)
        {
            continue;
        }

        let element: Arc<dyn AroundAdvice> = match &advisor.advice {
            Advice::Around(advice) => advice.clone(),
            Advice::Before(advice) => Arc::new(BeforeAdviceInterceptor {
                advice: advice.clone(),
            }),
            Advice::AfterReturning(advice) => Arc::new(AfterReturningInterceptor {
                advice: advice.clone(),
            }),
            Advice::AfterThrowing(advice) => Arc::new(AfterThrowingInterceptor {
                advice: advice.clone(),
            }),
            Advice::After(advice) => Arc::new(AfterInterceptor {
                advice: advice.clone(),
            }),
        };

        let element = if advisor.pointcut.is_dynamic() {
            Arc::new(DynamicMatchInterceptor {
                pointcut: advisor.pointcut.clone(),
                inner: element,
            })
        } else {
            element
        };

        trace!(
            "链元素: {}::{} <- {} ({})",
            type_info.name,
            method.name,
            advisor.name,
            advisor.advice.kind()
        );
        chain.push(element);
    }
    chain
}
