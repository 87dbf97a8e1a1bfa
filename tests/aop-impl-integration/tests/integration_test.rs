//! 拦截引擎集成测试：链语义与代理分发

use parking_lot::Mutex;
use std::sync::Arc;
use weave_aop_abstractions::{
    Advice, Advisor, AfterAdvice, AfterReturningAdvice, AfterThrowingAdvice, AroundAdvice,
    BeforeAdvice, Invocation, InvocationOutcome, NameMatchPointcut, Pointcut, ProxyConfig,
};
use weave_aop_impl::{current_proxy, CapabilityBinderRegistry, ComponentProxy, ProxyFactoryImpl};
use weave_common::{
    downcast_value, typed_value, unit_value, Component, ComponentValue, InvocationError,
    MethodDescriptor, TypeInfo, TypeModel, TypeModelRegistry,
};

type EventLog = Arc<Mutex<Vec<String>>>;

/// 被拦截的工作组件
#[derive(Debug)]
struct Worker {
    log: EventLog,
}

impl Component for Worker {
    fn name(&self) -> &'static str {
        "Worker"
    }
}

/// 引入的能力接口
trait Tagged: Send + Sync {
    fn tag(&self) -> String;
}

impl Tagged for Worker {
    fn tag(&self) -> String {
        "worker".to_string()
    }
}

fn worker_model() -> TypeModel {
    TypeModel::of::<Worker>()
        .constructor(Vec::new(), |_| {
            Ok(Worker {
                log: Arc::new(Mutex::new(Vec::new())),
            })
        })
        .method("work", 1, |worker, args| {
            let input = weave_common::argument::<String>(args, 0, "work")?;
            worker.log.lock().push("body".to_string());
            Ok(typed_value(format!("done:{}", input)))
        })
        .method("plain", 0, |_, _| Ok(typed_value("plain".to_string())))
        .method("fail", 0, |_, _| {
            Err(InvocationError::application("fail", "刻意失败"))
        })
        .method("outer", 0, |worker, _| {
            worker.log.lock().push("outer-body".to_string());
            // 经环境查找拿到当前代理，让内部自调用同样被拦截
            let proxy = current_proxy().ok_or_else(|| {
                InvocationError::application("outer", "当前线程没有暴露的代理")
            })?;
            let proxy = proxy
                .downcast::<ComponentProxy>()
                .map_err(|_| InvocationError::TargetTypeMismatch {
                    method: "outer".to_string(),
                })?;
            proxy.invoke("inner", &[])
        })
        .method("inner", 0, |worker, _| {
            worker.log.lock().push("inner-body".to_string());
            Ok(unit_value())
        })
        .build()
}

fn build_proxy(advisors: Vec<Advisor>, config: ProxyConfig) -> (Arc<ComponentProxy>, EventLog) {
    let models = Arc::new(TypeModelRegistry::new());
    let model = models.register(worker_model());
    let target_log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let target = typed_value(Worker {
        log: target_log.clone(),
    });
    let factory = ProxyFactoryImpl::new(models, Arc::new(CapabilityBinderRegistry::new()));
    let mut sequenced = Vec::new();
    for (sequence, mut advisor) in advisors.into_iter().enumerate() {
        advisor.sequence = sequence as u64;
        sequenced.push(advisor);
    }
    let proxy = factory
        .create_proxy("worker", target, model, sequenced, config)
        .unwrap();
    (proxy, target_log)
}

/// 记录进入/退出的环绕通知
struct LoggingAround {
    label: &'static str,
    log: EventLog,
}

impl AroundAdvice for LoggingAround {
    fn invoke(&self, invocation: &mut dyn Invocation) -> InvocationOutcome {
        self.log.lock().push(format!("{}:enter", self.label));
        let outcome = invocation.proceed();
        self.log.lock().push(format!("{}:exit", self.label));
        outcome
    }
}

/// 记录事件的前置通知
struct LoggingBefore {
    label: &'static str,
    log: EventLog,
}

impl BeforeAdvice for LoggingBefore {
    fn before(
        &self,
        _method: &MethodDescriptor,
        _arguments: &[ComponentValue],
        _target: &ComponentValue,
    ) -> Result<(), InvocationError> {
        self.log.lock().push(self.label.to_string());
        Ok(())
    }
}

/// 记录事件的返回后通知
struct LoggingAfterReturning {
    label: &'static str,
    log: EventLog,
}

impl AfterReturningAdvice for LoggingAfterReturning {
    fn after_returning(
        &self,
        _result: &ComponentValue,
        _method: &MethodDescriptor,
        _arguments: &[ComponentValue],
        _target: &ComponentValue,
    ) -> Result<(), InvocationError> {
        self.log.lock().push(self.label.to_string());
        Ok(())
    }
}

/// 记录错误种类的抛错后通知
struct LoggingAfterThrowing {
    log: EventLog,
}

impl AfterThrowingAdvice for LoggingAfterThrowing {
    fn handles(&self, error: &InvocationError) -> bool {
        error.kind() == "application"
    }

    fn after_throwing(
        &self,
        error: &InvocationError,
        _method: &MethodDescriptor,
        _arguments: &[ComponentValue],
        _target: &ComponentValue,
    ) {
        self.log.lock().push(format!("thrown:{}", error.kind()));
    }
}

/// 最终通知
struct LoggingAfter {
    log: EventLog,
}

impl AfterAdvice for LoggingAfter {
    fn after(
        &self,
        _method: &MethodDescriptor,
        _arguments: &[ComponentValue],
        _target: &ComponentValue,
    ) {
        self.log.lock().push("finally".to_string());
    }
}

#[test]
fn test_chain_executes_in_declared_order() {
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let advisors = vec![
        Advisor::new(
            "log-start",
            Arc::new(NameMatchPointcut::methods(["work"])),
            Advice::Around(Arc::new(LoggingAround {
                label: "logStart",
                log: log.clone(),
            })),
        ),
        Advisor::new(
            "audit",
            Arc::new(NameMatchPointcut::methods(["work"])),
            Advice::Before(Arc::new(LoggingBefore {
                label: "audit",
                log: log.clone(),
            })),
        ),
        Advisor::new(
            "cache",
            Arc::new(NameMatchPointcut::methods(["work"])),
            Advice::AfterReturning(Arc::new(LoggingAfterReturning {
                label: "cache",
                log: log.clone(),
            })),
        ),
    ];
    let (proxy, target_log) = build_proxy(advisors, ProxyConfig::default());

    let result = proxy
        .invoke("work", &[typed_value("x".to_string())])
        .unwrap();
    assert_eq!(*downcast_value::<String>(&result).unwrap(), "done:x");

    // 目标方法体的事件并入同一条时间线验证顺序
    let mut events = log.lock().clone();
    let body_position = events.len() - 2;
    events.insert(body_position, target_log.lock()[0].clone());
    assert_eq!(
        events,
        vec!["logStart:enter", "audit", "body", "cache", "logStart:exit"]
    );
}

/// 从不继续执行的环绕通知
struct SentinelAround;

impl AroundAdvice for SentinelAround {
    fn invoke(&self, _invocation: &mut dyn Invocation) -> InvocationOutcome {
        Ok(typed_value("sentinel".to_string()))
    }
}

#[test]
fn test_around_advice_can_short_circuit_target() {
    let advisors = vec![Advisor::new(
        "sentinel",
        Arc::new(NameMatchPointcut::methods(["*"])),
        Advice::Around(Arc::new(SentinelAround)),
    )];
    let (proxy, target_log) = build_proxy(advisors, ProxyConfig::default());

    let result = proxy
        .invoke("work", &[typed_value("ignored".to_string())])
        .unwrap();
    assert_eq!(*downcast_value::<String>(&result).unwrap(), "sentinel");
    // 真实方法体从未执行
    assert!(target_log.lock().is_empty());
}

#[test]
fn test_unmatched_method_uses_fast_path() {
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let advisors = vec![Advisor::new(
        "work-only",
        Arc::new(NameMatchPointcut::methods(["work"])),
        Advice::Before(Arc::new(LoggingBefore {
            label: "advice",
            log: log.clone(),
        })),
    )];
    let (proxy, _) = build_proxy(advisors, ProxyConfig::default());

    let result = proxy.invoke("plain", &[]).unwrap();
    assert_eq!(*downcast_value::<String>(&result).unwrap(), "plain");
    assert!(log.lock().is_empty());
    // 空链直达：无链式分发
    assert_eq!(proxy.dispatch_stats(), (1, 0));

    proxy
        .invoke("work", &[typed_value("x".to_string())])
        .unwrap();
    assert_eq!(proxy.dispatch_stats(), (1, 1));
}

/// 按首个参数值匹配的动态切点
struct ArgumentGate;

impl Pointcut for ArgumentGate {
    fn matches_type(&self, _type_info: &TypeInfo) -> bool {
        true
    }

    fn matches_method(&self, method: &MethodDescriptor, _type_info: &TypeInfo) -> bool {
        method.name == "work"
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn matches_arguments(
        &self,
        _method: &MethodDescriptor,
        arguments: &[ComponentValue],
    ) -> bool {
        arguments
            .first()
            .and_then(downcast_value::<String>)
            .map(|value| value.as_str() == "match")
            .unwrap_or(false)
    }
}

#[test]
fn test_dynamic_pointcut_re_evaluates_per_call() {
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let advisors = vec![Advisor::new(
        "gated",
        Arc::new(ArgumentGate),
        Advice::Before(Arc::new(LoggingBefore {
            label: "gated",
            log: log.clone(),
        })),
    )];
    let (proxy, target_log) = build_proxy(advisors, ProxyConfig::default());

    proxy
        .invoke("work", &[typed_value("match".to_string())])
        .unwrap();
    proxy
        .invoke("work", &[typed_value("other".to_string())])
        .unwrap();

    // 通知只在参数命中时执行，方法体两次都执行
    assert_eq!(log.lock().clone(), vec!["gated"]);
    assert_eq!(target_log.lock().len(), 2);
}

#[test]
fn test_after_throwing_filters_and_after_always_runs() {
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let advisors = vec![
        Advisor::new(
            "thrown",
            Arc::new(NameMatchPointcut::methods(["fail"])),
            Advice::AfterThrowing(Arc::new(LoggingAfterThrowing { log: log.clone() })),
        ),
        Advisor::new(
            "finally",
            Arc::new(NameMatchPointcut::methods(["fail"])),
            Advice::After(Arc::new(LoggingAfter { log: log.clone() })),
        ),
    ];
    let (proxy, _) = build_proxy(advisors, ProxyConfig::default());

    let error = proxy.invoke("fail", &[]).unwrap_err();
    assert_eq!(error.kind(), "application");
    assert_eq!(log.lock().clone(), vec!["finally", "thrown:application"]);
}

#[test]
fn test_introduction_advisor_adds_capability() {
    let pointcut = NameMatchPointcut::methods(["__none__"]);
    let advisor = Advisor::new(
        "introduce-tagged",
        Arc::new(pointcut),
        Advice::Before(Arc::new(LoggingBefore {
            label: "unused",
            log: Arc::new(Mutex::new(Vec::new())),
        })),
    )
    .with_introduction(weave_aop_abstractions::CapabilityIntroduction {
        type_info: TypeInfo::of::<dyn Tagged>(),
        cast: Arc::new(|value| {
            downcast_value::<Worker>(value).map(|worker| {
                let tagged: Arc<dyn Tagged> = worker;
                weave_common::capability_value(tagged)
            })
        }),
    });
    let (proxy, _) = build_proxy(vec![advisor], ProxyConfig::default());

    let tagged = proxy.cast_to(&TypeInfo::of::<dyn Tagged>()).unwrap();
    let tagged = weave_common::downcast_capability::<dyn Tagged>(&tagged).unwrap();
    assert_eq!(tagged.tag(), "worker");
}

#[test]
fn test_exposed_proxy_intercepts_self_invocation() {
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let advisors = vec![Advisor::new(
        "inner-audit",
        Arc::new(NameMatchPointcut::methods(["inner"])),
        Advice::Before(Arc::new(LoggingBefore {
            label: "advice:inner",
            log: log.clone(),
        })),
    )];
    let (proxy, target_log) = build_proxy(advisors, ProxyConfig::new().with_expose_proxy());

    proxy.invoke("outer", &[]).unwrap();

    // 内部自调用经代理分发，通知同样生效
    assert_eq!(log.lock().clone(), vec!["advice:inner"]);
    assert_eq!(
        target_log.lock().clone(),
        vec!["outer-body", "inner-body"]
    );
}

#[test]
fn test_return_value_normalization_substitutes_proxy() {
    // 返回目标自身的方法：经代理调用时替换为代理引用
    let models = Arc::new(TypeModelRegistry::new());

    /// 返回自身的组件
    #[derive(Debug)]
    struct SelfReturning;
    impl Component for SelfReturning {
        fn name(&self) -> &'static str {
            "SelfReturning"
        }
    }

    let target = typed_value(SelfReturning);
    let target_for_method = target.clone();
    let model = models.register(
        TypeModel::of::<SelfReturning>()
            .constructor(Vec::new(), |_| Ok(SelfReturning))
            .method("me", 0, move |_, _| Ok(target_for_method.clone()))
            .build(),
    );

    let factory = ProxyFactoryImpl::new(models, Arc::new(CapabilityBinderRegistry::new()));
    let advisors = vec![Advisor::new(
        "noop",
        Arc::new(NameMatchPointcut::methods(["me"])),
        Advice::Before(Arc::new(LoggingBefore {
            label: "noop",
            log: Arc::new(Mutex::new(Vec::new())),
        })),
    )];
    let proxy = factory
        .create_proxy(
            "self",
            target.clone(),
            model,
            advisors,
            ProxyConfig::default(),
        )
        .unwrap();

    let result = proxy.invoke("me", &[]).unwrap();
    // 调用方拿到的是代理引用而不是裸目标
    assert!(!weave_common::same_instance(&result, &target));
    assert!(result.downcast_ref::<ComponentProxy>().is_some());
}
