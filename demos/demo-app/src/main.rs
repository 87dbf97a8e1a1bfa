//! # 示例应用程序
//!
//! 演示如何使用 Weave 对象图容器和方法拦截引擎：
//! 注册类型模型与描述符、声明切面、启动上下文并访问组件。

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;
use weave_aop_abstractions::{
    Advice, Advisor, AroundAdvice, Invocation, InvocationOutcome, NameMatchPointcut,
};
use weave_aop_impl::ComponentProxy;
use weave_common::{
    typed_value, Component, ComponentDescriptor, TypeInfo, TypeModel, ValueSpec,
};
use weave_composition::{GraphBuilder, LoggingConfig};

/// 订单仓储能力接口
trait OrderRepository: Send + Sync + std::fmt::Debug {
    fn find_order(&self, id: u64) -> String;
}

/// 内存订单仓储
#[derive(Debug)]
struct InMemoryOrderRepository {
    region: RwLock<String>,
}

impl Component for InMemoryOrderRepository {
    fn name(&self) -> &'static str {
        "InMemoryOrderRepository"
    }
}

impl OrderRepository for InMemoryOrderRepository {
    fn find_order(&self, id: u64) -> String {
        format!("order-{} ({})", id, self.region.read())
    }
}

/// 订单服务
#[derive(Debug)]
struct OrderService {
    repository: RwLock<Option<Arc<dyn OrderRepository>>>,
}

impl Component for OrderService {
    fn name(&self) -> &'static str {
        "OrderService"
    }
}

impl OrderService {
    fn describe(&self, id: u64) -> String {
        self.repository
            .read()
            .as_ref()
            .map(|repository| repository.find_order(id))
            .unwrap_or_else(|| "<未装配>".to_string())
    }
}

/// 记录方法耗时的环绕通知
struct TimingAdvice;

impl AroundAdvice for TimingAdvice {
    fn invoke(&self, invocation: &mut dyn Invocation) -> InvocationOutcome {
        let started = std::time::Instant::now();
        let outcome = invocation.proceed();
        info!(
            "方法 {} 耗时 {:?}",
            invocation.method().name,
            started.elapsed()
        );
        outcome
    }
}

fn repository_model() -> TypeModel {
    TypeModel::of::<InMemoryOrderRepository>()
        .constructor(Vec::new(), |_| {
            Ok(InMemoryOrderRepository {
                region: RwLock::new("default".to_string()),
            })
        })
        .property::<String, _>("region", |repository, value| {
            *repository.region.write() = value;
        })
        .method("find_order", 1, |repository, args| {
            let id = weave_common::argument::<u64>(args, 0, "find_order")?;
            Ok(typed_value(repository.find_order(*id)))
        })
        .capability::<dyn OrderRepository, _>(
            |repository| -> Arc<dyn OrderRepository> { repository },
        )
        .build()
}

fn service_model() -> TypeModel {
    TypeModel::of::<OrderService>()
        .constructor(Vec::new(), |_| {
            Ok(OrderService {
                repository: RwLock::new(None),
            })
        })
        .capability_property::<dyn OrderRepository, _>("repository", |service, repository| {
            *service.repository.write() = Some(repository);
        })
        .build()
}

/// 订单仓储的代理包装
struct ProxiedOrderRepository(Arc<ComponentProxy>);

impl std::fmt::Debug for ProxiedOrderRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxiedOrderRepository").finish()
    }
}

impl OrderRepository for ProxiedOrderRepository {
    fn find_order(&self, id: u64) -> String {
        self.0
            .invoke("find_order", &[typed_value(id)])
            .ok()
            .and_then(|outcome| {
                weave_common::downcast_value::<String>(&outcome).map(|value| (*value).clone())
            })
            .unwrap_or_default()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 装配上下文：类型模型 + 描述符 + 切面 + 能力绑定器
    let context = GraphBuilder::new()
        .with_logging(LoggingConfig::development())
        .register_model(repository_model())
        .register_model(service_model())
        .register_descriptor(
            ComponentDescriptor::new("order_repository", TypeInfo::of::<InMemoryOrderRepository>())
                .with_property("region", ValueSpec::Literal(serde_json::json!("cn-east"))),
        )
        .register_descriptor(
            ComponentDescriptor::new("order_service", TypeInfo::of::<OrderService>())
                .with_property("repository", ValueSpec::Reference("order_repository".to_string())),
        )
        .add_advisor(Advisor::new(
            "timing",
            Arc::new(NameMatchPointcut::methods(["find_*"]).with_type_pattern("*Repository")),
            Advice::Around(Arc::new(TimingAdvice)),
        ))
        .register_binder::<dyn OrderRepository, _>(|proxy| Arc::new(ProxiedOrderRepository(proxy)))
        .build()?;

    context.start().await?;

    let service = context.get_as::<OrderService>("order_service")?;
    info!("查询结果: {}", service.describe(42));

    let repository = context.get_capability::<dyn OrderRepository>("order_repository")?;
    info!("直接访问仓储: {}", repository.find_order(7));

    context.stop().await?;
    Ok(())
}
