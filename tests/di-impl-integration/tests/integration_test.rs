//! 对象图构建器集成测试

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use weave_common::{
    ArgumentSpec, Component, ComponentDescriptor, ComponentScope, ConversionService,
    ParameterSpec, ResolutionError, TypeInfo, TypeModel, TypeModelRegistry, ValueSpec,
};
use weave_di_abstractions::{CapabilityCaster, ContainerConfig, ObjectGraph};
use weave_di_impl::{
    ConstructorResolverImpl, DescriptorRegistryImpl, ModelCaster, ObjectGraphBuilder,
};

fn new_graph(models: Arc<TypeModelRegistry>, config: ContainerConfig) -> Arc<ObjectGraphBuilder> {
    let conversion = Arc::new(ConversionService::new());
    let registry = Arc::new(DescriptorRegistryImpl::new(models.clone()));
    let resolver = Arc::new(ConstructorResolverImpl::new(
        models.clone(),
        conversion.clone(),
        config.clone(),
    ));
    let caster: Arc<dyn CapabilityCaster> = Arc::new(ModelCaster::new(models));
    Arc::new(ObjectGraphBuilder::new(
        registry, conversion, resolver, caster, config,
    ))
}

/// 测试仓储组件
#[derive(Debug)]
struct Repo {
    label: RwLock<String>,
}

impl Component for Repo {
    fn name(&self) -> &'static str {
        "Repo"
    }
}

/// 测试服务组件
#[derive(Debug)]
struct Service {
    repo: RwLock<Option<Arc<Repo>>>,
}

impl Component for Service {
    fn name(&self) -> &'static str {
        "Service"
    }
}

fn repo_model() -> TypeModel {
    TypeModel::of::<Repo>()
        .constructor(Vec::new(), |_| {
            Ok(Repo {
                label: RwLock::new("repo".to_string()),
            })
        })
        .property::<String, _>("label", |repo, value| {
            *repo.label.write() = value;
        })
        .build()
}

fn service_model() -> TypeModel {
    TypeModel::of::<Service>()
        .constructor(Vec::new(), |_| {
            Ok(Service {
                repo: RwLock::new(None),
            })
        })
        .reference_property::<Repo, _>("repo", |service, repo| {
            *service.repo.write() = Some(repo);
        })
        .build()
}

#[test]
fn test_scenario_service_with_repo_reference() {
    let models = Arc::new(TypeModelRegistry::new());
    models.register(repo_model());
    models.register(service_model());
    let graph = new_graph(models, ContainerConfig::default());

    graph
        .register(ComponentDescriptor::new("repo", TypeInfo::of::<Repo>()))
        .unwrap();
    graph
        .register(
            ComponentDescriptor::new("svc", TypeInfo::of::<Service>())
                .with_property("repo", ValueSpec::Reference("repo".to_string())),
        )
        .unwrap();

    let service = graph.get_or_create("svc").unwrap();
    let service = weave_common::downcast_value::<Service>(&service).unwrap();
    let repo = weave_common::downcast_value::<Repo>(&graph.get_or_create("repo").unwrap()).unwrap();

    // 服务持有的仓储与独立解析的仓储身份相同
    assert!(Arc::ptr_eq(service.repo.read().as_ref().unwrap(), &repo));

    // 单例幂等：第二次请求返回同一实例
    let again =
        weave_common::downcast_value::<Service>(&graph.get_or_create("svc").unwrap()).unwrap();
    assert!(Arc::ptr_eq(&service, &again));
}

#[test]
fn test_literal_property_conversion() {
    let models = Arc::new(TypeModelRegistry::new());
    models.register(repo_model());
    let graph = new_graph(models, ContainerConfig::default());

    graph
        .register(
            ComponentDescriptor::new("repo", TypeInfo::of::<Repo>())
                .with_property("label", ValueSpec::Literal(serde_json::json!("configured"))),
        )
        .unwrap();

    let repo = weave_common::downcast_value::<Repo>(&graph.get_or_create("repo").unwrap()).unwrap();
    assert_eq!(repo.label.read().as_str(), "configured");
}

// ---------------------------------------------------------------------------
// 属性注入循环
// ---------------------------------------------------------------------------

/// 循环组件 A
#[derive(Debug)]
struct NodeA {
    b: RwLock<Option<Arc<NodeB>>>,
}

impl Component for NodeA {
    fn name(&self) -> &'static str {
        "NodeA"
    }
}

/// 循环组件 B
#[derive(Debug)]
struct NodeB {
    a: RwLock<Option<Arc<NodeA>>>,
}

impl Component for NodeB {
    fn name(&self) -> &'static str {
        "NodeB"
    }
}

#[test]
fn test_property_cycle_resolves_with_final_identities() {
    let models = Arc::new(TypeModelRegistry::new());
    models.register(
        TypeModel::of::<NodeA>()
            .constructor(Vec::new(), |_| {
                Ok(NodeA {
                    b: RwLock::new(None),
                })
            })
            .reference_property::<NodeB, _>("b", |node, b| {
                *node.b.write() = Some(b);
            })
            .build(),
    );
    models.register(
        TypeModel::of::<NodeB>()
            .constructor(Vec::new(), |_| {
                Ok(NodeB {
                    a: RwLock::new(None),
                })
            })
            .reference_property::<NodeA, _>("a", |node, a| {
                *node.a.write() = Some(a);
            })
            .build(),
    );
    let graph = new_graph(models, ContainerConfig::default());

    graph
        .register(
            ComponentDescriptor::new("a", TypeInfo::of::<NodeA>())
                .with_property("b", ValueSpec::Reference("b".to_string())),
        )
        .unwrap();
    graph
        .register(
            ComponentDescriptor::new("b", TypeInfo::of::<NodeB>())
                .with_property("a", ValueSpec::Reference("a".to_string())),
        )
        .unwrap();

    let a = weave_common::downcast_value::<NodeA>(&graph.get_or_create("a").unwrap()).unwrap();
    let b = weave_common::downcast_value::<NodeB>(&graph.get_or_create("b").unwrap()).unwrap();

    // 两侧都持有最终发布的实例身份
    assert!(Arc::ptr_eq(a.b.read().as_ref().unwrap(), &b));
    assert!(Arc::ptr_eq(b.a.read().as_ref().unwrap(), &a));
}

// ---------------------------------------------------------------------------
// 构造注入循环
// ---------------------------------------------------------------------------

/// 构造循环组件 A
#[derive(Debug)]
struct CtorA {
    _b: Arc<CtorB>,
}

impl Component for CtorA {
    fn name(&self) -> &'static str {
        "CtorA"
    }
}

/// 构造循环组件 B
#[derive(Debug)]
struct CtorB {
    _a: Arc<CtorA>,
}

impl Component for CtorB {
    fn name(&self) -> &'static str {
        "CtorB"
    }
}

#[test]
fn test_constructor_cycle_fails_with_circular_error() {
    let models = Arc::new(TypeModelRegistry::new());
    models.register(
        TypeModel::of::<CtorA>()
            .constructor(vec![ParameterSpec::of::<CtorB>("b")], |args| {
                let b = weave_common::argument::<CtorB>(args, 0, "CtorA::new")?;
                Ok(CtorA { _b: b })
            })
            .build(),
    );
    models.register(
        TypeModel::of::<CtorB>()
            .constructor(vec![ParameterSpec::of::<CtorA>("a")], |args| {
                let a = weave_common::argument::<CtorA>(args, 0, "CtorB::new")?;
                Ok(CtorB { _a: a })
            })
            .build(),
    );
    let graph = new_graph(models, ContainerConfig::default());

    graph
        .register(ComponentDescriptor::new("ctor_a", TypeInfo::of::<CtorA>()))
        .unwrap();
    graph
        .register(ComponentDescriptor::new("ctor_b", TypeInfo::of::<CtorB>()))
        .unwrap();

    let error = graph.get_or_create("ctor_a").unwrap_err();
    // 构造注入循环以显式的循环引用错误报告，而不是栈溢出
    assert!(format!("{:?}", error).contains("ctor_a"));
    let mut cause: &dyn std::error::Error = &error;
    let mut found_cycle = false;
    loop {
        if let Some(creation) = cause.downcast_ref::<weave_common::CreationError>() {
            if creation.is_circular() {
                found_cycle = true;
                break;
            }
        }
        match cause.source() {
            Some(next) => cause = next,
            None => break,
        }
    }
    assert!(found_cycle, "错误链中应包含循环引用错误: {:?}", error);
}

// ---------------------------------------------------------------------------
// 解析器确定性与歧义
// ---------------------------------------------------------------------------

/// 多构造函数组件
#[derive(Debug)]
struct Holder {
    arity: usize,
}

impl Component for Holder {
    fn name(&self) -> &'static str {
        "Holder"
    }
}

/// 参数占位组件
#[derive(Debug)]
struct Blob;

impl Component for Blob {
    fn name(&self) -> &'static str {
        "Blob"
    }
}

fn holder_models(with_ambiguous_factory: bool) -> Arc<TypeModelRegistry> {
    let models = Arc::new(TypeModelRegistry::new());
    models.register(
        TypeModel::of::<Blob>()
            .constructor(Vec::new(), |_| Ok(Blob))
            .build(),
    );

    let mut builder = TypeModel::of::<Holder>()
        .constructor(vec![ParameterSpec::of::<Blob>("first")], |_| {
            Ok(Holder { arity: 1 })
        })
        .constructor(
            vec![
                ParameterSpec::of::<Blob>("first"),
                ParameterSpec::of::<Blob>("second"),
            ],
            |_| Ok(Holder { arity: 2 }),
        )
        .constructor(
            vec![
                ParameterSpec::of::<Blob>("first"),
                ParameterSpec::of::<Blob>("second"),
                ParameterSpec::of::<Blob>("third"),
            ],
            |_| Ok(Holder { arity: 3 }),
        );
    if with_ambiguous_factory {
        builder = builder.factory_method(
            "make",
            vec![
                ParameterSpec::of::<Blob>("first"),
                ParameterSpec::of::<Blob>("second"),
                ParameterSpec::of::<Blob>("third"),
            ],
            |_| Ok(Holder { arity: 30 }),
        );
    }
    models.register(builder.build());
    models
}

fn three_blob_args(descriptor: ComponentDescriptor) -> ComponentDescriptor {
    descriptor
        .with_arg(ArgumentSpec::value(ValueSpec::Instance(
            weave_common::typed_value(Blob),
        )))
        .with_arg(ArgumentSpec::value(ValueSpec::Instance(
            weave_common::typed_value(Blob),
        )))
        .with_arg(ArgumentSpec::value(ValueSpec::Instance(
            weave_common::typed_value(Blob),
        )))
}

#[test]
fn test_resolver_selects_greediest_matching_constructor() {
    let graph = new_graph(holder_models(false), ContainerConfig::default());
    graph
        .register(three_blob_args(ComponentDescriptor::new(
            "holder",
            TypeInfo::of::<Holder>(),
        )))
        .unwrap();

    // 三个参数值总是选中三参构造函数
    let holder =
        weave_common::downcast_value::<Holder>(&graph.get_or_create("holder").unwrap()).unwrap();
    assert_eq!(holder.arity, 3);
}

#[test]
fn test_equally_specific_candidates_fail_in_strict_mode() {
    let config = ContainerConfig {
        lenient_resolution: false,
        ..ContainerConfig::default()
    };
    let graph = new_graph(holder_models(true), config);
    graph
        .register(three_blob_args(ComponentDescriptor::new(
            "holder",
            TypeInfo::of::<Holder>(),
        )))
        .unwrap();

    let error = graph.get_or_create("holder").unwrap_err();
    let ambiguous = error
        .source
        .downcast_ref::<ResolutionError>()
        .map(|resolution| matches!(resolution, ResolutionError::AmbiguousExecutable { .. }))
        .unwrap_or(false);
    assert!(ambiguous, "严格模式下等权候选应报告歧义: {:?}", error);
}

#[test]
fn test_equally_specific_candidates_tolerated_in_lenient_mode() {
    let graph = new_graph(holder_models(true), ContainerConfig::default());
    graph
        .register(three_blob_args(ComponentDescriptor::new(
            "holder",
            TypeInfo::of::<Holder>(),
        )))
        .unwrap();

    let holder =
        weave_common::downcast_value::<Holder>(&graph.get_or_create("holder").unwrap()).unwrap();
    assert_eq!(holder.arity, 3);
}

#[test]
fn test_constructor_autowiring_by_type() {
    let graph = new_graph(holder_models(false), ContainerConfig::default());
    graph
        .register(ComponentDescriptor::new("blob", TypeInfo::of::<Blob>()))
        .unwrap();
    graph
        .register(ComponentDescriptor::new("holder", TypeInfo::of::<Holder>()))
        .unwrap();

    // 无显式参数时按类型自动装配，贪心选中最长构造函数
    let holder =
        weave_common::downcast_value::<Holder>(&graph.get_or_create("holder").unwrap()).unwrap();
    assert_eq!(holder.arity, 3);
}

// ---------------------------------------------------------------------------
// 并发与失败语义
// ---------------------------------------------------------------------------

/// 构造缓慢的组件
#[derive(Debug)]
struct Slow;

impl Component for Slow {
    fn name(&self) -> &'static str {
        "Slow"
    }
}

#[test]
fn test_concurrent_singleton_requests_deduplicate() {
    let constructions = Arc::new(AtomicUsize::new(0));
    let models = Arc::new(TypeModelRegistry::new());
    {
        let constructions = constructions.clone();
        models.register(
            TypeModel::of::<Slow>()
                .constructor(Vec::new(), move |_| {
                    constructions.fetch_add(1, Ordering::SeqCst);
                    std::thread::sleep(std::time::Duration::from_millis(100));
                    Ok(Slow)
                })
                .build(),
        );
    }
    let graph = new_graph(models, ContainerConfig::default());
    graph
        .register(ComponentDescriptor::new("slow", TypeInfo::of::<Slow>()))
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let graph = graph.clone();
        handles.push(std::thread::spawn(move || {
            weave_common::value_identity(&graph.get_or_create("slow").unwrap()) as usize
        }));
    }
    let identities: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(constructions.load(Ordering::SeqCst), 1, "单例创建必须去重");
    assert!(identities.windows(2).all(|pair| pair[0] == pair[1]));
}

/// 可控失败的组件
#[derive(Debug)]
struct Flaky;

impl Component for Flaky {
    fn name(&self) -> &'static str {
        "Flaky"
    }
}

#[test]
fn test_failed_creation_purges_state_and_allows_retry() {
    let should_fail = Arc::new(AtomicBool::new(true));
    let models = Arc::new(TypeModelRegistry::new());
    {
        let should_fail = should_fail.clone();
        models.register(
            TypeModel::of::<Flaky>()
                .constructor(Vec::new(), move |_| {
                    if should_fail.load(Ordering::SeqCst) {
                        Err("刻意失败".into())
                    } else {
                        Ok(Flaky)
                    }
                })
                .build(),
        );
    }
    let graph = new_graph(models, ContainerConfig::default());
    graph
        .register(ComponentDescriptor::new("flaky", TypeInfo::of::<Flaky>()))
        .unwrap();

    let error = graph.get_or_create("flaky").unwrap_err();
    assert_eq!(error.identifier, "flaky");

    // 失败后缓存被清理，重试可以成功
    should_fail.store(false, Ordering::SeqCst);
    assert!(graph.get_or_create("flaky").is_ok());
}

// ---------------------------------------------------------------------------
// 生命周期方法
// ---------------------------------------------------------------------------

/// 带生命周期方法的组件
#[derive(Debug)]
struct Lifecycled {
    tag: RwLock<String>,
    log: Arc<Mutex<Vec<String>>>,
}

impl Component for Lifecycled {
    fn name(&self) -> &'static str {
        "Lifecycled"
    }
}

fn lifecycled_model(log: Arc<Mutex<Vec<String>>>) -> TypeModel {
    TypeModel::of::<Lifecycled>()
        .constructor(Vec::new(), move |_| {
            Ok(Lifecycled {
                tag: RwLock::new("unnamed".to_string()),
                log: log.clone(),
            })
        })
        .property::<String, _>("tag", |component, value| {
            *component.tag.write() = value;
        })
        .method("setup", 0, |component, _| {
            let tag = component.tag.read().clone();
            component.log.lock().push(format!("setup:{}", tag));
            Ok(weave_common::unit_value())
        })
        .method("teardown", 0, |component, _| {
            let tag = component.tag.read().clone();
            component.log.lock().push(format!("teardown:{}", tag));
            Ok(weave_common::unit_value())
        })
        .build()
}

#[test]
fn test_init_and_reverse_order_destroy() {
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let models = Arc::new(TypeModelRegistry::new());
    models.register(lifecycled_model(log.clone()));
    let graph = new_graph(models, ContainerConfig::default());

    graph
        .register(
            ComponentDescriptor::new("first", TypeInfo::of::<Lifecycled>())
                .with_property("tag", ValueSpec::Literal(serde_json::json!("first")))
                .with_init_method("setup")
                .with_destroy_method("teardown"),
        )
        .unwrap();
    graph
        .register(
            ComponentDescriptor::new("second", TypeInfo::of::<Lifecycled>())
                .with_property("tag", ValueSpec::Literal(serde_json::json!("second")))
                .with_init_method("setup")
                .with_destroy_method("teardown"),
        )
        .unwrap();

    graph.pre_instantiate_singletons().unwrap();
    graph.destroy_singletons();

    // 初始化按注册顺序，销毁按创建顺序的逆序
    let entries = log.lock().clone();
    assert_eq!(
        entries,
        vec!["setup:first", "setup:second", "teardown:second", "teardown:first"]
    );
}

#[test]
fn test_missing_optional_init_method_is_skipped() {
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let models = Arc::new(TypeModelRegistry::new());
    models.register(lifecycled_model(log));
    let graph = new_graph(models, ContainerConfig::default());

    graph
        .register(
            ComponentDescriptor::new("c", TypeInfo::of::<Lifecycled>())
                .with_init_method("no_such_method"),
        )
        .unwrap();
    assert!(graph.get_or_create("c").is_ok());
}

#[test]
fn test_missing_required_init_method_is_fatal() {
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let models = Arc::new(TypeModelRegistry::new());
    models.register(lifecycled_model(log));
    let graph = new_graph(models, ContainerConfig::default());

    graph
        .register(
            ComponentDescriptor::new("c", TypeInfo::of::<Lifecycled>())
                .with_required_init_method("no_such_method"),
        )
        .unwrap();
    let error = graph.get_or_create("c").unwrap_err();
    assert_eq!(error.identifier, "c");
}

// ---------------------------------------------------------------------------
// 作用域与描述符边界
// ---------------------------------------------------------------------------

#[test]
fn test_prototype_scope_creates_fresh_instances() {
    let models = Arc::new(TypeModelRegistry::new());
    models.register(repo_model());
    let graph = new_graph(models, ContainerConfig::default());
    graph
        .register(
            ComponentDescriptor::new("repo", TypeInfo::of::<Repo>())
                .with_scope(ComponentScope::Prototype),
        )
        .unwrap();

    let first = graph.get_or_create("repo").unwrap();
    let second = graph.get_or_create("repo").unwrap();
    assert!(!weave_common::same_instance(&first, &second));
}

#[test]
fn test_named_scope_is_rejected() {
    let models = Arc::new(TypeModelRegistry::new());
    models.register(repo_model());
    let graph = new_graph(models, ContainerConfig::default());
    graph
        .register(
            ComponentDescriptor::new("repo", TypeInfo::of::<Repo>())
                .with_scope(ComponentScope::Named("request".to_string())),
        )
        .unwrap();

    assert!(graph.get_or_create("repo").is_err());
}

#[test]
fn test_abstract_descriptor_cannot_be_instantiated() {
    let models = Arc::new(TypeModelRegistry::new());
    models.register(repo_model());
    let graph = new_graph(models, ContainerConfig::default());
    graph
        .register(
            ComponentDescriptor::new("template", TypeInfo::of::<Repo>()).abstract_only(),
        )
        .unwrap();

    assert!(graph.get_or_create("template").is_err());
}

#[test]
fn test_unregistered_identifier_reports_error() {
    let models = Arc::new(TypeModelRegistry::new());
    let graph = new_graph(models, ContainerConfig::default());
    let error = graph.get_or_create("missing").unwrap_err();
    assert_eq!(error.identifier, "missing");
}

#[test]
fn test_depends_on_orders_creation() {
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let models = Arc::new(TypeModelRegistry::new());
    models.register(lifecycled_model(log.clone()));
    let graph = new_graph(models, ContainerConfig::default());

    graph
        .register(
            ComponentDescriptor::new("backing", TypeInfo::of::<Lifecycled>())
                .with_init_method("setup"),
        )
        .unwrap();
    graph
        .register(
            ComponentDescriptor::new("front", TypeInfo::of::<Lifecycled>())
                .with_init_method("setup")
                .with_depends_on("backing"),
        )
        .unwrap();

    graph.get_or_create("front").unwrap();
    // 显式前置依赖先于声明者完成创建
    assert!(graph.dependencies_of("front").contains(&"backing".to_string()));
    assert_eq!(log.lock().len(), 2);
}
