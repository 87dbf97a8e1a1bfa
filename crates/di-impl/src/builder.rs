//! 对象图构建器
//!
//! 负责按标识符编排实例化、属性填充、生命周期回调和发布，
//! 维护每个标识符的创建状态机和依赖边记录。
//!
//! 单例作用域的状态机：请求 → （一级命中直接返回）→ 标记创建中 →
//! 解析可执行体 → 原始实例化 → 暴露早期引用（写入三级）→ 属性填充 →
//! 初始化 →（可能织入代理）→ 发布到一级、解除标记。
//! 原型作用域跳过缓存层级，其余状态相同。

use crate::registry::DescriptorRegistryImpl;
use crate::singleton_cache::{BeginOutcome, SingletonCache};
use parking_lot::{Mutex, RwLock};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use weave_common::{
    same_instance, ComponentDescriptor, ComponentValue, ConversionService, CreationError,
    CreationResult, CreationStage, DescriptorError, ParameterSpec, PropertyModel, TypeInfo,
    TypeModel, TypeModelRegistry, ValueSpec,
};
use weave_di_abstractions::{
    CapabilityCaster, ComponentPostProcessor, ConstructorResolver, ContainerConfig,
    DependencyProvider, DescriptorRegistry, ObjectGraph,
};

thread_local! {
    /// 当前线程的解析栈，记录（构建器标记, 组件标识符）
    ///
    /// 同一构建器内重入同一标识符即为构造注入循环；
    /// 栈内容同时提供循环路径诊断
    static RESOLUTION_STACK: RefCell<Vec<(usize, String)>> = const { RefCell::new(Vec::new()) };
}

/// 解析栈守卫
struct StackGuard {
    token: usize,
}

impl StackGuard {
    /// 入栈，检测重入循环和深度超限
    fn enter(
        token: usize,
        identifier: &str,
        max_depth: usize,
    ) -> Result<Self, CreationError> {
        RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let entries: Vec<&String> = stack
                .iter()
                .filter(|(t, _)| *t == token)
                .map(|(_, id)| id)
                .collect();

            if entries.iter().any(|id| id.as_str() == identifier) {
                let mut path: Vec<String> = entries
                    .iter()
                    .skip_while(|id| id.as_str() != identifier)
                    .map(|id| id.to_string())
                    .collect();
                path.push(identifier.to_string());
                return Err(CreationError::new(
                    identifier,
                    CreationStage::Resolution,
                    weave_common::CircularReferenceError::ConstructorCycle { path },
                ));
            }
            if entries.len() >= max_depth {
                return Err(CreationError::from_message(
                    identifier,
                    CreationStage::Resolution,
                    format!("解析深度超过上限 {}", max_depth),
                ));
            }
            stack.push((token, identifier.to_string()));
            Ok(StackGuard { token })
        })
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(position) = stack.iter().rposition(|(t, _)| *t == self.token) {
                stack.remove(position);
            }
        });
    }
}

/// 对象图构建器
pub struct ObjectGraphBuilder {
    registry: Arc<DescriptorRegistryImpl>,
    models: Arc<TypeModelRegistry>,
    conversion: Arc<ConversionService>,
    resolver: Arc<dyn ConstructorResolver>,
    caster: Arc<dyn CapabilityCaster>,
    cache: SingletonCache,
    config: ContainerConfig,
    post_processors: RwLock<Vec<Arc<dyn ComponentPostProcessor>>>,
    /// 依赖方记录：标识符 → 依赖它的组件集合
    dependents: Mutex<HashMap<String, BTreeSet<String>>>,
    /// 依赖记录：标识符 → 它依赖的组件集合
    dependencies: Mutex<HashMap<String, BTreeSet<String>>>,
    /// 销毁目标：发布对象可能是代理，销毁方法作用在原始实例上
    destruction_targets: Mutex<HashMap<String, ComponentValue>>,
}

impl ObjectGraphBuilder {
    /// 创建新的对象图构建器
    pub fn new(
        registry: Arc<DescriptorRegistryImpl>,
        conversion: Arc<ConversionService>,
        resolver: Arc<dyn ConstructorResolver>,
        caster: Arc<dyn CapabilityCaster>,
        config: ContainerConfig,
    ) -> Self {
        let models = registry.models().clone();
        Self {
            registry,
            models,
            conversion,
            resolver,
            caster,
            cache: SingletonCache::new(),
            config,
            post_processors: RwLock::new(Vec::new()),
            dependents: Mutex::new(HashMap::new()),
            dependencies: Mutex::new(HashMap::new()),
            destruction_targets: Mutex::new(HashMap::new()),
        }
    }

    /// 注册组件后置处理器
    pub fn add_post_processor(&self, processor: Arc<dyn ComponentPostProcessor>) {
        debug!("注册组件后置处理器: {}", processor.processor_name());
        self.post_processors.write().push(processor);
    }

    /// 描述符注册表
    pub fn registry(&self) -> &Arc<DescriptorRegistryImpl> {
        &self.registry
    }

    /// 容器配置
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// 能力接口转换器
    pub fn caster(&self) -> &Arc<dyn CapabilityCaster> {
        &self.caster
    }

    /// 记录一条依赖边
    fn record_dependency(&self, requesting: &str, dependency: &str) {
        if requesting.is_empty() || requesting == dependency {
            return;
        }
        self.dependents
            .lock()
            .entry(dependency.to_string())
            .or_default()
            .insert(requesting.to_string());
        self.dependencies
            .lock()
            .entry(requesting.to_string())
            .or_default()
            .insert(dependency.to_string());
    }

    /// 依赖指定组件的标识符集合
    pub fn dependents_of(&self, identifier: &str) -> Vec<String> {
        self.dependents
            .lock()
            .get(identifier)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 指定组件依赖的标识符集合
    pub fn dependencies_of(&self, identifier: &str) -> Vec<String> {
        self.dependencies
            .lock()
            .get(identifier)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn builder_token(&self) -> usize {
        self as *const Self as usize
    }

    fn model_for(
        &self,
        descriptor: &ComponentDescriptor,
        stage: CreationStage,
    ) -> CreationResult<Arc<TypeModel>> {
        self.models
            .model_of(descriptor.type_info.id)
            .ok_or_else(|| {
                CreationError::new(
                    &descriptor.identifier,
                    stage,
                    DescriptorError::ModelMissing {
                        type_name: descriptor.type_info.name.clone(),
                    },
                )
            })
    }

    fn processors_snapshot(&self) -> Vec<Arc<dyn ComponentPostProcessor>> {
        self.post_processors.read().clone()
    }

    /// 将值适配到目标逻辑类型，失败即属性填充错误
    fn cast_or_fail(
        &self,
        identifier: &str,
        value: ComponentValue,
        target: &TypeInfo,
    ) -> CreationResult<ComponentValue> {
        self.caster.cast(&value, target).ok_or_else(|| {
            CreationError::from_message(
                identifier,
                CreationStage::Population,
                format!("值无法赋给声明类型 {}", target.name),
            )
        })
    }

    /// 解析描述符声明的一个值
    fn resolve_value(
        &self,
        identifier: &str,
        spec: &ValueSpec,
        target: &TypeInfo,
    ) -> CreationResult<ComponentValue> {
        match spec {
            ValueSpec::Literal(literal) => self
                .conversion
                .convert(literal, target)
                .map_err(|e| CreationError::new(identifier, CreationStage::Population, e)),
            ValueSpec::Reference(reference) => {
                let value = self.resolve_reference(identifier, reference)?;
                self.cast_or_fail(identifier, value, target)
            }
            ValueSpec::Instance(value) => {
                self.cast_or_fail(identifier, value.clone(), target)
            }
        }
    }

    /// 当前线程解析栈中以指定标识符开头的循环路径
    fn cycle_path(&self, identifier: &str) -> Option<Vec<String>> {
        let token = self.builder_token();
        RESOLUTION_STACK.with(|stack| {
            let stack = stack.borrow();
            let entries: Vec<&String> = stack
                .iter()
                .filter(|(t, _)| *t == token)
                .map(|(_, id)| id)
                .collect();
            if !entries.iter().any(|id| id.as_str() == identifier) {
                return None;
            }
            let mut path: Vec<String> = entries
                .iter()
                .skip_while(|id| id.as_str() != identifier)
                .map(|id| id.to_string())
                .collect();
            path.push(identifier.to_string());
            Some(path)
        })
    }

    /// 单例创建路径
    fn get_singleton(
        &self,
        identifier: &str,
        descriptor: &Arc<ComponentDescriptor>,
    ) -> CreationResult<ComponentValue> {
        match self.cache.begin_creation(identifier) {
            Ok(BeginOutcome::Published(value)) => return Ok(value),
            Ok(BeginOutcome::Started) => {}
            Err(re_entry) => {
                // 同线程重入且解析栈中存在该标识符：构造注入循环，
                // 携带循环路径报告；否则保留意外重入的原始诊断
                let cause = match self.cycle_path(identifier) {
                    Some(path) => {
                        weave_common::CircularReferenceError::ConstructorCycle { path }
                    }
                    None => re_entry,
                };
                return Err(CreationError::new(
                    identifier,
                    CreationStage::Resolution,
                    cause,
                ));
            }
        }

        debug!("开始创建单例组件: {}", identifier);
        match self.create_instance(identifier, descriptor, None) {
            Ok(value) => {
                self.cache.complete_creation(identifier, value.clone());
                info!("单例组件已发布: {}", identifier);
                Ok(value)
            }
            Err(e) => {
                self.cache.fail_creation(identifier);
                self.destruction_targets.lock().remove(identifier);
                self.resolver.evict(identifier);
                Err(e)
            }
        }
    }

    /// 完整的创建流水线：解析 → 实例化 → 暴露早期引用 → 填充 → 初始化
    fn create_instance(
        &self,
        identifier: &str,
        descriptor: &Arc<ComponentDescriptor>,
        explicit_args: Option<&[ComponentValue]>,
    ) -> CreationResult<ComponentValue> {
        let _guard = StackGuard::enter(
            self.builder_token(),
            identifier,
            self.config.max_resolution_depth,
        )?;

        let raw = self.create_raw(descriptor, explicit_args)?;

        if descriptor.scope.is_singleton() {
            if descriptor.destroy_method.is_some() {
                self.destruction_targets
                    .lock()
                    .insert(identifier.to_string(), raw.clone());
            }
            let processors = self.processors_snapshot();
            let early_identifier = identifier.to_string();
            let early_raw = raw.clone();
            self.cache.register_early_factory(
                identifier,
                Box::new(move || {
                    let mut current = early_raw;
                    for processor in &processors {
                        current = processor.early_reference(current, &early_identifier)?;
                    }
                    Ok(current)
                }),
            );
        }

        let outcome = self
            .populate(&raw, descriptor)
            .and_then(|_| self.initialize(raw.clone(), descriptor));
        let initialized = match outcome {
            Ok(value) => value,
            Err(mut e) => {
                // 展开路径上尽力清理，次级错误附加在主错误上
                if descriptor.destroy_method.is_some() {
                    if let Err(cleanup) = self.invoke_destroy(&raw, descriptor) {
                        e.push_suppressed(cleanup);
                    }
                }
                return Err(e);
            }
        };

        if descriptor.scope.is_singleton() {
            self.check_early_exposure(identifier, &raw, initialized)
        } else {
            Ok(initialized)
        }
    }

    /// 原始实例化：委托解析器选择可执行体并调用分配原语
    ///
    /// 不做属性填充，也不执行初始化回调
    pub fn create_raw(
        &self,
        descriptor: &ComponentDescriptor,
        explicit_args: Option<&[ComponentValue]>,
    ) -> CreationResult<ComponentValue> {
        let resolved = self.resolver.resolve(descriptor, explicit_args, self)?;
        debug!(
            "实例化组件: {} 经由 {}",
            descriptor.identifier,
            resolved.executable.signature()
        );
        (resolved.executable.invoke)(&resolved.arguments).map_err(|e| {
            CreationError::new(&descriptor.identifier, CreationStage::Instantiation, e)
        })
    }

    /// 属性填充
    ///
    /// 解析每个显式声明的属性值（字面量、组件引用或转换后的标量），
    /// 再按自动装配模式发现并填充未赋值的可写属性，为每次填充记录
    /// 一条依赖边
    pub fn populate(
        &self,
        instance: &ComponentValue,
        descriptor: &Arc<ComponentDescriptor>,
    ) -> CreationResult<()> {
        let identifier = descriptor.identifier.as_str();
        let model = self.model_for(descriptor, CreationStage::Population)?;

        let mut assigned: BTreeSet<&str> = BTreeSet::new();
        for assignment in &descriptor.properties {
            let property = model.property(&assignment.name).ok_or_else(|| {
                CreationError::from_message(
                    identifier,
                    CreationStage::Population,
                    format!("类型 {} 没有属性 '{}'", descriptor.type_info.name, assignment.name),
                )
            })?;
            let value = self.resolve_value(identifier, &assignment.value, &property.type_info)?;
            (property.setter)(instance, value).map_err(|e| {
                CreationError::new(identifier, CreationStage::Population, e)
            })?;
            assigned.insert(assignment.name.as_str());
        }

        match descriptor.autowire {
            weave_common::AutowireMode::None => {}
            weave_common::AutowireMode::ByName => {
                for property in model.properties() {
                    if assigned.contains(property.name.as_str()) {
                        continue;
                    }
                    if !self.registry.contains(&property.name) {
                        continue;
                    }
                    debug!("按名称装配属性: {}.{}", identifier, property.name);
                    self.autowire_property(instance, identifier, property, &property.name)?;
                }
            }
            weave_common::AutowireMode::ByType => {
                for property in model.properties() {
                    if assigned.contains(property.name.as_str()) {
                        continue;
                    }
                    if self.conversion.is_simple(property.type_info.id) {
                        continue;
                    }
                    let candidates = self.registry.find_assignable(&property.type_info);
                    if candidates.is_empty() {
                        debug!(
                            "按类型装配未找到候选，跳过属性: {}.{}",
                            identifier, property.name
                        );
                        continue;
                    }
                    let chosen = self
                        .registry
                        .select_candidate(&property.type_info, candidates)
                        .map_err(|e| {
                            CreationError::new(identifier, CreationStage::Population, e)
                        })?;
                    debug!(
                        "按类型装配属性: {}.{} <- {}",
                        identifier, property.name, chosen
                    );
                    self.autowire_property(instance, identifier, property, &chosen)?;
                }
            }
        }
        Ok(())
    }

    fn autowire_property(
        &self,
        instance: &ComponentValue,
        identifier: &str,
        property: &Arc<PropertyModel>,
        dependency: &str,
    ) -> CreationResult<()> {
        let value = self.resolve_reference(identifier, dependency)?;
        let value = self.cast_or_fail(identifier, value, &property.type_info)?;
        (property.setter)(instance, value)
            .map_err(|e| CreationError::new(identifier, CreationStage::Population, e))
    }

    /// 初始化
    ///
    /// 依次执行前置扩展钩子、声明的初始化方法（缺失时跳过，显式要求
    /// 时缺失为致命错误）、后置扩展钩子。后置钩子正是拦截引擎用代理
    /// 替换原始实例的位置。
    pub fn initialize(
        &self,
        instance: ComponentValue,
        descriptor: &Arc<ComponentDescriptor>,
    ) -> CreationResult<ComponentValue> {
        let identifier = descriptor.identifier.as_str();
        let processors = self.processors_snapshot();

        let mut current = instance;
        for processor in &processors {
            current = processor.before_initialization(current, identifier)?;
        }

        if let Some(init_method) = &descriptor.init_method {
            let model = self.model_for(descriptor, CreationStage::Initialization)?;
            match model.method(init_method) {
                Some(method) => {
                    debug!("调用初始化方法: {}.{}", identifier, init_method);
                    (method.invoke)(&current, &[]).map_err(|e| {
                        CreationError::new(identifier, CreationStage::Initialization, e)
                    })?;
                }
                None if descriptor.init_method_required => {
                    return Err(CreationError::from_message(
                        identifier,
                        CreationStage::Initialization,
                        format!("必需的初始化方法不存在: {}", init_method),
                    ));
                }
                None => {
                    debug!("初始化方法不存在，跳过: {}.{}", identifier, init_method);
                }
            }
        }

        for processor in &processors {
            current = processor.after_initialization(current, identifier)?;
        }
        Ok(current)
    }

    /// 早期引用身份一致性检查
    ///
    /// 早期引用已被依赖方消费、而初始化后的对象与原始实例不再是
    /// 同一身份时，说明循环中注入了错误的实例身份：除非启用
    /// 原始注入容忍模式，否则视为致命的组装错误
    fn check_early_exposure(
        &self,
        identifier: &str,
        raw: &ComponentValue,
        initialized: ComponentValue,
    ) -> CreationResult<ComponentValue> {
        let Some(early) = self.cache.early_reference(identifier) else {
            return Ok(initialized);
        };

        if same_instance(&initialized, raw) {
            // 初始化未替换实例：采用早期引用（可能已织入循环安全代理）
            return Ok(early);
        }

        let dependents = self.dependents_of(identifier);
        if dependents.is_empty() {
            return Ok(initialized);
        }
        if self.config.allow_raw_injection {
            warn!(
                "组件 '{}' 的早期原始引用已注入依赖方 {:?}，原始注入容忍模式已启用",
                identifier, dependents
            );
            return Ok(initialized);
        }
        Err(CreationError::from_message(
            identifier,
            CreationStage::Initialization,
            format!(
                "组件 '{}' 的早期引用已注入依赖方 {:?}，但最终发布对象已被替换为不同实例；\
                 循环中的依赖方持有了错误的实例身份",
                identifier, dependents
            ),
        ))
    }

    fn invoke_destroy(
        &self,
        instance: &ComponentValue,
        descriptor: &Arc<ComponentDescriptor>,
    ) -> CreationResult<()> {
        let identifier = descriptor.identifier.as_str();
        let Some(destroy_method) = &descriptor.destroy_method else {
            return Ok(());
        };
        let model = self.model_for(descriptor, CreationStage::Destruction)?;
        match model.method(destroy_method) {
            Some(method) => {
                debug!("调用销毁方法: {}.{}", identifier, destroy_method);
                (method.invoke)(instance, &[])
                    .map(|_| ())
                    .map_err(|e| {
                        CreationError::new(identifier, CreationStage::Destruction, e)
                    })
            }
            None => {
                debug!("销毁方法不存在，跳过: {}.{}", identifier, destroy_method);
                Ok(())
            }
        }
    }

    /// 饥饿实例化所有非延迟单例
    ///
    /// 按注册顺序创建全部非延迟、非抽象的单例组件
    pub fn pre_instantiate_singletons(&self) -> CreationResult<usize> {
        let mut created = 0;
        for identifier in self.registry.identifiers() {
            let Ok(descriptor) = self.registry.get(&identifier) else {
                continue;
            };
            if !descriptor.scope.is_singleton() || descriptor.lazy || descriptor.is_abstract {
                continue;
            }
            self.get_or_create(&identifier)?;
            created += 1;
        }
        info!("饥饿实例化完成, 共创建 {} 个单例", created);
        Ok(created)
    }

    /// 按创建顺序的逆序销毁全部单例
    ///
    /// 单个组件的销毁失败只记录日志，不中断其余组件的销毁
    pub fn destroy_singletons(&self) -> usize {
        let drained = self.cache.drain_for_destruction();
        let mut targets = std::mem::take(&mut *self.destruction_targets.lock());
        let mut destroyed = 0;
        for (identifier, instance) in &drained {
            if let Ok(descriptor) = self.registry.get(identifier) {
                // 销毁方法作用在原始实例上（发布对象可能是代理）
                let target = targets.remove(identifier).unwrap_or_else(|| instance.clone());
                if let Err(e) = self.invoke_destroy(&target, &descriptor) {
                    error!("组件销毁失败: {}, 原因: {}", identifier, e);
                    continue;
                }
            }
            destroyed += 1;
        }
        self.dependents.lock().clear();
        self.dependencies.lock().clear();
        info!("单例销毁完成, 共处理 {} 个组件", drained.len());
        destroyed
    }

    /// 判断标识符当前是否处于创建中
    pub fn is_in_creation(&self, identifier: &str) -> bool {
        self.cache.early_reference(identifier).is_some()
            || RESOLUTION_STACK.with(|stack| {
                stack
                    .borrow()
                    .iter()
                    .any(|(t, id)| *t == self.builder_token() && id == identifier)
            })
    }
}

impl std::fmt::Debug for ObjectGraphBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectGraphBuilder")
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish()
    }
}

impl ObjectGraph for ObjectGraphBuilder {
    fn get_or_create(&self, identifier: &str) -> CreationResult<ComponentValue> {
        if let Some(value) = self.cache.lookup(identifier, true)? {
            return Ok(value);
        }

        let descriptor = self.registry.get(identifier).map_err(|e| {
            CreationError::new(identifier, CreationStage::Resolution, e)
        })?;
        if descriptor.is_abstract {
            return Err(CreationError::new(
                identifier,
                CreationStage::Resolution,
                DescriptorError::AbstractInstantiation {
                    identifier: identifier.to_string(),
                },
            ));
        }

        for dependency in &descriptor.depends_on {
            self.record_dependency(identifier, dependency);
            self.get_or_create(dependency)?;
        }

        match &descriptor.scope {
            weave_common::ComponentScope::Singleton => self.get_singleton(identifier, &descriptor),
            weave_common::ComponentScope::Prototype => {
                debug!("创建原型组件实例: {}", identifier);
                self.create_instance(identifier, &descriptor, None)
            }
            weave_common::ComponentScope::Named(scope) => Err(CreationError::new(
                identifier,
                CreationStage::Resolution,
                DescriptorError::UnsupportedScope {
                    identifier: identifier.to_string(),
                    scope: scope.clone(),
                },
            )),
        }
    }

    fn contains(&self, identifier: &str) -> bool {
        self.registry.contains(identifier)
    }

    fn register(&self, descriptor: ComponentDescriptor) -> Result<(), DescriptorError> {
        self.registry.register(descriptor)
    }
}

impl DependencyProvider for ObjectGraphBuilder {
    fn resolve_reference(
        &self,
        requesting: &str,
        identifier: &str,
    ) -> CreationResult<ComponentValue> {
        self.record_dependency(requesting, identifier);
        self.get_or_create(identifier)
    }

    fn resolve_dependency(
        &self,
        requesting: &str,
        parameter: &ParameterSpec,
    ) -> CreationResult<ComponentValue> {
        let candidates = self.registry.find_assignable(&parameter.type_info);
        if candidates.is_empty() {
            return Err(CreationError::new(
                requesting,
                CreationStage::Resolution,
                weave_common::ResolutionError::UnsatisfiedDependency {
                    identifier: requesting.to_string(),
                    parameter: parameter.name.clone(),
                    source: format!(
                        "没有类型可赋值给 {} 的已注册组件",
                        parameter.type_info.name
                    )
                    .into(),
                },
            ));
        }
        let chosen = self
            .registry
            .select_candidate(&parameter.type_info, candidates)
            .map_err(|e| CreationError::new(requesting, CreationStage::Resolution, e))?;
        let value = self.resolve_reference(requesting, &chosen)?;
        self.caster
            .cast(&value, &parameter.type_info)
            .ok_or_else(|| {
                CreationError::from_message(
                    requesting,
                    CreationStage::Resolution,
                    format!(
                        "组件 '{}' 无法按声明类型 {} 注入参数 '{}'",
                        chosen, parameter.type_info.name, parameter.name
                    ),
                )
            })
    }
}
