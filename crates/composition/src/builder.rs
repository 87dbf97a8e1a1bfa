//! 上下文构建器
//!
//! 使用建造者模式装配完整的对象图上下文

use crate::context::{ObjectGraphContext, StartupTask};
use crate::errors::{CompositionError, CompositionResult};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info};
use weave_aop_abstractions::{Advisor, ProxyConfig};
use weave_aop_impl::{
    AdvisorRegistry, AutoProxyProcessor, CapabilityBinderRegistry, ProxyAwareCaster,
    ProxyFactoryImpl,
};
use weave_common::{
    ComponentDescriptor, ConversionService, TypeModel, TypeModelRegistry,
};
use weave_di_abstractions::{
    CapabilityCaster, ComponentPostProcessor, ContainerConfig, DescriptorRegistry,
};
use weave_di_impl::{ConstructorResolverImpl, DescriptorRegistryImpl, ObjectGraphBuilder};

/// 上下文构建器
///
/// 收集类型模型、描述符、切面、转换器和绑定器，`build` 时装配
/// 出完整的对象图上下文
pub struct GraphBuilder {
    container_config: ContainerConfig,
    proxy_config: ProxyConfig,
    logging_config: LoggingConfig,
    /// 是否启用日志初始化
    logging_enabled: bool,
    models: Vec<TypeModel>,
    descriptors: Vec<ComponentDescriptor>,
    advisors: Vec<Advisor>,
    converter_setup: Vec<Box<dyn FnOnce(&ConversionService) + Send>>,
    binder_setup: Vec<Box<dyn FnOnce(&CapabilityBinderRegistry) + Send>>,
    post_processors: Vec<Arc<dyn ComponentPostProcessor>>,
    startup_tasks: Vec<Arc<dyn StartupTask>>,
}

impl GraphBuilder {
    /// 创建新的上下文构建器
    pub fn new() -> Self {
        Self {
            container_config: ContainerConfig::default(),
            proxy_config: ProxyConfig::default(),
            logging_config: LoggingConfig::default(),
            logging_enabled: false, // 默认不启用日志初始化
            models: Vec::new(),
            descriptors: Vec::new(),
            advisors: Vec::new(),
            converter_setup: Vec::new(),
            binder_setup: Vec::new(),
            post_processors: Vec::new(),
            startup_tasks: Vec::new(),
        }
    }

    /// 设置容器配置
    pub fn with_container_config(mut self, config: ContainerConfig) -> Self {
        self.container_config = config;
        self
    }

    /// 设置代理配置
    pub fn with_proxy_config(mut self, config: ProxyConfig) -> Self {
        self.proxy_config = config;
        self
    }

    /// 配置日志
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging_config = config;
        self.logging_enabled = true;
        self
    }

    /// 注册类型模型
    pub fn register_model(mut self, model: TypeModel) -> Self {
        self.models.push(model);
        self
    }

    /// 注册组件描述符
    pub fn register_descriptor(mut self, descriptor: ComponentDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// 注册字面量转换的目标类型
    pub fn register_converter<T: DeserializeOwned + Send + Sync + 'static>(mut self) -> Self {
        self.converter_setup
            .push(Box::new(|conversion| conversion.register::<T>()));
        self
    }

    /// 注册切面
    pub fn add_advisor(mut self, advisor: Advisor) -> Self {
        self.advisors.push(advisor);
        self
    }

    /// 注册能力接口的代理绑定器
    pub fn register_binder<C, F>(mut self, bind: F) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<weave_aop_impl::ComponentProxy>) -> Arc<C> + Send + Sync + 'static,
    {
        self.binder_setup
            .push(Box::new(move |binders| binders.register::<C, _>(bind)));
        self
    }

    /// 注册组件后置处理器
    pub fn add_post_processor(mut self, processor: Arc<dyn ComponentPostProcessor>) -> Self {
        self.post_processors.push(processor);
        self
    }

    /// 注册启动任务
    pub fn add_startup_task(mut self, task: Arc<dyn StartupTask>) -> Self {
        self.startup_tasks.push(task);
        self
    }

    /// 装配对象图上下文
    pub fn build(self) -> CompositionResult<ObjectGraphContext> {
        info!("开始装配对象图上下文");

        // 只有在明确配置了日志时才初始化日志
        // 避免在测试环境中重复初始化
        if self.logging_enabled {
            self.logging_config.initialize()?;
        }

        // 类型模型注册表
        let models = Arc::new(TypeModelRegistry::new());
        for model in self.models {
            models.register(model);
        }

        // 转换服务
        let conversion = Arc::new(ConversionService::new());
        for setup in self.converter_setup {
            setup(&conversion);
        }

        // 描述符注册表与解析器
        let registry = Arc::new(DescriptorRegistryImpl::new(models.clone()));
        let resolver = Arc::new(ConstructorResolverImpl::new(
            models.clone(),
            conversion.clone(),
            self.container_config.clone(),
        ));

        // 切面注册表、绑定器与代理工厂
        let advisors = Arc::new(AdvisorRegistry::new());
        for advisor in self.advisors {
            advisors.add(advisor);
        }
        let binders = Arc::new(CapabilityBinderRegistry::new());
        for setup in self.binder_setup {
            setup(&binders);
        }
        let proxy_factory = Arc::new(ProxyFactoryImpl::new(models.clone(), binders));

        // 代理感知的能力转换器
        let caster: Arc<dyn CapabilityCaster> = Arc::new(ProxyAwareCaster::new(models.clone()));

        // 对象图构建器
        let graph = Arc::new(ObjectGraphBuilder::new(
            registry.clone(),
            conversion,
            resolver,
            caster,
            self.container_config,
        ));

        // 先注册用户处理器，自动代理处理器保持在最后
        for processor in self.post_processors {
            graph.add_post_processor(processor);
        }
        if !advisors.is_empty() {
            debug!("注册自动代理处理器 ({} 个切面)", advisors.len());
            graph.add_post_processor(Arc::new(AutoProxyProcessor::new(
                advisors.clone(),
                proxy_factory.clone(),
                models,
                self.proxy_config,
            )));
        }

        // 注册所有描述符
        for descriptor in self.descriptors {
            registry.register(descriptor)?;
        }

        info!("对象图上下文装配完成");
        Ok(ObjectGraphContext::new(
            graph,
            advisors,
            proxy_factory,
            self.startup_tasks,
        ))
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: tracing::Level,
    /// 是否显示目标
    pub show_target: bool,
    /// 是否显示线程ID
    pub show_thread_ids: bool,
    /// 是否显示文件名
    pub show_file: bool,
    /// 是否显示行号
    pub show_line_number: bool,
    /// 是否使用 JSON 格式
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: tracing::Level::INFO,
            show_target: true,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// 创建开发环境日志配置
    pub fn development() -> Self {
        Self {
            level: tracing::Level::DEBUG,
            show_target: true,
            show_thread_ids: true,
            show_file: true,
            show_line_number: true,
            json_format: false,
        }
    }

    /// 创建生产环境日志配置
    pub fn production() -> Self {
        Self {
            level: tracing::Level::INFO,
            show_target: false,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: true,
        }
    }

    /// 初始化日志系统
    fn initialize(&self) -> CompositionResult<()> {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(self.level)
            .with_target(self.show_target)
            .with_thread_ids(self.show_thread_ids)
            .with_file(self.show_file)
            .with_line_number(self.show_line_number);

        if self.json_format {
            subscriber.json().try_init()
        } else {
            subscriber.try_init()
        }
        .map_err(|e| CompositionError::BootstrapFailed {
            message: format!("日志初始化失败: {}", e),
        })?;

        info!("日志系统初始化完成");
        Ok(())
    }
}
