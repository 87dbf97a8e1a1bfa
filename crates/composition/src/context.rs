//! 对象图上下文
//!
//! 装配完成的上下文实例：持有对象图构建器、切面注册表与代理工厂，
//! 提供异步的启动/停止编排和类型化的组件访问入口。每个上下文是
//! 独立的对象图（进程内可并存多个，例如测试场景）。

use crate::errors::{CompositionError, CompositionResult};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};
use uuid::Uuid;
use weave_aop_impl::{AdvisorRegistry, ProxyFactoryImpl};
use weave_common::{
    downcast_capability, downcast_value, ComponentDescriptor, ComponentValue, CreationError,
    CreationResult, CreationStage, DescriptorError, TypeInfo,
};
use weave_di_abstractions::{CapabilityCaster, ObjectGraph};
use weave_di_impl::ObjectGraphBuilder;

/// 上下文运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphStatus {
    /// 已初始化
    Initialized,
    /// 启动中
    Starting,
    /// 运行中
    Running,
    /// 停止中
    Stopping,
    /// 已停止
    Stopped,
    /// 失败状态
    Failed,
}

/// 上下文统计信息
#[derive(Debug, Clone, Default)]
pub struct GraphMetrics {
    /// 启动时间
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    /// 饥饿实例化的单例数量
    pub eager_singletons: usize,
}

/// 启动任务 trait
///
/// 对象图就绪后、上下文进入运行状态前执行的扩展任务
#[async_trait]
pub trait StartupTask: Send + Sync {
    /// 任务名称
    fn task_name(&self) -> &str;

    /// 执行任务
    async fn run(&self, context: &ObjectGraphContext) -> CompositionResult<()>;
}

/// 对象图上下文
pub struct ObjectGraphContext {
    /// 上下文实例ID
    id: Uuid,
    /// 对象图构建器
    graph: Arc<ObjectGraphBuilder>,
    /// 切面注册表
    advisors: Arc<AdvisorRegistry>,
    /// 代理工厂
    proxy_factory: Arc<ProxyFactoryImpl>,
    /// 启动任务列表
    startup_tasks: Vec<Arc<dyn StartupTask>>,
    /// 运行状态
    status: RwLock<GraphStatus>,
    /// 统计信息
    metrics: RwLock<GraphMetrics>,
}

impl ObjectGraphContext {
    pub(crate) fn new(
        graph: Arc<ObjectGraphBuilder>,
        advisors: Arc<AdvisorRegistry>,
        proxy_factory: Arc<ProxyFactoryImpl>,
        startup_tasks: Vec<Arc<dyn StartupTask>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            graph,
            advisors,
            proxy_factory,
            startup_tasks,
            status: RwLock::new(GraphStatus::Initialized),
            metrics: RwLock::new(GraphMetrics::default()),
        }
    }

    /// 上下文实例ID
    pub fn context_id(&self) -> Uuid {
        self.id
    }

    /// 对象图构建器
    pub fn graph(&self) -> &Arc<ObjectGraphBuilder> {
        &self.graph
    }

    /// 切面注册表
    pub fn advisors(&self) -> &Arc<AdvisorRegistry> {
        &self.advisors
    }

    /// 代理工厂（外部协作方的装配入口）
    pub fn proxy_factory(&self) -> &Arc<ProxyFactoryImpl> {
        &self.proxy_factory
    }

    /// 启动上下文
    ///
    /// 饥饿实例化所有非延迟单例，随后执行注册的启动任务
    pub async fn start(&self) -> CompositionResult<()> {
        info!("启动对象图上下文: {}", self.id);
        {
            let mut status = self.status.write().await;
            *status = GraphStatus::Starting;
        }
        {
            let mut metrics = self.metrics.write().await;
            metrics.start_time = Some(chrono::Utc::now());
        }

        let created = match self.graph.pre_instantiate_singletons() {
            Ok(created) => created,
            Err(e) => {
                error!("饥饿实例化失败: {}", e);
                let mut status = self.status.write().await;
                *status = GraphStatus::Failed;
                return Err(CompositionError::from(e));
            }
        };
        {
            let mut metrics = self.metrics.write().await;
            metrics.eager_singletons = created;
        }

        for task in &self.startup_tasks {
            info!("执行启动任务: {}", task.task_name());
            if let Err(e) = task.run(self).await {
                error!("启动任务失败: {}, 原因: {}", task.task_name(), e);
                let mut status = self.status.write().await;
                *status = GraphStatus::Failed;
                return Err(CompositionError::StartupTask {
                    name: task.task_name().to_string(),
                    source: Box::new(e),
                });
            }
        }

        {
            let mut status = self.status.write().await;
            *status = GraphStatus::Running;
        }
        info!("对象图上下文启动完成: {}", self.id);
        Ok(())
    }

    /// 停止上下文
    ///
    /// 按创建顺序的逆序销毁全部单例
    pub async fn stop(&self) -> CompositionResult<()> {
        info!("停止对象图上下文: {}", self.id);
        {
            let mut status = self.status.write().await;
            *status = GraphStatus::Stopping;
        }

        self.graph.destroy_singletons();

        {
            let mut status = self.status.write().await;
            *status = GraphStatus::Stopped;
        }
        info!("对象图上下文已停止: {}", self.id);
        Ok(())
    }

    /// 当前运行状态
    pub async fn status(&self) -> GraphStatus {
        *self.status.read().await
    }

    /// 统计信息快照
    pub async fn metrics(&self) -> GraphMetrics {
        self.metrics.read().await.clone()
    }

    /// 获取组件实例（类型擦除形式）
    pub fn get(&self, identifier: &str) -> CreationResult<ComponentValue> {
        self.graph.get_or_create(identifier)
    }

    /// 获取组件实例并还原为具体类型
    pub fn get_as<T: Send + Sync + 'static>(&self, identifier: &str) -> CreationResult<Arc<T>> {
        let value = self.get(identifier)?;
        downcast_value::<T>(&value).ok_or_else(|| {
            CreationError::from_message(
                identifier,
                CreationStage::Resolution,
                format!(
                    "实例无法还原为请求的类型 {}",
                    std::any::type_name::<T>()
                ),
            )
        })
    }

    /// 获取组件实例的能力接口视图
    pub fn get_capability<C: ?Sized + Send + Sync + 'static>(
        &self,
        identifier: &str,
    ) -> CreationResult<Arc<C>> {
        let value = self.get(identifier)?;
        let target = TypeInfo::of::<C>();
        let cast = self.graph.caster().cast(&value, &target).ok_or_else(|| {
            CreationError::from_message(
                identifier,
                CreationStage::Resolution,
                format!("实例无法转换为能力接口 {}", target.name),
            )
        })?;
        downcast_capability::<C>(&cast).ok_or_else(|| {
            CreationError::from_message(
                identifier,
                CreationStage::Resolution,
                format!("能力接口视图还原失败: {}", target.name),
            )
        })
    }

    /// 检查标识符是否已注册
    pub fn contains(&self, identifier: &str) -> bool {
        self.graph.contains(identifier)
    }

    /// 注册描述符（装配完成后的增量注册）
    pub fn register(&self, descriptor: ComponentDescriptor) -> Result<(), DescriptorError> {
        self.graph.register(descriptor)
    }
}

impl std::fmt::Debug for ObjectGraphContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectGraphContext")
            .field("id", &self.id)
            .field("graph", &self.graph)
            .finish()
    }
}
