//! 组件代理
//!
//! 代理是目标实例的显式装饰器：持有目标、类型模型和适用切面，
//! 按（方法）缓存拦截链并逐调用分发。能力接口视图经由已注册的
//! 类型化绑定器产出，是运行期字节码合成的重设计替代。

use crate::chain::{build_chain, InterceptionChain};
use crate::invocation::ChainInvocation;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use weave_aop_abstractions::{Advisor, Invocation, InvocationOutcome, ProxyConfig};
use weave_common::{
    capability_value, same_instance, ComponentValue, InvocationError, MethodModel, TypeInfo,
    TypeModel,
};

/// 能力绑定闭包：把代理包装成某个能力接口的类型化视图
pub type BinderFn = Arc<dyn Fn(Arc<ComponentProxy>) -> ComponentValue + Send + Sync>;

/// 能力绑定器注册表
///
/// 能力接口类型ID → 产出类型化代理包装的工厂闭包。
/// 目标的能力集合只在运行期可知时，以此代替运行期代码合成。
#[derive(Default)]
pub struct CapabilityBinderRegistry {
    binders: RwLock<HashMap<TypeId, BinderFn>>,
}

impl CapabilityBinderRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册能力接口的绑定器
    pub fn register<C, F>(&self, bind: F)
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<ComponentProxy>) -> Arc<C> + Send + Sync + 'static,
    {
        let binder: BinderFn = Arc::new(move |proxy| capability_value(bind(proxy)));
        self.binders.write().insert(TypeId::of::<C>(), binder);
    }

    /// 查询绑定器
    pub fn get(&self, capability: TypeId) -> Option<BinderFn> {
        self.binders.read().get(&capability).cloned()
    }

    /// 是否存在指定能力的绑定器
    pub fn contains(&self, capability: TypeId) -> bool {
        self.binders.read().contains_key(&capability)
    }
}

impl std::fmt::Debug for CapabilityBinderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityBinderRegistry")
            .field("binders", &self.binders.read().len())
            .finish()
    }
}

/// 分发计数
///
/// 快路径（空链直达）与链式分发的次数，测试与观测用
#[derive(Debug, Default)]
pub struct DispatchStats {
    direct: AtomicU64,
    chained: AtomicU64,
}

impl DispatchStats {
    /// （快路径次数, 链式分发次数）快照
    pub fn snapshot(&self) -> (u64, u64) {
        (
            self.direct.load(Ordering::Relaxed),
            self.chained.load(Ordering::Relaxed),
        )
    }
}

thread_local! {
    /// 当前线程正在执行的代理栈（自调用暴露）
    static CURRENT_PROXY: RefCell<Vec<ComponentValue>> = const { RefCell::new(Vec::new()) };
}

/// 查询当前线程环境中暴露的代理
///
/// 仅在启用了 `expose_proxy` 的代理分发期间返回值；目标内部的
/// 自调用借此改走代理，使内部调用同样被拦截
pub fn current_proxy() -> Option<ComponentValue> {
    CURRENT_PROXY.with(|stack| stack.borrow().last().cloned())
}

/// 代理暴露守卫
struct ProxyExposure;

impl ProxyExposure {
    fn enter(proxy: ComponentValue) -> Self {
        CURRENT_PROXY.with(|stack| stack.borrow_mut().push(proxy));
        ProxyExposure
    }
}

impl Drop for ProxyExposure {
    fn drop(&mut self) {
        CURRENT_PROXY.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// 组件代理
pub struct ComponentProxy {
    identifier: String,
    target: ComponentValue,
    model: Arc<TypeModel>,
    advisors: Vec<Advisor>,
    config: ProxyConfig,
    binders: Arc<CapabilityBinderRegistry>,
    /// 按方法名缓存的拦截链（切面状态不可变，匹配确定）
    chains: DashMap<String, InterceptionChain>,
    stats: DispatchStats,
    /// 自引用，供暴露代理值与能力绑定使用
    self_ref: Weak<ComponentProxy>,
}

impl ComponentProxy {
    /// 创建代理（由代理工厂调用）
    pub(crate) fn create(
        identifier: String,
        target: ComponentValue,
        model: Arc<TypeModel>,
        advisors: Vec<Advisor>,
        config: ProxyConfig,
        binders: Arc<CapabilityBinderRegistry>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            identifier,
            target,
            model,
            advisors,
            config,
            binders,
            chains: DashMap::new(),
            stats: DispatchStats::default(),
            self_ref: self_ref.clone(),
        })
    }

    /// 代理自身的组件值表示
    ///
    /// 仅在代理析构竞争窗口内可能为空，此时回退为目标自身
    fn self_value(&self) -> ComponentValue {
        match self.self_ref.upgrade() {
            Some(proxy) => proxy,
            None => self.target.clone(),
        }
    }

    /// 代理的组件标识符
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// 未包装的目标实例
    pub fn target(&self) -> &ComponentValue {
        &self.target
    }

    /// 目标的类型模型
    pub fn model(&self) -> &Arc<TypeModel> {
        &self.model
    }

    /// 分发计数快照
    pub fn dispatch_stats(&self) -> (u64, u64) {
        self.stats.snapshot()
    }

    fn chain_for(&self, method: &Arc<MethodModel>) -> InterceptionChain {
        self.chains
            .entry(method.descriptor.name.clone())
            .or_insert_with(|| {
                Arc::new(build_chain(
                    &self.advisors,
                    self.model.type_info(),
                    &method.descriptor,
                ))
            })
            .clone()
    }

    /// 经代理分发一次方法调用
    ///
    /// 空链走快路径：不分配调用上下文，直接经方法表调用目标。
    /// 非空链构建调用上下文并执行链。行为返回（代理前的）目标实例
    /// 本身时替换为代理引用，保持调用方的身份比较一致。
    pub fn invoke(&self, method_name: &str, arguments: &[ComponentValue]) -> InvocationOutcome {
        let method = self
            .model
            .method(method_name)
            .cloned()
            .ok_or_else(|| InvocationError::MethodNotFound {
                type_name: self.model.type_info().name.clone(),
                method: method_name.to_string(),
            })?;

        let proxy_value = self.self_value();
        let _exposure = self
            .config
            .expose_proxy
            .then(|| ProxyExposure::enter(proxy_value.clone()));

        let chain = self.chain_for(&method);
        let outcome = if chain.is_empty() {
            self.stats.direct.fetch_add(1, Ordering::Relaxed);
            (method.invoke)(&self.target, arguments)
        } else {
            self.stats.chained.fetch_add(1, Ordering::Relaxed);
            let mut invocation = ChainInvocation::new(
                Some(proxy_value.clone()),
                self.target.clone(),
                method,
                arguments.to_vec(),
                chain,
            );
            invocation.proceed()
        };

        match outcome {
            Ok(result) if same_instance(&result, &self.target) => Ok(proxy_value),
            other => other,
        }
    }

    /// 把代理转换为目标类型的视图
    ///
    /// 先查能力绑定器（类型化代理包装，调用仍被拦截），再查切面的
    /// 能力引入（作用在目标上，按类型匹配）。代理不提供到具体实现
    /// 类型的还原，依赖方应当依赖能力接口。
    pub fn cast_to(&self, target: &TypeInfo) -> Option<ComponentValue> {
        if let Some(binder) = self.binders.get(target.id) {
            if let Some(proxy) = self.self_ref.upgrade() {
                return Some(binder(proxy));
            }
        }
        for advisor in &self.advisors {
            for introduction in &advisor.introductions {
                if introduction.type_info.id == target.id {
                    return (introduction.cast)(&self.target);
                }
            }
        }
        None
    }
}

impl std::fmt::Debug for ComponentProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentProxy")
            .field("identifier", &self.identifier)
            .field("type", &self.model.type_info().name)
            .field("advisors", &self.advisors.len())
            .finish()
    }
}
