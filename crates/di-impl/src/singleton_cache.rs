//! 三级单例缓存
//!
//! 成品实例（一级）、早期引用（二级）、待定早期引用工厂（三级）。
//! 三级缓存让单例之间的属性注入循环可以在不无限递归的前提下完成：
//! 原始实例分配后、属性填充前即向三级缓存注册早期引用工厂，
//! 循环中的依赖方通过该工厂拿到与最终发布对象身份一致的引用。
//!
//! 不变量：任一时刻一个标识符至多出现在一个层级中。
//! 二级与三级共用一张带标签状态的映射表，结构上保证该不变量；
//! 一级使用并发映射，已发布单例的读取不经过粗粒度互斥锁。

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::thread::{self, ThreadId};
use tracing::debug;
use weave_common::{CircularReferenceError, ComponentValue, CreationResult};

/// 早期引用工厂
///
/// 零参回调，产出组件的早期引用（原始实例，或拦截引擎认为
/// 需要循环安全代理时的代理实例）。至多调用一次，结果被记忆。
pub type EarlyReferenceFactory =
    Box<dyn FnOnce() -> CreationResult<ComponentValue> + Send>;

/// 二级/三级缓存的带标签条目
enum TransientEntry {
    /// 二级：已记忆的早期引用
    Early(ComponentValue),
    /// 三级：尚未调用的早期引用工厂
    Pending(EarlyReferenceFactory),
}

/// 粗粒度互斥锁保护的缓存瞬态状态
struct TransientState {
    /// 二级与三级条目
    transient: HashMap<String, TransientEntry>,
    /// 创建中标记：标识符 → 执行创建的线程
    in_creation: HashMap<String, ThreadId>,
    /// 单例发布顺序（销毁时逆序使用）
    creation_order: Vec<String>,
}

/// 开始创建的结果
pub enum BeginOutcome {
    /// 本线程获得创建权
    Started,
    /// 等待期间其他线程已完成发布
    Published(ComponentValue),
}

/// 三级单例缓存
pub struct SingletonCache {
    /// 一级：成品实例
    finished: DashMap<String, ComponentValue>,
    /// 二级/三级与创建中标记，整体由一把粗粒度互斥锁串行化
    state: Mutex<TransientState>,
    /// 创建完成通知
    creation_done: Condvar,
}

impl SingletonCache {
    /// 创建空缓存
    pub fn new() -> Self {
        Self {
            finished: DashMap::new(),
            state: Mutex::new(TransientState {
                transient: HashMap::new(),
                in_creation: HashMap::new(),
                creation_order: Vec::new(),
            }),
            creation_done: Condvar::new(),
        }
    }

    /// 分层查找组件实例
    ///
    /// 先查一级；仅当标识符被当前线程标记为创建中时，依次查二级、
    /// （`allow_early` 允许时）三级。三级命中会调用工厂并将结果
    /// 提升到二级，此后同一创建过程内的查找都返回同一引用。
    pub fn lookup(
        &self,
        identifier: &str,
        allow_early: bool,
    ) -> CreationResult<Option<ComponentValue>> {
        if let Some(value) = self.finished.get(identifier) {
            return Ok(Some(value.value().clone()));
        }

        let mut state = self.state.lock();
        match state.in_creation.get(identifier) {
            Some(owner) if *owner == thread::current().id() => {}
            _ => return Ok(None),
        }

        match state.transient.get(identifier) {
            Some(TransientEntry::Early(value)) => Ok(Some(value.clone())),
            Some(TransientEntry::Pending(_)) if allow_early => {
                let Some(TransientEntry::Pending(factory)) = state.transient.remove(identifier)
                else {
                    unreachable!("待定条目在持锁期间消失");
                };
                let value = factory()?;
                debug!("早期引用已提升: {}", identifier);
                state
                    .transient
                    .insert(identifier.to_string(), TransientEntry::Early(value.clone()));
                Ok(Some(value))
            }
            _ => Ok(None),
        }
    }

    /// 标记标识符进入创建状态
    ///
    /// 其他线程正在创建同一标识符时阻塞等待其完成；等待结束后若已
    /// 发布则直接返回成品。同一线程重复标记视为意外的重入创建，
    /// 立即报错（合法的循环依赖应当命中早期引用缓存，不会走到这里）。
    pub fn begin_creation(
        &self,
        identifier: &str,
    ) -> Result<BeginOutcome, CircularReferenceError> {
        let mut state = self.state.lock();
        loop {
            if let Some(value) = self.finished.get(identifier) {
                return Ok(BeginOutcome::Published(value.value().clone()));
            }
            match state.in_creation.get(identifier) {
                None => {
                    state
                        .in_creation
                        .insert(identifier.to_string(), thread::current().id());
                    return Ok(BeginOutcome::Started);
                }
                Some(owner) if *owner == thread::current().id() => {
                    return Err(CircularReferenceError::CurrentlyInCreation {
                        identifier: identifier.to_string(),
                    });
                }
                Some(_) => {
                    self.creation_done.wait(&mut state);
                }
            }
        }
    }

    /// 注册早期引用工厂（三级）
    ///
    /// 一级已持有该标识符时注册无效
    pub fn register_early_factory(&self, identifier: &str, factory: EarlyReferenceFactory) {
        if self.finished.contains_key(identifier) {
            return;
        }
        let mut state = self.state.lock();
        state
            .transient
            .insert(identifier.to_string(), TransientEntry::Pending(factory));
    }

    /// 查看已提升的早期引用（仅二级，不触发三级工厂）
    pub fn early_reference(&self, identifier: &str) -> Option<ComponentValue> {
        let state = self.state.lock();
        match state.transient.get(identifier) {
            Some(TransientEntry::Early(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// 发布成品实例并结束创建
    ///
    /// 写入一级、清除该标识符的二级/三级条目与创建中标记，
    /// 并唤醒等待该标识符的线程
    pub fn complete_creation(&self, identifier: &str, value: ComponentValue) {
        let mut state = self.state.lock();
        self.finished.insert(identifier.to_string(), value);
        state.transient.remove(identifier);
        state.in_creation.remove(identifier);
        state.creation_order.push(identifier.to_string());
        self.creation_done.notify_all();
    }

    /// 创建失败时清理
    ///
    /// 清除该标识符的二级/三级残留条目与创建中标记，使后续重试
    /// 不会观察到陈旧的早期引用
    pub fn fail_creation(&self, identifier: &str) {
        let mut state = self.state.lock();
        state.transient.remove(identifier);
        state.in_creation.remove(identifier);
        self.creation_done.notify_all();
    }

    /// 一级是否持有该标识符
    pub fn contains_finished(&self, identifier: &str) -> bool {
        self.finished.contains_key(identifier)
    }

    /// 获取已发布的成品实例
    pub fn finished(&self, identifier: &str) -> Option<ComponentValue> {
        self.finished.get(identifier).map(|value| value.value().clone())
    }

    /// 取出全部成品实例供销毁（按发布顺序的逆序），并清空缓存
    pub fn drain_for_destruction(&self) -> Vec<(String, ComponentValue)> {
        let mut state = self.state.lock();
        let order = std::mem::take(&mut state.creation_order);
        state.transient.clear();
        state.in_creation.clear();
        drop(state);

        let mut drained = Vec::with_capacity(order.len());
        for identifier in order.into_iter().rev() {
            if let Some((identifier, value)) = self.finished.remove(&identifier) {
                drained.push((identifier, value));
            }
        }
        self.finished.clear();
        drained
    }
}

impl Default for SingletonCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SingletonCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SingletonCache")
            .field("finished", &self.finished.len())
            .field("transient", &state.transient.len())
            .field("in_creation", &state.in_creation.len())
            .finish()
    }
}
