//! 切面注册表与匹配器

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use weave_aop_abstractions::Advisor;
use weave_common::TypeInfo;

/// 切面注册表
///
/// 保存已注册的切面并在查询时给出稳定排序的适用子集。
/// 匹配是两级的：此处做粗粒度类型过滤，方法级匹配在链构建时进行。
#[derive(Default)]
pub struct AdvisorRegistry {
    advisors: RwLock<Vec<Advisor>>,
    sequence: AtomicU64,
}

impl AdvisorRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册切面（分配声明序号）
    pub fn add(&self, mut advisor: Advisor) {
        advisor.sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        debug!(
            "注册切面: {} (order={}, seq={}, 行为={})",
            advisor.name,
            advisor.order,
            advisor.sequence,
            advisor.advice.kind()
        );
        self.advisors.write().push(advisor);
    }

    /// 已注册切面数量
    pub fn len(&self) -> usize {
        self.advisors.read().len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.advisors.read().is_empty()
    }

    /// 查询对目标类型适用的切面，按（显式序值, 声明顺序）稳定排序
    pub fn advisors_for(&self, type_info: &TypeInfo) -> Vec<Advisor> {
        let mut applicable: Vec<Advisor> = self
            .advisors
            .read()
            .iter()
            .filter(|advisor| advisor.applies_to_type(type_info))
            .cloned()
            .collect();
        applicable.sort_by_key(|advisor| (advisor.order, advisor.sequence));
        applicable
    }
}

impl std::fmt::Debug for AdvisorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvisorRegistry")
            .field("advisors", &self.len())
            .finish()
    }
}
