//! 切面定义
//!
//! 切面是（切点, 通知）的有序对。排序按显式序值稳定排序，
//! 序值相同时按声明顺序。引入能力接口的切面只按类型匹配。

use crate::advice::Advice;
use crate::pointcut::Pointcut;
use std::sync::Arc;
use weave_common::{CapabilityCastFn, TypeInfo};

/// 能力引入
///
/// 切面为目标类型附加的额外能力接口，按类型匹配，与方法无关
#[derive(Clone)]
pub struct CapabilityIntroduction {
    /// 引入的能力接口类型
    pub type_info: TypeInfo,
    /// 作用在目标实例上的转换闭包
    pub cast: CapabilityCastFn,
}

impl std::fmt::Debug for CapabilityIntroduction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityIntroduction")
            .field("type_info", &self.type_info)
            .finish()
    }
}

/// 切面
#[derive(Clone)]
pub struct Advisor {
    /// 切面名称（日志与诊断用）
    pub name: String,
    /// 显式序值，越小越先执行
    pub order: i32,
    /// 声明顺序（注册时分配，同序值时的稳定次序）
    pub sequence: u64,
    /// 切点
    pub pointcut: Arc<dyn Pointcut>,
    /// 通知行为
    pub advice: Advice,
    /// 能力引入列表
    pub introductions: Vec<CapabilityIntroduction>,
}

impl Advisor {
    /// 创建新的切面
    pub fn new(name: impl Into<String>, pointcut: Arc<dyn Pointcut>, advice: Advice) -> Self {
        Self {
            name: name.into(),
            order: 0,
            sequence: 0,
            pointcut,
            advice,
            introductions: Vec::new(),
        }
    }

    /// 设置显式序值
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// 附加能力引入
    pub fn with_introduction(mut self, introduction: CapabilityIntroduction) -> Self {
        self.introductions.push(introduction);
        self
    }

    /// 该切面是否对目标类型适用（切点类型过滤或存在能力引入）
    pub fn applies_to_type(&self, type_info: &TypeInfo) -> bool {
        self.pointcut.matches_type(type_info) || !self.introductions.is_empty()
    }
}

impl std::fmt::Debug for Advisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Advisor")
            .field("name", &self.name)
            .field("order", &self.order)
            .field("sequence", &self.sequence)
            .field("advice", &self.advice)
            .field("introductions", &self.introductions.len())
            .finish()
    }
}
