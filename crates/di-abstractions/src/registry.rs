//! 描述符注册表抽象接口

use std::sync::Arc;
use weave_common::{ComponentDescriptor, DescriptorError, ResolutionError, TypeInfo};

/// 描述符注册表 trait
///
/// 存储组件描述符，支持按标识符和按声明能力（类型）查找。
/// 读多写少：注册发生在组合根阶段，查找贯穿整个运行期。
pub trait DescriptorRegistry: Send + Sync {
    /// 注册描述符
    fn register(&self, descriptor: ComponentDescriptor) -> Result<(), DescriptorError>;

    /// 按标识符获取描述符
    fn get(&self, identifier: &str) -> Result<Arc<ComponentDescriptor>, DescriptorError>;

    /// 检查标识符是否已注册
    fn contains(&self, identifier: &str) -> bool;

    /// 所有已注册标识符（按注册顺序）
    fn identifiers(&self) -> Vec<String>;

    /// 查找目标类型可赋值的候选标识符（按注册顺序，不含抽象描述符）
    fn find_assignable(&self, target: &TypeInfo) -> Vec<String>;

    /// 从候选集中选出唯一候选
    ///
    /// 单个候选直接返回；多个候选时恰有一个 `primary` 标记者胜出，
    /// 否则报告按类型解析不明确。
    fn select_candidate(
        &self,
        target: &TypeInfo,
        candidates: Vec<String>,
    ) -> Result<String, ResolutionError>;
}
