//! 切点定义
//!
//! 切点是作用在（类型, 方法签名）上的匹配谓词。匹配分两级：
//! 先做粗粒度的类型过滤，再做方法级匹配。标记为动态的切点
//! 在每次调用时用实际运行期参数重新求值。

use weave_common::{name_matches, ComponentValue, MethodDescriptor, TypeInfo};

/// 切点 trait
pub trait Pointcut: Send + Sync {
    /// 粗粒度类型过滤：该切点是否对此类型的实例适用
    fn matches_type(&self, type_info: &TypeInfo) -> bool;

    /// 方法级匹配：该切点是否适用于此方法签名
    fn matches_method(&self, method: &MethodDescriptor, type_info: &TypeInfo) -> bool;

    /// 是否为动态切点（每次调用用实际参数重新求值）
    fn is_dynamic(&self) -> bool {
        false
    }

    /// 动态匹配：用运行期实际参数求值
    ///
    /// 仅对动态切点有意义；静态切点始终返回 `true`
    fn matches_arguments(
        &self,
        _method: &MethodDescriptor,
        _arguments: &[ComponentValue],
    ) -> bool {
        true
    }
}

/// 恒真切点：匹配所有类型的所有方法
#[derive(Debug, Default)]
pub struct TruePointcut;

impl Pointcut for TruePointcut {
    fn matches_type(&self, _type_info: &TypeInfo) -> bool {
        true
    }

    fn matches_method(&self, _method: &MethodDescriptor, _type_info: &TypeInfo) -> bool {
        true
    }
}

/// 名称匹配切点
///
/// 类型名模式（可选）加一组方法名模式，模式支持 `*` 前后缀通配
#[derive(Debug, Clone)]
pub struct NameMatchPointcut {
    /// 类型名模式，`None` 表示匹配所有类型
    type_pattern: Option<String>,
    /// 方法名模式列表，任一匹配即命中
    method_patterns: Vec<String>,
}

impl NameMatchPointcut {
    /// 创建匹配所有类型的名称切点
    pub fn methods(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            type_pattern: None,
            method_patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// 限定类型名模式
    pub fn with_type_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.type_pattern = Some(pattern.into());
        self
    }
}

impl Pointcut for NameMatchPointcut {
    fn matches_type(&self, type_info: &TypeInfo) -> bool {
        match &self.type_pattern {
            Some(pattern) => name_matches(pattern, &type_info.name),
            None => true,
        }
    }

    fn matches_method(&self, method: &MethodDescriptor, _type_info: &TypeInfo) -> bool {
        self.method_patterns
            .iter()
            .any(|pattern| name_matches(pattern, &method.name))
    }
}
