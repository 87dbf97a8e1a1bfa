//! 元数据定义
//!
//! 提供组件和方法的类型元数据信息

use std::any::TypeId;

/// 类型信息
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    /// 类型名称
    pub name: String,
    /// 类型ID
    pub id: TypeId,
    /// 模块路径
    pub module_path: String,
}

impl TypeInfo {
    /// 从类型获取类型信息
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            name: std::any::type_name::<T>()
                .split("::")
                .last()
                .unwrap_or("Unknown")
                .to_string(),
            id: TypeId::of::<T>(),
            module_path: std::any::type_name::<T>().to_string(),
        }
    }

    /// 获取简短的类型名称（不包含模块路径）
    pub fn short_name(&self) -> &str {
        self.name.split("::").last().unwrap_or(&self.name)
    }
}

impl std::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// 方法描述符
///
/// 标识一个可调用方法的签名信息，供切点匹配和链缓存使用
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    /// 方法名称
    pub name: String,
    /// 参数个数
    pub parameter_count: usize,
}

impl MethodDescriptor {
    /// 创建新的方法描述符
    pub fn new(name: impl Into<String>, parameter_count: usize) -> Self {
        Self {
            name: name.into(),
            parameter_count,
        }
    }
}

impl std::fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.parameter_count)
    }
}

/// 名称模式匹配
///
/// 支持前缀通配（`set*`）、后缀通配（`*Service`）和完全匹配
pub fn name_matches(pattern: &str, name: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return name.starts_with(prefix);
    }
    if let Some(suffix) = pattern.strip_prefix('*') {
        return name.ends_with(suffix);
    }
    pattern == name
}
