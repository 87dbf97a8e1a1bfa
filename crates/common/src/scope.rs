//! 组件作用域定义

/// 组件作用域
///
/// 决定组件实例的共享方式
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComponentScope {
    /// 单例模式 - 整个对象图生命周期内只创建一个实例
    Singleton,
    /// 原型模式 - 每次请求都创建新实例
    Prototype,
    /// 命名作用域 - 由外围工具定义的自定义作用域
    Named(String),
}

impl Default for ComponentScope {
    fn default() -> Self {
        Self::Singleton
    }
}

impl ComponentScope {
    /// 是否为单例作用域
    pub fn is_singleton(&self) -> bool {
        matches!(self, Self::Singleton)
    }

    /// 是否为原型作用域
    pub fn is_prototype(&self) -> bool {
        matches!(self, Self::Prototype)
    }
}

impl std::fmt::Display for ComponentScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Singleton => f.write_str("singleton"),
            Self::Prototype => f.write_str("prototype"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// 自动装配模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutowireMode {
    /// 不自动装配，仅使用显式声明的属性
    #[default]
    None,
    /// 按属性名称查找同名组件填充
    ByName,
    /// 按属性类型查找可赋值组件填充
    ByType,
}
