//! # Weave DI 实现
//!
//! 对象图构建抽象层的具体实现：描述符注册表、构造函数/工厂方法
//! 解析器、三级单例缓存和对象图构建器。
//!
//! ## 核心类型
//!
//! - [`DescriptorRegistryImpl`] - 描述符注册表实现
//! - [`ConstructorResolverImpl`] - 构造解析器实现（类型差异加权评分）
//! - [`SingletonCache`] - 三级单例缓存（成品/早期引用/待定工厂）
//! - [`ObjectGraphBuilder`] - 对象图构建器（按标识符的创建状态机）

pub mod builder;
pub mod caster;
pub mod registry;
pub mod resolver;
pub mod singleton_cache;

pub use builder::*;
pub use caster::*;
pub use registry::*;
pub use resolver::*;
pub use singleton_cache::*;
