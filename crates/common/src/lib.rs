//! # Weave Common
//!
//! 这个 crate 提供了 Weave 容器各层共享的公共类型和工具。
//!
//! ## 核心组件
//!
//! - [`Component`] - 组件基础 trait
//! - [`ComponentDescriptor`] - 组件描述符（构建单个命名对象的声明式配方）
//! - [`TypeModel`] - 类型模型（构造函数/属性/方法/能力表，反射的编译期替代）
//! - [`ConversionService`] - 字面量值到目标类型的转换服务
//! - 错误分类体系（描述符/解析/循环引用/创建/代理配置）
//!
//! ## 设计原则
//!
//! - 基于 Rust 类型系统的编译时安全
//! - 类型擦除的实例表示（`Arc<dyn Any + Send + Sync>`）
//! - 显式上下文对象，不依赖进程级全局状态

pub mod component;
pub mod convert;
pub mod descriptor;
pub mod errors;
pub mod metadata;
pub mod model;
pub mod scope;
pub mod value;

pub use component::*;
pub use convert::*;
pub use descriptor::*;
pub use errors::*;
pub use metadata::*;
pub use model::*;
pub use scope::*;
pub use value::*;
