//! # Weave Composition
//!
//! 组合根层：把描述符注册表、类型模型、转换服务、对象图构建器、
//! 切面注册表和代理工厂装配成一个可用的上下文实例。
//!
//! ## 核心组件
//!
//! - [`GraphBuilder`] - 上下文构建器（建造者模式）
//! - [`ObjectGraphContext`] - 装配完成的对象图上下文
//! - [`StartupTask`] - 启动任务扩展钩子
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! let context = GraphBuilder::new()
//!     .with_logging(LoggingConfig::development())
//!     .register_model(model)
//!     .register_descriptor(descriptor)
//!     .build()?;
//! context.start().await?;
//! let service = context.get_as::<OrderService>("order_service")?;
//! ```

pub mod builder;
pub mod context;
pub mod errors;

pub use builder::*;
pub use context::*;
pub use errors::*;
