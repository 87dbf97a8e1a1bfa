//! # Weave AOP 实现
//!
//! 方法拦截抽象层的具体实现：切面注册表与匹配器、拦截链构建与
//! 执行、组件代理、代理工厂和自动代理后置处理器。
//!
//! ## 核心类型
//!
//! - [`AdvisorRegistry`] - 有序切面注册表
//! - [`ChainInvocation`] - 拦截链执行器（proceed 续延）
//! - [`ComponentProxy`] - 组件代理（方法表分发、链缓存、快路径）
//! - [`ProxyFactoryImpl`] - 代理工厂（策略选择）
//! - [`AutoProxyProcessor`] - 桥接对象图与拦截引擎的后置处理器

pub mod auto_proxy;
pub mod chain;
pub mod factory;
pub mod invocation;
pub mod proxy;
pub mod registry;

pub use auto_proxy::*;
pub use chain::*;
pub use factory::*;
pub use invocation::*;
pub use proxy::*;
pub use registry::*;
