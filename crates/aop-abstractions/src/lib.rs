//! # Weave AOP Abstractions
//!
//! 方法拦截抽象层，定义切点匹配、通知行为和调用上下文的核心接口。
//!
//! ## 核心接口
//!
//! - [`Pointcut`] - 方法匹配谓词（支持静态与动态匹配）
//! - [`AroundAdvice`] / [`BeforeAdvice`] / [`AfterReturningAdvice`] /
//!   [`AfterThrowingAdvice`] / [`AfterAdvice`] - 通知行为
//! - [`Advisor`] - （切点, 通知）有序对
//! - [`Invocation`] - 方法调用上下文（携带 proceed 续延）
//! - [`ProxyConfig`] - 代理构建选项

pub mod advice;
pub mod advisor;
pub mod invocation;
pub mod pointcut;
pub mod proxy;

pub use advice::*;
pub use advisor::*;
pub use invocation::*;
pub use pointcut::*;
pub use proxy::*;
