//! 组件基础接口定义
//!
//! 提供所有受容器管理的组件类型实现的基础 trait

use std::any::TypeId;
use std::fmt::Debug;

/// 组件基础 trait
///
/// 所有受容器管理的组件类型都必须实现此 trait
pub trait Component: Send + Sync + Debug + 'static {
    /// 组件名称
    fn name(&self) -> &'static str;

    /// 组件类型ID
    fn type_id(&self) -> TypeId {
        TypeId::of::<Self>()
    }
}
