//! 组件实例值表示
//!
//! 容器内部以类型擦除的形式传递组件实例和参数值

use std::any::Any;
use std::sync::Arc;

/// 类型擦除的组件值
///
/// 组件实例、构造参数、属性值在容器内部统一使用此表示传递。
/// 能力接口值（`Arc<dyn Trait>`）通过再包一层 `Arc` 表示，
/// 即 `Arc<Arc<dyn Trait>>` 擦除为 `ComponentValue`。
pub type ComponentValue = Arc<dyn Any + Send + Sync>;

/// 将具体类型的值包装为组件值
pub fn typed_value<T: Send + Sync + 'static>(value: T) -> ComponentValue {
    Arc::new(value)
}

/// 将能力接口值包装为组件值
pub fn capability_value<C: ?Sized + Send + Sync + 'static>(value: Arc<C>) -> ComponentValue {
    Arc::new(value)
}

/// 尝试将组件值还原为具体类型
pub fn downcast_value<T: Send + Sync + 'static>(value: &ComponentValue) -> Option<Arc<T>> {
    value.clone().downcast::<T>().ok()
}

/// 尝试将组件值还原为能力接口值
pub fn downcast_capability<C: ?Sized + Send + Sync + 'static>(
    value: &ComponentValue,
) -> Option<Arc<C>> {
    downcast_value::<Arc<C>>(value).map(|outer| Arc::clone(&*outer))
}

/// 组件值的身份指针
///
/// 用于身份比较（等价于引用相等语义）。比较数据指针而非胖指针，
/// 以保证同一实例经过不同 trait 视角后仍然身份相等。
pub fn value_identity(value: &ComponentValue) -> *const () {
    Arc::as_ptr(value) as *const ()
}

/// 判断两个组件值是否为同一实例
pub fn same_instance(a: &ComponentValue, b: &ComponentValue) -> bool {
    value_identity(a) == value_identity(b)
}

/// 组件值的运行时具体类型ID
pub fn value_type_id(value: &ComponentValue) -> std::any::TypeId {
    (**value).type_id()
}

/// 空返回值（方法无返回内容时使用）
pub fn unit_value() -> ComponentValue {
    static UNIT: once_cell::sync::Lazy<ComponentValue> =
        once_cell::sync::Lazy::new(|| Arc::new(()));
    UNIT.clone()
}
