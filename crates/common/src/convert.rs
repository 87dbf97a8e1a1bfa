//! 类型转换服务
//!
//! 将描述符中的字面量值（JSON 表示）转换为参数或属性声明的目标类型

use crate::errors::{ConversionError, ConversionResult};
use crate::metadata::TypeInfo;
use crate::value::{typed_value, ComponentValue};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// 转换闭包
pub type ConverterFn =
    Arc<dyn Fn(&serde_json::Value) -> ConversionResult<ComponentValue> + Send + Sync>;

/// 类型转换服务
///
/// 内置常用标量类型的转换器，支持注册任意可反序列化类型。
/// 注册过转换器的类型视为"简单类型"，按类型自动装配时跳过。
pub struct ConversionService {
    converters: RwLock<HashMap<TypeId, ConverterFn>>,
}

impl ConversionService {
    /// 创建携带内置转换器的转换服务
    pub fn new() -> Self {
        let service = Self {
            converters: RwLock::new(HashMap::new()),
        };
        service.register::<String>();
        service.register::<bool>();
        service.register::<i32>();
        service.register::<i64>();
        service.register::<u32>();
        service.register::<u64>();
        service.register::<usize>();
        service.register::<f64>();
        service.register::<serde_json::Value>();
        service
    }

    /// 注册目标类型的转换器（基于 serde 反序列化）
    pub fn register<T: DeserializeOwned + Send + Sync + 'static>(&self) {
        let converter: ConverterFn = Arc::new(|value| {
            serde_json::from_value::<T>(value.clone())
                .map(typed_value)
                .map_err(|source| ConversionError::Deserialization {
                    type_name: std::any::type_name::<T>().to_string(),
                    source,
                })
        });
        self.converters.write().insert(TypeId::of::<T>(), converter);
    }

    /// 注册自定义转换闭包
    pub fn register_converter(&self, type_id: TypeId, converter: ConverterFn) {
        self.converters.write().insert(type_id, converter);
    }

    /// 目标类型是否可转换（即是否为简单类型）
    pub fn is_simple(&self, type_id: TypeId) -> bool {
        self.converters.read().contains_key(&type_id)
    }

    /// 将字面量转换为目标类型的值
    pub fn convert(
        &self,
        value: &serde_json::Value,
        target: &TypeInfo,
    ) -> ConversionResult<ComponentValue> {
        let converter = self
            .converters
            .read()
            .get(&target.id)
            .cloned()
            .ok_or_else(|| ConversionError::UnsupportedTargetType {
                type_name: target.name.clone(),
            })?;
        converter(value)
    }
}

impl Default for ConversionService {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConversionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionService")
            .field("converters", &self.converters.read().len())
            .finish()
    }
}
