//! 类型模型定义
//!
//! 类型模型是反射的编译期替代：每个受管理的组件类型注册一张
//! 构造函数/属性/方法/能力表，容器据此完成实例化、属性填充、
//! 生命周期方法调用和能力接口转换。

use crate::component::Component;
use crate::errors::InvocationError;
use crate::metadata::{MethodDescriptor, TypeInfo};
use crate::value::{
    capability_value, downcast_capability, downcast_value, typed_value, ComponentValue,
};
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// 构造函数/工厂方法调用闭包
pub type ExecutableFn = Arc<
    dyn Fn(&[ComponentValue]) -> Result<ComponentValue, Box<dyn std::error::Error + Send + Sync>>
        + Send
        + Sync,
>;

/// 属性赋值闭包
pub type SetterFn = Arc<
    dyn Fn(&ComponentValue, ComponentValue) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
        + Send
        + Sync,
>;

/// 方法调用闭包
pub type MethodFn = Arc<
    dyn Fn(&ComponentValue, &[ComponentValue]) -> Result<ComponentValue, InvocationError>
        + Send
        + Sync,
>;

/// 能力接口转换闭包
pub type CapabilityCastFn =
    Arc<dyn Fn(&ComponentValue) -> Option<ComponentValue> + Send + Sync>;

/// 可见性级别
///
/// 排序上 `Public` 最大，解析器按可见性降序枚举候选
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Visibility {
    Private,
    Crate,
    Public,
}

/// 参数规格
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    /// 参数名称
    pub name: String,
    /// 参数的逻辑类型
    pub type_info: TypeInfo,
}

impl ParameterSpec {
    /// 创建新的参数规格
    pub fn new(name: impl Into<String>, type_info: TypeInfo) -> Self {
        Self {
            name: name.into(),
            type_info,
        }
    }

    /// 从类型创建参数规格
    pub fn of<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::new(name, TypeInfo::of::<T>())
    }
}

/// 可执行体种类
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutableKind {
    /// 构造函数
    Constructor,
    /// 命名工厂方法
    FactoryMethod(String),
}

/// 可执行体规格
///
/// 一个候选构造函数或工厂方法：签名加上类型擦除的调用闭包
pub struct ExecutableSpec {
    /// 种类
    pub kind: ExecutableKind,
    /// 可见性
    pub visibility: Visibility,
    /// 参数列表
    pub parameters: Vec<ParameterSpec>,
    /// 调用闭包
    pub invoke: ExecutableFn,
}

impl ExecutableSpec {
    /// 签名的显示形式（诊断用）
    pub fn signature(&self) -> String {
        let params: Vec<&str> = self
            .parameters
            .iter()
            .map(|p| p.type_info.name.as_str())
            .collect();
        match &self.kind {
            ExecutableKind::Constructor => format!("new({})", params.join(", ")),
            ExecutableKind::FactoryMethod(name) => format!("{}({})", name, params.join(", ")),
        }
    }
}

impl std::fmt::Debug for ExecutableSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutableSpec")
            .field("kind", &self.kind)
            .field("visibility", &self.visibility)
            .field("parameters", &self.parameters)
            .field("invoke", &"<closure>")
            .finish()
    }
}

/// 属性模型
pub struct PropertyModel {
    /// 属性名称
    pub name: String,
    /// 属性的逻辑类型
    pub type_info: TypeInfo,
    /// 赋值闭包
    pub setter: SetterFn,
}

impl std::fmt::Debug for PropertyModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyModel")
            .field("name", &self.name)
            .field("type_info", &self.type_info)
            .finish()
    }
}

/// 方法模型
pub struct MethodModel {
    /// 方法描述符
    pub descriptor: MethodDescriptor,
    /// 调用闭包
    pub invoke: MethodFn,
}

impl std::fmt::Debug for MethodModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodModel")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// 能力模型
///
/// 声明组件类型可以被视为某个能力接口，并提供转换闭包
pub struct CapabilityModel {
    /// 能力接口的类型信息
    pub type_info: TypeInfo,
    /// 包装后值的类型ID（`Arc<dyn C>` 的类型ID）
    pub wrapped_id: TypeId,
    /// 继承距离（直接声明为 1，经由其他能力传递时更大）
    pub distance: u32,
    /// 转换闭包
    pub cast: CapabilityCastFn,
}

impl std::fmt::Debug for CapabilityModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityModel")
            .field("type_info", &self.type_info)
            .field("distance", &self.distance)
            .finish()
    }
}

/// 类型模型
#[derive(Debug)]
pub struct TypeModel {
    /// 组件的具体类型信息
    type_info: TypeInfo,
    /// 候选构造函数和工厂方法
    executables: Vec<Arc<ExecutableSpec>>,
    /// 属性表
    properties: HashMap<String, Arc<PropertyModel>>,
    /// 方法表
    methods: HashMap<String, Arc<MethodModel>>,
    /// 能力表，按能力接口的类型ID索引
    capabilities: HashMap<TypeId, Arc<CapabilityModel>>,
}

impl TypeModel {
    /// 创建指定组件类型的模型构建器
    pub fn of<T: Component>() -> TypeModelBuilder<T> {
        TypeModelBuilder::new()
    }

    /// 组件类型信息
    pub fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    /// 候选可执行体
    pub fn executables(&self) -> &[Arc<ExecutableSpec>] {
        &self.executables
    }

    /// 查找属性模型
    pub fn property(&self, name: &str) -> Option<&Arc<PropertyModel>> {
        self.properties.get(name)
    }

    /// 遍历全部属性模型
    pub fn properties(&self) -> impl Iterator<Item = &Arc<PropertyModel>> {
        self.properties.values()
    }

    /// 查找方法模型
    pub fn method(&self, name: &str) -> Option<&Arc<MethodModel>> {
        self.methods.get(name)
    }

    /// 遍历全部方法模型
    pub fn methods(&self) -> impl Iterator<Item = &Arc<MethodModel>> {
        self.methods.values()
    }

    /// 遍历全部能力模型
    pub fn capabilities(&self) -> impl Iterator<Item = &Arc<CapabilityModel>> {
        self.capabilities.values()
    }

    /// 是否可赋值给目标类型（自身或声明的能力接口）
    pub fn is_assignable_to(&self, target: TypeId) -> bool {
        self.type_info.id == target || self.capabilities.contains_key(&target)
    }

    /// 到目标类型的继承距离（自身为 0，能力接口取声明距离）
    pub fn assignability_distance(&self, target: TypeId) -> Option<u32> {
        if self.type_info.id == target {
            return Some(0);
        }
        self.capabilities.get(&target).map(|c| c.distance)
    }

    /// 将组件值转换为目标类型的表示
    pub fn cast_to(&self, target: TypeId, value: &ComponentValue) -> Option<ComponentValue> {
        if self.type_info.id == target {
            return Some(value.clone());
        }
        self.capabilities.get(&target).and_then(|c| (c.cast)(value))
    }
}

/// 类型模型构建器
pub struct TypeModelBuilder<T> {
    executables: Vec<Arc<ExecutableSpec>>,
    properties: HashMap<String, Arc<PropertyModel>>,
    methods: HashMap<String, Arc<MethodModel>>,
    capabilities: HashMap<TypeId, Arc<CapabilityModel>>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Component> TypeModelBuilder<T> {
    fn new() -> Self {
        Self {
            executables: Vec::new(),
            properties: HashMap::new(),
            methods: HashMap::new(),
            capabilities: HashMap::new(),
            _marker: std::marker::PhantomData,
        }
    }

    /// 注册公有构造函数
    pub fn constructor<F>(self, parameters: Vec<ParameterSpec>, construct: F) -> Self
    where
        F: Fn(&[ComponentValue]) -> Result<T, Box<dyn std::error::Error + Send + Sync>>
            + Send
            + Sync
            + 'static,
    {
        self.constructor_with_visibility(Visibility::Public, parameters, construct)
    }

    /// 注册指定可见性的构造函数
    pub fn constructor_with_visibility<F>(
        mut self,
        visibility: Visibility,
        parameters: Vec<ParameterSpec>,
        construct: F,
    ) -> Self
    where
        F: Fn(&[ComponentValue]) -> Result<T, Box<dyn std::error::Error + Send + Sync>>
            + Send
            + Sync
            + 'static,
    {
        self.executables.push(Arc::new(ExecutableSpec {
            kind: ExecutableKind::Constructor,
            visibility,
            parameters,
            invoke: Arc::new(move |args| construct(args).map(typed_value)),
        }));
        self
    }

    /// 注册公有工厂方法
    pub fn factory_method<F>(
        self,
        name: impl Into<String>,
        parameters: Vec<ParameterSpec>,
        produce: F,
    ) -> Self
    where
        F: Fn(&[ComponentValue]) -> Result<T, Box<dyn std::error::Error + Send + Sync>>
            + Send
            + Sync
            + 'static,
    {
        self.factory_method_with_visibility(Visibility::Public, name, parameters, produce)
    }

    /// 注册指定可见性的工厂方法
    pub fn factory_method_with_visibility<F>(
        mut self,
        visibility: Visibility,
        name: impl Into<String>,
        parameters: Vec<ParameterSpec>,
        produce: F,
    ) -> Self
    where
        F: Fn(&[ComponentValue]) -> Result<T, Box<dyn std::error::Error + Send + Sync>>
            + Send
            + Sync
            + 'static,
    {
        self.executables.push(Arc::new(ExecutableSpec {
            kind: ExecutableKind::FactoryMethod(name.into()),
            visibility,
            parameters,
            invoke: Arc::new(move |args| produce(args).map(typed_value)),
        }));
        self
    }

    /// 注册简单值属性（字面量经类型转换后注入，值按克隆传递）
    pub fn property<P, F>(mut self, name: impl Into<String>, apply: F) -> Self
    where
        P: Clone + Send + Sync + 'static,
        F: Fn(&T, P) + Send + Sync + 'static,
    {
        let name = name.into();
        let property_name = name.clone();
        let setter: SetterFn = Arc::new(move |target, value| {
            let target = downcast_value::<T>(target)
                .ok_or_else(|| setter_mismatch::<T>(&property_name, "目标"))?;
            let value = downcast_value::<P>(&value)
                .ok_or_else(|| setter_mismatch::<P>(&property_name, "值"))?;
            apply(&target, (*value).clone());
            Ok(())
        });
        self.properties.insert(
            name.clone(),
            Arc::new(PropertyModel {
                name,
                type_info: TypeInfo::of::<P>(),
                setter,
            }),
        );
        self
    }

    /// 注册具体组件引用属性（注入的值即组件实例本身）
    pub fn reference_property<P, F>(mut self, name: impl Into<String>, apply: F) -> Self
    where
        P: Send + Sync + 'static,
        F: Fn(&T, Arc<P>) + Send + Sync + 'static,
    {
        let name = name.into();
        let property_name = name.clone();
        let setter: SetterFn = Arc::new(move |target, value| {
            let target = downcast_value::<T>(target)
                .ok_or_else(|| setter_mismatch::<T>(&property_name, "目标"))?;
            let value = downcast_value::<P>(&value)
                .ok_or_else(|| setter_mismatch::<P>(&property_name, "值"))?;
            apply(&target, value);
            Ok(())
        });
        self.properties.insert(
            name.clone(),
            Arc::new(PropertyModel {
                name,
                type_info: TypeInfo::of::<P>(),
                setter,
            }),
        );
        self
    }

    /// 注册能力接口属性（注入的值是能力接口视图，代理感知）
    pub fn capability_property<C, F>(mut self, name: impl Into<String>, apply: F) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn(&T, Arc<C>) + Send + Sync + 'static,
    {
        let name = name.into();
        let property_name = name.clone();
        let setter: SetterFn = Arc::new(move |target, value| {
            let target = downcast_value::<T>(target)
                .ok_or_else(|| setter_mismatch::<T>(&property_name, "目标"))?;
            let value = downcast_capability::<C>(&value)
                .ok_or_else(|| setter_mismatch::<Arc<C>>(&property_name, "值"))?;
            apply(&target, value);
            Ok(())
        });
        self.properties.insert(
            name.clone(),
            Arc::new(PropertyModel {
                name,
                type_info: TypeInfo::of::<C>(),
                setter,
            }),
        );
        self
    }

    /// 注册可调用方法（业务方法和生命周期方法共用此表）
    pub fn method<F>(mut self, name: impl Into<String>, parameter_count: usize, invoke: F) -> Self
    where
        F: Fn(&T, &[ComponentValue]) -> Result<ComponentValue, InvocationError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        let method_name = name.clone();
        let method: MethodFn = Arc::new(move |target, args| {
            let target =
                downcast_value::<T>(target).ok_or_else(|| InvocationError::TargetTypeMismatch {
                    method: method_name.clone(),
                })?;
            if args.len() != parameter_count {
                return Err(InvocationError::ArgumentCount {
                    method: method_name.clone(),
                    expected: parameter_count,
                    actual: args.len(),
                });
            }
            invoke(&target, args)
        });
        self.methods.insert(
            name.clone(),
            Arc::new(MethodModel {
                descriptor: MethodDescriptor::new(name, parameter_count),
                invoke: method,
            }),
        );
        self
    }

    /// 声明能力接口（直接声明距离为 1）
    pub fn capability<C, F>(self, cast: F) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<C> + Send + Sync + 'static,
    {
        self.capability_with_distance(1, cast)
    }

    /// 声明能力接口并指定继承距离
    pub fn capability_with_distance<C, F>(mut self, distance: u32, cast: F) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<C> + Send + Sync + 'static,
    {
        let cast_fn: CapabilityCastFn = Arc::new(move |value| {
            downcast_value::<T>(value).map(|concrete| capability_value(cast(concrete)))
        });
        self.capabilities.insert(
            TypeId::of::<C>(),
            Arc::new(CapabilityModel {
                type_info: TypeInfo::of::<C>(),
                wrapped_id: TypeId::of::<Arc<C>>(),
                distance,
                cast: cast_fn,
            }),
        );
        self
    }

    /// 完成构建
    pub fn build(self) -> TypeModel {
        TypeModel {
            type_info: TypeInfo::of::<T>(),
            executables: self.executables,
            properties: self.properties,
            methods: self.methods,
            capabilities: self.capabilities,
        }
    }
}

fn setter_mismatch<T: ?Sized + 'static>(
    property: &str,
    role: &str,
) -> Box<dyn std::error::Error + Send + Sync> {
    format!(
        "属性 '{}' 赋值时{}类型不匹配, 期望 {}",
        property,
        role,
        std::any::type_name::<T>()
    )
    .into()
}

/// 类型模型注册表
///
/// 按类型ID和类型名称索引已注册的类型模型，并维护能力包装类型的
/// 反向索引（`Arc<dyn C>` 的类型ID → 能力接口类型ID）。
#[derive(Debug, Default)]
pub struct TypeModelRegistry {
    models: RwLock<HashMap<TypeId, Arc<TypeModel>>>,
    by_name: RwLock<HashMap<String, TypeId>>,
    wrappers: RwLock<HashMap<TypeId, TypeId>>,
}

impl TypeModelRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册类型模型
    pub fn register(&self, model: TypeModel) -> Arc<TypeModel> {
        let type_id = model.type_info.id;
        let type_name = model.type_info.name.clone();
        debug!("注册类型模型: {}", type_name);

        {
            let mut wrappers = self.wrappers.write();
            for capability in model.capabilities.values() {
                wrappers.insert(capability.wrapped_id, capability.type_info.id);
            }
        }

        let model = Arc::new(model);
        let replaced = self.models.write().insert(type_id, model.clone());
        if replaced.is_some() {
            warn!("类型模型被覆盖: {}", type_name);
        }
        self.by_name.write().insert(type_name, type_id);
        model
    }

    /// 按类型ID查找模型
    pub fn model_of(&self, type_id: TypeId) -> Option<Arc<TypeModel>> {
        self.models.read().get(&type_id).cloned()
    }

    /// 按类型名称查找模型
    pub fn model_named(&self, name: &str) -> Option<Arc<TypeModel>> {
        let type_id = *self.by_name.read().get(name)?;
        self.model_of(type_id)
    }

    /// 查询包装类型对应的能力接口类型ID
    pub fn wrapper_capability(&self, wrapped_id: TypeId) -> Option<TypeId> {
        self.wrappers.read().get(&wrapped_id).copied()
    }

    /// 将组件值转换为目标逻辑类型的表示
    ///
    /// 依次尝试：具体类型精确匹配、已是目标能力的包装值、
    /// 按具体类型的模型执行能力转换。
    pub fn cast_value(
        &self,
        value: &ComponentValue,
        target: &TypeInfo,
    ) -> Option<ComponentValue> {
        let concrete = crate::value::value_type_id(value);
        if concrete == target.id {
            return Some(value.clone());
        }
        if self.wrapper_capability(concrete) == Some(target.id) {
            return Some(value.clone());
        }
        self.model_of(concrete)
            .and_then(|model| model.cast_to(target.id, value))
    }
}

/// 从参数数组中取出指定位置的具体类型参数
pub fn argument<T: Send + Sync + 'static>(
    args: &[ComponentValue],
    index: usize,
    method: &str,
) -> Result<Arc<T>, InvocationError> {
    let value = args.get(index).ok_or_else(|| InvocationError::ArgumentCount {
        method: method.to_string(),
        expected: index + 1,
        actual: args.len(),
    })?;
    downcast_value::<T>(value).ok_or_else(|| InvocationError::ArgumentType {
        method: method.to_string(),
        index,
    })
}

/// 从参数数组中取出指定位置的能力接口参数
pub fn capability_argument<C: ?Sized + Send + Sync + 'static>(
    args: &[ComponentValue],
    index: usize,
    method: &str,
) -> Result<Arc<C>, InvocationError> {
    let value = args.get(index).ok_or_else(|| InvocationError::ArgumentCount {
        method: method.to_string(),
        expected: index + 1,
        actual: args.len(),
    })?;
    downcast_capability::<C>(value).ok_or_else(|| InvocationError::ArgumentType {
        method: method.to_string(),
        index,
    })
}
