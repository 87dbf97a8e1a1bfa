//! 组件描述符定义
//!
//! 描述符是构建单个命名组件的声明式配方：目标类型、作用域、
//! 构造参数、属性赋值、生命周期方法和标志位。注册后不可变。

use crate::errors::{DescriptorError, DescriptorResult};
use crate::metadata::TypeInfo;
use crate::scope::{AutowireMode, ComponentScope};
use crate::value::ComponentValue;
use std::collections::BTreeMap;

/// 值规格
///
/// 描述符中一个待注入值的声明形式
#[derive(Clone)]
pub enum ValueSpec {
    /// 字面量，注入前经转换服务转换为目标类型
    Literal(serde_json::Value),
    /// 引用另一个组件标识符，注入时递归解析
    Reference(String),
    /// 编程式直接提供的实例值
    Instance(ComponentValue),
}

impl ValueSpec {
    /// 是否为需要类型转换的字面量
    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }
}

impl std::fmt::Debug for ValueSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Reference(identifier) => f.debug_tuple("Reference").field(identifier).finish(),
            Self::Instance(_) => f.write_str("Instance(<value>)"),
        }
    }
}

/// 构造参数规格
#[derive(Debug, Clone)]
pub struct ArgumentSpec {
    /// 按名称匹配的参数名（可选）
    pub name: Option<String>,
    /// 按类型匹配的类型名（可选）
    pub type_name: Option<String>,
    /// 参数值
    pub value: ValueSpec,
}

impl ArgumentSpec {
    /// 创建仅携带值的参数规格
    pub fn value(value: ValueSpec) -> Self {
        Self {
            name: None,
            type_name: None,
            value,
        }
    }

    /// 创建按名称匹配的参数规格
    pub fn named(name: impl Into<String>, value: ValueSpec) -> Self {
        Self {
            name: Some(name.into()),
            type_name: None,
            value,
        }
    }

    /// 创建按类型名匹配的参数规格
    pub fn typed(type_name: impl Into<String>, value: ValueSpec) -> Self {
        Self {
            name: None,
            type_name: Some(type_name.into()),
            value,
        }
    }

    /// 判断规格是否与参数的名称/类型声明匹配
    pub fn matches(&self, parameter_name: &str, parameter_type: &TypeInfo) -> bool {
        if let Some(name) = &self.name {
            if name != parameter_name {
                return false;
            }
        }
        if let Some(type_name) = &self.type_name {
            if type_name != &parameter_type.name {
                return false;
            }
        }
        true
    }
}

/// 构造参数集合
///
/// 按位置索引的参数和不定位置的通用参数
#[derive(Debug, Clone, Default)]
pub struct ArgumentValues {
    indexed: BTreeMap<usize, ArgumentSpec>,
    generic: Vec<ArgumentSpec>,
}

impl ArgumentValues {
    /// 创建空的参数集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加按位置索引的参数
    pub fn add_indexed(&mut self, index: usize, spec: ArgumentSpec) {
        self.indexed.insert(index, spec);
    }

    /// 添加通用参数
    pub fn add_generic(&mut self, spec: ArgumentSpec) {
        self.generic.push(spec);
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty() && self.generic.is_empty()
    }

    /// 显式参数规格决定的最小参数个数
    pub fn minimum_count(&self) -> usize {
        let indexed_min = self
            .indexed
            .keys()
            .next_back()
            .map(|max| max + 1)
            .unwrap_or(0);
        indexed_min.max(self.indexed.len() + self.generic.len())
    }

    /// 查找指定位置的索引参数（校验名称/类型声明）
    pub fn indexed(
        &self,
        index: usize,
        parameter_name: &str,
        parameter_type: &TypeInfo,
    ) -> Option<&ArgumentSpec> {
        self.indexed
            .get(&index)
            .filter(|spec| spec.matches(parameter_name, parameter_type))
    }

    /// 查找匹配的通用参数，跳过已使用的位置
    pub fn find_generic(
        &self,
        parameter_name: &str,
        parameter_type: &TypeInfo,
        used: &[usize],
    ) -> Option<(usize, &ArgumentSpec)> {
        self.generic
            .iter()
            .enumerate()
            .filter(|(position, _)| !used.contains(position))
            .find(|(_, spec)| spec.matches(parameter_name, parameter_type))
    }
}

/// 属性赋值声明
#[derive(Debug, Clone)]
pub struct PropertyAssignment {
    /// 属性名称
    pub name: String,
    /// 属性值
    pub value: ValueSpec,
}

/// 组件描述符
#[derive(Debug, Clone)]
pub struct ComponentDescriptor {
    /// 唯一标识符
    pub identifier: String,
    /// 目标类型信息
    pub type_info: TypeInfo,
    /// 作用域
    pub scope: ComponentScope,
    /// 构造参数
    pub constructor_args: ArgumentValues,
    /// 属性赋值列表
    pub properties: Vec<PropertyAssignment>,
    /// 自动装配模式
    pub autowire: AutowireMode,
    /// 初始化方法名
    pub init_method: Option<String>,
    /// 初始化方法缺失时是否视为致命错误
    pub init_method_required: bool,
    /// 销毁方法名
    pub destroy_method: Option<String>,
    /// 是否延迟创建
    pub lazy: bool,
    /// 按类型装配存在多个候选时是否优先选择
    pub primary: bool,
    /// 是否为抽象描述符（仅作为配置模板，不可实例化）
    pub is_abstract: bool,
    /// 显式前置依赖的标识符列表
    pub depends_on: Vec<String>,
}

impl ComponentDescriptor {
    /// 创建新的组件描述符
    pub fn new(identifier: impl Into<String>, type_info: TypeInfo) -> Self {
        Self {
            identifier: identifier.into(),
            type_info,
            scope: ComponentScope::default(),
            constructor_args: ArgumentValues::new(),
            properties: Vec::new(),
            autowire: AutowireMode::default(),
            init_method: None,
            init_method_required: false,
            destroy_method: None,
            lazy: false,
            primary: false,
            is_abstract: false,
            depends_on: Vec::new(),
        }
    }

    /// 设置作用域
    pub fn with_scope(mut self, scope: ComponentScope) -> Self {
        self.scope = scope;
        self
    }

    /// 添加按位置索引的构造参数
    pub fn with_indexed_arg(mut self, index: usize, spec: ArgumentSpec) -> Self {
        self.constructor_args.add_indexed(index, spec);
        self
    }

    /// 添加通用构造参数
    pub fn with_arg(mut self, spec: ArgumentSpec) -> Self {
        self.constructor_args.add_generic(spec);
        self
    }

    /// 添加属性赋值
    pub fn with_property(mut self, name: impl Into<String>, value: ValueSpec) -> Self {
        self.properties.push(PropertyAssignment {
            name: name.into(),
            value,
        });
        self
    }

    /// 设置自动装配模式
    pub fn with_autowire(mut self, mode: AutowireMode) -> Self {
        self.autowire = mode;
        self
    }

    /// 设置初始化方法
    pub fn with_init_method(mut self, name: impl Into<String>) -> Self {
        self.init_method = Some(name.into());
        self
    }

    /// 设置必需的初始化方法（方法缺失时创建失败）
    pub fn with_required_init_method(mut self, name: impl Into<String>) -> Self {
        self.init_method = Some(name.into());
        self.init_method_required = true;
        self
    }

    /// 设置销毁方法
    pub fn with_destroy_method(mut self, name: impl Into<String>) -> Self {
        self.destroy_method = Some(name.into());
        self
    }

    /// 标记为延迟创建
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// 标记为按类型装配的首选候选
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// 标记为抽象描述符
    pub fn abstract_only(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// 添加显式前置依赖
    pub fn with_depends_on(mut self, identifier: impl Into<String>) -> Self {
        self.depends_on.push(identifier.into());
        self
    }

    /// 校验描述符的基本有效性
    pub fn validate(&self) -> DescriptorResult<()> {
        if self.identifier.trim().is_empty() {
            return Err(DescriptorError::InvalidDescriptor {
                identifier: self.identifier.clone(),
                message: "标识符不能为空".to_string(),
            });
        }
        for property in &self.properties {
            if property.name.trim().is_empty() {
                return Err(DescriptorError::InvalidDescriptor {
                    identifier: self.identifier.clone(),
                    message: "属性名不能为空".to_string(),
                });
            }
        }
        if self.depends_on.iter().any(|dep| dep == &self.identifier) {
            return Err(DescriptorError::InvalidDescriptor {
                identifier: self.identifier.clone(),
                message: "组件不能显式依赖自身".to_string(),
            });
        }
        Ok(())
    }
}
