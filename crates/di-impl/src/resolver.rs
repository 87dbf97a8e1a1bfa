//! 构造函数/工厂方法解析器实现
//!
//! 给定描述符和一组已知或可延迟解析的参数候选，从类型模型的
//! 候选可执行体中选出最匹配者并物化具体参数值。
//!
//! 候选按（可见性降序、参数个数降序）排序，贪心匹配可以在更短的
//! 候选不可能胜过已接受的更长匹配时提前终止。评分使用类型差异
//! 权重：宽松模式累加能力继承距离并给未经转换的原始参数一个固定
//! 偏好（1024）；严格模式下任一参数不可直接赋值即淘汰该候选，
//! 可赋值的候选取接近最大值的常量权重，仅在参数个数相同时与宽松
//! 近似匹配竞争。

use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;
use weave_common::{
    ComponentDescriptor, ComponentValue, ConversionService, CreationError, CreationStage,
    ExecutableSpec, ParameterSpec, ResolutionError, TypeModel, TypeModelRegistry, ValueSpec,
    value_type_id,
};
use weave_di_abstractions::{
    ConstructorResolver, ContainerConfig, DependencyProvider, ResolvedInstantiation,
};

/// 未经转换的原始参数相对转换参数的固定偏好
const RAW_ARGUMENT_BIAS: i64 = 1024;
/// 严格模式下可赋值匹配的权重常量
const STRICT_ASSIGNABLE_WEIGHT: i64 = i64::MAX - 1024;

/// 每个标识符的创建记录
///
/// 缓存选中的可执行体；参数全部来自字面量/直接实例时一并缓存，
/// 含有引用或自动装配参数时标记为需要重新物化，后续创建只重做
/// 参数装配而跳过候选枚举与评分。
struct CreationRecord {
    executable: Arc<ExecutableSpec>,
    resolved_arguments: Option<Vec<ComponentValue>>,
}

/// 单个候选的装配结果
struct CandidateFit {
    arguments: Vec<ComponentValue>,
    weight: i64,
    fully_resolved: bool,
}

/// 候选装配失败
///
/// 普通失败限定在该候选范围内（尝试下一个候选）；循环引用等
/// 结构性失败立即终止整个解析
enum CandidateFailure {
    Skip(String),
    Fatal(CreationError),
}

impl CandidateFailure {
    fn from_creation(error: CreationError, context: String) -> Self {
        if error.has_circular_cause() {
            Self::Fatal(error)
        } else {
            Self::Skip(format!("{}: {}", context, error))
        }
    }
}

/// 构造函数/工厂方法解析器实现
pub struct ConstructorResolverImpl {
    models: Arc<TypeModelRegistry>,
    conversion: Arc<ConversionService>,
    config: ContainerConfig,
    records: DashMap<String, Arc<CreationRecord>>,
}

impl ConstructorResolverImpl {
    /// 创建新的解析器
    pub fn new(
        models: Arc<TypeModelRegistry>,
        conversion: Arc<ConversionService>,
        config: ContainerConfig,
    ) -> Self {
        Self {
            models,
            conversion,
            config,
            records: DashMap::new(),
        }
    }

    fn model_for(&self, descriptor: &ComponentDescriptor) -> Result<Arc<TypeModel>, CreationError> {
        self.models
            .model_of(descriptor.type_info.id)
            .ok_or_else(|| {
                CreationError::new(
                    &descriptor.identifier,
                    CreationStage::Resolution,
                    weave_common::DescriptorError::ModelMissing {
                        type_name: descriptor.type_info.name.clone(),
                    },
                )
            })
    }

    /// 将一个值适配到参数的声明类型
    ///
    /// 返回适配后的值和继承距离；无法适配时返回候选范围内的失败原因
    fn fit_value(
        &self,
        value: ComponentValue,
        parameter: &ParameterSpec,
    ) -> Result<(ComponentValue, i64), String> {
        let concrete = value_type_id(&value);
        if concrete == parameter.type_info.id {
            return Ok((value, 0));
        }
        if self.models.wrapper_capability(concrete) == Some(parameter.type_info.id) {
            return Ok((value, 0));
        }
        if let Some(model) = self.models.model_of(concrete) {
            if let Some(distance) = model.assignability_distance(parameter.type_info.id) {
                if let Some(cast) = model.cast_to(parameter.type_info.id, &value) {
                    return Ok((cast, i64::from(distance)));
                }
            }
        }
        Err(format!(
            "参数 '{}' 的值无法赋给声明类型 {}",
            parameter.name, parameter.type_info.name
        ))
    }

    /// 物化描述符中声明的一个参数值
    ///
    /// 返回（适配后的值, 是否经过类型转换, 继承距离）
    fn materialize_spec(
        &self,
        descriptor: &ComponentDescriptor,
        spec: &ValueSpec,
        parameter: &ParameterSpec,
        dependencies: &dyn DependencyProvider,
    ) -> Result<(ComponentValue, bool, i64), CandidateFailure> {
        match spec {
            ValueSpec::Literal(literal) => {
                let converted = self
                    .conversion
                    .convert(literal, &parameter.type_info)
                    .map_err(|e| {
                        CandidateFailure::Skip(format!("参数 '{}' 转换失败: {}", parameter.name, e))
                    })?;
                Ok((converted, true, 0))
            }
            ValueSpec::Reference(identifier) => {
                let value = dependencies
                    .resolve_reference(&descriptor.identifier, identifier)
                    .map_err(|e| {
                        CandidateFailure::from_creation(
                            e,
                            format!("引用 '{}' 解析失败", identifier),
                        )
                    })?;
                let (value, distance) = self
                    .fit_value(value, parameter)
                    .map_err(CandidateFailure::Skip)?;
                Ok((value, false, distance))
            }
            ValueSpec::Instance(value) => {
                let (value, distance) = self
                    .fit_value(value.clone(), parameter)
                    .map_err(CandidateFailure::Skip)?;
                Ok((value, false, distance))
            }
        }
    }

    /// 尝试用一个候选可执行体装配参数数组
    fn try_candidate(
        &self,
        descriptor: &ComponentDescriptor,
        candidate: &ExecutableSpec,
        explicit_args: Option<&[ComponentValue]>,
        dependencies: &dyn DependencyProvider,
    ) -> Result<CandidateFit, CandidateFailure> {
        let mut arguments = Vec::with_capacity(candidate.parameters.len());
        let mut distance_sum: i64 = 0;
        let mut any_converted = false;
        let mut any_deferred = false;
        let mut used_generic: Vec<usize> = Vec::new();

        if let Some(explicit) = explicit_args {
            for (value, parameter) in explicit.iter().zip(&candidate.parameters) {
                let (value, distance) = self
                    .fit_value(value.clone(), parameter)
                    .map_err(CandidateFailure::Skip)?;
                distance_sum += distance;
                arguments.push(value);
            }
        } else {
            for (index, parameter) in candidate.parameters.iter().enumerate() {
                let indexed = descriptor.constructor_args.indexed(
                    index,
                    &parameter.name,
                    &parameter.type_info,
                );
                let spec = match indexed {
                    Some(spec) => Some(spec),
                    None => {
                        match descriptor.constructor_args.find_generic(
                            &parameter.name,
                            &parameter.type_info,
                            &used_generic,
                        ) {
                            Some((position, spec)) => {
                                used_generic.push(position);
                                Some(spec)
                            }
                            None => None,
                        }
                    }
                };

                match spec {
                    Some(spec) => {
                        if matches!(spec.value, ValueSpec::Reference(_)) {
                            any_deferred = true;
                        }
                        let (value, converted, distance) =
                            self.materialize_spec(descriptor, &spec.value, parameter, dependencies)?;
                        any_converted |= converted;
                        distance_sum += distance;
                        arguments.push(value);
                    }
                    None => {
                        // 未填充的参数按类型自动装配
                        let value = dependencies
                            .resolve_dependency(&descriptor.identifier, parameter)
                            .map_err(|e| {
                                CandidateFailure::from_creation(
                                    e,
                                    format!("参数 '{}' 自动装配失败", parameter.name),
                                )
                            })?;
                        let (value, distance) = self
                            .fit_value(value, parameter)
                            .map_err(CandidateFailure::Skip)?;
                        distance_sum += distance;
                        any_deferred = true;
                        arguments.push(value);
                    }
                }
            }
        }

        let weight = if self.config.lenient_resolution {
            distance_sum + if any_converted { RAW_ARGUMENT_BIAS } else { 0 }
        } else {
            // 严格模式：fit_value 已淘汰不可赋值的候选，可赋值者取哨兵常量
            STRICT_ASSIGNABLE_WEIGHT
        };

        Ok(CandidateFit {
            arguments,
            weight,
            fully_resolved: !any_deferred,
        })
    }
}

impl std::fmt::Debug for ConstructorResolverImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstructorResolverImpl")
            .field("records", &self.records.len())
            .finish()
    }
}

impl ConstructorResolver for ConstructorResolverImpl {
    fn resolve(
        &self,
        descriptor: &ComponentDescriptor,
        explicit_args: Option<&[ComponentValue]>,
        dependencies: &dyn DependencyProvider,
    ) -> Result<ResolvedInstantiation, CreationError> {
        let identifier = descriptor.identifier.as_str();
        let model = self.model_for(descriptor)?;

        // 已缓存的创建记录让重复创建跳过候选枚举与评分
        if explicit_args.is_none() {
            if let Some(record) = self.records.get(identifier).map(|r| Arc::clone(r.value())) {
                if let Some(arguments) = &record.resolved_arguments {
                    return Ok(ResolvedInstantiation {
                        executable: record.executable.clone(),
                        arguments: arguments.clone(),
                    });
                }
                // 仅重新物化参数
                let fit = self
                    .try_candidate(descriptor, &record.executable, None, dependencies)
                    .map_err(|failure| match failure {
                        CandidateFailure::Fatal(error) => error,
                        CandidateFailure::Skip(message) => CreationError::new(
                            identifier,
                            CreationStage::Resolution,
                            ResolutionError::NoMatchingExecutable {
                                identifier: identifier.to_string(),
                                type_name: descriptor.type_info.name.clone(),
                                message,
                            },
                        ),
                    })?;
                return Ok(ResolvedInstantiation {
                    executable: record.executable.clone(),
                    arguments: fit.arguments,
                });
            }
        }

        let minimum = descriptor.constructor_args.minimum_count();
        let mut candidates: Vec<Arc<ExecutableSpec>> = model
            .executables()
            .iter()
            .filter(|executable| {
                self.config.allow_non_public
                    || executable.visibility == weave_common::Visibility::Public
            })
            .cloned()
            .collect();
        candidates.sort_by(|a, b| {
            b.visibility
                .cmp(&a.visibility)
                .then(b.parameters.len().cmp(&a.parameters.len()))
        });

        let mut best: Option<(Arc<ExecutableSpec>, CandidateFit)> = None;
        let mut ambiguous: Vec<Arc<ExecutableSpec>> = Vec::new();
        let mut causes: Vec<String> = Vec::new();

        for candidate in &candidates {
            if let Some((accepted, _)) = &best {
                // 更短的候选不可能胜过已接受的更长匹配
                if candidate.parameters.len() < accepted.parameters.len() {
                    break;
                }
            }
            if let Some(explicit) = explicit_args {
                if candidate.parameters.len() != explicit.len() {
                    continue;
                }
            } else if candidate.parameters.len() < minimum {
                continue;
            }

            match self.try_candidate(descriptor, candidate, explicit_args, dependencies) {
                Ok(fit) => {
                    let current_weight = best.as_ref().map(|(_, current)| current.weight);
                    match current_weight {
                        None => best = Some((candidate.clone(), fit)),
                        Some(weight) if fit.weight < weight => {
                            // 出现严格更优的候选，此前的并列不再构成歧义
                            ambiguous.clear();
                            best = Some((candidate.clone(), fit));
                        }
                        Some(weight) if fit.weight == weight => {
                            ambiguous.push(candidate.clone());
                        }
                        Some(_) => {}
                    }
                }
                Err(CandidateFailure::Fatal(error)) => return Err(error),
                Err(CandidateFailure::Skip(cause)) => {
                    causes.push(format!("{}: {}", candidate.signature(), cause))
                }
            }
        }

        let Some((executable, fit)) = best else {
            let message = if causes.is_empty() {
                "没有满足参数要求的候选".to_string()
            } else {
                causes.join("; ")
            };
            return Err(CreationError::new(
                identifier,
                CreationStage::Resolution,
                ResolutionError::NoMatchingExecutable {
                    identifier: identifier.to_string(),
                    type_name: descriptor.type_info.name.clone(),
                    message,
                },
            ));
        };

        if !ambiguous.is_empty() {
            if self.config.lenient_resolution {
                debug!(
                    "宽松模式忽略 {} 个等权候选: {}",
                    ambiguous.len(),
                    identifier
                );
            } else {
                let mut names = vec![executable.signature()];
                names.extend(ambiguous.iter().map(|candidate| candidate.signature()));
                return Err(CreationError::new(
                    identifier,
                    CreationStage::Resolution,
                    ResolutionError::AmbiguousExecutable {
                        identifier: identifier.to_string(),
                        candidates: names,
                    },
                ));
            }
        }

        debug!("选定可执行体: {} -> {}", identifier, executable.signature());

        if explicit_args.is_none() {
            self.records.insert(
                identifier.to_string(),
                Arc::new(CreationRecord {
                    executable: executable.clone(),
                    resolved_arguments: fit
                        .fully_resolved
                        .then(|| fit.arguments.clone()),
                }),
            );
        }

        Ok(ResolvedInstantiation {
            executable,
            arguments: fit.arguments,
        })
    }

    fn evict(&self, identifier: &str) {
        self.records.remove(identifier);
    }
}
