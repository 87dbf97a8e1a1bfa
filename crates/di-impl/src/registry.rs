//! 描述符注册表实现

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;
use weave_common::{
    ComponentDescriptor, DescriptorError, ResolutionError, TypeInfo, TypeModelRegistry,
};
use weave_di_abstractions::DescriptorRegistry;

/// 描述符注册表实现
///
/// 按标识符索引描述符，另维护注册顺序供饥饿实例化和按类型
/// 查找使用。注册需要目标类型已有类型模型（抽象描述符除外）。
pub struct DescriptorRegistryImpl {
    /// 标识符 → 描述符
    descriptors: DashMap<String, Arc<ComponentDescriptor>>,
    /// 注册顺序
    order: Mutex<Vec<String>>,
    /// 类型模型注册表
    models: Arc<TypeModelRegistry>,
}

impl DescriptorRegistryImpl {
    /// 创建新的描述符注册表
    pub fn new(models: Arc<TypeModelRegistry>) -> Self {
        Self {
            descriptors: DashMap::new(),
            order: Mutex::new(Vec::new()),
            models,
        }
    }

    /// 类型模型注册表
    pub fn models(&self) -> &Arc<TypeModelRegistry> {
        &self.models
    }
}

impl std::fmt::Debug for DescriptorRegistryImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorRegistryImpl")
            .field("descriptors", &self.descriptors.len())
            .finish()
    }
}

impl DescriptorRegistry for DescriptorRegistryImpl {
    fn register(&self, descriptor: ComponentDescriptor) -> Result<(), DescriptorError> {
        descriptor.validate()?;

        if !descriptor.is_abstract && self.models.model_of(descriptor.type_info.id).is_none() {
            return Err(DescriptorError::ModelMissing {
                type_name: descriptor.type_info.name.clone(),
            });
        }
        if self.descriptors.contains_key(&descriptor.identifier) {
            return Err(DescriptorError::DuplicateIdentifier {
                identifier: descriptor.identifier.clone(),
            });
        }

        info!(
            "注册组件描述符: {} (类型 {}, 作用域 {})",
            descriptor.identifier, descriptor.type_info.name, descriptor.scope
        );
        let identifier = descriptor.identifier.clone();
        self.descriptors
            .insert(identifier.clone(), Arc::new(descriptor));
        self.order.lock().push(identifier);
        Ok(())
    }

    fn get(&self, identifier: &str) -> Result<Arc<ComponentDescriptor>, DescriptorError> {
        self.descriptors
            .get(identifier)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| DescriptorError::NotRegistered {
                identifier: identifier.to_string(),
            })
    }

    fn contains(&self, identifier: &str) -> bool {
        self.descriptors.contains_key(identifier)
    }

    fn identifiers(&self) -> Vec<String> {
        self.order.lock().clone()
    }

    fn find_assignable(&self, target: &TypeInfo) -> Vec<String> {
        let order = self.order.lock().clone();
        order
            .into_iter()
            .filter(|identifier| {
                let Some(descriptor) = self.descriptors.get(identifier) else {
                    return false;
                };
                if descriptor.is_abstract {
                    return false;
                }
                self.models
                    .model_of(descriptor.type_info.id)
                    .map(|model| model.is_assignable_to(target.id))
                    .unwrap_or(false)
            })
            .collect()
    }

    fn select_candidate(
        &self,
        target: &TypeInfo,
        candidates: Vec<String>,
    ) -> Result<String, ResolutionError> {
        match candidates.as_slice() {
            [] => Err(ResolutionError::AmbiguousDependency {
                type_name: target.name.clone(),
                candidates,
            }),
            [single] => Ok(single.clone()),
            _ => {
                let primaries: Vec<&String> = candidates
                    .iter()
                    .filter(|identifier| {
                        self.descriptors
                            .get(identifier.as_str())
                            .map(|descriptor| descriptor.primary)
                            .unwrap_or(false)
                    })
                    .collect();
                if primaries.len() == 1 {
                    return Ok(primaries[0].clone());
                }
                Err(ResolutionError::AmbiguousDependency {
                    type_name: target.name.clone(),
                    candidates,
                })
            }
        }
    }
}
