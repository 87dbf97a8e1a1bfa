//! 自动代理后置处理器
//!
//! 对象图与拦截引擎的耦合点：在初始化后的扩展钩子里为匹配到切面
//! 的组件织入代理；循环依赖场景下经早期引用钩子提前织入，并记录
//! 原始实例身份以避免初始化后再次包装。

use crate::factory::ProxyFactoryImpl;
use crate::proxy::ComponentProxy;
use crate::registry::AdvisorRegistry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;
use weave_aop_abstractions::ProxyConfig;
use weave_common::{
    value_identity, value_type_id, ComponentValue, CreationError, CreationStage, TypeInfo,
    TypeModelRegistry,
};
use weave_di_abstractions::{CapabilityCaster, ComponentPostProcessor};

/// 自动代理后置处理器
pub struct AutoProxyProcessor {
    advisors: Arc<AdvisorRegistry>,
    factory: Arc<ProxyFactoryImpl>,
    models: Arc<TypeModelRegistry>,
    config: ProxyConfig,
    /// 已在早期引用阶段织入代理的组件：标识符 → 原始实例身份
    early_proxied: DashMap<String, usize>,
}

impl AutoProxyProcessor {
    /// 创建新的自动代理处理器
    pub fn new(
        advisors: Arc<AdvisorRegistry>,
        factory: Arc<ProxyFactoryImpl>,
        models: Arc<TypeModelRegistry>,
        config: ProxyConfig,
    ) -> Self {
        Self {
            advisors,
            factory,
            models,
            config,
            early_proxied: DashMap::new(),
        }
    }

    /// 必要时为实例织入代理
    ///
    /// 实例的具体类型没有模型、或没有适用切面时原样返回
    fn wrap_if_necessary(
        &self,
        instance: ComponentValue,
        identifier: &str,
    ) -> Result<ComponentValue, CreationError> {
        if instance.downcast_ref::<ComponentProxy>().is_some() {
            return Ok(instance);
        }
        let Some(model) = self.models.model_of(value_type_id(&instance)) else {
            return Ok(instance);
        };
        let advisors = self.advisors.advisors_for(model.type_info());
        if advisors.is_empty() {
            return Ok(instance);
        }

        debug!(
            "织入代理: {} ({} 个切面)",
            identifier,
            advisors.len()
        );
        let proxy = self
            .factory
            .create_proxy(identifier, instance, model, advisors, self.config.clone())
            .map_err(|e| CreationError::new(identifier, CreationStage::Proxying, e))?;
        let value: ComponentValue = proxy;
        Ok(value)
    }
}

impl ComponentPostProcessor for AutoProxyProcessor {
    fn processor_name(&self) -> &str {
        "AutoProxyProcessor"
    }

    fn early_reference(
        &self,
        instance: ComponentValue,
        identifier: &str,
    ) -> Result<ComponentValue, CreationError> {
        self.early_proxied
            .insert(identifier.to_string(), value_identity(&instance) as usize);
        self.wrap_if_necessary(instance, identifier)
    }

    fn after_initialization(
        &self,
        instance: ComponentValue,
        identifier: &str,
    ) -> Result<ComponentValue, CreationError> {
        if let Some((_, remembered)) = self.early_proxied.remove(identifier) {
            if remembered == value_identity(&instance) as usize {
                // 早期引用阶段已织入，成品采用早期代理，这里不重复包装
                return Ok(instance);
            }
        }
        self.wrap_if_necessary(instance, identifier)
    }
}

impl std::fmt::Debug for AutoProxyProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoProxyProcessor")
            .field("advisors", &self.advisors)
            .finish()
    }
}

/// 代理感知的能力接口转换器
///
/// 值是组件代理时优先经代理转换（保持拦截），否则回退到
/// 类型模型转换
pub struct ProxyAwareCaster {
    models: Arc<TypeModelRegistry>,
}

impl ProxyAwareCaster {
    /// 创建新的代理感知转换器
    pub fn new(models: Arc<TypeModelRegistry>) -> Self {
        Self { models }
    }
}

impl CapabilityCaster for ProxyAwareCaster {
    fn cast(&self, value: &ComponentValue, target: &TypeInfo) -> Option<ComponentValue> {
        if let Ok(proxy) = value.clone().downcast::<ComponentProxy>() {
            return proxy.cast_to(target);
        }
        self.models.cast_value(value, target)
    }
}

impl std::fmt::Debug for ProxyAwareCaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProxyAwareCaster")
    }
}
