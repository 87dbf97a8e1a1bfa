//! 代理工厂
//!
//! 选择代理策略并创建组件代理。目标声明了能力接口且未强制按实现
//! 类型代理时，采用能力接口策略：代理经类型化绑定器以能力视图
//! 注入，未匹配切面的调用直接转发目标。否则采用实现类型策略，
//! 代理以完整方法表对外。

use crate::proxy::{CapabilityBinderRegistry, ComponentProxy};
use std::sync::Arc;
use tracing::{info, warn};
use weave_aop_abstractions::{Advisor, ProxyConfig};
use weave_common::{
    value_type_id, ComponentValue, ProxyConfigurationError, ProxyResult, TypeModel,
    TypeModelRegistry,
};

/// 代理工厂实现
pub struct ProxyFactoryImpl {
    models: Arc<TypeModelRegistry>,
    binders: Arc<CapabilityBinderRegistry>,
}

impl ProxyFactoryImpl {
    /// 创建新的代理工厂
    pub fn new(models: Arc<TypeModelRegistry>, binders: Arc<CapabilityBinderRegistry>) -> Self {
        Self { models, binders }
    }

    /// 能力绑定器注册表
    pub fn binders(&self) -> &Arc<CapabilityBinderRegistry> {
        &self.binders
    }

    /// 创建组件代理
    pub fn create_proxy(
        &self,
        identifier: &str,
        target: ComponentValue,
        model: Arc<TypeModel>,
        advisors: Vec<Advisor>,
        config: ProxyConfig,
    ) -> ProxyResult<Arc<ComponentProxy>> {
        if advisors.is_empty() {
            return Err(ProxyConfigurationError::NoAdvisors {
                identifier: identifier.to_string(),
            });
        }

        let capability_count = model.capabilities().count();
        if capability_count == 0 || config.proxy_target_type {
            info!(
                "创建实现类型代理: {} (类型 {}, {} 个切面)",
                identifier,
                model.type_info().name,
                advisors.len()
            );
        } else {
            for capability in model.capabilities() {
                if !self.binders.contains(capability.type_info.id) {
                    warn!(
                        "能力接口缺少代理绑定器, 该能力经代理不可达: {} ({})",
                        capability.type_info.name, identifier
                    );
                }
            }
            info!(
                "创建能力接口代理: {} (类型 {}, {} 个能力, {} 个切面)",
                identifier,
                model.type_info().name,
                capability_count,
                advisors.len()
            );
        }

        Ok(ComponentProxy::create(
            identifier.to_string(),
            target,
            model,
            advisors,
            config,
            self.binders.clone(),
        ))
    }

    /// 直接包装一个实例（外部协作方的装配入口）
    ///
    /// 按实例的具体类型查找类型模型；无模型时目标不可用
    pub fn wrap(
        &self,
        identifier: &str,
        instance: ComponentValue,
        advisors: Vec<Advisor>,
        config: ProxyConfig,
    ) -> ProxyResult<Arc<ComponentProxy>> {
        let model = self
            .models
            .model_of(value_type_id(&instance))
            .ok_or_else(|| ProxyConfigurationError::NoUsableTarget {
                message: format!("实例没有注册类型模型: {}", identifier),
            })?;
        self.create_proxy(identifier, instance, model, advisors, config)
    }
}

impl std::fmt::Debug for ProxyFactoryImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyFactoryImpl")
            .field("binders", &self.binders)
            .finish()
    }
}
