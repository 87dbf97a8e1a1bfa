//! 代理构建选项

use serde::{Deserialize, Serialize};

/// 代理配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// 是否向目标内部的自调用暴露当前代理（经由环境查找）
    pub expose_proxy: bool,
    /// 是否强制按实现类型建立代理（忽略目标声明的能力接口）
    pub proxy_target_type: bool,
}

impl ProxyConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 启用代理自暴露
    pub fn with_expose_proxy(mut self) -> Self {
        self.expose_proxy = true;
        self
    }

    /// 强制按实现类型建立代理
    pub fn with_proxy_target_type(mut self) -> Self {
        self.proxy_target_type = true;
        self
    }
}
