use async_trait::async_trait;

/// 外部依赖的可用性探测
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// 依赖名称，用于健康检查响应与日志
    fn name(&self) -> &'static str;

    async fn is_healthy(&self) -> bool;
}
