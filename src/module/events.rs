//! 模块生命周期事件
//!
//! 模块启用、停用后发出一个事件。分发失败只记录日志，不影响状态变更。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use crate::utils::{CoreError, Result};

/// 模块事件类型
pub mod module_events {
    /// 模块已启用
    pub const MODULE_ENABLED: &str = "module.enabled";
    /// 模块已停用
    pub const MODULE_DISABLED: &str = "module.disabled";
}

/// 模块事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleEvent {
    /// 事件 ID
    pub id: String,
    /// 事件类型
    pub event_type: String,
    /// 模块名称
    pub module: String,
    /// 发生时间
    pub timestamp: DateTime<Utc>,
}

impl ModuleEvent {
    /// 创建事件
    pub fn new(event_type: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            module: module.into(),
            timestamp: Utc::now(),
        }
    }

    /// 模块已启用事件
    pub fn enabled(module: &str) -> Self {
        Self::new(module_events::MODULE_ENABLED, module)
    }

    /// 模块已停用事件
    pub fn disabled(module: &str) -> Self {
        Self::new(module_events::MODULE_DISABLED, module)
    }
}

/// 事件接收端
pub trait EventSink: Send + Sync {
    /// 分发事件
    fn dispatch(&self, event: &ModuleEvent) -> Result<()>;
}

/// 把事件写入日志
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn dispatch(&self, event: &ModuleEvent) -> Result<()> {
        info!(
            event_id = %event.id,
            event_type = %event.event_type,
            module = %event.module,
            "模块事件"
        );
        Ok(())
    }
}

/// 通过 tokio 广播通道转发事件
///
/// 没有订阅者时分发返回 [`CoreError::EventDispatchFailed`]。
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<ModuleEvent>,
}

impl BroadcastEventSink {
    /// 创建指定缓冲容量的通道
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// 订阅事件
    pub fn subscribe(&self) -> broadcast::Receiver<ModuleEvent> {
        self.sender.subscribe()
    }

    /// 当前订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventSink for BroadcastEventSink {
    fn dispatch(&self, event: &ModuleEvent) -> Result<()> {
        self.sender
            .send(event.clone())
            .map(|_| ())
            .map_err(|e| CoreError::EventDispatchFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_constructors() {
        let event = ModuleEvent::enabled("Blog");
        assert_eq!(event.event_type, module_events::MODULE_ENABLED);
        assert_eq!(event.module, "Blog");
        assert!(Uuid::parse_str(&event.id).is_ok());

        let other = ModuleEvent::disabled("Blog");
        assert_eq!(other.event_type, "module.disabled");
        assert_ne!(event.id, other.id);
    }

    #[tokio::test]
    async fn test_broadcast_delivers_to_subscribers() {
        let sink = BroadcastEventSink::new(8);
        let mut rx = sink.subscribe();
        assert_eq!(sink.subscriber_count(), 1);

        sink.dispatch(&ModuleEvent::enabled("Blog")).unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.module, "Blog");
    }

    #[test]
    fn test_broadcast_without_subscribers_fails() {
        let sink = BroadcastEventSink::default();
        let err = sink.dispatch(&ModuleEvent::disabled("Blog")).unwrap_err();
        assert!(matches!(err, CoreError::EventDispatchFailed(_)));
    }

    #[test]
    fn test_tracing_sink_never_fails() {
        assert!(TracingEventSink.dispatch(&ModuleEvent::enabled("Blog")).is_ok());
    }
}
