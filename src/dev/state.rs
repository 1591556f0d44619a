use crate::config::ProjectConfig;
use crate::dev::livereload::DevEvent;
use crate::paths::PathRegistry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// 开发模式下监听器与预览服务共享的状态
#[derive(Debug, Clone)]
pub struct DevState {
    pub config: Arc<ProjectConfig>,
    pub paths: Arc<PathRegistry>,
    /// 推送给浏览器的事件
    pub events: broadcast::Sender<DevEvent>,
    /// 重建互斥锁：同一时刻只执行一次重建
    pub rebuild_lock: Arc<tokio::sync::Mutex<()>>,
    /// 当前连接的浏览器数量
    pub clients: Arc<AtomicUsize>,
    pub next_client_id: Arc<AtomicU64>,
    pub shutdown: CancellationToken,
}

impl DevState {
    pub fn new(config: ProjectConfig, paths: PathRegistry) -> Self {
        let (events, _) = broadcast::channel::<DevEvent>(64);
        Self {
            config: Arc::new(config),
            paths: Arc::new(paths),
            events,
            rebuild_lock: Arc::new(tokio::sync::Mutex::new(())),
            clients: Arc::new(AtomicUsize::new(0)),
            next_client_id: Arc::new(AtomicU64::new(1)),
            shutdown: CancellationToken::new(),
        }
    }

    /// 广播事件；没有浏览器连接时静默丢弃
    pub fn broadcast(&self, event: DevEvent) {
        let _ = self.events.send(event);
    }
}
