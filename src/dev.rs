pub mod livereload;
pub mod server;
pub mod state;
pub mod watcher;

use crate::build::events;
use crate::build::pipeline::{self, Pipeline};
use crate::config::ProjectConfig;
use crate::paths::PathRegistry;
use anyhow::Result;
use state::DevState;
use std::path::Path;

/// 开发模式：先完成 default 管道，再启动文件监听与预览服务，Ctrl-C 后优雅退出
pub async fn start(project_root: &Path, config: ProjectConfig, port: Option<u16>) -> Result<()> {
    let state = prepare(project_root, config).await?;

    let server_cfg = &state.config.server;
    let listener = server::bind(&server_cfg.host, port.unwrap_or(server_cfg.port)).await?;

    let token = state.shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("收到退出信号，正在停止...");
        }
        token.cancel();
    });

    let watch_handle = tokio::spawn(watcher::run(state.clone()));
    let served = server::serve(state.clone(), listener).await;

    state.shutdown.cancel();
    match watch_handle.await {
        Ok(Err(e)) => tracing::error!("文件监听异常退出：{e:#}"),
        Err(e) => tracing::error!("文件监听任务异常：{e}"),
        Ok(Ok(())) => {}
    }
    served
}

/// 校验配置并执行首次完整构建；构建失败时不会进入监听与预览阶段
pub async fn prepare(project_root: &Path, config: ProjectConfig) -> Result<DevState> {
    config.validate()?;
    let paths = PathRegistry::from_config(project_root, &config);
    paths.validate()?;

    let state = DevState::new(config, paths);
    let paths = state.paths.clone();
    let config = state.config.clone();
    tokio::task::spawn_blocking(move || {
        pipeline::execute(Pipeline::Default, &paths, &config, &events::log_event)
    })
    .await
    .map_err(|e| anyhow::anyhow!("初始构建任务异常：{e}"))??;

    Ok(state)
}
