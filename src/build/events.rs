use serde::Serialize;

/// 构建进度事件
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum BuildEvent {
    Started {
        pipeline: String,
    },
    TaskBegin {
        task: String,
    },
    TaskEnd {
        task: String,
        files: usize,
        elapsed_ms: u64,
    },
    Finished {
        pipeline: String,
        total_ms: u64,
        tasks: usize,
        files: usize,
    },
    Failed {
        error: String,
    },
}

/// 默认事件处理：写入日志
pub fn log_event(event: &BuildEvent) {
    match event {
        BuildEvent::Started { pipeline } => tracing::info!("开始执行管道 {pipeline}"),
        BuildEvent::TaskBegin { task } => tracing::debug!("任务 {task} 开始"),
        BuildEvent::TaskEnd {
            task,
            files,
            elapsed_ms,
        } => tracing::info!("任务 {task} 完成：写出 {files} 个文件，耗时 {elapsed_ms}ms"),
        BuildEvent::Finished {
            pipeline,
            total_ms,
            tasks,
            files,
        } => tracing::info!(
            "管道 {pipeline} 完成，耗时 {:.2}s（{tasks} 个任务，{files} 个文件）",
            *total_ms as f64 / 1000.0
        ),
        BuildEvent::Failed { error } => tracing::error!("构建失败：{error}"),
    }
}
