pub mod events;
pub mod fingerprint;
pub mod graph;
pub mod pipeline;
pub mod tasks;

use crate::config::ProjectConfig;
use crate::paths::PathRegistry;
use anyhow::Result;
use pipeline::{BuildStats, Pipeline};
use std::path::Path;

/// 构建模式：决定每个任务走开发链路还是生产链路
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Dev,
    Prod,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Dev => "dev",
            Mode::Prod => "prod",
        }
    }
}

/// 校验路径配置后执行整条管道，进度写入日志
pub fn run(project_root: &Path, config: &ProjectConfig, pipeline: Pipeline) -> Result<BuildStats> {
    let paths = PathRegistry::from_config(project_root, config);
    paths.validate()?;
    pipeline::execute(pipeline, &paths, config, &events::log_event)
}

/// 单独执行一个任务，不运行其依赖
pub fn run_single(
    project_root: &Path,
    config: &ProjectConfig,
    task: &str,
    mode: Mode,
) -> Result<usize> {
    let paths = PathRegistry::from_config(project_root, config);
    paths.validate()?;
    let report = pipeline::run_task(task, mode, &paths, config, &events::log_event)?;
    Ok(report.files_written)
}
