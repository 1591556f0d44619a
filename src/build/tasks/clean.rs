use crate::build::tasks::{TaskContext, TaskReport};
use anyhow::{Context, Result};

/// 删除整个输出目录
pub fn run(ctx: &TaskContext<'_>) -> Result<TaskReport> {
    let output_dir = ctx.paths.output_root();
    if output_dir.exists() {
        std::fs::remove_dir_all(output_dir)
            .with_context(|| format!("清除输出目录失败：{}", output_dir.display()))?;
        tracing::info!("已清除输出目录：{}", output_dir.display());
    }
    Ok(TaskReport::default())
}
