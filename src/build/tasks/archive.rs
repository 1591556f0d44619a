use crate::build::tasks::{TaskContext, TaskReport};
use crate::transform::archive;
use anyhow::Result;

/// 把整个输出目录打包为 zip
pub fn run(ctx: &TaskContext<'_>) -> Result<TaskReport> {
    let entries = archive::zip_dir(ctx.paths.output_root(), ctx.paths.archive_path())?;
    tracing::info!(
        "已打包 {} 个条目 → {}",
        entries,
        ctx.paths.archive_path().display()
    );
    Ok(TaskReport::files(1))
}
