use crate::build::Mode;
use crate::build::tasks::{TaskContext, TaskReport};
use crate::paths::AssetGroup;
use crate::transform::files::{self, SourceFile};
use crate::transform::optimize;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::Path;

/// 图片：开发模式把 perm 与 temp 同时复制到两个目标目录，
/// 生产模式只优化 perm 图片，临时图片不进入发布包。
pub fn run(ctx: &TaskContext<'_>) -> Result<TaskReport> {
    match ctx.mode {
        Mode::Dev => {
            let mut sources = ctx.resolve(AssetGroup::ImgPerm)?;
            sources.extend(ctx.resolve(AssetGroup::ImgTemp)?);
            let mut written = 0;
            for group in [AssetGroup::ImgPerm, AssetGroup::ImgTemp] {
                written += files::copy_into(&sources, ctx.paths.dest(group))?;
            }
            Ok(TaskReport::files(written))
        }
        Mode::Prod => {
            let sources = ctx.resolve(AssetGroup::ImgPerm)?;
            let dest = ctx.paths.dest(AssetGroup::ImgPerm);
            let quality = ctx.config.prod.jpeg_quality;
            let saved = if ctx.config.build.parallel {
                sources
                    .par_iter()
                    .map(|file| optimize_one(file, dest, quality))
                    .collect::<Result<Vec<_>>>()?
            } else {
                sources
                    .iter()
                    .map(|file| optimize_one(file, dest, quality))
                    .collect::<Result<Vec<_>>>()?
            };
            let saved: u64 = saved.into_iter().sum();
            if !sources.is_empty() {
                tracing::info!("已优化 {} 张图片，共节省 {} KB", sources.len(), saved / 1024);
            }
            Ok(TaskReport::files(sources.len()))
        }
    }
}

/// 返回节省的字节数
fn optimize_one(file: &SourceFile, dest: &Path, quality: u8) -> Result<u64> {
    let input = files::read_bytes(&file.path)?;
    let output = optimize::optimize_image(&input, &file.extension(), quality)
        .with_context(|| format!("图片优化失败：{}", file.path.display()))?;
    files::write_output(&dest.join(&file.relative), &output)?;
    Ok(input.len().saturating_sub(output.len()) as u64)
}
