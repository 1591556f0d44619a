use crate::build::Mode;
use crate::build::tasks::{TaskContext, TaskReport};
use crate::paths::AssetGroup;
use crate::transform::{files, minify, rewrite};
use anyhow::Result;

/// 页面：开发模式原样复制；生产模式按清单改写资源引用后压缩
pub fn run(ctx: &TaskContext<'_>) -> Result<TaskReport> {
    let mut written = 0;
    for group in [AssetGroup::HtmlIndex, AssetGroup::Html] {
        let sources = ctx.resolve(group)?;
        let dest = ctx.paths.dest(group);
        written += match ctx.mode {
            Mode::Dev => files::copy_into(&sources, dest)?,
            Mode::Prod => {
                for file in &sources {
                    let html = files::read_text(&file.path)?;
                    let html = if ctx.config.prod.rewrite_html {
                        let (rewritten, count) =
                            rewrite::rewrite_references(&html, &ctx.manifest());
                        if count > 0 {
                            tracing::debug!("{}：改写 {count} 处资源引用", file.relative_slash());
                        }
                        rewritten
                    } else {
                        html
                    };
                    files::write_output(&dest.join(&file.relative), minify::html(&html))?;
                }
                sources.len()
            }
        };
    }
    Ok(TaskReport::files(written))
}
