use crate::build::Mode;
use crate::build::tasks::{TaskContext, TaskReport};
use crate::paths::AssetGroup;
use crate::transform::concat::{self, Piece};
use crate::transform::{files, minify, prefix};
use anyhow::Result;

const BUNDLE: &str = "style.css";

/// 项目样式：补前缀并拼接为 style.css；开发模式附带 source map，生产模式压缩并加指纹
pub fn run(ctx: &TaskContext<'_>) -> Result<TaskReport> {
    let sources = ctx.resolve(AssetGroup::Css)?;
    if sources.is_empty() {
        tracing::debug!("没有项目样式，跳过 {BUNDLE}");
        return Ok(TaskReport::default());
    }

    let mut pieces = Vec::with_capacity(sources.len());
    for file in &sources {
        let original = files::read_text(&file.path)?;
        let code = prefix::apply(&original);
        pieces.push(Piece {
            source: file.relative_slash(),
            original,
            code,
        });
    }

    match ctx.mode {
        Mode::Dev => {
            let dest = ctx.paths.dest(AssetGroup::Css);
            let map_name = format!("{BUNDLE}.map");
            let (mut code, map) = concat::concat_with_map(BUNDLE, &pieces);
            code.push_str(&format!("\n/*# sourceMappingURL={map_name} */\n"));
            files::write_output(&dest.join(BUNDLE), code)?;
            files::write_output(&dest.join(&map_name), map.to_json())?;
            Ok(TaskReport::files(2))
        }
        Mode::Prod => {
            let joined = concat::concat(pieces.iter().map(|p| p.code.as_str()));
            ctx.emit_bundle(AssetGroup::Css, BUNDLE, joined, minify::css)?;
            Ok(TaskReport::files(1))
        }
    }
}
