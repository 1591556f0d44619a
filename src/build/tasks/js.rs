use crate::build::Mode;
use crate::build::tasks::{TaskContext, TaskReport};
use crate::paths::AssetGroup;
use crate::transform::concat::{self, Piece};
use crate::transform::{files, minify};
use anyhow::Result;

const BUNDLE: &str = "main.js";

pub fn run(ctx: &TaskContext<'_>) -> Result<TaskReport> {
    let sources = ctx.resolve(AssetGroup::Js)?;
    if sources.is_empty() {
        tracing::debug!("没有项目脚本，跳过 {BUNDLE}");
        return Ok(TaskReport::default());
    }

    let pieces = sources
        .iter()
        .map(|file| {
            let original = files::read_text(&file.path)?;
            Ok(Piece {
                source: file.relative_slash(),
                code: original.clone(),
                original,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    match ctx.mode {
        Mode::Dev => {
            let dest = ctx.paths.dest(AssetGroup::Js);
            let map_name = format!("{BUNDLE}.map");
            let (mut code, map) = concat::concat_with_map(BUNDLE, &pieces);
            code.push_str(&format!("\n//# sourceMappingURL={map_name}\n"));
            files::write_output(&dest.join(BUNDLE), code)?;
            files::write_output(&dest.join(&map_name), map.to_json())?;
            Ok(TaskReport::files(2))
        }
        Mode::Prod => {
            let joined = concat::concat(pieces.iter().map(|p| p.code.as_str()));
            ctx.emit_bundle(AssetGroup::Js, BUNDLE, joined, minify::js)?;
            Ok(TaskReport::files(1))
        }
    }
}
