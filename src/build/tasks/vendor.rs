use crate::build::tasks::{TaskContext, TaskReport};
use crate::paths::AssetGroup;
use crate::transform::{concat, files, minify};
use anyhow::Result;

/// 第三方依赖：css/js 各自拼接为 vendor.css / vendor.js，字体原样复制
pub fn run(ctx: &TaskContext<'_>) -> Result<TaskReport> {
    let mut written = 0;
    written += bundle(ctx, AssetGroup::VendorCss, "vendor.css", minify::css)?;
    written += bundle(ctx, AssetGroup::VendorJs, "vendor.js", minify::js)?;

    let fonts = ctx.resolve(AssetGroup::VendorFonts)?;
    written += files::copy_into(&fonts, ctx.paths.dest(AssetGroup::VendorFonts))?;

    Ok(TaskReport::files(written))
}

fn bundle(
    ctx: &TaskContext<'_>,
    group: AssetGroup,
    file_name: &str,
    minify: fn(&str) -> String,
) -> Result<usize> {
    let sources = ctx.resolve(group)?;
    if sources.is_empty() {
        tracing::warn!("资源组 {group} 没有匹配到文件，跳过 {file_name}（是否尚未安装依赖？）");
        return Ok(0);
    }

    let contents = sources
        .iter()
        .map(|f| files::read_text(&f.path))
        .collect::<Result<Vec<_>>>()?;
    let joined = concat::concat(contents.iter().map(String::as_str));
    let written = ctx.emit_bundle(group, file_name, joined, minify)?;
    tracing::debug!("已拼接 {} 个 vendor 文件 → {written}", sources.len());
    Ok(1)
}
