use crate::build::Mode;
use crate::build::tasks::{TaskContext, TaskReport};
use crate::paths::AssetGroup;
use crate::transform::sprite::{self, SpriteOptions};
use crate::transform::{files, minify, optimize};
use anyhow::Result;

pub fn run(ctx: &TaskContext<'_>) -> Result<TaskReport> {
    let sources = ctx.resolve(AssetGroup::ImgSprite)?;
    if sources.is_empty() {
        return Ok(TaskReport::default());
    }

    let cfg = &ctx.config.sprite;
    let options = SpriteOptions {
        image_name: &cfg.image_name,
        class_prefix: &cfg.class_prefix,
        padding: match ctx.mode {
            Mode::Dev => cfg.dev_padding,
            Mode::Prod => cfg.prod_padding,
        },
    };
    let Some(sheet) = sprite::pack(&sources, &options)? else {
        return Ok(TaskReport::default());
    };

    let dest = ctx.paths.dest(AssetGroup::ImgSprite);
    match ctx.mode {
        Mode::Dev => {
            files::write_output(&dest.join(&cfg.image_name), &sheet.image)?;
            files::write_output(&dest.join(&cfg.css_name), minify::css(&sheet.css))?;
        }
        Mode::Prod => {
            let image =
                optimize::optimize_image(&sheet.image, "png", ctx.config.prod.jpeg_quality)?;
            files::write_output(&dest.join(&cfg.image_name), &image)?;
            ctx.emit_bundle(AssetGroup::ImgSprite, &cfg.css_name, sheet.css, minify::css)?;
        }
    }
    tracing::info!("雪碧图已生成：{} 个图标", sheet.icons);
    Ok(TaskReport::files(2))
}
