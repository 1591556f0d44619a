use anyhow::{Context, Result};
use image::{DynamicImage, RgbaImage};

use crate::transform::files::{self, SourceFile};
use crate::transform::optimize::encode_png;

pub struct SpriteOptions<'a> {
    /// 样式中引用的图片文件名
    pub image_name: &'a str,
    pub class_prefix: &'a str,
    pub padding: u32,
}

pub struct SpriteSheet {
    /// PNG 编码的雪碧图
    pub image: Vec<u8>,
    /// 未压缩的样式表
    pub css: String,
    pub icons: usize,
}

struct Placed {
    class: String,
    y: u32,
    width: u32,
    height: u32,
}

/// 将图标自上而下排列到一张图中并生成对应样式；没有可用图标时返回 None
pub fn pack(sources: &[SourceFile], options: &SpriteOptions<'_>) -> Result<Option<SpriteSheet>> {
    let mut icons = Vec::new();
    for file in sources {
        if file.extension() == "svg" {
            tracing::warn!("雪碧图不支持 SVG，已跳过：{}", file.path.display());
            continue;
        }
        let data = files::read_bytes(&file.path)?;
        let img = image::load_from_memory(&data)
            .with_context(|| format!("无法解码图标：{}", file.path.display()))?;
        icons.push((class_name(file), img.to_rgba8()));
    }

    if icons.is_empty() {
        return Ok(None);
    }
    icons.sort_by(|a, b| a.0.cmp(&b.0));

    let width = icons.iter().map(|(_, img)| img.width()).max().unwrap_or(0);
    let mut placed = Vec::with_capacity(icons.len());
    let mut y = 0u32;
    for (class, img) in &icons {
        placed.push(Placed {
            class: class.clone(),
            y,
            width: img.width(),
            height: img.height(),
        });
        y += img.height() + options.padding;
    }
    let height = y.saturating_sub(options.padding).max(1);

    let mut canvas = RgbaImage::new(width.max(1), height);
    for ((_, img), place) in icons.iter().zip(&placed) {
        image::imageops::overlay(&mut canvas, img, 0, i64::from(place.y));
    }

    let image = encode_png(&DynamicImage::ImageRgba8(canvas))?;
    let css = stylesheet(&placed, options);

    Ok(Some(SpriteSheet {
        image,
        css,
        icons: placed.len(),
    }))
}

fn stylesheet(placed: &[Placed], options: &SpriteOptions<'_>) -> String {
    let mut css = String::new();
    for icon in placed {
        let offset = if icon.y == 0 {
            "0px".to_string()
        } else {
            format!("-{}px", icon.y)
        };
        css.push_str(&format!(
            ".{prefix}{class} {{\n  background-image: url({image});\n  background-position: 0px {offset};\n  width: {w}px;\n  height: {h}px;\n}}\n",
            prefix = options.class_prefix,
            class = icon.class,
            image = options.image_name,
            w = icon.width,
            h = icon.height,
        ));
    }
    css
}

/// 由相对路径生成类名：子目录以 `-` 连接，非字母数字字符替换为 `-`
fn class_name(file: &SourceFile) -> String {
    let rel = file.relative.with_extension("");
    crate::paths::to_slash(&rel)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
