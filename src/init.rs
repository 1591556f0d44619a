use crate::config::CONFIG_FILE;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

// 嵌入项目骨架
const DEFAULT_CONFIG: &str = include_str!("../scaffold/assetpipe.toml");
const INDEX_HTML: &str = include_str!("../scaffold/src/index.html");
const STYLE_CSS: &str = include_str!("../scaffold/src/css/style.css");
const MAIN_JS: &str = include_str!("../scaffold/src/js/main.js");

/// 在项目根目录创建默认配置与源码骨架。
/// 返回 `true` 表示执行了初始化，`false` 表示配置文件已存在。
/// 已存在的源码文件不会被覆盖。
pub fn ensure_initialized(root: &Path) -> Result<bool> {
    if root.join(CONFIG_FILE).exists() {
        return Ok(false);
    }

    let dirs = [
        "src/html",
        "src/css",
        "src/js",
        "src/img/perm",
        "src/img/sprite",
        "src/img/temp",
    ];
    for dir in &dirs {
        let path = root.join(dir);
        fs::create_dir_all(&path).with_context(|| format!("创建目录失败：{}", path.display()))?;
    }

    fs::write(root.join(CONFIG_FILE), DEFAULT_CONFIG)?;

    let files: &[(&str, &str)] = &[
        ("src/index.html", INDEX_HTML),
        ("src/css/style.css", STYLE_CSS),
        ("src/js/main.js", MAIN_JS),
    ];
    for (path, content) in files {
        let target = root.join(path);
        if target.exists() {
            continue;
        }
        fs::write(&target, content)?;
    }

    Ok(true)
}
