use crate::config::{CONFIG_FILE, ProjectConfig};
use crate::paths::{AssetGroup, PathRegistry};
use crate::transform::files;
use anyhow::Result;
use std::path::Path;

pub struct CheckResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// 执行项目检查，依次验证配置、路径表、源码目录和第三方依赖
pub fn run(project_root: &Path) -> Result<CheckResult> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if let Some(config) = check_config(project_root, &mut errors, &mut warnings) {
        let paths = PathRegistry::from_config(project_root, &config);
        if let Err(e) = paths.validate() {
            errors.push(e.to_string());
        } else {
            check_sources(&paths, &mut warnings);
        }
        check_vendor(&paths, &mut warnings)?;
    }

    Ok(CheckResult { errors, warnings })
}

fn check_config(
    root: &Path,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) -> Option<ProjectConfig> {
    if !root.join(CONFIG_FILE).exists() {
        warnings.push(format!("未找到 {CONFIG_FILE}，将使用默认配置"));
    }
    let config = match ProjectConfig::load(root) {
        Ok(cfg) => cfg,
        Err(e) => {
            errors.push(format!("{e:#}"));
            return None;
        }
    };
    if let Err(e) = config.validate() {
        errors.push(e.to_string());
    }
    Some(config)
}

fn check_sources(paths: &PathRegistry, warnings: &mut Vec<String>) {
    let src = paths.source_root();
    for sub in ["html", "css", "js", "img"] {
        if !src.join(sub).is_dir() {
            warnings.push(format!("源码目录 {}/{sub} 不存在", src.display()));
        }
    }
    if !src.join("index.html").exists() {
        warnings.push(format!("缺少入口页面 {}/index.html", src.display()));
    }
}

fn check_vendor(paths: &PathRegistry, warnings: &mut Vec<String>) -> Result<()> {
    for group in [AssetGroup::VendorCss, AssetGroup::VendorJs, AssetGroup::VendorFonts] {
        for pattern in paths.sources(group) {
            let matched = files::resolve(paths.project_root(), std::slice::from_ref(pattern))?;
            if matched.is_empty() {
                warnings.push(format!("{group} 匹配模式没有找到文件：{pattern}"));
            }
        }
    }
    Ok(())
}
