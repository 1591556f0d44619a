use crate::config::{ConfigError, ProjectConfig};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// 资源组：构建读取与写出的逻辑分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssetGroup {
    Html,
    HtmlIndex,
    Css,
    Js,
    ImgPerm,
    ImgSprite,
    ImgTemp,
    VendorCss,
    VendorJs,
    VendorFonts,
}

impl AssetGroup {
    pub const ALL: [AssetGroup; 10] = [
        AssetGroup::Html,
        AssetGroup::HtmlIndex,
        AssetGroup::Css,
        AssetGroup::Js,
        AssetGroup::ImgPerm,
        AssetGroup::ImgSprite,
        AssetGroup::ImgTemp,
        AssetGroup::VendorCss,
        AssetGroup::VendorJs,
        AssetGroup::VendorFonts,
    ];

    pub fn key(self) -> &'static str {
        match self {
            AssetGroup::Html => "html",
            AssetGroup::HtmlIndex => "html.index",
            AssetGroup::Css => "css",
            AssetGroup::Js => "js",
            AssetGroup::ImgPerm => "img.perm",
            AssetGroup::ImgSprite => "img.sprite",
            AssetGroup::ImgTemp => "img.temp",
            AssetGroup::VendorCss => "vendor.css",
            AssetGroup::VendorJs => "vendor.js",
            AssetGroup::VendorFonts => "vendor.fonts",
        }
    }

    /// 是否属于源码目录（vendor 文件不在源码目录中，开发模式不监听）
    pub fn is_source(self) -> bool {
        !matches!(
            self,
            AssetGroup::VendorCss | AssetGroup::VendorJs | AssetGroup::VendorFonts
        )
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for AssetGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone)]
pub struct GroupPaths {
    /// 相对项目根目录的匹配模式，统一使用 `/` 分隔
    pub sources: Vec<String>,
    /// 输出目录（绝对路径）
    pub dest: PathBuf,
}

/// 路径注册表：启动时由配置构造一次，之后只读
#[derive(Debug, Clone)]
pub struct PathRegistry {
    project_root: PathBuf,
    source_root: PathBuf,
    output_root: PathBuf,
    archive: PathBuf,
    groups: Vec<GroupPaths>,
}

impl PathRegistry {
    pub fn from_config(project_root: &Path, config: &ProjectConfig) -> Self {
        let src = normalize_dir(&config.build.src_dir);
        let output_root = project_root.join(normalize_dir(&config.build.output_dir));
        let img_exts = "{png,jpg,svg,gif}";

        let table = |group: AssetGroup| -> GroupPaths {
            let (sources, dest): (Vec<String>, PathBuf) = match group {
                AssetGroup::Html => {
                    (vec![format!("{src}/html/**/*.html")], output_root.join("html"))
                }
                AssetGroup::HtmlIndex => (vec![format!("{src}/index.html")], output_root.clone()),
                AssetGroup::Css => {
                    (vec![format!("{src}/css/**/*.css")], output_root.join("css"))
                }
                AssetGroup::Js => (vec![format!("{src}/js/**/*.js")], output_root.join("js")),
                AssetGroup::ImgPerm => (
                    vec![format!("{src}/img/perm/**/*.{img_exts}")],
                    output_root.join("img").join("perm"),
                ),
                // 雪碧图与样式表一起输出到 css 目录，样式中使用相对引用
                AssetGroup::ImgSprite => (
                    vec![format!("{src}/img/sprite/**/*.{img_exts}")],
                    output_root.join("css"),
                ),
                AssetGroup::ImgTemp => (
                    vec![format!("{src}/img/temp/**/*.{img_exts}")],
                    output_root.join("img").join("temp"),
                ),
                AssetGroup::VendorCss => {
                    (normalize_all(&config.vendor.css), output_root.join("css"))
                }
                AssetGroup::VendorJs => {
                    (normalize_all(&config.vendor.js), output_root.join("js"))
                }
                AssetGroup::VendorFonts => {
                    (normalize_all(&config.vendor.fonts), output_root.join("fonts"))
                }
            };
            GroupPaths { sources, dest }
        };

        Self {
            project_root: project_root.to_path_buf(),
            source_root: project_root.join(&src),
            archive: project_root.join(&config.build.archive),
            groups: AssetGroup::ALL.iter().map(|g| table(*g)).collect(),
            output_root,
        }
    }

    pub fn sources(&self, group: AssetGroup) -> &[String] {
        &self.groups[group.index()].sources
    }

    pub fn dest(&self, group: AssetGroup) -> &Path {
        &self.groups[group.index()].dest
    }

    pub fn groups(&self) -> impl Iterator<Item = (AssetGroup, &GroupPaths)> {
        AssetGroup::ALL.iter().map(|g| (*g, &self.groups[g.index()]))
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive
    }

    /// 输出文件相对输出根目录的路径，如 `css/style.css`
    pub fn output_relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.output_root).unwrap_or(path);
        to_slash(rel)
    }

    /// 找出匹配某个相对路径（相对项目根目录）的所有资源组
    pub fn groups_matching(&self, relative: &str) -> Vec<AssetGroup> {
        self.groups()
            .filter(|(_, paths)| {
                paths
                    .sources
                    .iter()
                    .any(|pattern| glob_match::glob_match(pattern, relative))
            })
            .map(|(group, _)| group)
            .collect()
    }

    /// 启动期校验：匹配模式语法、源码目录存在、输出目录与压缩包位于项目之内
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (group, paths) in self.groups() {
            for pattern in &paths.sources {
                if let Err(e) = glob::Pattern::new(pattern) {
                    return Err(ConfigError::InvalidGlob {
                        group: group.key().to_string(),
                        pattern: pattern.clone(),
                        message: e.to_string(),
                    });
                }
                let escapes = Path::new(pattern).is_absolute()
                    || Path::new(pattern)
                        .components()
                        .any(|c| c == Component::ParentDir);
                if group.is_source() && escapes {
                    return Err(ConfigError::InvalidGlob {
                        group: group.key().to_string(),
                        pattern: pattern.clone(),
                        message: "源码匹配模式必须是项目内的相对路径".into(),
                    });
                }
            }
        }

        if !self.source_root.is_dir() {
            return Err(ConfigError::MissingSourceRoot(self.source_root.clone()));
        }

        let inside = self.output_root.starts_with(&self.project_root)
            && self.output_root != self.project_root
            && !self
                .output_root
                .components()
                .any(|c| c == Component::ParentDir);
        if !inside || self.source_root.starts_with(&self.output_root) {
            return Err(ConfigError::UnsafeOutputDir(self.output_root.clone()));
        }

        let archive_inside = self.archive.starts_with(&self.project_root)
            && self.archive != self.project_root
            && !self
                .archive
                .components()
                .any(|c| c == Component::ParentDir);
        if !archive_inside {
            return Err(ConfigError::UnsafeArchivePath(self.archive.clone()));
        }

        Ok(())
    }
}

pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn normalize_dir(dir: &str) -> String {
    let trimmed = dir.trim_start_matches("./").trim_end_matches('/');
    if trimmed.is_empty() { ".".into() } else { trimmed.into() }
}

fn normalize_all(patterns: &[String]) -> Vec<String> {
    patterns
        .iter()
        .map(|p| p.trim_start_matches("./").to_string())
        .collect()
}
