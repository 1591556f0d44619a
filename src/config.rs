use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "assetpipe.toml";

/// 配置错误：启动阶段发现即终止
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("资源组 {group} 的匹配模式无效 `{pattern}`：{message}")]
    InvalidGlob {
        group: String,
        pattern: String,
        message: String,
    },

    #[error("源码目录不存在：{}", .0.display())]
    MissingSourceRoot(PathBuf),

    #[error("输出目录必须位于项目目录之内且不能是项目根目录：{}", .0.display())]
    UnsafeOutputDir(PathBuf),

    #[error("压缩包路径必须位于项目目录之内：{}", .0.display())]
    UnsafeArchivePath(PathBuf),

    #[error("预览服务暂不支持 HTTPS，请将 server.https 设为 false")]
    HttpsUnsupported,

    #[error("配置项 {key} 无效：{message}")]
    InvalidValue { key: String, message: String },
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub vendor: VendorConfig,
    #[serde(default)]
    pub dev: DevConfig,
    #[serde(default)]
    pub prod: ProdConfig,
    #[serde(default)]
    pub sprite: SpriteConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize)]
pub struct BuildConfig {
    #[serde(default = "default_src_dir")]
    pub src_dir: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// 生产模式打包文件，相对项目根目录
    #[serde(default = "default_archive")]
    pub archive: String,
    #[serde(default = "default_hash_length")]
    pub hash_length: usize,
    /// 同一层级的任务是否并行执行
    #[serde(default = "default_true")]
    pub parallel: bool,
}

/// 第三方依赖文件（通常来自 node_modules）
#[derive(Debug, Deserialize)]
pub struct VendorConfig {
    #[serde(default = "default_vendor_css")]
    pub css: Vec<String>,
    #[serde(default = "default_vendor_js")]
    pub js: Vec<String>,
    #[serde(default = "default_vendor_fonts")]
    pub fonts: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DevConfig {
    /// 开发管道是否包含雪碧图步骤
    #[serde(default = "default_true")]
    pub sprite: bool,
}

#[derive(Debug, Deserialize)]
pub struct ProdConfig {
    /// 将 HTML 中的资源引用改写为带指纹的文件名
    #[serde(default = "default_true")]
    pub rewrite_html: bool,
    /// 打包完成后删除输出目录
    #[serde(default)]
    pub clean_after_archive: bool,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Deserialize)]
pub struct SpriteConfig {
    #[serde(default = "default_sprite_image")]
    pub image_name: String,
    #[serde(default = "default_sprite_css")]
    pub css_name: String,
    #[serde(default = "default_class_prefix")]
    pub class_prefix: String,
    #[serde(default = "default_dev_padding")]
    pub dev_padding: u32,
    #[serde(default)]
    pub prod_padding: u32,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_true")]
    pub log_connections: bool,
    #[serde(default = "default_true")]
    pub log_file_changes: bool,
    /// 重新加载时在页面上显示提示
    #[serde(default)]
    pub notify: bool,
    #[serde(default)]
    pub open: OpenBrowser,
    #[serde(default)]
    pub https: bool,
    #[serde(default)]
    pub ghost_mode: GhostMode,
}

/// 启动时自动打开浏览器：`"local"`、`"external"` 或 `false`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "OpenRaw")]
pub enum OpenBrowser {
    Local,
    #[default]
    External,
    Disabled,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OpenRaw {
    Flag(bool),
    Target(String),
}

impl TryFrom<OpenRaw> for OpenBrowser {
    type Error = String;

    fn try_from(raw: OpenRaw) -> std::result::Result<Self, Self::Error> {
        match raw {
            OpenRaw::Flag(false) => Ok(Self::Disabled),
            OpenRaw::Flag(true) => Ok(Self::Local),
            OpenRaw::Target(t) => match t.as_str() {
                "local" => Ok(Self::Local),
                "external" => Ok(Self::External),
                other => Err(format!("未知的 open 取值：{other}（可选 local、external、false）")),
            },
        }
    }
}

/// 多个浏览器之间同步的交互类型
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GhostMode {
    #[serde(default = "default_true")]
    pub clicks: bool,
    #[serde(default = "default_true")]
    pub forms: bool,
    #[serde(default = "default_true")]
    pub scroll: bool,
}

impl ProjectConfig {
    /// 读取项目根目录下的 assetpipe.toml，不存在时使用默认配置
    pub fn load(project_root: &Path) -> Result<Self> {
        let config_path = project_root.join(CONFIG_FILE);
        if !config_path.exists() {
            tracing::debug!("未找到 {CONFIG_FILE}，使用默认配置");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("读取 {CONFIG_FILE} 失败：{}", e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: ProjectConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("解析 {CONFIG_FILE} 失败：{}", e))?;
        Ok(config)
    }

    /// 校验取值范围；路径相关校验见 `PathRegistry::validate`
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(4..=64).contains(&self.build.hash_length) {
            return Err(ConfigError::InvalidValue {
                key: "build.hash_length".into(),
                message: format!("应在 4 到 64 之间，当前为 {}", self.build.hash_length),
            });
        }
        if !(1..=100).contains(&self.prod.jpeg_quality) {
            return Err(ConfigError::InvalidValue {
                key: "prod.jpeg_quality".into(),
                message: format!("应在 1 到 100 之间，当前为 {}", self.prod.jpeg_quality),
            });
        }
        if self.sprite.image_name.is_empty() || self.sprite.css_name.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "sprite".into(),
                message: "image_name 与 css_name 不能为空".into(),
            });
        }
        if self.server.https {
            return Err(ConfigError::HttpsUnsupported);
        }
        Ok(())
    }
}

// 默认值函数
fn default_src_dir() -> String { "src".into() }
fn default_output_dir() -> String { "dist".into() }
fn default_archive() -> String { "dist.zip".into() }
fn default_hash_length() -> usize { 10 }
fn default_true() -> bool { true }
fn default_vendor_css() -> Vec<String> {
    vec!["node_modules/bootstrap/dist/css/bootstrap.css".into()]
}
fn default_vendor_js() -> Vec<String> {
    vec![
        "node_modules/jquery/dist/jquery.js".into(),
        "node_modules/bootstrap/dist/js/bootstrap.js".into(),
    ]
}
fn default_vendor_fonts() -> Vec<String> {
    vec!["node_modules/bootstrap/dist/fonts/**/*".into()]
}
fn default_jpeg_quality() -> u8 { 85 }
fn default_sprite_image() -> String { "sprite.png".into() }
fn default_sprite_css() -> String { "sprite.css".into() }
fn default_class_prefix() -> String { "icon-".into() }
fn default_dev_padding() -> u32 { 2 }
fn default_host() -> String { "0.0.0.0".into() }
fn default_port() -> u16 { 28088 }
fn default_log_level() -> String { "info".into() }

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            src_dir: default_src_dir(),
            output_dir: default_output_dir(),
            archive: default_archive(),
            hash_length: default_hash_length(),
            parallel: true,
        }
    }
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            css: default_vendor_css(),
            js: default_vendor_js(),
            fonts: default_vendor_fonts(),
        }
    }
}

impl Default for DevConfig {
    fn default() -> Self {
        Self { sprite: true }
    }
}

impl Default for ProdConfig {
    fn default() -> Self {
        Self {
            rewrite_html: true,
            clean_after_archive: false,
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self {
            image_name: default_sprite_image(),
            css_name: default_sprite_css(),
            class_prefix: default_class_prefix(),
            dev_padding: default_dev_padding(),
            prod_padding: 0,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_connections: true,
            log_file_changes: true,
            notify: false,
            open: OpenBrowser::default(),
            https: false,
            ghost_mode: GhostMode::default(),
        }
    }
}

impl Default for GhostMode {
    fn default() -> Self {
        Self {
            clicks: true,
            forms: true,
            scroll: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config.build.output_dir, "dist");
        assert_eq!(config.server.port, 28088);
        assert_eq!(config.build.hash_length, 10);
        assert!(config.dev.sprite);
        assert_eq!(config.server.open, OpenBrowser::External);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = ProjectConfig::parse(
            r#"
            [build]
            output_dir = "public"

            [server]
            port = 3001
            open = false

            [server.ghost_mode]
            scroll = false
            "#,
        )
        .unwrap();
        assert_eq!(config.build.output_dir, "public");
        assert_eq!(config.build.src_dir, "src");
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.server.open, OpenBrowser::Disabled);
        assert!(config.server.ghost_mode.clicks);
        assert!(!config.server.ghost_mode.scroll);
    }

    #[test]
    fn open_accepts_local_and_rejects_unknown() {
        let config = ProjectConfig::parse("[server]\nopen = \"local\"\n").unwrap();
        assert_eq!(config.server.open, OpenBrowser::Local);
        assert!(ProjectConfig::parse("[server]\nopen = \"tunnel\"\n").is_err());
    }

    #[test]
    fn https_is_rejected() {
        let config = ProjectConfig::parse("[server]\nhttps = true\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::HttpsUnsupported)));
    }

    #[test]
    fn hash_length_out_of_range_is_rejected() {
        let config = ProjectConfig::parse("[build]\nhash_length = 2\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("build.hash_length"));
    }
}
