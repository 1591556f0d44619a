use crate::build::Mode;
use crate::build::events::BuildEvent;
use crate::build::fingerprint::Manifest;
use crate::build::graph::{GraphError, TaskGraph};
use crate::build::tasks::{self, Task, TaskContext, TaskRegistry, TaskReport};
use crate::config::ProjectConfig;
use crate::paths::PathRegistry;
use anyhow::Result;
use rayon::prelude::*;
use std::sync::Mutex;
use std::time::Instant;
use thiserror::Error;

/// 单个任务失败，保留任务名与原始错误链
#[derive(Debug, Error)]
#[error("任务 {task} 执行失败")]
pub struct TaskError {
    pub task: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    /// 开发构建，完成后进入监听与预览
    Default,
    Prod,
}

impl Pipeline {
    pub fn name(self) -> &'static str {
        match self {
            Pipeline::Default => "default",
            Pipeline::Prod => "prod",
        }
    }

    pub fn mode(self) -> Mode {
        match self {
            Pipeline::Default => Mode::Dev,
            Pipeline::Prod => Mode::Prod,
        }
    }

    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Dev => Pipeline::Default,
            Mode::Prod => Pipeline::Prod,
        }
    }

    /// 注册该管道包含的任务及依赖关系
    pub fn registry(self, config: &ProjectConfig) -> TaskRegistry {
        let mut r = TaskRegistry::default();
        r.register("clean", &[], tasks::clean::run);
        r.register("vendor", &["clean"], tasks::vendor::run);

        match self {
            Pipeline::Default => {
                let assets_after: &[&'static str] = if config.dev.sprite {
                    r.register("sprite", &["vendor"], tasks::sprite::run);
                    &["sprite"]
                } else {
                    &["vendor"]
                };
                r.register("html", assets_after, tasks::html::run);
                r.register("css", assets_after, tasks::css::run);
                r.register("js", assets_after, tasks::js::run);
                r.register("img", assets_after, tasks::img::run);
            }
            Pipeline::Prod => {
                r.register("sprite", &["vendor"], tasks::sprite::run);
                r.register("css", &["sprite"], tasks::css::run);
                r.register("js", &["sprite"], tasks::js::run);
                // 页面改写依赖所有带指纹的产物
                r.register("html", &["css", "js"], tasks::html::run);
                r.register("img", &["html"], tasks::img::run);
                r.register("archive", &["img"], tasks::archive::run);
                if config.prod.clean_after_archive {
                    r.register("clean-after", &["archive"], tasks::clean::run);
                }
            }
        }
        r
    }
}

#[derive(Debug, Default)]
pub struct BuildStats {
    pub tasks: usize,
    pub files: usize,
    pub elapsed_ms: u64,
    /// 仅生产模式非空
    pub manifest: Manifest,
}

pub fn graph_of(registry: &TaskRegistry) -> TaskGraph {
    let mut graph = TaskGraph::new();
    for task in registry.iter() {
        graph.add(task.name, &task.dependencies);
    }
    graph
}

/// 按层执行管道：层内任务可并发，层与层之间完全同步。
/// 某层出现失败时等待该层其余任务结束后中止，后续层不再启动。
pub fn execute(
    pipeline: Pipeline,
    paths: &PathRegistry,
    config: &ProjectConfig,
    on_event: &(dyn Fn(&BuildEvent) + Sync),
) -> Result<BuildStats> {
    let registry = pipeline.registry(config);
    let levels = graph_of(&registry).levels()?;

    let start = Instant::now();
    on_event(&BuildEvent::Started {
        pipeline: pipeline.name().to_owned(),
    });

    let manifest = Mutex::new(Manifest::default());
    let ctx = TaskContext {
        paths,
        config,
        mode: pipeline.mode(),
        manifest: &manifest,
    };

    let mut stats = BuildStats::default();
    for level in &levels {
        let tasks = level
            .iter()
            .map(|name| {
                registry
                    .get(name)
                    .ok_or_else(|| GraphError::UnknownTask(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let results: Vec<Result<TaskReport>> = if config.build.parallel && tasks.len() > 1 {
            tasks.par_iter().map(|t| run_one(t, &ctx, on_event)).collect()
        } else {
            tasks.iter().map(|t| run_one(t, &ctx, on_event)).collect()
        };

        for result in results {
            match result {
                Ok(report) => {
                    stats.tasks += 1;
                    stats.files += report.files_written;
                }
                Err(e) => {
                    on_event(&BuildEvent::Failed {
                        error: format!("{e:#}"),
                    });
                    return Err(e);
                }
            }
        }
    }

    stats.elapsed_ms = start.elapsed().as_millis() as u64;
    stats.manifest = manifest.into_inner().unwrap_or_else(|e| e.into_inner());
    on_event(&BuildEvent::Finished {
        pipeline: pipeline.name().to_owned(),
        total_ms: stats.elapsed_ms,
        tasks: stats.tasks,
        files: stats.files,
    });
    Ok(stats)
}

/// 单独执行某个模式下已注册的任务，忽略其依赖
pub fn run_task(
    name: &str,
    mode: Mode,
    paths: &PathRegistry,
    config: &ProjectConfig,
    on_event: &(dyn Fn(&BuildEvent) + Sync),
) -> Result<TaskReport> {
    let registry = Pipeline::for_mode(mode).registry(config);
    let task = registry
        .get(name)
        .ok_or_else(|| GraphError::UnknownTask(name.to_owned()))?;

    let manifest = Mutex::new(Manifest::default());
    let ctx = TaskContext {
        paths,
        config,
        mode,
        manifest: &manifest,
    };
    run_one(task, &ctx, on_event)
}

fn run_one(
    task: &Task,
    ctx: &TaskContext<'_>,
    on_event: &(dyn Fn(&BuildEvent) + Sync),
) -> Result<TaskReport> {
    on_event(&BuildEvent::TaskBegin {
        task: task.name.to_owned(),
    });
    let start = Instant::now();
    let report = (task.action)(ctx).map_err(|e| TaskError {
        task: task.name.to_owned(),
        source: e.into(),
    })?;
    on_event(&BuildEvent::TaskEnd {
        task: task.name.to_owned(),
        files: report.files_written,
        elapsed_ms: start.elapsed().as_millis() as u64,
    });
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::rewrite;
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;
    use walkdir::WalkDir;

    const INDEX: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <link rel="stylesheet" href="css/style.css">
  </head>
  <body>
    <!-- 页面主体 -->
    <p>hello</p>
    <script src="js/main.js"></script>
  </body>
</html>
"#;

    fn touch(root: &Path, rel: &str, content: impl AsRef<[u8]>) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/index.html", INDEX);
        touch(dir.path(), "src/css/a.css", ".a{color:red}");
        touch(dir.path(), "src/js/a.js", "console.log(1)");
        dir
    }

    fn build(root: &Path, pipeline: Pipeline) -> Result<BuildStats> {
        build_with(root, pipeline, &ProjectConfig::default())
    }

    fn build_with(root: &Path, pipeline: Pipeline, config: &ProjectConfig) -> Result<BuildStats> {
        let paths = PathRegistry::from_config(root, config);
        execute(pipeline, &paths, config, &|_| {})
    }

    fn snapshot(dir: &Path) -> BTreeMap<String, Vec<u8>> {
        WalkDir::new(dir)
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e.path().strip_prefix(dir).unwrap().to_string_lossy().replace('\\', "/");
                (rel, fs::read(e.path()).unwrap())
            })
            .collect()
    }

    fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
        crate::transform::optimize::encode_png(&image::DynamicImage::ImageRgba8(img)).unwrap()
    }

    fn level_names(pipeline: Pipeline, config: &ProjectConfig) -> Vec<Vec<String>> {
        graph_of(&pipeline.registry(config)).levels().unwrap()
    }

    #[test]
    fn default_graph_levels() {
        let config = ProjectConfig::default();
        assert_eq!(
            level_names(Pipeline::Default, &config),
            vec![
                vec!["clean"],
                vec!["vendor"],
                vec!["sprite"],
                vec!["css", "html", "img", "js"],
            ]
        );
    }

    #[test]
    fn default_graph_without_sprite() {
        let config = ProjectConfig::parse("[dev]\nsprite = false\n").unwrap();
        let levels = level_names(Pipeline::Default, &config);
        assert_eq!(levels.len(), 3);
        assert!(levels.iter().flatten().all(|t| t != "sprite"));
    }

    #[test]
    fn prod_graph_levels() {
        let config = ProjectConfig::parse("[prod]\nclean_after_archive = true\n").unwrap();
        assert_eq!(
            level_names(Pipeline::Prod, &config),
            vec![
                vec!["clean"],
                vec!["vendor"],
                vec!["sprite"],
                vec!["css", "js"],
                vec!["html"],
                vec!["img"],
                vec!["archive"],
                vec!["clean-after"],
            ]
        );
    }

    #[test]
    fn default_pipeline_writes_bundles_and_maps() {
        let dir = project();
        let stats = build(dir.path(), Pipeline::Default).unwrap();
        assert_eq!(stats.tasks, 7);
        assert!(stats.manifest.is_empty());

        let dist = dir.path().join("dist");
        let css = fs::read_to_string(dist.join("css/style.css")).unwrap();
        assert!(css.starts_with(".a{color:red}"));
        assert!(css.contains("/*# sourceMappingURL=style.css.map */"));
        let js = fs::read_to_string(dist.join("js/main.js")).unwrap();
        assert!(js.starts_with("console.log(1)"));
        assert!(js.contains("//# sourceMappingURL=main.js.map"));

        let map: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dist.join("css/style.css.map")).unwrap())
                .unwrap();
        assert_eq!(map["version"], 3);
        assert_eq!(map["sources"][0], "a.css");
        assert!(dist.join("js/main.js.map").exists());

        assert_eq!(fs::read_to_string(dist.join("index.html")).unwrap(), INDEX);
        assert!(!dir.path().join("dist.zip").exists());
    }

    #[test]
    fn prod_pipeline_hashes_and_rewrites() {
        let dir = project();
        let stats = build(dir.path(), Pipeline::Prod).unwrap();

        let css = stats.manifest.get("css/style.css").unwrap().to_owned();
        let js = stats.manifest.get("js/main.js").unwrap().to_owned();
        assert!(css.starts_with("css/style.") && css.ends_with(".min.css"));
        assert!(js.starts_with("js/main.") && js.ends_with(".min.js"));

        let dist = dir.path().join("dist");
        let index = fs::read_to_string(dist.join("index.html")).unwrap();
        assert!(index.contains(&format!("href=\"{css}\"")));
        assert!(index.contains(&format!("src=\"{js}\"")));
        assert!(!index.contains("页面主体"));
        assert!(!dist.join("css/style.css").exists());
        assert_eq!(fs::read_to_string(dist.join(&css)).unwrap(), ".a{color:red}");

        let archive = fs::File::open(dir.path().join("dist.zip")).unwrap();
        let mut zip = zip::ZipArchive::new(archive).unwrap();
        assert!(zip.by_name("index.html").is_ok());
        assert!(zip.by_name(&css).is_ok());
    }

    #[test]
    fn dev_img_copies_perm_and_temp_into_both() {
        let dir = project();
        touch(dir.path(), "src/img/perm/p.png", "perm");
        touch(dir.path(), "src/img/temp/t.png", "temp");
        build(dir.path(), Pipeline::Default).unwrap();

        let img = dir.path().join("dist/img");
        for dest in ["perm", "temp"] {
            assert_eq!(fs::read(img.join(dest).join("p.png")).unwrap(), b"perm");
            assert_eq!(fs::read(img.join(dest).join("t.png")).unwrap(), b"temp");
        }
    }

    #[test]
    fn prod_img_ships_perm_only() {
        let dir = project();
        let original = png(16, 8, [200, 10, 10, 255]);
        touch(dir.path(), "src/img/perm/logo.png", &original);
        touch(dir.path(), "src/img/temp/draft.png", png(4, 4, [0, 0, 0, 255]));
        build(dir.path(), Pipeline::Prod).unwrap();

        let dist = dir.path().join("dist");
        let shipped = fs::read(dist.join("img/perm/logo.png")).unwrap();
        assert!(shipped.len() <= original.len());
        let decoded = image::load_from_memory(&shipped).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
        assert!(!dist.join("img/temp").exists());

        let mut zip = zip::ZipArchive::new(fs::File::open(dir.path().join("dist.zip")).unwrap())
            .unwrap();
        assert!(zip.by_name("img/perm/logo.png").is_ok());
        assert!(zip.by_name("img/temp/draft.png").is_err());
    }

    #[test]
    fn prod_sprite_stylesheet_is_hashed_and_rewritten() {
        let dir = project();
        touch(
            dir.path(),
            "src/index.html",
            "<link href=\"css/sprite.css\"><link href=\"css/style.css\">",
        );
        touch(dir.path(), "src/img/sprite/home.png", png(8, 8, [0, 128, 0, 255]));
        touch(dir.path(), "src/img/sprite/search.png", png(6, 4, [0, 0, 255, 255]));
        let stats = build(dir.path(), Pipeline::Prod).unwrap();

        let sprite_css = stats.manifest.get("css/sprite.css").unwrap().to_owned();
        assert!(sprite_css.starts_with("css/sprite.") && sprite_css.ends_with(".min.css"));
        assert_eq!(sprite_css.len(), "css/sprite.".len() + 10 + ".min.css".len());

        let dist = dir.path().join("dist");
        assert!(dist.join(&sprite_css).exists());
        assert!(dist.join("css/sprite.png").exists());
        assert!(!dist.join("css/sprite.css").exists());

        let index = fs::read_to_string(dist.join("index.html")).unwrap();
        assert!(index.contains(&format!("href=\"{sprite_css}\"")), "{index}");
        assert!(!index.contains("href=\"css/sprite.css\""));
    }

    #[test]
    fn rewritten_references_exist() {
        let dir = project();
        touch(
            dir.path(),
            "src/html/about.html",
            "<link href=\"../css/style.css\"><a href=\"#top\">top</a>",
        );
        build(dir.path(), Pipeline::Prod).unwrap();

        let dist = dir.path().join("dist");
        for (page, base) in [("index.html", dist.clone()), ("html/about.html", dist.join("html"))] {
            let html = fs::read_to_string(dist.join(page)).unwrap();
            let refs = rewrite::local_references(&html);
            assert!(!refs.is_empty());
            for r in refs {
                assert!(base.join(&r).exists(), "{page} 引用的 {r} 不存在");
            }
        }
    }

    #[test]
    fn clean_build_is_idempotent() {
        let dir = project();
        build(dir.path(), Pipeline::Prod).unwrap();
        let first = snapshot(&dir.path().join("dist"));
        let first_zip = fs::read(dir.path().join("dist.zip")).unwrap();

        build(dir.path(), Pipeline::Prod).unwrap();
        assert_eq!(snapshot(&dir.path().join("dist")), first);
        assert_eq!(fs::read(dir.path().join("dist.zip")).unwrap(), first_zip);
    }

    #[test]
    fn hash_changes_with_source() {
        let dir = project();
        let before = build(dir.path(), Pipeline::Prod).unwrap();
        touch(dir.path(), "src/css/a.css", ".a{color:blue}");
        let after = build(dir.path(), Pipeline::Prod).unwrap();
        assert_ne!(before.manifest.get("css/style.css"), after.manifest.get("css/style.css"));
        assert_eq!(before.manifest.get("js/main.js"), after.manifest.get("js/main.js"));
    }

    #[test]
    fn empty_sources_write_nothing() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/index.html", "<p>x</p>");
        build(dir.path(), Pipeline::Default).unwrap();

        let dist = dir.path().join("dist");
        assert!(dist.join("index.html").exists());
        assert!(!dist.join("css").exists());
        assert!(!dist.join("js").exists());
        assert!(!dist.join("img").exists());
    }

    #[test]
    fn failing_task_stops_later_levels() {
        let dir = project();
        touch(dir.path(), "src/img/sprite/broken.png", b"not a png");

        let events = Mutex::new(Vec::new());
        let config = ProjectConfig::default();
        let paths = PathRegistry::from_config(dir.path(), &config);
        let err = execute(Pipeline::Default, &paths, &config, &|e: &BuildEvent| {
            events.lock().unwrap().push(e.clone())
        })
        .unwrap_err();

        let task_err = err.downcast_ref::<TaskError>().unwrap();
        assert_eq!(task_err.task, "sprite");
        assert!(!dir.path().join("dist/index.html").exists());

        let events = events.into_inner().unwrap();
        assert!(matches!(events.last(), Some(BuildEvent::Failed { .. })));
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, BuildEvent::TaskBegin { task } if task == "css"))
        );
    }

    #[test]
    fn sequential_build_matches_parallel() {
        let parallel = project();
        build(parallel.path(), Pipeline::Prod).unwrap();

        let sequential = project();
        let config = ProjectConfig::parse("[build]\nparallel = false\n").unwrap();
        build_with(sequential.path(), Pipeline::Prod, &config).unwrap();

        assert_eq!(
            snapshot(&parallel.path().join("dist")),
            snapshot(&sequential.path().join("dist"))
        );
    }

    #[test]
    fn clean_after_archive_removes_output() {
        let dir = project();
        let config = ProjectConfig::parse("[prod]\nclean_after_archive = true\n").unwrap();
        build_with(dir.path(), Pipeline::Prod, &config).unwrap();
        assert!(dir.path().join("dist.zip").exists());
        assert!(!dir.path().join("dist").exists());
    }

    #[test]
    fn single_task_runs_without_dependencies() {
        let dir = project();
        let config = ProjectConfig::default();
        let paths = PathRegistry::from_config(dir.path(), &config);

        let report = run_task("css", Mode::Dev, &paths, &config, &|_| {}).unwrap();
        assert_eq!(report.files_written, 2);
        assert!(dir.path().join("dist/css/style.css").exists());
        assert!(!dir.path().join("dist/index.html").exists());

        let err = run_task("archive", Mode::Dev, &paths, &config, &|_| {}).unwrap_err();
        assert_eq!(
            err.downcast_ref::<GraphError>(),
            Some(&GraphError::UnknownTask("archive".into()))
        );
    }
}
