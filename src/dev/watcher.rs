use crate::build::Mode;
use crate::build::events::{self, BuildEvent};
use crate::build::pipeline::{self, Pipeline};
use crate::config::ProjectConfig;
use crate::dev::livereload::DevEvent;
use crate::dev::state::DevState;
use crate::paths::{AssetGroup, PathRegistry, to_slash};
use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// 合并连续变更的等待时间
const DEBOUNCE: Duration = Duration::from_millis(100);

/// 资源组对应的重建任务
fn task_for(group: AssetGroup) -> Option<&'static str> {
    match group {
        AssetGroup::Html | AssetGroup::HtmlIndex => Some("html"),
        AssetGroup::Css => Some("css"),
        AssetGroup::Js => Some("js"),
        AssetGroup::ImgPerm | AssetGroup::ImgTemp => Some("img"),
        AssetGroup::ImgSprite => Some("sprite"),
        AssetGroup::VendorCss | AssetGroup::VendorJs | AssetGroup::VendorFonts => None,
    }
}

/// 把一批变更路径映射为需要重跑的任务（按名称排序、去重）。
/// 只保留 default 管道中注册了的任务，关闭雪碧图时图标变更不触发重建。
pub fn tasks_for_changes(
    paths: &PathRegistry,
    config: &ProjectConfig,
    changed: &[PathBuf],
) -> BTreeSet<&'static str> {
    let registry = Pipeline::Default.registry(config);
    changed
        .iter()
        .filter(|p| !p.starts_with(paths.output_root()))
        .filter_map(|p| p.strip_prefix(paths.project_root()).ok())
        .flat_map(|rel| paths.groups_matching(&to_slash(rel)))
        .filter_map(task_for)
        .filter(|name| registry.get(name).is_some())
        .collect()
}

/// 监听源码目录，去抖后重跑受影响的任务并通知浏览器，直到收到取消信号
pub async fn run(state: DevState) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                for path in event.paths {
                    let _ = tx.send(path);
                }
            }
        },
        Config::default(),
    )
    .context("创建文件监听器失败")?;

    let source_root = state.paths.source_root().to_path_buf();
    watcher
        .watch(&source_root, RecursiveMode::Recursive)
        .with_context(|| format!("监听目录失败：{}", source_root.display()))?;
    tracing::info!("正在监听：{}", source_root.display());

    loop {
        let first = tokio::select! {
            _ = state.shutdown.cancelled() => break,
            path = rx.recv() => match path {
                Some(p) => p,
                None => break,
            },
        };

        let mut batch = BTreeSet::from([first]);
        while let Ok(Some(path)) = tokio::time::timeout(DEBOUNCE, rx.recv()).await {
            batch.insert(path);
        }
        let batch: Vec<PathBuf> = batch.into_iter().collect();
        rebuild(&state, &batch).await;
    }

    tracing::info!("文件监听已停止");
    Ok(())
}

async fn rebuild(state: &DevState, changed: &[PathBuf]) {
    let tasks = tasks_for_changes(&state.paths, &state.config, changed);
    if tasks.is_empty() {
        return;
    }

    let rel_paths: Vec<String> = changed
        .iter()
        .filter_map(|p| p.strip_prefix(state.paths.project_root()).ok())
        .map(to_slash)
        .collect();
    if state.config.server.log_file_changes {
        for p in &rel_paths {
            tracing::info!("文件变更：{p}");
        }
    }

    let _guard = state.rebuild_lock.lock().await;
    let css_only = tasks.iter().all(|t| *t == "css");
    let task_names: Vec<&'static str> = tasks.into_iter().collect();

    let paths = state.paths.clone();
    let config = state.config.clone();
    let sender = state.events.clone();
    let result = tokio::task::spawn_blocking(move || {
        let forward = |event: &BuildEvent| {
            events::log_event(event);
            let _ = sender.send(DevEvent::Progress {
                event: event.clone(),
            });
        };
        for name in task_names {
            pipeline::run_task(name, Mode::Dev, &paths, &config, &forward)?;
        }
        anyhow::Ok(())
    })
    .await;

    match result {
        Ok(Ok(())) => state.broadcast(DevEvent::Reload {
            paths: rel_paths,
            css_only,
        }),
        Ok(Err(e)) => {
            let error = format!("{e:#}");
            tracing::error!("重建失败：{error}");
            state.broadcast(DevEvent::BuildFailed { error });
        }
        Err(e) => {
            tracing::error!("重建任务异常：{e}");
            state.broadcast(DevEvent::BuildFailed {
                error: e.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use std::fs;
    use tempfile::TempDir;

    fn registry(root: &std::path::Path) -> PathRegistry {
        PathRegistry::from_config(root, &ProjectConfig::default())
    }

    #[test]
    fn changes_map_to_tasks() {
        let root = PathBuf::from("/project");
        let paths = registry(&root);
        let changed = vec![
            root.join("src/css/layout/grid.css"),
            root.join("src/index.html"),
            root.join("src/html/about.html"),
            root.join("src/img/temp/a.png"),
            root.join("src/img/sprite/icon.png"),
            root.join("src/readme.txt"),
        ];
        let config = ProjectConfig::default();
        let tasks: Vec<_> = tasks_for_changes(&paths, &config, &changed).into_iter().collect();
        assert_eq!(tasks, vec!["css", "html", "img", "sprite"]);
    }

    #[test]
    fn sprite_changes_skipped_when_sprite_disabled() {
        let root = PathBuf::from("/project");
        let config = ProjectConfig::parse("[dev]\nsprite = false\n").unwrap();
        let paths = PathRegistry::from_config(&root, &config);

        let icon = vec![root.join("src/img/sprite/icon.png")];
        assert!(tasks_for_changes(&paths, &config, &icon).is_empty());

        let mixed = vec![root.join("src/img/sprite/icon.png"), root.join("src/js/a.js")];
        let tasks: Vec<_> = tasks_for_changes(&paths, &config, &mixed).into_iter().collect();
        assert_eq!(tasks, vec!["js"]);
    }

    #[test]
    fn output_changes_are_ignored() {
        let root = PathBuf::from("/project");
        let paths = registry(&root);
        let changed = vec![root.join("dist/css/style.css")];
        assert!(tasks_for_changes(&paths, &ProjectConfig::default(), &changed).is_empty());
    }

    #[tokio::test]
    async fn rebuild_reloads_styles_only() {
        let dir = TempDir::new().unwrap();
        let css = dir.path().join("src/css/a.css");
        fs::create_dir_all(css.parent().unwrap()).unwrap();
        fs::write(&css, ".a{color:red}").unwrap();

        let config = ProjectConfig::default();
        let state = DevState::new(config, registry(dir.path()));
        let mut rx = state.events.subscribe();

        rebuild(&state, &[css]).await;
        assert!(dir.path().join("dist/css/style.css").exists());

        let mut reload = None;
        while let Ok(event) = rx.try_recv() {
            if let DevEvent::Reload { paths, css_only } = event {
                reload = Some((paths, css_only));
            }
        }
        assert_eq!(reload, Some((vec!["src/css/a.css".to_string()], true)));
    }

    #[tokio::test]
    async fn failed_rebuild_is_reported() {
        let dir = TempDir::new().unwrap();
        let icon = dir.path().join("src/img/sprite/bad.png");
        fs::create_dir_all(icon.parent().unwrap()).unwrap();
        fs::write(&icon, "garbage").unwrap();

        let state = DevState::new(ProjectConfig::default(), registry(dir.path()));
        let mut rx = state.events.subscribe();
        rebuild(&state, &[icon]).await;

        let mut failed = false;
        while let Ok(event) = rx.try_recv() {
            failed |= matches!(event, DevEvent::BuildFailed { .. });
        }
        assert!(failed);
    }

    #[tokio::test]
    async fn sprite_edit_with_sprite_disabled_is_not_a_failure() {
        let dir = TempDir::new().unwrap();
        let icon = dir.path().join("src/img/sprite/a.png");
        fs::create_dir_all(icon.parent().unwrap()).unwrap();
        image::RgbaImage::from_pixel(4, 4, image::Rgba([0, 0, 255, 255]))
            .save(&icon)
            .unwrap();

        let config = ProjectConfig::parse("[dev]\nsprite = false\n").unwrap();
        let paths = PathRegistry::from_config(dir.path(), &config);
        let state = DevState::new(config, paths);
        let mut rx = state.events.subscribe();
        rebuild(&state, &[icon]).await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(
            !events.iter().any(|e| matches!(e, DevEvent::BuildFailed { .. })),
            "{events:?}"
        );
        assert!(!dir.path().join("dist/css/sprite.png").exists());
    }
}
