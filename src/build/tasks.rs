pub mod archive;
pub mod clean;
pub mod css;
pub mod html;
pub mod img;
pub mod js;
pub mod sprite;
pub mod vendor;

use crate::build::fingerprint::{self, Manifest};
use crate::build::Mode;
use crate::config::ProjectConfig;
use crate::paths::{AssetGroup, PathRegistry};
use crate::transform::files::{self, SourceFile};
use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// 任务执行上下文：同一次管道运行内所有任务共享
pub struct TaskContext<'a> {
    pub paths: &'a PathRegistry,
    pub config: &'a ProjectConfig,
    pub mode: Mode,
    pub manifest: &'a Mutex<Manifest>,
}

impl TaskContext<'_> {
    pub fn resolve(&self, group: AssetGroup) -> Result<Vec<SourceFile>> {
        files::resolve(self.paths.project_root(), self.paths.sources(group))
    }

    pub fn manifest(&self) -> MutexGuard<'_, Manifest> {
        self.manifest.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 写出打包后的单个文件。
    /// 开发模式按原名写出；生产模式先压缩，再以内容哈希命名并登记到清单。
    /// 返回写出的文件路径（相对输出根目录）。
    pub fn emit_bundle(
        &self,
        group: AssetGroup,
        file_name: &str,
        content: String,
        minify: fn(&str) -> String,
    ) -> Result<String> {
        let dest = self.paths.dest(group);
        let logical = self.paths.output_relative(&dest.join(file_name));
        match self.mode {
            Mode::Dev => {
                files::write_output(&dest.join(file_name), content)?;
                Ok(logical)
            }
            Mode::Prod => {
                let minified = minify(&content);
                let hash =
                    fingerprint::content_hash(minified.as_bytes(), self.config.build.hash_length);
                let target = dest.join(fingerprint::hashed_name(file_name, &hash));
                files::write_output(&target, minified)?;
                let hashed = self.paths.output_relative(&target);
                tracing::debug!("指纹：{logical} → {hashed}");
                self.manifest().insert(logical, hashed.clone());
                Ok(hashed)
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TaskReport {
    pub files_written: usize,
}

impl TaskReport {
    pub fn files(files_written: usize) -> Self {
        Self { files_written }
    }
}

pub type TaskAction = fn(&TaskContext<'_>) -> Result<TaskReport>;

pub struct Task {
    pub name: &'static str,
    pub dependencies: Vec<&'static str>,
    pub action: TaskAction,
}

/// 任务注册表：管道运行前注册完毕
#[derive(Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<&'static str, Task>,
}

impl TaskRegistry {
    pub fn register(
        &mut self,
        name: &'static str,
        dependencies: &[&'static str],
        action: TaskAction,
    ) {
        self.tasks.insert(
            name,
            Task {
                name,
                dependencies: dependencies.to_vec(),
                action,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }
}
