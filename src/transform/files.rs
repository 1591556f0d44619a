use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::paths::to_slash;

/// 匹配到的源文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// 相对匹配模式基准目录的路径，输出时保留这一层目录结构
    pub relative: PathBuf,
}

impl SourceFile {
    pub fn relative_slash(&self) -> String {
        to_slash(&self.relative)
    }

    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default()
    }
}

/// 按模式声明顺序展开匹配，每个模式内部按路径排序，跨模式去重。
/// 不存在的文件或目录视为零匹配。
pub fn resolve(project_root: &Path, patterns: &[String]) -> Result<Vec<SourceFile>> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for pattern in patterns {
        let base = glob_base(pattern);
        let base_dir = project_root.join(base);

        if !has_wildcard(pattern) {
            let path = project_root.join(pattern);
            if path.is_file() && seen.insert(path.clone()) {
                let relative = path
                    .strip_prefix(&base_dir)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| PathBuf::from(path.file_name().unwrap_or_default()));
                files.push(SourceFile { path, relative });
            } else if !path.is_file() {
                tracing::debug!("未匹配到文件：{pattern}");
            }
            continue;
        }

        if !base_dir.is_dir() {
            tracing::debug!("匹配目录不存在，跳过：{}", base_dir.display());
            continue;
        }

        let mut matched = Vec::new();
        for entry in WalkDir::new(&base_dir).follow_links(true) {
            let entry = entry.with_context(|| format!("遍历目录失败：{}", base_dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Ok(rel_to_root) = path.strip_prefix(project_root) else {
                continue;
            };
            if glob_match::glob_match(pattern, &to_slash(rel_to_root)) {
                let relative = path.strip_prefix(&base_dir).unwrap_or(path).to_path_buf();
                matched.push(SourceFile {
                    path: path.to_path_buf(),
                    relative,
                });
            }
        }
        matched.sort_by(|a, b| a.relative.cmp(&b.relative));

        if matched.is_empty() {
            tracing::debug!("未匹配到文件：{pattern}");
        }
        for file in matched {
            if seen.insert(file.path.clone()) {
                files.push(file);
            }
        }
    }

    Ok(files)
}

/// 模式中第一个通配段之前的目录部分；不含通配符时为所在目录
pub fn glob_base(pattern: &str) -> &str {
    if !has_wildcard(pattern) {
        return match pattern.rfind('/') {
            Some(idx) => &pattern[..idx],
            None => "",
        };
    }
    let mut end = 0;
    for (idx, segment) in segment_spans(pattern) {
        if has_wildcard(segment) {
            break;
        }
        end = idx + segment.len();
    }
    &pattern[..end]
}

fn segment_spans(pattern: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    pattern.split('/').map(move |seg| {
        let start = offset;
        offset += seg.len() + 1;
        (start, seg)
    })
}

fn has_wildcard(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}

pub fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("读取文件失败：{}", path.display()))
}

pub fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("读取文件失败：{}", path.display()))
}

/// 写出文件，必要时创建父目录
pub fn write_output(path: &Path, data: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("创建目录失败：{}", parent.display()))?;
    }
    std::fs::write(path, data).with_context(|| format!("写入文件失败：{}", path.display()))?;
    tracing::debug!("已写出：{}", path.display());
    Ok(())
}

/// 按相对路径复制一组源文件到目标目录，返回写出的文件数
pub fn copy_into(files: &[SourceFile], dest_dir: &Path) -> Result<usize> {
    for file in files {
        let target = dest_dir.join(&file.relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&file.path, &target).with_context(|| {
            format!("复制文件失败：{} → {}", file.path.display(), target.display())
        })?;
        tracing::debug!("已复制资源: {}", file.path.display());
    }
    Ok(files.len())
}
