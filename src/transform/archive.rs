use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

use crate::paths::to_slash;

/// 将目录完整打包为 zip：条目按路径排序、使用固定时间戳，相同目录得到相同归档
pub fn zip_dir(src_dir: &Path, archive_path: &Path) -> Result<usize> {
    if let Some(parent) = archive_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(archive_path)
        .with_context(|| format!("创建归档失败：{}", archive_path.display()))?;
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    let mut files = 0;
    for entry in WalkDir::new(src_dir).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("遍历目录失败：{}", src_dir.display()))?;
        let path = entry.path();
        // 归档位于输出目录内时不能把自己打进去
        if path == archive_path {
            continue;
        }
        let name = to_slash(path.strip_prefix(src_dir).unwrap_or(path));

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{name}/"), options)
                .with_context(|| format!("写入归档目录失败：{name}"))?;
            continue;
        }

        zip.start_file(name.as_str(), options)
            .with_context(|| format!("写入归档条目失败：{name}"))?;
        let data = std::fs::read(path)
            .with_context(|| format!("读取文件失败：{}", path.display()))?;
        zip.write_all(&data)?;
        files += 1;
    }

    zip.finish().context("完成归档失败")?;
    Ok(files)
}
