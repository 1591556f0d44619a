use regex::Regex;
use std::sync::LazyLock;

use crate::build::fingerprint::Manifest;

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(href|src)(\s*=\s*)(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// 将 href/src 中指向清单内资源的引用替换为带指纹的路径，返回新 HTML 与替换次数
pub fn rewrite_references(html: &str, manifest: &Manifest) -> (String, usize) {
    let mut count = 0;
    let out = ATTR_RE.replace_all(html, |caps: &regex::Captures| {
        let attr = &caps[1];
        let eq = &caps[2];
        let (value, quote) = match (caps.get(3), caps.get(4)) {
            (Some(v), _) => (v.as_str(), '"'),
            (None, Some(v)) => (v.as_str(), '\''),
            (None, None) => ("", '"'),
        };
        match rewrite_url(value, manifest) {
            Some(rewritten) => {
                count += 1;
                format!("{attr}{eq}{quote}{rewritten}{quote}")
            }
            None => caps[0].to_string(),
        }
    });
    (out.into_owned(), count)
}

/// 保留前缀（`./`、`../`、`/`）与查询串、片段，只替换路径主体
fn rewrite_url(url: &str, manifest: &Manifest) -> Option<String> {
    if url.contains("://") || url.starts_with("//") || url.starts_with("data:") {
        return None;
    }
    let split = url.find(['?', '#']).unwrap_or(url.len());
    let (path, suffix) = url.split_at(split);

    let mut key = path;
    loop {
        if let Some(rest) = key.strip_prefix("./") {
            key = rest;
        } else if let Some(rest) = key.strip_prefix("../") {
            key = rest;
        } else {
            break;
        }
    }
    let key = key.trim_start_matches('/');
    let prefix = &path[..path.len() - key.len()];

    manifest
        .get(key)
        .map(|hashed| format!("{prefix}{hashed}{suffix}"))
}

/// 提取所有本地 href/src 引用（不含查询串与片段），供校验使用
pub fn local_references(html: &str) -> Vec<String> {
    ATTR_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(3).or_else(|| caps.get(4)).map(|m| m.as_str().to_string()))
        .filter(|url| {
            !url.is_empty()
                && !url.contains("://")
                && !url.starts_with("//")
                && !url.starts_with('#')
                && !url.starts_with("data:")
                && !url.starts_with("mailto:")
        })
        .map(|url| {
            let end = url.find(['?', '#']).unwrap_or(url.len());
            url[..end].to_string()
        })
        .collect()
}
