use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// 计算任意字节数据的 SHA-256 哈希（十六进制），截取前 `len` 位
pub fn content_hash(data: &[u8], len: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let hex = format!("{:x}", hasher.finalize());
    hex[..len.min(hex.len())].to_string()
}

/// `style.css` → `style.<hash>.min.css`
pub fn hashed_name(file_name: &str, hash: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}.{hash}.min.{ext}"),
        None => format!("{file_name}.{hash}.min"),
    }
}

/// 指纹清单：逻辑路径 → 带指纹的输出路径（均相对输出根目录）
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: BTreeMap<String, String>,
}

impl Manifest {
    pub fn insert(&mut self, logical: impl Into<String>, hashed: impl Into<String>) {
        self.entries.insert(logical.into(), hashed.into());
    }

    pub fn get(&self, logical: &str) -> Option<&str> {
        self.entries.get(logical).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
