use serde::Serialize;

/// 待拼接的一段源码
pub struct Piece {
    /// 相对基准目录的源文件路径，写入 source map 的 sources
    pub source: String,
    /// 原始内容，写入 sourcesContent
    pub original: String,
    /// 经过前置处理（如补前缀）后的内容，行结构与原始内容一致
    pub code: String,
}

/// Source Map v3
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u8,
    pub file: String,
    pub source_root: String,
    pub sources: Vec<String>,
    pub sources_content: Vec<String>,
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// 以换行拼接
pub fn concat<'a>(contents: impl IntoIterator<Item = &'a str>) -> String {
    contents.into_iter().collect::<Vec<_>>().join("\n")
}

/// 拼接并生成行级 source map：每个输出行映射到对应源文件的同一行第 0 列
pub fn concat_with_map(file: &str, pieces: &[Piece]) -> (String, SourceMap) {
    let code = concat(pieces.iter().map(|p| p.code.as_str()));

    let mut mappings = String::new();
    let mut prev_source: i64 = 0;
    let mut prev_line: i64 = 0;
    let mut first = true;

    for (source_idx, piece) in pieces.iter().enumerate() {
        let line_count = piece.code.split('\n').count();
        for line in 0..line_count {
            if !first {
                mappings.push(';');
            }
            first = false;
            // [生成列, 源索引, 源行, 源列]，除生成列外均为相对上一段的增量
            encode_vlq(&mut mappings, 0);
            encode_vlq(&mut mappings, source_idx as i64 - prev_source);
            encode_vlq(&mut mappings, line as i64 - prev_line);
            encode_vlq(&mut mappings, 0);
            prev_source = source_idx as i64;
            prev_line = line as i64;
        }
    }

    let map = SourceMap {
        version: 3,
        file: file.to_string(),
        source_root: "/source/".to_string(),
        sources: pieces.iter().map(|p| p.source.clone()).collect(),
        sources_content: pieces.iter().map(|p| p.original.clone()).collect(),
        names: Vec::new(),
        mappings,
    };
    (code, map)
}

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn encode_vlq(out: &mut String, value: i64) {
    let mut vlq = if value < 0 { ((-value) << 1) | 1 } else { value << 1 };
    loop {
        let mut digit = (vlq & 0b11111) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b100000;
        }
        out.push(BASE64[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}
