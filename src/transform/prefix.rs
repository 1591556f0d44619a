use regex::Regex;
use std::sync::LazyLock;

/// 需要补充浏览器前缀的属性
const PREFIXED_PROPERTIES: &[(&str, &[&str])] = &[
    ("user-select", &["-webkit-", "-moz-", "-ms-"]),
    ("appearance", &["-webkit-", "-moz-"]),
    ("backdrop-filter", &["-webkit-"]),
    ("text-size-adjust", &["-webkit-", "-moz-", "-ms-"]),
    ("hyphens", &["-webkit-", "-ms-"]),
    ("tab-size", &["-moz-"]),
    ("mask-image", &["-webkit-"]),
    ("box-decoration-break", &["-webkit-"]),
];

static DECL_RE: LazyLock<Regex> = LazyLock::new(|| {
    let names: Vec<&str> = PREFIXED_PROPERTIES.iter().map(|(name, _)| *name).collect();
    Regex::new(&format!(
        r"(?m)(^|[{{;\s])(({})\s*:[^;{{}}\n]*)",
        names.join("|")
    ))
    .unwrap()
});

static STICKY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(^|[{;\s])(position\s*:\s*)sticky\b").unwrap());

/// 为声明补充浏览器前缀，插入在标准声明之前且不换行，保持行号不变
pub fn apply(css: &str) -> String {
    let prefixed = DECL_RE.replace_all(css, |caps: &regex::Captures| {
        let lead = &caps[1];
        let decl = caps[2].trim_end();
        let trailing = &caps[2][decl.len()..];
        let property = &caps[3];
        let block = enclosing_block(css, caps.get(0).map_or(0, |m| m.start()));

        let mut out = String::from(lead);
        for prefix in prefixes_for(property) {
            if block.contains(&format!("{prefix}{property}")) {
                continue;
            }
            out.push_str(prefix);
            out.push_str(decl);
            out.push_str("; ");
        }
        out.push_str(decl);
        out.push_str(trailing);
        out
    });

    STICKY_RE
        .replace_all(&prefixed, |caps: &regex::Captures| {
            let start = caps.get(0).map_or(0, |m| m.start());
            if enclosing_block(&prefixed, start).contains("-webkit-sticky") {
                return caps[0].to_string();
            }
            format!("{}{}-webkit-sticky; {}sticky", &caps[1], &caps[2], &caps[2])
        })
        .into_owned()
}

/// 包含 `pos` 的声明块（两侧花括号之间的文本）
fn enclosing_block(css: &str, pos: usize) -> &str {
    let start = css[..pos].rfind(['{', '}']).map_or(0, |i| i + 1);
    let end = css[pos..].find('}').map_or(css.len(), |i| pos + i);
    &css[start..end]
}

fn prefixes_for(property: &str) -> &'static [&'static str] {
    PREFIXED_PROPERTIES
        .iter()
        .find(|(name, _)| *name == property)
        .map(|(_, prefixes)| *prefixes)
        .unwrap_or(&[])
}
