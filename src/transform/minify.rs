//! 保守的压缩实现：只删除注释和多余空白，不改写标识符与语法结构。

/// CSS：删除普通注释（保留 `/*! */`），折叠空白，去掉块末尾多余的分号
pub fn css(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut pending_space = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '/' && chars.get(i + 1) == Some(&'*') {
            let end = find_seq(&chars, i + 2, &['*', '/']).map_or(chars.len(), |e| e + 2);
            if chars.get(i + 2) == Some(&'!') {
                flush_css_space(&mut out, &mut pending_space, c);
                out.extend(&chars[i..end]);
            }
            i = end;
            continue;
        }

        if c == '"' || c == '\'' {
            flush_css_space(&mut out, &mut pending_space, c);
            let end = string_end(&chars, i, c);
            out.extend(&chars[i..end]);
            i = end;
            continue;
        }

        if c.is_whitespace() {
            pending_space = true;
            i += 1;
            continue;
        }

        if c == '}' && out.ends_with(';') {
            out.pop();
        }
        flush_css_space(&mut out, &mut pending_space, c);
        out.push(c);
        i += 1;
    }

    out
}

fn flush_css_space(out: &mut String, pending: &mut bool, next: char) {
    if *pending
        && !out.is_empty()
        && !out.ends_with(['{', '}', ';', ',', ':'])
        && !matches!(next, '{' | '}' | ';' | ',')
    {
        out.push(' ');
    }
    *pending = false;
}

/// JS：删除注释（保留 `/*! */`），去掉行首尾与空行，保留换行以免影响自动分号插入
pub fn js(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut pending_space = false;
    let mut pending_newline = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match c {
            '/' if next == Some('/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if next == Some('*') => {
                let end = find_seq(&chars, i + 2, &['*', '/']).map_or(chars.len(), |e| e + 2);
                if chars.get(i + 2) == Some(&'!') {
                    flush_js_space(&mut out, &mut pending_space, &mut pending_newline);
                    out.extend(&chars[i..end]);
                } else if chars[i..end].contains(&'\n') {
                    pending_newline = true;
                } else {
                    pending_space = true;
                }
                i = end;
            }
            '/' if regex_allowed(&out) => {
                flush_js_space(&mut out, &mut pending_space, &mut pending_newline);
                let end = regex_end(&chars, i);
                out.extend(&chars[i..end]);
                i = end;
            }
            '"' | '\'' | '`' => {
                flush_js_space(&mut out, &mut pending_space, &mut pending_newline);
                let end = string_end(&chars, i, c);
                out.extend(&chars[i..end]);
                i = end;
            }
            '\n' | '\r' => {
                pending_newline = true;
                i += 1;
            }
            c if c.is_whitespace() => {
                pending_space = true;
                i += 1;
            }
            _ => {
                flush_js_space(&mut out, &mut pending_space, &mut pending_newline);
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

fn flush_js_space(out: &mut String, pending_space: &mut bool, pending_newline: &mut bool) {
    if !out.is_empty() {
        if *pending_newline {
            out.push('\n');
        } else if *pending_space {
            out.push(' ');
        }
    }
    *pending_space = false;
    *pending_newline = false;
}

const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

/// 判断当前位置的 `/` 是正则字面量开头还是除号
fn regex_allowed(out: &str) -> bool {
    let trimmed = out.trim_end();
    let Some(last) = trimmed.chars().last() else {
        return true;
    };
    if "(,=:[!&|?{};+-*%<>~^".contains(last) {
        return true;
    }
    if last.is_alphanumeric() || last == '_' || last == '$' {
        let word: String = trimmed
            .chars()
            .rev()
            .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        return REGEX_PRECEDING_KEYWORDS.contains(&word.as_str());
    }
    false
}

fn regex_end(chars: &[char], start: usize) -> usize {
    let mut i = start + 1;
    let mut in_class = false;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '[' => in_class = true,
            ']' => in_class = false,
            '/' if !in_class => return i + 1,
            '\n' => return i,
            _ => {}
        }
        i += 1;
    }
    chars.len()
}

/// 字符串字面量结束位置（含结束引号），处理转义
fn string_end(chars: &[char], start: usize, quote: char) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}

fn find_seq(chars: &[char], from: usize, seq: &[char]) -> Option<usize> {
    if from >= chars.len() {
        return None;
    }
    chars[from..]
        .windows(seq.len())
        .position(|w| w == seq)
        .map(|p| p + from)
}

const RAW_TAGS: &[&str] = &["pre", "textarea", "script", "style"];

/// HTML：删除注释（保留条件注释），折叠空白；pre/textarea/script/style 内容原样保留
pub fn html(source: &str) -> String {
    let lower = source.to_ascii_lowercase();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;

    while i < source.len() {
        let rest = &source[i..];

        if rest.starts_with("<!--") {
            let end = source[i + 4..]
                .find("-->")
                .map_or(source.len(), |e| i + 4 + e + 3);
            if rest.starts_with("<!--[if") {
                out.push_str(&source[i..end]);
            }
            i = end;
            continue;
        }

        if let Some(tag) = raw_tag_at(&lower[i..]) {
            let closing = format!("</{tag}");
            let end = lower[i..]
                .find(&closing)
                .and_then(|c| lower[i + c..].find('>').map(|g| i + c + g + 1))
                .unwrap_or(source.len());
            out.push_str(&source[i..end]);
            i = end;
            continue;
        }

        let Some(c) = rest.chars().next() else {
            break;
        };

        if c.is_whitespace() {
            let run_len = rest
                .char_indices()
                .find(|(_, ch)| !ch.is_whitespace())
                .map_or(rest.len(), |(idx, _)| idx);
            let run = &rest[..run_len];
            let after = &rest[run_len..];
            let between_tags = out.ends_with('>') && after.starts_with('<');
            if !(run.contains('\n') && between_tags) && !out.is_empty() && !after.is_empty() {
                out.push(' ');
            }
            i += run_len;
            continue;
        }

        out.push(c);
        i += c.len_utf8();
    }

    out
}

fn raw_tag_at(lower_rest: &str) -> Option<&'static str> {
    RAW_TAGS.iter().copied().find(|tag| {
        lower_rest.starts_with('<')
            && lower_rest[1..].starts_with(tag)
            && lower_rest[1 + tag.len()..]
                .chars()
                .next()
                .is_some_and(|c| c == '>' || c == '/' || c.is_whitespace())
    })
}
