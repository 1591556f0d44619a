use crate::build::events::BuildEvent;
use crate::config::GhostMode;
use serde::{Deserialize, Serialize};

pub const WS_PATH: &str = "/__assetpipe/ws";
pub const CLIENT_PATH: &str = "/__assetpipe/client.js";

/// 服务端推送给浏览器的消息
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum DevEvent {
    /// 重建完成；`css_only` 时浏览器只替换样式表，不刷新页面
    Reload { paths: Vec<String>, css_only: bool },
    BuildFailed { error: String },
    Progress { event: BuildEvent },
    /// 其他浏览器上的交互，`origin` 为来源连接编号
    Ghost { origin: u64, event: GhostEvent },
}

/// 浏览器之间同步的交互事件（浏览器 → 服务端 → 其他浏览器）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GhostEvent {
    Click {
        selector: String,
    },
    Form {
        selector: String,
        #[serde(default)]
        value: String,
        #[serde(default)]
        checked: Option<bool>,
    },
    /// 滚动位置按页面高度的比例传递，适配不同尺寸的窗口
    Scroll {
        x: f64,
        y: f64,
    },
}

impl GhostEvent {
    pub fn allowed(&self, mode: &GhostMode) -> bool {
        match self {
            GhostEvent::Click { .. } => mode.clicks,
            GhostEvent::Form { .. } => mode.forms,
            GhostEvent::Scroll { .. } => mode.scroll,
        }
    }
}

/// 注入到页面中的客户端脚本标签
pub fn client_snippet(notify: bool) -> String {
    format!(
        "<script>window.__ASSETPIPE__={{ws:\"{WS_PATH}\",notify:{notify}}};</script>\
         <script src=\"{CLIENT_PATH}\" async></script>"
    )
}

/// 在最后一个 `</body>` 之前插入脚本；没有 body 时追加到末尾
pub fn inject_client(html: &str, snippet: &str) -> String {
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + snippet.len());
            out.push_str(&html[..pos]);
            out.push_str(snippet);
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{html}{snippet}"),
    }
}
