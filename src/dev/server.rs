use crate::config::OpenBrowser;
use crate::dev::livereload::{self, DevEvent, GhostEvent, CLIENT_PATH, WS_PATH};
use crate::dev::state::DevState;
use anyhow::Result;
use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::{HeaderValue, Request, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use std::net::IpAddr;
use std::sync::atomic::Ordering;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::services::ServeDir;

const CLIENT_JS: &str = include_str!("client.js");

/// 预览服务路由：输出目录静态文件 + 实时刷新端点
pub fn router(state: DevState) -> Router {
    let static_files = ServeDir::new(state.paths.output_root());

    Router::new()
        .route(WS_PATH, get(ws_handler))
        .route(CLIENT_PATH, get(client_js))
        .fallback_service(static_files)
        .layer(middleware::from_fn_with_state(state.clone(), inject_livereload))
        .with_state(state)
}

/// 绑定监听地址；端口被占用时尽量给出占用进程
pub async fn bind(host: &str, port: u16) -> Result<TcpListener> {
    let addr = format!("{host}:{port}");
    match TcpListener::bind(&addr).await {
        Ok(l) => Ok(l),
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            if let Some(info) = port_owner(port) {
                tracing::error!("端口 {port} 已被占用：{info}");
            } else {
                tracing::error!("端口 {port} 已被占用");
            }
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn serve(state: DevState, listener: TcpListener) -> Result<()> {
    let port = listener.local_addr()?.port();
    let local = format!("http://localhost:{port}");
    tracing::info!("预览服务启动：{local}");
    let external = local_ip().map(|ip| format!("http://{ip}:{port}"));
    if let Some(ref url) = external {
        tracing::info!("局域网访问：{url}");
    }

    match state.config.server.open {
        OpenBrowser::Local => open_browser(&local),
        OpenBrowser::External => open_browser(external.as_deref().unwrap_or(&local)),
        OpenBrowser::Disabled => {}
    }

    let token = state.shutdown.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;
    tracing::info!("预览服务已停止");
    Ok(())
}

/// 为 HTML 响应注入实时刷新脚本，并禁止浏览器缓存
async fn inject_livereload(
    State(state): State<DevState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    if !is_html || response.status() != StatusCode::OK {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!("读取页面内容失败：{e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let html = String::from_utf8_lossy(&bytes);
    let snippet = livereload::client_snippet(state.config.server.notify);
    let injected = livereload::inject_client(&html, &snippet);
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(injected))
}

async fn client_js() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        CLIENT_JS,
    )
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<DevState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: DevState) {
    let id = state.next_client_id.fetch_add(1, Ordering::Relaxed);
    let total = state.clients.fetch_add(1, Ordering::Relaxed) + 1;
    let log_connections = state.config.server.log_connections;
    if log_connections {
        tracing::info!("浏览器已连接 #{id}（当前 {total} 个）");
    }

    let mut rx = state.events.subscribe();
    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,
            event = rx.recv() => match event {
                Ok(DevEvent::Ghost { origin, .. }) if origin == id => {}
                Ok(event) => {
                    let json = serde_json::to_string(&event).unwrap_or_default();
                    if socket.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!("浏览器 #{id} 落后 {n} 条消息");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Text(text))) => relay_ghost(&state, id, text.as_str()),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    let remaining = state.clients.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
    if log_connections {
        tracing::info!("浏览器已断开 #{id}（剩余 {remaining} 个）");
    }
}

/// 把一个浏览器上的交互转发给其他浏览器
fn relay_ghost(state: &DevState, origin: u64, text: &str) {
    let event: GhostEvent = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(e) => {
            tracing::debug!("忽略无法识别的客户端消息：{e}");
            return;
        }
    };
    if event.allowed(&state.config.server.ghost_mode) {
        state.broadcast(DevEvent::Ghost { origin, event });
    }
}

fn open_browser(url: &str) {
    let result = if cfg!(target_os = "macos") {
        std::process::Command::new("open").arg(url).spawn()
    } else if cfg!(target_os = "windows") {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", url])
            .spawn()
    } else {
        std::process::Command::new("xdg-open").arg(url).spawn()
    };
    if let Err(e) = result {
        tracing::warn!("无法打开浏览器：{e}");
    }
}

/// 本机局域网地址（只查询路由，不发送数据）
fn local_ip() -> Option<IpAddr> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|a| a.ip())
}

/// 占用端口的进程，形如 `PID 123 (node)`；依赖 /proc，仅 Linux 可用
fn port_owner(port: u16) -> Option<String> {
    let inode = ["/proc/net/tcp", "/proc/net/tcp6"]
        .iter()
        .filter_map(|table| std::fs::read_to_string(table).ok())
        .find_map(|table| listening_inode(&table, port))?;
    let target = format!("socket:[{inode}]");

    std::fs::read_dir("/proc")
        .ok()?
        .flatten()
        .filter(|entry| {
            let name = entry.file_name();
            name.to_string_lossy().bytes().all(|b| b.is_ascii_digit())
        })
        .find(|entry| {
            std::fs::read_dir(entry.path().join("fd")).is_ok_and(|mut fds| {
                fds.any(|fd| {
                    fd.and_then(|fd| std::fs::read_link(fd.path()))
                        .is_ok_and(|link| link.as_os_str() == target.as_str())
                })
            })
        })
        .map(|entry| {
            let comm = std::fs::read_to_string(entry.path().join("comm")).unwrap_or_default();
            format!("PID {} ({})", entry.file_name().to_string_lossy(), comm.trim())
        })
}

/// 在 /proc/net/tcp 格式的表中查找监听（状态 0A）指定端口的 socket inode
fn listening_inode(table: &str, port: u16) -> Option<String> {
    let port_hex = format!("{port:04X}");
    table.lines().skip(1).find_map(|line| {
        let cols: Vec<&str> = line.split_whitespace().collect();
        let (local, state, inode) = (cols.get(1)?, cols.get(3)?, cols.get(9)?);
        let listening = *state == "0A" && local.rsplit(':').next() == Some(port_hex.as_str());
        listening.then(|| inode.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use crate::paths::PathRegistry;
    use std::fs;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn app() -> (TempDir, Router) {
        let dir = TempDir::new().unwrap();
        let dist = dir.path().join("dist");
        fs::create_dir_all(dist.join("css")).unwrap();
        fs::write(dist.join("index.html"), "<html><body><p>hi</p></body></html>").unwrap();
        fs::write(dist.join("css/style.css"), ".a{color:red}").unwrap();

        let config = ProjectConfig::default();
        let paths = PathRegistry::from_config(dir.path(), &config);
        (dir, router(DevState::new(config, paths)))
    }

    async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn html_gets_client_injected() {
        let (_dir, app) = app();
        let (status, body) = get_text(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(CLIENT_PATH));
        assert!(body.ends_with("</body></html>"));
    }

    #[tokio::test]
    async fn other_assets_pass_through() {
        let (_dir, app) = app();
        let (status, body) = get_text(app, "/css/style.css").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, ".a{color:red}");
    }

    #[tokio::test]
    async fn serves_client_script() {
        let (_dir, app) = app();
        let (status, body) = get_text(app, CLIENT_PATH).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("WebSocket"));
    }

    #[tokio::test]
    async fn missing_file_is_404() {
        let (_dir, app) = app();
        let (status, _) = get_text(app, "/nope.html").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn finds_listening_socket_inode() {
        let table = "\
  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 0100007F:0BB8 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 4242 1
   1: 0100007F:1F90 0100007F:9C40 01 00000000:00000000 00:00000000 00000000  1000        0 5151 1
   2: 00000000:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 6363 1
";
        assert_eq!(listening_inode(table, 3000).as_deref(), Some("4242"));
        assert_eq!(listening_inode(table, 8080).as_deref(), Some("6363"));
        assert_eq!(listening_inode(table, 9000), None);
    }

    #[tokio::test]
    async fn ghost_relay_respects_flags() {
        let dir = TempDir::new().unwrap();
        let config = ProjectConfig::parse("[server.ghost_mode]\nclicks = false\n").unwrap();
        let paths = PathRegistry::from_config(dir.path(), &config);
        let state = DevState::new(config, paths);
        let mut rx = state.events.subscribe();

        relay_ghost(&state, 1, r#"{"kind":"click","selector":"a"}"#);
        relay_ghost(&state, 1, "not json");
        relay_ghost(&state, 1, r#"{"kind":"scroll","x":0,"y":0.25}"#);

        match rx.recv().await.unwrap() {
            DevEvent::Ghost { origin, event } => {
                assert_eq!(origin, 1);
                assert_eq!(event, GhostEvent::Scroll { x: 0.0, y: 0.25 });
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }
}
