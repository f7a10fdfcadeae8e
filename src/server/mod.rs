/// 本地 HTTP 服务
///
/// tiny_http 监听一个地址，固定数量的工作线程各自取请求，
/// 在共享的 Tokio 运行时上 `block_on` 执行异步的 dispatcher
use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tiny_http::{Header, Method, Request, Response, Server};
use url::Url;

use crate::config::ServerConfig;

pub mod assets;
pub mod dispatcher;

use dispatcher::{ApiResponse, Dispatcher};

/// 路由结果
#[derive(Debug)]
pub enum Route {
    Api(HashMap<String, String>),
    Asset(&'static assets::Asset),
    NotFound,
}

/// 解析请求 URL（tiny_http 只给出 path + query）
pub fn route(raw_url: &str) -> Result<Route> {
    let url = Url::parse(&format!("http://localhost{}", raw_url))
        .with_context(|| format!("无效的请求地址: {}", raw_url))?;

    match url.path() {
        // /api.php 保留给旧的前端路径
        "/api" | "/api.php" => Ok(Route::Api(url.query_pairs().into_owned().collect())),
        path => Ok(assets::lookup(path).map_or(Route::NotFound, Route::Asset)),
    }
}

/// 启动 HTTP 服务并阻塞直到收到 Ctrl+C
pub fn run(
    config: &ServerConfig,
    dispatcher: Arc<Dispatcher>,
    rt: tokio::runtime::Handle,
) -> Result<()> {
    let server = Server::http(&config.listen).map_err(|e| {
        anyhow::anyhow!("无法启动 HTTP 服务 {}（端口可能被占用）: {}", config.listen, e)
    })?;
    let server = Arc::new(server);

    let ui_url = format!("http://{}/", config.listen.replace("0.0.0.0", "127.0.0.1"));
    tracing::info!("🚀 NanoMail Web 已启动: {}", ui_url);

    if config.open_browser {
        if let Err(e) = webbrowser::open(&ui_url) {
            tracing::error!("无法打开浏览器: {}", e);
        }
    }

    let workers = config.workers.max(1);
    let shutting_down = Arc::new(AtomicBool::new(false));

    // Ctrl+C：标记退出并唤醒所有阻塞在 recv() 的工作线程
    {
        let server = server.clone();
        let shutting_down = shutting_down.clone();
        rt.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("收到 Ctrl+C，开始优雅关机...");
                shutting_down.store(true, Ordering::SeqCst);
                for _ in 0..workers {
                    server.unblock();
                }
            }
        });
    }

    let mut handles = Vec::with_capacity(workers);
    for index in 0..workers {
        let server = server.clone();
        let dispatcher = dispatcher.clone();
        let rt = rt.clone();
        let shutting_down = shutting_down.clone();

        let handle = std::thread::Builder::new()
            .name(format!("http-worker-{index}"))
            .spawn(move || worker_loop(&server, &dispatcher, &rt, &shutting_down))
            .context("创建工作线程失败")?;
        handles.push(handle);
    }
    tracing::debug!("已启动 {} 个工作线程", workers);

    for handle in handles {
        handle
            .join()
            .map_err(|_| anyhow::anyhow!("工作线程 panic"))?;
    }

    tracing::info!("HTTP 服务已停止");
    Ok(())
}

fn worker_loop(
    server: &Server,
    dispatcher: &Dispatcher,
    rt: &tokio::runtime::Handle,
    shutting_down: &AtomicBool,
) {
    loop {
        let request = match server.recv() {
            Ok(request) => request,
            Err(e) => {
                if shutting_down.load(Ordering::SeqCst) {
                    break;
                }
                tracing::warn!("接收请求失败: {}", e);
                continue;
            }
        };

        if let Err(e) = handle_request(request, dispatcher, rt) {
            tracing::error!("处理请求失败: {:#}", e);
        }
    }
}

fn handle_request(
    request: Request,
    dispatcher: &Dispatcher,
    rt: &tokio::runtime::Handle,
) -> Result<()> {
    tracing::debug!("收到请求: {} {}", request.method(), request.url());

    if *request.method() != Method::Get {
        return respond_json(request, 405, &json!({ "error": "Method not allowed" }));
    }

    let route = match route(request.url()) {
        Ok(route) => route,
        Err(e) => {
            tracing::warn!("{:#}", e);
            return respond_json(request, 400, &json!({ "error": "Bad request" }));
        }
    };

    match route {
        Route::Api(params) => match rt.block_on(dispatcher.dispatch(&params)) {
            ApiResponse::Json { status, body } => respond_json(request, status, &body),
            ApiResponse::Redirect { location } => respond_redirect(request, &location),
        },
        Route::Asset(asset) => {
            let response = Response::from_string(asset.body)
                .with_header(header("Content-Type", asset.content_type)?);
            request.respond(response)?;
            Ok(())
        }
        Route::NotFound => respond_json(request, 404, &json!({ "error": "Not found" })),
    }
}

fn header(name: &str, value: &str) -> Result<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes())
        .map_err(|_| anyhow::anyhow!("无效的响应头: {}: {}", name, value))
}

fn respond_json(request: Request, status: u16, body: &Value) -> Result<()> {
    let response = Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(header("Content-Type", "application/json; charset=utf-8")?)
        .with_header(header("Cache-Control", "no-store")?);
    request.respond(response)?;
    Ok(())
}

fn respond_redirect(request: Request, location: &str) -> Result<()> {
    let response = Response::empty(302).with_header(header("Location", location)?);
    request.respond(response)?;
    Ok(())
}
