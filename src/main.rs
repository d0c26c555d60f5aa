use axum::{extract::DefaultBodyLimit, routing::get, Json, Router};
use file_station_rust::{
    config::{AppConfig, LogConfig},
    logging,
    server::handlers,
    AppState,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::info;

/// 配置文件路径
const CONFIG_PATH: &str = "config/app.toml";

/// 加载日志配置
///
/// 日志系统要先于完整配置初始化，这里只读取配置文件中的 [log] 表，
/// 失败时返回默认配置
async fn load_log_config() -> LogConfig {
    if let Ok(content) = tokio::fs::read_to_string(CONFIG_PATH).await {
        if let Ok(config) = toml::from_str::<toml::Value>(&content) {
            if let Some(log_table) = config.get("log") {
                if let Ok(log_config) = log_table.clone().try_into::<LogConfig>() {
                    return log_config;
                }
            }
        }
    }

    LogConfig::default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 先尝试加载日志配置，失败时使用默认配置
    let log_config = load_log_config().await;

    // 初始化日志系统（必须保持 _log_guard 存活）
    let _log_guard = logging::init_logging(&log_config);

    info!("File Station v0.1.0 启动中...");

    // 加载应用配置
    let config = AppConfig::load_or_default(CONFIG_PATH).await;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let static_dir = config.server.static_dir.clone();

    // 创建应用状态（根目录结构随之就绪）
    let app_state = AppState::new(config)?;
    info!("共享根目录: {:?}", app_state.storage.root());

    // 配置中间件层
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http()) // HTTP 请求日志
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // API 路由
    let api_routes = Router::new()
        .route(
            "/file",
            get(handlers::get_file)
                .post(handlers::upload_file)
                .put(handlers::move_file)
                .delete(handlers::delete_file)
                // 上传大小不设上限
                .layer(DefaultBodyLimit::disable()),
        )
        .with_state(app_state.clone());

    // 健康检查响应结构
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
        service: String,
    }

    // 健康检查处理器
    async fn health_check() -> Json<HealthResponse> {
        Json(HealthResponse {
            status: "ok".to_string(),
            service: "file-station-rust".to_string(),
        })
    }

    // 构建完整应用
    let mut app = Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check));

    // 可选的前端静态资源
    if let Some(dir) = static_dir {
        let index_html_path = dir.join("index.html");
        app = app
            .fallback_service(ServeDir::new(&dir).not_found_service(ServeFile::new(&index_html_path)));
        info!("前端静态资源目录: {:?}", dir);
    }

    let app = app.layer(middleware);

    // 启动服务器
    info!("服务器启动在: http://{}", addr);
    info!("API 基础路径: http://{}/api/v1", addr);
    info!("健康检查: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    // 监听关闭信号，支持优雅关闭
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("服务器错误: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("收到 Ctrl+C，开始优雅关闭...");
        }
    }

    info!("应用已安全退出");

    Ok(())
}
