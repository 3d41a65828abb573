#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use keygate_rs::{
    auth::{AdminSecret, KeyManager, UsageRecorder, UsageReporter},
    cartoon::{ImageTransformer, RemoteCartoonifier},
    config::Settings,
    storage,
    utils::logger,
    AppContext,
};

#[tokio::main]
async fn main() -> Result<()> {
    keygate_rs::init_env();
    let settings = Settings::from_env()?;

    // 初始化日志系统
    let _guard = logger::init(settings.log_dir.clone())?;
    // 创建必要的目录
    settings.ensure_data_dir()?;

    info!("Starting keygate service ({})...", env!("GIT_HASH"));

    // 初始化 storage
    info!("Initializing Credential Store...");
    let store = storage::connect(&settings.database, settings.default_horizon()?).await?;

    // 使用量统计在后台写入
    let (usage, usage_worker) = UsageRecorder::spawn(store.clone(), settings.usage_queue_capacity);

    // 初始化认证管理器
    info!("Initializing Key Manager...");
    let keys = KeyManager::new(store.clone(), usage);
    let reporter = UsageReporter::new(store);
    let admin_secret = AdminSecret::from_config(settings.admin_secret.clone());

    let transformer: Option<Arc<dyn ImageTransformer>> = match &settings.cartoonifier_url {
        Some(url) => {
            let cartoonifier: Arc<dyn ImageTransformer> = Arc::new(RemoteCartoonifier::new(url.clone())?);
            Some(cartoonifier)
        }
        None => None,
    };

    // 创建应用上下文
    let ctx = Arc::new(AppContext {
        keys: Arc::new(keys),
        reporter: Arc::new(reporter),
        admin_secret,
        transformer,
        hide_admin_docs: settings.hide_admin_docs,
        max_image_bytes: settings.max_image_bytes,
    });

    info!("Starting HTTP server at http://{}", settings.bind_addr);

    // 启动 HTTP 服务器
    match keygate_rs::web::start_server(ctx.clone(), settings.bind_addr).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            tracing::error!("Server error: {}", e);
            return Err(e);
        }
    }

    // 优雅关闭: 释放 recorder 后等待队列写完
    info!("Shutting down...");
    drop(ctx);
    if tokio::time::timeout(Duration::from_secs(5), usage_worker).await.is_err() {
        warn!("Usage worker did not drain in time, pending usage updates are dropped");
    }

    Ok(())
}
