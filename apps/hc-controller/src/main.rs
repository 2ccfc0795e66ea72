//! 家庭自动化控制器进程。

mod assembly;

use hc_config::AppConfig;
use hc_telemetry::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    let controller = assembly::assemble(&config).await?;

    tokio::signal::ctrl_c().await?;
    info!(target: "hc.controller", "shutdown_requested");
    controller.shutdown().await;
    Ok(())
}
