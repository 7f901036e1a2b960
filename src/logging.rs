use tracing_subscriber::EnvFilter;

/// 日志过滤环境变量
pub const LOG_ENV: &str = "NIMBUS_LOG";

/// 默认日志级别
fn default_directive() -> &'static str {
    if cfg!(debug_assertions) {
        "info,nimbus_shell=debug"
    } else {
        "info"
    }
}

/// 初始化日志（重复初始化时静默忽略）
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
