use thiserror::Error;

/// 宿主程序错误类型
#[derive(Error, Debug)]
pub enum ShellError {
    #[error("创建单实例锁失败: {0}")]
    LockCreation(String),

    #[error("创建窗口失败: {0}")]
    WindowCreation(String),

    #[error("引擎启动失败: {0}")]
    EngineStart(String),

    #[error("事件循环失败: {0}")]
    EventLoop(String),

    #[error("读取配置失败: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("配置解析失败: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

/// 宿主程序结果类型
pub type ShellResult<T> = Result<T, ShellError>;
