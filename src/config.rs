use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ShellResult;

/// 宿主程序配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// 单实例互斥锁名称
    pub lock_name: String,
    /// 主窗口标题（第二实例按此查找主窗口）
    pub window_title: String,
    /// 窗口初始位置（逻辑像素）
    pub window_origin: (i32, i32),
    /// 窗口初始大小（逻辑像素）
    pub window_size: (u32, u32),
    /// 参数方法通道名称
    pub args_channel: String,
    /// 文件事件通道名称
    pub file_handler_channel: String,
    /// WM_COPYDATA 消息标识
    pub handoff_tag: usize,
    /// 引擎资源目录
    pub assets_path: String,
    /// 启动时是否附加到父进程控制台
    pub attach_console: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            lock_name: "NimbusAppMutex".to_string(),
            window_title: "Nimbus".to_string(),
            window_origin: (10, 10),
            window_size: (1280, 720),
            args_channel: "com.nimbus/args".to_string(),
            file_handler_channel: "com.nimbus/file_handler".to_string(),
            handoff_tag: 1,
            assets_path: "data".to_string(),
            attach_console: true,
        }
    }
}

impl ShellConfig {
    /// 默认配置文件路径
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push("nimbus");
            path.push("shell.json");
            path
        })
    }

    /// 从默认位置加载配置，文件不存在时使用默认值
    pub fn load() -> ShellResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// 从指定文件加载配置
    pub fn load_from(path: &Path) -> ShellResult<Self> {
        if !path.exists() {
            debug!("配置文件不存在，使用默认配置: {:?}", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: ShellConfig = serde_json::from_str(&content)?;
        debug!("已加载配置文件: {:?}", path);
        Ok(config)
    }
}
