pub mod errors;
pub mod config;
pub mod logging;
pub mod args;
pub mod instance;
pub mod handoff;
pub mod engine;
pub mod bridge;
pub mod window;
pub mod startup;
pub mod console;
pub mod app;

// 导出主要的公共类型
pub use errors::{ShellError, ShellResult};
pub use config::ShellConfig;
pub use args::{CommandLine, LaunchArgument};
pub use startup::{Launch, PrimaryLaunch};
pub use window::{HostMessage, ShellWindow, WindowHandler};
pub use app::App;

// 重新导出常用的 Windows API 类型
#[cfg(windows)]
pub use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};

// 重新导出 winit 相关类型
pub use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::{Window, WindowId},
    dpi::{LogicalPosition, LogicalSize},
    raw_window_handle::{HasWindowHandle, RawWindowHandle},
};

// 重新导出其他常用类型
pub use softbuffer::{Context, Surface};
pub use std::{rc::Rc, num::NonZeroU32};
