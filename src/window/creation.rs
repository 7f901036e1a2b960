use crate::*;
use crate::config::ShellConfig;

/// 创建主窗口（先隐藏，引擎首帧完成后再显示）
pub fn create_main_window(
    event_loop: &ActiveEventLoop,
    config: &ShellConfig,
) -> ShellResult<Rc<Window>> {
    let (x, y) = config.window_origin;
    let (width, height) = config.window_size;

    let window_attributes = Window::default_attributes()
        .with_title(config.window_title.as_str())
        .with_position(LogicalPosition::new(x, y))
        .with_inner_size(LogicalSize::new(width, height))
        .with_visible(false);

    let window = event_loop
        .create_window(window_attributes)
        .map_err(|e| ShellError::WindowCreation(e.to_string()))?;

    Ok(Rc::new(window))
}

/// 获取窗口的Windows句柄
#[cfg(windows)]
pub fn get_window_hwnd(window: &Window) -> Option<HWND> {
    if let Ok(handle) = window.window_handle() {
        if let RawWindowHandle::Win32(win32_handle) = handle.as_raw() {
            return Some(HWND(win32_handle.hwnd.get() as *mut _));
        }
    }
    None
}

impl super::WindowSurface for Window {
    fn show(&self) {
        self.set_visible(true);
        self.focus_window();
    }

    fn client_size(&self) -> (u32, u32) {
        let size = self.inner_size();
        (size.width, size.height)
    }
}
