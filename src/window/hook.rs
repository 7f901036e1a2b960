use crate::*;
use super::{HostMessage, get_window_hwnd};
use tracing::{debug, warn};
use windows::Win32::System::DataExchange::COPYDATASTRUCT;
use windows::Win32::UI::Shell::{DefSubclassProc, RemoveWindowSubclass, SetWindowSubclass};
use windows::Win32::UI::WindowsAndMessaging::{WM_COPYDATA, WM_FONTCHANGE, WM_NCDESTROY};

/// 子类化标识
const HOOK_ID: usize = 0x4E42;

/// 收到原生消息后的去处，返回 false 表示已无法投递
type MessageSink = Box<dyn Fn(HostMessage) -> bool>;

/// 挂在主窗口上的状态（窗口销毁时释放）
struct HookState {
    sink: MessageSink,
}

/// 子类化主窗口，把 WM_COPYDATA / WM_FONTCHANGE 转成 [`HostMessage`] 送回事件循环
pub fn install_message_hook(window: &Window, proxy: EventLoopProxy<HostMessage>) -> ShellResult<()> {
    let hwnd = get_window_hwnd(window)
        .ok_or_else(|| ShellError::WindowCreation("无法获取窗口句柄".to_string()))?;

    subclass_window(hwnd, move |message| proxy.send_event(message).is_ok())?;
    debug!("已挂接主窗口消息");
    Ok(())
}

fn subclass_window(hwnd: HWND, sink: impl Fn(HostMessage) -> bool + 'static) -> ShellResult<()> {
    let state = Box::into_raw(Box::new(HookState { sink: Box::new(sink) }));

    unsafe {
        if !SetWindowSubclass(hwnd, Some(subclass_proc), HOOK_ID, state as usize).as_bool() {
            drop(Box::from_raw(state));
            return Err(ShellError::WindowCreation("子类化主窗口失败".to_string()));
        }
    }

    Ok(())
}

/// 复制 COPYDATASTRUCT 的内容（只在消息处理期间有效）
unsafe fn copy_payload(data: &COPYDATASTRUCT) -> Vec<u8> {
    if data.lpData.is_null() || data.cbData == 0 {
        return Vec::new();
    }
    unsafe { std::slice::from_raw_parts(data.lpData as *const u8, data.cbData as usize).to_vec() }
}

unsafe extern "system" fn subclass_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
    _id: usize,
    ref_data: usize,
) -> LRESULT {
    unsafe {
        let state = &*(ref_data as *const HookState);

        match msg {
            WM_COPYDATA => {
                let data = lparam.0 as *const COPYDATASTRUCT;
                if !data.is_null() {
                    let data = &*data;
                    let message = HostMessage::CopyData {
                        tag: data.dwData,
                        payload: copy_payload(data),
                    };
                    if !(state.sink)(message) {
                        warn!("事件循环已关闭，丢弃 WM_COPYDATA");
                    }
                }
                return LRESULT(1);
            }
            WM_FONTCHANGE => {
                let _ = (state.sink)(HostMessage::FontChange);
            }
            WM_NCDESTROY => {
                let result = DefSubclassProc(hwnd, msg, wparam, lparam);
                let _ = RemoveWindowSubclass(hwnd, Some(subclass_proc), HOOK_ID);
                drop(Box::from_raw(ref_data as *mut HookState));
                return result;
            }
            _ => {}
        }

        DefSubclassProc(hwnd, msg, wparam, lparam)
    }
}
