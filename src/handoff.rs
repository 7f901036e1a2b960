//! 参数转交
//!
//! 第二实例把自己的原始命令行编码为 UTF-16（带结尾 NUL），通过同步的跨进程窗口消息
//! 交给主实例窗口。消息只带一个标识值和一段字节，不需要回执。

use std::cell::RefCell;
use std::collections::HashMap;

use tracing::debug;

use crate::args::CommandLine;

/// 默认消息标识
pub const DEFAULT_HANDOFF_TAG: usize = 1;

/// 转交消息：标识 + UTF-16LE 字节
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffMessage {
    tag: usize,
    payload: Vec<u8>,
}

impl HandoffMessage {
    /// 将文本编码为带 NUL 结尾的 UTF-16LE
    pub fn from_text(tag: usize, text: &str) -> Self {
        let payload = text
            .encode_utf16()
            .chain(std::iter::once(0))
            .flat_map(u16::to_le_bytes)
            .collect();
        Self { tag, payload }
    }

    /// 由命令行构造，程序名之后没有内容时返回 None
    pub fn from_command_line(tag: usize, command_line: &CommandLine) -> Option<Self> {
        let tail = command_line.argument_tail();
        if tail.is_empty() {
            None
        } else {
            Some(Self::from_text(tag, tail))
        }
    }

    /// 由接收到的原始数据构造
    pub fn from_parts(tag: usize, bytes: &[u8]) -> Self {
        Self {
            tag,
            payload: bytes.to_vec(),
        }
    }

    pub fn tag(&self) -> usize {
        self.tag
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// 解码为文本，截止到第一个 NUL；奇数长度的尾字节忽略
    pub fn decode_text(&self) -> String {
        let units: Vec<u16> = self
            .payload
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|&unit| unit != 0)
            .collect();
        String::from_utf16_lossy(&units)
    }
}

/// 转交结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffOutcome {
    /// 找不到主实例窗口
    WindowNotFound,
    /// 已激活主实例窗口，没有参数需要转交
    Activated,
    /// 已激活并送达参数
    Delivered,
}

/// 跨进程转交通道
pub trait HandoffTransport {
    /// 查找指定标题的窗口，激活它并（如有）同步送达消息
    fn hand_off(&self, window_title: &str, message: Option<&HandoffMessage>) -> HandoffOutcome;
}

/// 当前平台的默认转交通道
pub fn default_transport() -> Box<dyn HandoffTransport> {
    #[cfg(windows)]
    {
        Box::new(CopyDataTransport)
    }
    #[cfg(not(windows))]
    {
        Box::new(UnavailableTransport)
    }
}

/// 没有跨进程窗口消息的平台
pub struct UnavailableTransport;

impl HandoffTransport for UnavailableTransport {
    fn hand_off(&self, window_title: &str, _message: Option<&HandoffMessage>) -> HandoffOutcome {
        debug!("当前平台无法转交参数: {}", window_title);
        HandoffOutcome::WindowNotFound
    }
}

/// 进程内回环通道：按窗口标题注册接收者
#[derive(Default)]
pub struct LoopbackTransport {
    receivers: RefCell<HashMap<String, Box<dyn Fn(&HandoffMessage)>>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册窗口
    pub fn register(&self, window_title: impl Into<String>, receiver: impl Fn(&HandoffMessage) + 'static) {
        self.receivers
            .borrow_mut()
            .insert(window_title.into(), Box::new(receiver));
    }

    /// 注销窗口
    pub fn unregister(&self, window_title: &str) {
        self.receivers.borrow_mut().remove(window_title);
    }
}

impl HandoffTransport for LoopbackTransport {
    fn hand_off(&self, window_title: &str, message: Option<&HandoffMessage>) -> HandoffOutcome {
        let receivers = self.receivers.borrow();
        let Some(receiver) = receivers.get(window_title) else {
            return HandoffOutcome::WindowNotFound;
        };

        match message {
            Some(message) => {
                receiver(message);
                HandoffOutcome::Delivered
            }
            None => HandoffOutcome::Activated,
        }
    }
}

#[cfg(windows)]
pub use win32::CopyDataTransport;

#[cfg(windows)]
mod win32 {
    use super::*;
    use tracing::info;
    use windows::Win32::Foundation::{LPARAM, HWND};
    use windows::Win32::System::DataExchange::COPYDATASTRUCT;
    use windows::Win32::UI::WindowsAndMessaging::{
        FindWindowW, IsIconic, SendMessageW, SetForegroundWindow, ShowWindow, SW_RESTORE, WM_COPYDATA,
    };
    use windows::core::{HSTRING, PCWSTR};

    /// 基于 WM_COPYDATA 的转交通道
    pub struct CopyDataTransport;

    fn find_window(window_title: &str) -> Option<HWND> {
        let title = HSTRING::from(window_title);
        match unsafe { FindWindowW(PCWSTR::null(), &title) } {
            Ok(hwnd) if !hwnd.0.is_null() => Some(hwnd),
            _ => None,
        }
    }

    impl HandoffTransport for CopyDataTransport {
        fn hand_off(&self, window_title: &str, message: Option<&HandoffMessage>) -> HandoffOutcome {
            let Some(hwnd) = find_window(window_title) else {
                info!("未找到主实例窗口: {}", window_title);
                return HandoffOutcome::WindowNotFound;
            };

            unsafe {
                if IsIconic(hwnd).as_bool() {
                    let _ = ShowWindow(hwnd, SW_RESTORE);
                }
                let _ = SetForegroundWindow(hwnd);
            }

            let Some(message) = message else {
                return HandoffOutcome::Activated;
            };

            let payload = message.as_bytes();
            let data = COPYDATASTRUCT {
                dwData: message.tag(),
                cbData: payload.len() as u32,
                lpData: payload.as_ptr() as *mut _,
            };

            // 同步调用，返回时接收方已处理完毕；窗口已关闭时调用静默失败
            unsafe {
                SendMessageW(
                    hwnd,
                    WM_COPYDATA,
                    None,
                    Some(LPARAM(&data as *const COPYDATASTRUCT as isize)),
                );
            }

            debug!("已向主实例送达 {} 字节", payload.len());
            HandoffOutcome::Delivered
        }
    }
}
