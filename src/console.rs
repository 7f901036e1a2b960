/// 附加到父进程控制台；失败且处于调试器下时新建控制台
#[cfg(windows)]
pub fn attach_parent_console() {
    use windows::Win32::System::Console::{AllocConsole, AttachConsole, ATTACH_PARENT_PROCESS};
    use windows::Win32::System::Diagnostics::Debug::IsDebuggerPresent;

    unsafe {
        if AttachConsole(ATTACH_PARENT_PROCESS).is_err() && IsDebuggerPresent().as_bool() {
            let _ = AllocConsole();
        }
    }
}

/// 非 Windows 平台进程本身就有控制台
#[cfg(not(windows))]
pub fn attach_parent_console() {}
