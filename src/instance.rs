//! 单实例守护
//!
//! 启动时尝试创建固定名称的互斥锁：创建成功即为主实例，锁在进程存活期间一直持有；
//! 锁已存在则为第二实例，由调用方负责转交参数后退出。

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::errors::{ShellError, ShellResult};

/// 已持有的锁句柄，Drop 时释放
pub trait LockHandle {}

/// 一次加锁尝试的结果
pub enum LockAttempt {
    Acquired(Box<dyn LockHandle>),
    AlreadyHeld,
}

/// 命名互斥锁的实现后端
pub trait InstanceLockBackend {
    /// 创建或打开命名锁
    fn try_create(&self, name: &str) -> ShellResult<LockAttempt>;
}

/// 进程级单实例锁
pub struct InstanceLock {
    name: String,
    handle: Option<Box<dyn LockHandle>>,
}

impl InstanceLock {
    /// 显式释放锁（正常退出路径）
    pub fn release(mut self) {
        if self.handle.take().is_some() {
            debug!("已释放单实例锁: {}", self.name);
        }
    }
}

impl std::fmt::Debug for InstanceLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceLock").field("name", &self.name).finish()
    }
}

/// 单实例状态
#[derive(Debug)]
pub enum InstanceState {
    /// 获得锁，正常启动
    Primary(InstanceLock),
    /// 锁已被其他进程持有
    Secondary,
}

impl InstanceState {
    pub fn is_primary(&self) -> bool {
        matches!(self, InstanceState::Primary(_))
    }
}

/// 尝试获取单实例锁
pub fn acquire(backend: &dyn InstanceLockBackend, name: &str) -> ShellResult<InstanceState> {
    match backend.try_create(name)? {
        LockAttempt::Acquired(handle) => {
            info!("获得单实例锁: {}", name);
            Ok(InstanceState::Primary(InstanceLock {
                name: name.to_string(),
                handle: Some(handle),
            }))
        }
        LockAttempt::AlreadyHeld => {
            info!("单实例锁已被占用，进入第二实例流程: {}", name);
            Ok(InstanceState::Secondary)
        }
    }
}

/// 当前平台的默认后端
pub fn default_backend() -> Box<dyn InstanceLockBackend> {
    #[cfg(windows)]
    {
        Box::new(Win32MutexBackend)
    }
    #[cfg(not(windows))]
    {
        Box::new(NoopBackend)
    }
}

/// 进程内命名锁表，多个守护实例共享同一张表即可模拟多进程
#[derive(Clone, Default)]
pub struct ProcessLocalBackend {
    held: Arc<Mutex<HashSet<String>>>,
}

impl ProcessLocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, name: &str) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(name))
            .unwrap_or(false)
    }
}

struct LocalLockHandle {
    name: String,
    held: Arc<Mutex<HashSet<String>>>,
}

impl LockHandle for LocalLockHandle {}

impl Drop for LocalLockHandle {
    fn drop(&mut self) {
        if let Ok(mut held) = self.held.lock() {
            held.remove(&self.name);
        }
    }
}

impl InstanceLockBackend for ProcessLocalBackend {
    fn try_create(&self, name: &str) -> ShellResult<LockAttempt> {
        let mut held = self
            .held
            .lock()
            .map_err(|e| ShellError::LockCreation(e.to_string()))?;

        if !held.insert(name.to_string()) {
            return Ok(LockAttempt::AlreadyHeld);
        }

        Ok(LockAttempt::Acquired(Box::new(LocalLockHandle {
            name: name.to_string(),
            held: Arc::clone(&self.held),
        })))
    }
}

/// 不做互斥的后端，非 Windows 平台下总是主实例
pub struct NoopBackend;

struct NoopHandle;

impl LockHandle for NoopHandle {}

impl InstanceLockBackend for NoopBackend {
    fn try_create(&self, _name: &str) -> ShellResult<LockAttempt> {
        Ok(LockAttempt::Acquired(Box::new(NoopHandle)))
    }
}

#[cfg(windows)]
pub use win32::Win32MutexBackend;

#[cfg(windows)]
mod win32 {
    use super::*;
    use windows::Win32::Foundation::{CloseHandle, ERROR_ALREADY_EXISTS, GetLastError, HANDLE};
    use windows::Win32::System::Threading::{CreateMutexW, ReleaseMutex};
    use windows::core::HSTRING;

    /// Win32 命名互斥量后端（作用域为当前会话）
    pub struct Win32MutexBackend;

    struct Win32Mutex(HANDLE);

    impl LockHandle for Win32Mutex {}

    impl Drop for Win32Mutex {
        fn drop(&mut self) {
            unsafe {
                let _ = ReleaseMutex(self.0);
                let _ = CloseHandle(self.0);
            }
        }
    }

    impl InstanceLockBackend for Win32MutexBackend {
        fn try_create(&self, name: &str) -> ShellResult<LockAttempt> {
            let name = HSTRING::from(name);

            unsafe {
                let handle = CreateMutexW(None, true, &name)
                    .map_err(|e| ShellError::LockCreation(e.to_string()))?;

                if GetLastError() == ERROR_ALREADY_EXISTS {
                    let _ = CloseHandle(handle);
                    return Ok(LockAttempt::AlreadyHeld);
                }

                Ok(LockAttempt::Acquired(Box::new(Win32Mutex(handle))))
            }
        }
    }
}
