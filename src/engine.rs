//! 内嵌引擎
//!
//! 宿主只通过 [`Engine`] 与 [`BinaryMessenger`] 两个接口访问引擎：按名称注册方法通道、
//! 事件流通道，并向引擎推送方法调用。[`HeadlessEngine`] 是进程内的实现，
//! 引擎侧接口（`call_host`、`listen`、`on_host_call`）模拟运行在引擎中的应用代码。

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

/// 通道上传递的值
pub type EncodableValue = Value;

/// 方法调用
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    pub arguments: EncodableValue,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: EncodableValue) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// 方法调用的回复
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    Success(EncodableValue),
    Error {
        code: String,
        message: String,
        details: Option<EncodableValue>,
    },
    NotImplemented,
}

/// 引擎错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("通道没有注册处理器: {0}")]
    ChannelNotFound(String),

    #[error("处理器返回错误: {code}, 消息: {message}")]
    Handler { code: String, message: String },
}

/// 事件流错误
#[derive(Debug, Clone, PartialEq)]
pub struct StreamError {
    pub code: String,
    pub message: String,
}

/// 事件流的发送端
pub trait EventSink {
    fn success(&mut self, event: EncodableValue);
    fn error(&mut self, code: &str, message: &str);
    fn end_of_stream(&mut self);
}

/// 事件流通道的宿主端处理器
pub trait StreamHandler {
    /// 引擎开始监听
    fn on_listen(&mut self, arguments: &EncodableValue, events: Box<dyn EventSink>) -> Option<StreamError>;
    /// 引擎取消监听
    fn on_cancel(&mut self, arguments: &EncodableValue) -> Option<StreamError>;
}

/// 方法通道的宿主端处理器
pub type MethodHandler = Box<dyn FnMut(&MethodCall) -> MethodResponse>;

/// 引擎消息总线
pub trait BinaryMessenger {
    /// 注册（或移除）方法通道处理器
    fn set_method_handler(&self, channel: &str, handler: Option<MethodHandler>);
    /// 注册（或移除）事件流处理器
    fn set_stream_handler(&self, channel: &str, handler: Option<Box<dyn StreamHandler>>);
    /// 宿主向引擎发起方法调用，不等待回复
    fn invoke_method(&self, channel: &str, call: MethodCall) -> Result<(), EngineError>;
}

/// 引擎项目：资源目录与入口参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineProject {
    pub assets_path: PathBuf,
    pub entrypoint_arguments: Vec<String>,
}

impl EngineProject {
    pub fn new(assets_path: impl Into<PathBuf>) -> Self {
        Self {
            assets_path: assets_path.into(),
            entrypoint_arguments: Vec::new(),
        }
    }

    pub fn with_entrypoint_arguments(mut self, arguments: Vec<String>) -> Self {
        self.entrypoint_arguments = arguments;
        self
    }
}

/// 宿主持有的引擎
pub trait Engine {
    /// 消息总线，引擎未就绪时为 None
    fn messenger(&self) -> Option<&dyn BinaryMessenger>;
    /// 系统字体变化后重新加载
    fn reload_system_fonts(&self);
    /// 下一帧渲染完成后回调一次
    fn set_next_frame_callback(&self, callback: Box<dyn FnOnce()>);
    /// 强制重绘
    fn force_redraw(&self);
}

/// 引擎工厂
pub type EngineFactory = Box<dyn FnMut(&EngineProject) -> crate::ShellResult<Box<dyn Engine>>>;

/// 引擎侧收到的流事件
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Data(EncodableValue),
    Error { code: String, message: String },
    End,
}

struct RecordingSink {
    events: Rc<RefCell<Vec<StreamEvent>>>,
}

impl EventSink for RecordingSink {
    fn success(&mut self, event: EncodableValue) {
        self.events.borrow_mut().push(StreamEvent::Data(event));
    }

    fn error(&mut self, code: &str, message: &str) {
        self.events.borrow_mut().push(StreamEvent::Error {
            code: code.to_string(),
            message: message.to_string(),
        });
    }

    fn end_of_stream(&mut self) {
        self.events.borrow_mut().push(StreamEvent::End);
    }
}

/// 引擎侧的一次订阅
#[derive(Clone)]
pub struct Subscription {
    events: Rc<RefCell<Vec<StreamEvent>>>,
}

impl Subscription {
    /// 到目前为止收到的事件
    pub fn events(&self) -> Vec<StreamEvent> {
        self.events.borrow().clone()
    }
}

type HostCallListener = Box<dyn FnMut(&MethodCall) -> Result<(), EngineError>>;

/// 进程内消息总线
#[derive(Default)]
pub struct MessageBus {
    method_handlers: RefCell<HashMap<String, MethodHandler>>,
    stream_handlers: RefCell<HashMap<String, Box<dyn StreamHandler>>>,
    host_call_listeners: RefCell<HashMap<String, HostCallListener>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 引擎调用宿主方法
    pub fn call_host(&self, channel: &str, call: &MethodCall) -> Result<MethodResponse, EngineError> {
        // 调用期间把处理器取出，处理器内部可以再次访问总线
        let mut handler = self
            .method_handlers
            .borrow_mut()
            .remove(channel)
            .ok_or_else(|| EngineError::ChannelNotFound(channel.to_string()))?;

        let response = handler(call);

        self.method_handlers
            .borrow_mut()
            .entry(channel.to_string())
            .or_insert(handler);

        Ok(response)
    }

    /// 引擎开始监听事件流
    pub fn listen(&self, channel: &str, arguments: &EncodableValue) -> Result<Subscription, EngineError> {
        let mut handler = self
            .stream_handlers
            .borrow_mut()
            .remove(channel)
            .ok_or_else(|| EngineError::ChannelNotFound(channel.to_string()))?;

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = RecordingSink {
            events: Rc::clone(&events),
        };
        let result = handler.on_listen(arguments, Box::new(sink));

        self.stream_handlers
            .borrow_mut()
            .entry(channel.to_string())
            .or_insert(handler);

        match result {
            Some(error) => Err(EngineError::Handler {
                code: error.code,
                message: error.message,
            }),
            None => Ok(Subscription { events }),
        }
    }

    /// 引擎取消监听事件流
    pub fn cancel(&self, channel: &str, arguments: &EncodableValue) -> Result<(), EngineError> {
        let mut handler = self
            .stream_handlers
            .borrow_mut()
            .remove(channel)
            .ok_or_else(|| EngineError::ChannelNotFound(channel.to_string()))?;

        let result = handler.on_cancel(arguments);

        self.stream_handlers
            .borrow_mut()
            .entry(channel.to_string())
            .or_insert(handler);

        match result {
            Some(error) => Err(EngineError::Handler {
                code: error.code,
                message: error.message,
            }),
            None => Ok(()),
        }
    }

    /// 引擎侧注册宿主调用的接收者
    pub fn on_host_call(
        &self,
        channel: &str,
        listener: impl FnMut(&MethodCall) -> Result<(), EngineError> + 'static,
    ) {
        self.host_call_listeners
            .borrow_mut()
            .insert(channel.to_string(), Box::new(listener));
    }
}

impl BinaryMessenger for MessageBus {
    fn set_method_handler(&self, channel: &str, handler: Option<MethodHandler>) {
        let mut handlers = self.method_handlers.borrow_mut();
        match handler {
            Some(handler) => {
                handlers.insert(channel.to_string(), handler);
            }
            None => {
                handlers.remove(channel);
            }
        }
    }

    fn set_stream_handler(&self, channel: &str, handler: Option<Box<dyn StreamHandler>>) {
        let mut handlers = self.stream_handlers.borrow_mut();
        match handler {
            Some(handler) => {
                handlers.insert(channel.to_string(), handler);
            }
            None => {
                handlers.remove(channel);
            }
        }
    }

    fn invoke_method(&self, channel: &str, call: MethodCall) -> Result<(), EngineError> {
        let mut listener = self
            .host_call_listeners
            .borrow_mut()
            .remove(channel)
            .ok_or_else(|| EngineError::ChannelNotFound(channel.to_string()))?;

        let result = listener(&call);

        self.host_call_listeners
            .borrow_mut()
            .entry(channel.to_string())
            .or_insert(listener);

        result
    }
}

type FirstFrameHook = Box<dyn FnOnce(&HeadlessEngine)>;

struct EngineInner {
    project: EngineProject,
    bus: MessageBus,
    running: Cell<bool>,
    font_reloads: Cell<u32>,
    frames: Cell<u64>,
    next_frame_callback: RefCell<Option<Box<dyn FnOnce()>>>,
    first_frame_hooks: RefCell<Vec<FirstFrameHook>>,
}

/// 无界面的进程内引擎
#[derive(Clone)]
pub struct HeadlessEngine {
    inner: Rc<EngineInner>,
}

impl HeadlessEngine {
    /// 创建引擎（尚未运行，消息总线不可用）
    pub fn new(project: EngineProject) -> Self {
        Self {
            inner: Rc::new(EngineInner {
                project,
                bus: MessageBus::new(),
                running: Cell::new(false),
                font_reloads: Cell::new(0),
                frames: Cell::new(0),
                next_frame_callback: RefCell::new(None),
                first_frame_hooks: RefCell::new(Vec::new()),
            }),
        }
    }

    /// 启动引擎
    pub fn run(&self) {
        if !self.inner.running.replace(true) {
            info!(
                "引擎已启动: 资源目录 {:?}, 入口参数 {:?}",
                self.inner.project.assets_path, self.inner.project.entrypoint_arguments
            );
        }
    }

    /// 停止引擎
    pub fn shutdown(&self) {
        if self.inner.running.replace(false) {
            debug!("引擎已停止");
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }

    /// 引擎侧访问消息总线（不受运行状态限制）
    pub fn bus(&self) -> &MessageBus {
        &self.inner.bus
    }

    /// 首帧完成后执行一次的引擎侧逻辑
    pub fn on_first_frame(&self, hook: impl FnOnce(&HeadlessEngine) + 'static) {
        self.inner.first_frame_hooks.borrow_mut().push(Box::new(hook));
    }

    pub fn font_reloads(&self) -> u32 {
        self.inner.font_reloads.get()
    }

    pub fn frames(&self) -> u64 {
        self.inner.frames.get()
    }
}

impl Engine for HeadlessEngine {
    fn messenger(&self) -> Option<&dyn BinaryMessenger> {
        if self.inner.running.get() {
            Some(&self.inner.bus)
        } else {
            None
        }
    }

    fn reload_system_fonts(&self) {
        self.inner.font_reloads.set(self.inner.font_reloads.get() + 1);
        debug!("重新加载系统字体");
    }

    fn set_next_frame_callback(&self, callback: Box<dyn FnOnce()>) {
        *self.inner.next_frame_callback.borrow_mut() = Some(callback);
    }

    fn force_redraw(&self) {
        if !self.inner.running.get() {
            return;
        }

        let frame = self.inner.frames.get() + 1;
        self.inner.frames.set(frame);

        let callback = self.inner.next_frame_callback.borrow_mut().take();
        if let Some(callback) = callback {
            callback();
        }

        if frame == 1 {
            let hooks: Vec<FirstFrameHook> = self.inner.first_frame_hooks.borrow_mut().drain(..).collect();
            for hook in hooks {
                hook(self);
            }
        }
    }
}
