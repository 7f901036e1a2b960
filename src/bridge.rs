//! 参数桥
//!
//! 把启动参数暴露给引擎：
//! - 参数通道上的 `getArguments` 请求，回复本进程的启动参数；
//! - 文件事件流，首个监听者收到一次启动参数；
//! - 运行期间收到第二实例转交的命令行时，在参数通道上推送 `handleFile`。

use serde_json::Value;
use tracing::{debug, warn};

use crate::args::LaunchArgument;
use crate::config::ShellConfig;
use crate::engine::{
    BinaryMessenger, EncodableValue, Engine, EventSink, MethodCall, MethodHandler, MethodResponse,
    StreamError, StreamHandler,
};
use crate::handoff::HandoffMessage;

/// 查询启动参数
pub const GET_ARGUMENTS: &str = "getArguments";
/// 通知引擎打开文件
pub const HANDLE_FILE: &str = "handleFile";

/// 参数通道的方法处理器
pub fn args_method_handler(launch: LaunchArgument) -> MethodHandler {
    Box::new(move |call: &MethodCall| {
        if call.method == GET_ARGUMENTS {
            MethodResponse::Success(Value::String(launch.as_str().to_string()))
        } else {
            debug!("参数通道收到未实现的方法: {}", call.method);
            MethodResponse::NotImplemented
        }
    })
}

/// 文件事件流：只有第一个监听者能收到启动参数
pub struct FileHandlerStream {
    pending: Option<LaunchArgument>,
}

impl FileHandlerStream {
    pub fn new(launch: LaunchArgument) -> Self {
        Self {
            pending: Some(launch),
        }
    }
}

impl StreamHandler for FileHandlerStream {
    fn on_listen(&mut self, _arguments: &EncodableValue, mut events: Box<dyn EventSink>) -> Option<StreamError> {
        match self.pending.take() {
            Some(launch) if !launch.is_empty() => {
                debug!("向文件事件流发送启动参数: {}", launch);
                events.success(Value::String(launch.into_inner()));
            }
            Some(_) => {}
            None => debug!("文件事件流已有监听者，忽略本次监听"),
        }
        None
    }

    fn on_cancel(&mut self, _arguments: &EncodableValue) -> Option<StreamError> {
        None
    }
}

/// 转交消息的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// 已推送给引擎
    Forwarded,
    /// 引擎或消息总线尚未就绪，消息被丢弃
    EngineNotReady,
    /// 引擎返回错误，已忽略
    Rejected(String),
}

/// 参数桥
#[derive(Debug, Clone)]
pub struct ArgumentBridge {
    args_channel: String,
    file_handler_channel: String,
    launch: LaunchArgument,
}

impl ArgumentBridge {
    pub fn new(config: &ShellConfig, launch: LaunchArgument) -> Self {
        Self {
            args_channel: config.args_channel.clone(),
            file_handler_channel: config.file_handler_channel.clone(),
            launch,
        }
    }

    pub fn args_channel(&self) -> &str {
        &self.args_channel
    }

    pub fn file_handler_channel(&self) -> &str {
        &self.file_handler_channel
    }

    /// 在消息总线上注册参数通道和文件事件流
    pub fn install(&self, messenger: &dyn BinaryMessenger) {
        messenger.set_method_handler(&self.args_channel, Some(args_method_handler(self.launch.clone())));
        messenger.set_stream_handler(
            &self.file_handler_channel,
            Some(Box::new(FileHandlerStream::new(self.launch.clone()))),
        );
        debug!("参数桥已注册: {}, {}", self.args_channel, self.file_handler_channel);
    }

    /// 把第二实例转交的命令行推送给引擎，失败只记录不上抛
    pub fn forward_handoff(&self, engine: Option<&dyn Engine>, message: &HandoffMessage) -> ForwardOutcome {
        let text = message.decode_text();

        let Some(messenger) = engine.and_then(|engine| engine.messenger()) else {
            debug!("引擎尚未就绪，丢弃转交参数: {}", text);
            return ForwardOutcome::EngineNotReady;
        };

        let call = MethodCall::new(HANDLE_FILE, Value::String(text));
        match messenger.invoke_method(&self.args_channel, call) {
            Ok(()) => ForwardOutcome::Forwarded,
            Err(e) => {
                warn!("推送 {} 失败，已忽略: {}", HANDLE_FILE, e);
                ForwardOutcome::Rejected(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineProject, HeadlessEngine, StreamEvent};
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn running_engine(bridge: &ArgumentBridge) -> HeadlessEngine {
        let engine = HeadlessEngine::new(EngineProject::new("data"));
        engine.run();
        bridge.install(engine.messenger().unwrap());
        engine
    }

    #[test]
    fn test_get_arguments_replies_launch_argument() {
        let bridge = ArgumentBridge::new(&ShellConfig::default(), LaunchArgument::new(r"C:\file.txt"));
        let engine = running_engine(&bridge);

        let response = engine
            .bus()
            .call_host("com.nimbus/args", &MethodCall::new(GET_ARGUMENTS, Value::Null))
            .unwrap();
        assert_eq!(response, MethodResponse::Success(json!(r"C:\file.txt")));
    }

    #[test]
    fn test_get_arguments_without_launch_is_empty_string() {
        let bridge = ArgumentBridge::new(&ShellConfig::default(), LaunchArgument::default());
        let engine = running_engine(&bridge);

        let response = engine
            .bus()
            .call_host("com.nimbus/args", &MethodCall::new(GET_ARGUMENTS, Value::Null))
            .unwrap();
        assert_eq!(response, MethodResponse::Success(json!("")));
    }

    #[test]
    fn test_unknown_method_is_not_implemented() {
        let bridge = ArgumentBridge::new(&ShellConfig::default(), LaunchArgument::default());
        let engine = running_engine(&bridge);

        let response = engine
            .bus()
            .call_host("com.nimbus/args", &MethodCall::new("openSettings", Value::Null))
            .unwrap();
        assert_eq!(response, MethodResponse::NotImplemented);
    }

    #[test]
    fn test_file_handler_stream_first_listener_only() {
        let bridge = ArgumentBridge::new(&ShellConfig::default(), LaunchArgument::new(r"C:\file.txt"));
        let engine = running_engine(&bridge);

        let first = engine.bus().listen("com.nimbus/file_handler", &Value::Null).unwrap();
        let second = engine.bus().listen("com.nimbus/file_handler", &Value::Null).unwrap();

        assert_eq!(first.events(), vec![StreamEvent::Data(json!(r"C:\file.txt"))]);
        assert!(second.events().is_empty());
        assert!(engine.bus().cancel("com.nimbus/file_handler", &Value::Null).is_ok());
    }

    #[test]
    fn test_file_handler_stream_without_launch_emits_nothing() {
        let bridge = ArgumentBridge::new(&ShellConfig::default(), LaunchArgument::default());
        let engine = running_engine(&bridge);

        let first = engine.bus().listen("com.nimbus/file_handler", &Value::Null).unwrap();
        assert!(first.events().is_empty());
    }

    #[test]
    fn test_forward_handoff_pushes_handle_file() {
        let bridge = ArgumentBridge::new(&ShellConfig::default(), LaunchArgument::default());
        let engine = running_engine(&bridge);
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&received);
        engine.bus().on_host_call("com.nimbus/args", move |call: &MethodCall| {
            sink.borrow_mut().push(call.clone());
            Ok(())
        });

        let message = HandoffMessage::from_text(1, r"C:\other.txt");
        let outcome = bridge.forward_handoff(Some(&engine), &message);

        assert_eq!(outcome, ForwardOutcome::Forwarded);
        assert_eq!(
            *received.borrow(),
            vec![MethodCall::new(HANDLE_FILE, json!(r"C:\other.txt"))]
        );
    }

    #[test]
    fn test_forward_handoff_drops_when_engine_not_ready() {
        let bridge = ArgumentBridge::new(&ShellConfig::default(), LaunchArgument::default());
        let message = HandoffMessage::from_text(1, r"C:\other.txt");

        assert_eq!(bridge.forward_handoff(None, &message), ForwardOutcome::EngineNotReady);

        let idle = HeadlessEngine::new(EngineProject::new("data"));
        assert_eq!(bridge.forward_handoff(Some(&idle), &message), ForwardOutcome::EngineNotReady);
    }

    #[test]
    fn test_forward_handoff_swallows_engine_error() {
        let bridge = ArgumentBridge::new(&ShellConfig::default(), LaunchArgument::default());
        let engine = running_engine(&bridge);
        let message = HandoffMessage::from_text(1, r"C:\other.txt");

        match bridge.forward_handoff(Some(&engine), &message) {
            ForwardOutcome::Rejected(_) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }
}
