mod backdrop;
mod creation;
#[cfg(windows)]
mod hook;

pub use backdrop::*;
pub use creation::*;
#[cfg(windows)]
pub use hook::*;

use crate::*;
use crate::bridge::{ArgumentBridge, ForwardOutcome};
use crate::engine::{Engine, EngineFactory, EngineProject};
use crate::handoff::HandoffMessage;
use tracing::{debug, info, warn};

/// 原生窗口转交给宿主处理的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostMessage {
    /// WM_COPYDATA：标识 + 数据副本
    CopyData { tag: usize, payload: Vec<u8> },
    /// WM_FONTCHANGE
    FontChange,
}

/// 原生窗口提供给宿主的能力
pub trait WindowSurface {
    /// 显示窗口
    fn show(&self);
    /// 客户区大小（物理像素）
    fn client_size(&self) -> (u32, u32);
}

/// 窗口生命周期：创建、销毁、处理消息
pub trait WindowHandler {
    fn on_create(&mut self, surface: Rc<dyn WindowSurface>) -> ShellResult<()>;
    fn on_destroy(&mut self);
    /// 返回 true 表示消息已处理
    fn handle_message(&mut self, message: HostMessage) -> bool;
}

/// 承载引擎的主窗口
pub struct ShellWindow {
    handoff_tag: usize,
    project: EngineProject,
    bridge: ArgumentBridge,
    factory: EngineFactory,
    engine: Option<Box<dyn Engine>>,
}

impl ShellWindow {
    pub fn new(handoff_tag: usize, project: EngineProject, bridge: ArgumentBridge, factory: EngineFactory) -> Self {
        Self {
            handoff_tag,
            project,
            bridge,
            factory,
            engine: None,
        }
    }

    /// 当前引擎（创建前、销毁后为 None）
    pub fn engine(&self) -> Option<&dyn Engine> {
        self.engine.as_deref()
    }

    pub fn bridge(&self) -> &ArgumentBridge {
        &self.bridge
    }

    fn on_copy_data(&self, tag: usize, payload: &[u8]) {
        if tag != self.handoff_tag {
            debug!("忽略未知的 WM_COPYDATA 标识: {}", tag);
            return;
        }

        let message = HandoffMessage::from_parts(tag, payload);
        match self.bridge.forward_handoff(self.engine(), &message) {
            ForwardOutcome::Forwarded => info!("已将转交参数推送给引擎"),
            outcome => debug!("转交参数未送达引擎: {:?}", outcome),
        }
    }
}

impl WindowHandler for ShellWindow {
    fn on_create(&mut self, surface: Rc<dyn WindowSurface>) -> ShellResult<()> {
        let (width, height) = surface.client_size();
        debug!("创建引擎，客户区 {}x{}", width, height);

        let engine = (self.factory)(&self.project)?;

        match engine.messenger() {
            Some(messenger) => self.bridge.install(messenger),
            None => warn!("引擎消息总线不可用，参数通道未注册"),
        }

        let shown = Rc::clone(&surface);
        engine.set_next_frame_callback(Box::new(move || shown.show()));
        engine.force_redraw();

        self.engine = Some(engine);
        Ok(())
    }

    fn on_destroy(&mut self) {
        if self.engine.take().is_some() {
            debug!("引擎已释放");
        }
    }

    fn handle_message(&mut self, message: HostMessage) -> bool {
        match message {
            HostMessage::CopyData { tag, payload } => {
                self.on_copy_data(tag, &payload);
                true
            }
            HostMessage::FontChange => {
                if let Some(engine) = self.engine() {
                    engine.reload_system_fonts();
                }
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::LaunchArgument;
    use crate::config::ShellConfig;
    use crate::engine::{HeadlessEngine, MethodCall};
    use crate::errors::ShellError;
    use serde_json::json;
    use std::cell::{Cell, RefCell};

    struct FakeSurface {
        visible: Cell<bool>,
    }

    impl WindowSurface for FakeSurface {
        fn show(&self) {
            self.visible.set(true);
        }

        fn client_size(&self) -> (u32, u32) {
            (1280, 720)
        }
    }

    fn shell_with(engine: HeadlessEngine, launch: &str) -> ShellWindow {
        let config = ShellConfig::default();
        let bridge = ArgumentBridge::new(&config, LaunchArgument::new(launch));
        let factory: EngineFactory = Box::new(move |_: &EngineProject| -> ShellResult<Box<dyn Engine>> {
            Ok(Box::new(engine.clone()))
        });
        ShellWindow::new(config.handoff_tag, EngineProject::new("data"), bridge, factory)
    }

    fn record_handle_file(engine: &HeadlessEngine) -> Rc<RefCell<Vec<MethodCall>>> {
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&received);
        engine.bus().on_host_call("com.nimbus/args", move |call: &MethodCall| {
            sink.borrow_mut().push(call.clone());
            Ok(())
        });
        received
    }

    #[test]
    fn test_create_shows_window_after_first_frame() {
        let engine = HeadlessEngine::new(EngineProject::new("data"));
        engine.run();
        let mut shell = shell_with(engine.clone(), "");
        let surface = Rc::new(FakeSurface { visible: Cell::new(false) });

        shell.on_create(surface.clone()).unwrap();

        assert!(surface.visible.get());
        assert_eq!(engine.frames(), 1);
        assert!(shell.engine().is_some());
    }

    #[test]
    fn test_copy_data_reaches_engine() {
        let engine = HeadlessEngine::new(EngineProject::new("data"));
        engine.run();
        let received = record_handle_file(&engine);
        let mut shell = shell_with(engine, "");
        shell.on_create(Rc::new(FakeSurface { visible: Cell::new(false) })).unwrap();

        let message = HandoffMessage::from_text(1, r"C:\other.txt");
        assert!(shell.handle_message(HostMessage::CopyData {
            tag: 1,
            payload: message.as_bytes().to_vec(),
        }));

        assert_eq!(received.borrow()[0], MethodCall::new("handleFile", json!(r"C:\other.txt")));
    }

    #[test]
    fn test_copy_data_with_foreign_tag_is_ignored() {
        let engine = HeadlessEngine::new(EngineProject::new("data"));
        engine.run();
        let received = record_handle_file(&engine);
        let mut shell = shell_with(engine, "");
        shell.on_create(Rc::new(FakeSurface { visible: Cell::new(false) })).unwrap();

        let message = HandoffMessage::from_text(2, r"C:\other.txt");
        shell.handle_message(HostMessage::CopyData {
            tag: 2,
            payload: message.as_bytes().to_vec(),
        });

        assert!(received.borrow().is_empty());
    }

    #[test]
    fn test_copy_data_before_engine_is_dropped() {
        let engine = HeadlessEngine::new(EngineProject::new("data"));
        let received = record_handle_file(&engine);
        let mut shell = shell_with(engine.clone(), "");
        let payload = HandoffMessage::from_text(1, r"C:\other.txt").as_bytes().to_vec();

        // 窗口尚未创建
        assert!(shell.handle_message(HostMessage::CopyData { tag: 1, payload: payload.clone() }));

        // 引擎已创建但消息总线未就绪
        shell.on_create(Rc::new(FakeSurface { visible: Cell::new(false) })).unwrap();
        assert!(shell.handle_message(HostMessage::CopyData { tag: 1, payload }));

        assert!(received.borrow().is_empty());
    }

    #[test]
    fn test_font_change_reloads_fonts() {
        let engine = HeadlessEngine::new(EngineProject::new("data"));
        engine.run();
        let mut shell = shell_with(engine.clone(), "");

        shell.handle_message(HostMessage::FontChange);
        assert_eq!(engine.font_reloads(), 0);

        shell.on_create(Rc::new(FakeSurface { visible: Cell::new(false) })).unwrap();
        shell.handle_message(HostMessage::FontChange);
        assert_eq!(engine.font_reloads(), 1);
    }

    #[test]
    fn test_destroy_releases_engine() {
        let engine = HeadlessEngine::new(EngineProject::new("data"));
        engine.run();
        let received = record_handle_file(&engine);
        let mut shell = shell_with(engine, "");
        shell.on_create(Rc::new(FakeSurface { visible: Cell::new(false) })).unwrap();

        shell.on_destroy();
        assert!(shell.engine().is_none());

        let payload = HandoffMessage::from_text(1, "late.txt").as_bytes().to_vec();
        shell.handle_message(HostMessage::CopyData { tag: 1, payload });
        assert!(received.borrow().is_empty());
    }

    #[test]
    fn test_factory_error_propagates() {
        let config = ShellConfig::default();
        let bridge = ArgumentBridge::new(&config, LaunchArgument::default());
        let factory: EngineFactory = Box::new(|_: &EngineProject| -> ShellResult<Box<dyn Engine>> {
            Err(ShellError::EngineStart("missing assets".into()))
        });
        let mut shell = ShellWindow::new(1, EngineProject::new("data"), bridge, factory);

        let result = shell.on_create(Rc::new(FakeSurface { visible: Cell::new(false) }));
        assert!(matches!(result, Err(ShellError::EngineStart(_))));
        assert!(shell.engine().is_none());
    }
}
