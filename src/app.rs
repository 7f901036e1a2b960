use crate::*;
use crate::bridge::{ArgumentBridge, GET_ARGUMENTS, HANDLE_FILE};
use crate::engine::{Engine, EngineFactory, EngineProject, HeadlessEngine, MethodCall};
use crate::window::{Backdrop, create_main_window};
use serde_json::Value;
use tracing::{debug, error, info};

/// 应用程序主结构体
pub struct App {
    config: ShellConfig,
    shell: ShellWindow,
    window: Option<Rc<Window>>,
    backdrop: Backdrop,
    #[cfg_attr(not(windows), allow(dead_code))]
    proxy: EventLoopProxy<HostMessage>,
    error: Option<ShellError>,
}

impl App {
    pub fn new(config: ShellConfig, shell: ShellWindow, proxy: EventLoopProxy<HostMessage>) -> Self {
        Self {
            config,
            shell,
            window: None,
            backdrop: Backdrop::new(),
            proxy,
            error: None,
        }
    }

    /// 事件循环结束后取出启动阶段的错误
    pub fn take_error(&mut self) -> Option<ShellError> {
        self.error.take()
    }

    /// 创建窗口并在其中启动引擎
    fn create(&mut self, event_loop: &ActiveEventLoop) -> ShellResult<()> {
        let window = create_main_window(event_loop, &self.config)?;

        #[cfg(windows)]
        crate::window::install_message_hook(&window, self.proxy.clone())?;

        self.backdrop.initialize(&window)?;

        let surface: Rc<dyn crate::window::WindowSurface> = window.clone();
        self.window = Some(window);
        self.shell.on_create(surface)
    }

    fn redraw(&mut self) {
        let Some(window) = &self.window else {
            return;
        };
        let size = window.inner_size();
        if let Err(e) = self.backdrop.draw(size.width, size.height) {
            debug!("绘制底色失败: {}", e);
        }
        if let Some(engine) = self.shell.engine() {
            engine.force_redraw();
        }
    }
}

impl ApplicationHandler<HostMessage> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        if let Err(e) = self.create(event_loop) {
            error!("主窗口创建失败: {}", e);
            self.error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.shell.on_destroy();
                self.window = None;
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => self.redraw(),
            WindowEvent::Resized(_) => {
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: HostMessage) {
        self.shell.handle_message(event);
    }
}

/// 在消息总线上挂接引擎侧的日志输出，模拟运行在引擎中的应用
fn attach_engine_diagnostics(engine: &HeadlessEngine, bridge: &ArgumentBridge) {
    engine.bus().on_host_call(bridge.args_channel(), |call: &MethodCall| {
        if call.method == HANDLE_FILE {
            info!("引擎收到打开文件请求: {}", call.arguments);
        }
        Ok(())
    });

    let args_channel = bridge.args_channel().to_string();
    let file_handler_channel = bridge.file_handler_channel().to_string();
    engine.on_first_frame(move |engine| {
        match engine.bus().call_host(&args_channel, &MethodCall::new(GET_ARGUMENTS, Value::Null)) {
            Ok(response) => info!("引擎查询启动参数: {:?}", response),
            Err(e) => debug!("查询启动参数失败: {}", e),
        }
        match engine.bus().listen(&file_handler_channel, &Value::Null) {
            Ok(subscription) => info!("文件事件流: {:?}", subscription.events()),
            Err(e) => debug!("监听文件事件流失败: {}", e),
        }
    });
}

/// 进程内引擎工厂
fn headless_engine_factory(bridge: ArgumentBridge) -> EngineFactory {
    Box::new(move |project: &EngineProject| -> ShellResult<Box<dyn Engine>> {
        let engine = HeadlessEngine::new(project.clone());
        attach_engine_diagnostics(&engine, &bridge);
        engine.run();
        Ok(Box::new(engine))
    })
}

/// 运行主实例直到窗口关闭
pub fn run(config: ShellConfig, launch: PrimaryLaunch) -> ShellResult<()> {
    let event_loop = EventLoop::<HostMessage>::with_user_event()
        .build()
        .map_err(|e| ShellError::EventLoop(e.to_string()))?;

    let project = launch.engine_project(&config);
    let bridge = ArgumentBridge::new(&config, launch.launch_argument.clone());
    let shell = ShellWindow::new(
        config.handoff_tag,
        project,
        bridge.clone(),
        headless_engine_factory(bridge),
    );

    let mut app = App::new(config, shell, event_loop.create_proxy());
    event_loop
        .run_app(&mut app)
        .map_err(|e| ShellError::EventLoop(e.to_string()))?;

    if let Some(e) = app.take_error() {
        return Err(e);
    }

    launch.lock.release();
    Ok(())
}
