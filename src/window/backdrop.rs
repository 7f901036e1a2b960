use crate::*;

/// 客户区底色
const BACKDROP_COLOR: u32 = 0x00202124;

/// 引擎画面之下的客户区底色绘制
pub struct Backdrop {
    surface: Option<Surface<Rc<Window>, Rc<Window>>>,
    context: Option<Context<Rc<Window>>>,
}

impl Backdrop {
    pub fn new() -> Self {
        Self {
            surface: None,
            context: None,
        }
    }

    /// 初始化绘制表面
    pub fn initialize(&mut self, window: &Rc<Window>) -> ShellResult<()> {
        let context = Context::new(window.clone())
            .map_err(|e| ShellError::WindowCreation(format!("创建绘制上下文失败: {}", e)))?;

        let surface = Surface::new(&context, window.clone())
            .map_err(|e| ShellError::WindowCreation(format!("创建绘制表面失败: {}", e)))?;

        self.context = Some(context);
        self.surface = Some(surface);

        Ok(())
    }

    /// 用底色填充客户区
    pub fn draw(&mut self, width: u32, height: u32) -> std::result::Result<(), String> {
        let surface = self.surface.as_mut().ok_or("绘制表面未初始化")?;

        // 最小化时客户区为 0
        let (Some(width), Some(height)) = (NonZeroU32::new(width), NonZeroU32::new(height)) else {
            return Ok(());
        };

        surface
            .resize(width, height)
            .map_err(|e| format!("调整缓冲区失败: {}", e))?;

        let mut buffer = surface
            .buffer_mut()
            .map_err(|e| format!("获取缓冲区失败: {}", e))?;

        buffer.fill(BACKDROP_COLOR);

        buffer.present().map_err(|e| format!("呈现缓冲区失败: {}", e))?;

        Ok(())
    }
}

impl Default for Backdrop {
    fn default() -> Self {
        Self::new()
    }
}
