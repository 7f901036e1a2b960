//! 命令行解析
//!
//! Windows 上直接用系统的 CommandLineToArgvW 切分当前命令行；[`tokenize`] 按同样的规则
//! 处理任意文本：第一个记号是可执行文件路径（引号内不处理转义），之后的参数支持引号与
//! 反斜杠转义。第一个位置参数视为启动文件路径。

use std::fmt;
use std::iter::repeat;

/// 空白字符（Windows 命令行只认空格和制表符）
fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// 切分出程序名记号，返回 (程序名, 剩余部分)
fn split_program(raw: &str) -> (String, &str) {
    if let Some(rest) = raw.strip_prefix('"') {
        match rest.find('"') {
            Some(end) => (rest[..end].to_string(), &rest[end + 1..]),
            None => (rest.to_string(), ""),
        }
    } else {
        match raw.find(is_blank) {
            Some(end) => (raw[..end].to_string(), &raw[end..]),
            None => (raw.to_string(), ""),
        }
    }
}

/// 解析程序名之后的参数
fn split_arguments(rest: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut chars = rest.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if is_blank(*c)) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut current = String::new();
        let mut in_quotes = false;

        loop {
            match chars.peek().copied() {
                None => break,
                Some(c) if is_blank(c) && !in_quotes => break,
                Some('\\') => {
                    let mut count = 0;
                    while chars.peek() == Some(&'\\') {
                        chars.next();
                        count += 1;
                    }
                    if chars.peek() == Some(&'"') {
                        // 2n 个反斜杠 + 引号 -> n 个反斜杠，引号留给下一轮切换状态
                        current.extend(repeat('\\').take(count / 2));
                        if count % 2 == 1 {
                            current.push('"');
                            chars.next();
                        }
                    } else {
                        current.extend(repeat('\\').take(count));
                    }
                }
                Some('"') => {
                    chars.next();
                    if in_quotes && chars.peek() == Some(&'"') {
                        // 引号内的 "" 产生一个字面引号并结束引号段
                        current.push('"');
                        chars.next();
                        in_quotes = false;
                    } else {
                        in_quotes = !in_quotes;
                    }
                }
                Some(c) => {
                    current.push(c);
                    chars.next();
                }
            }
        }

        args.push(current);
    }

    args
}

/// 按 Windows 规则切分完整命令行
pub fn tokenize(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }

    let (program, rest) = split_program(raw);
    let mut tokens = vec![program];
    tokens.extend(split_arguments(rest));
    tokens
}

/// 将单个参数加引号，使其能被 [`tokenize`] 还原
pub fn quote_argument(arg: &str) -> String {
    if !arg.is_empty() && !arg.chars().any(|c| is_blank(c) || c == '"') {
        return arg.to_string();
    }

    let mut quoted = String::from('"');
    let mut backslashes = 0;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                quoted.extend(repeat('\\').take(backslashes * 2 + 1));
                quoted.push('"');
                backslashes = 0;
            }
            _ => {
                quoted.extend(repeat('\\').take(backslashes));
                quoted.push(c);
                backslashes = 0;
            }
        }
    }
    quoted.extend(repeat('\\').take(backslashes * 2));
    quoted.push('"');
    quoted
}

/// 启动参数：命令行中的第一个位置参数，没有时为空字符串
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LaunchArgument(String);

impl LaunchArgument {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for LaunchArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 进程命令行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    raw: String,
    tokens: Vec<String>,
}

impl CommandLine {
    /// 解析原始命令行
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let tokens = tokenize(&raw);
        Self { raw, tokens }
    }

    /// 当前进程的命令行（由系统切分）
    #[cfg(windows)]
    pub fn current() -> Self {
        use windows::Win32::Foundation::{HLOCAL, LocalFree};
        use windows::Win32::System::Environment::GetCommandLineW;
        use windows::Win32::UI::Shell::CommandLineToArgvW;
        use windows::core::PCWSTR;

        unsafe {
            let command_line = GetCommandLineW();
            let raw = String::from_utf16_lossy(command_line.as_wide());

            let mut argc = 0;
            let argv = CommandLineToArgvW(PCWSTR(command_line.0), &mut argc);
            if argv.is_null() {
                return Self::parse(raw);
            }

            let tokens = std::slice::from_raw_parts(argv, argc.max(0) as usize)
                .iter()
                .map(|arg| String::from_utf16_lossy(arg.as_wide()))
                .collect();
            let _ = LocalFree(Some(HLOCAL(argv as *mut _)));

            Self { raw, tokens }
        }
    }

    /// 当前进程的命令行（由 argv 重新拼接）
    #[cfg(not(windows))]
    pub fn current() -> Self {
        let mut args = std::env::args_os().map(|arg| arg.to_string_lossy().into_owned());
        let mut raw = match args.next() {
            Some(program) if program.contains(is_blank) => format!("\"{}\"", program),
            Some(program) => program,
            None => String::new(),
        };
        for arg in args {
            raw.push(' ');
            raw.push_str(&quote_argument(&arg));
        }
        Self::parse(raw)
    }

    /// 原始命令行文本
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// 切分后的全部记号（含程序名）
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// 第一个位置参数，不存在时为空字符串
    pub fn first_argument_or_empty(&self) -> LaunchArgument {
        self.tokens
            .get(1)
            .map(|arg| LaunchArgument::new(arg.as_str()))
            .unwrap_or_default()
    }

    /// 程序名之后的原始参数文本（与 WinMain 收到的命令行一致）
    pub fn argument_tail(&self) -> &str {
        let (_, rest) = split_program(&self.raw);
        rest.trim_start_matches(is_blank)
    }

    /// 传给引擎入口的参数列表（不含程序名）
    pub fn entrypoint_arguments(&self) -> Vec<String> {
        self.tokens.iter().skip(1).cloned().collect()
    }
}
