#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::process::ExitCode;

use nimbus_shell::{app, console, handoff, instance, logging, startup};
use nimbus_shell::{CommandLine, Launch, ShellConfig};
use tracing::{error, warn};

/// 程序入口点
fn main() -> ExitCode {
    let loaded = ShellConfig::load();

    if loaded.as_ref().map(|config| config.attach_console).unwrap_or(true) {
        console::attach_parent_console();
    }
    logging::init_logging();

    let config = loaded.unwrap_or_else(|e| {
        warn!("配置加载失败，使用默认配置: {}", e);
        ShellConfig::default()
    });

    let backend = instance::default_backend();
    let transport = handoff::default_transport();

    let launch = match startup::run(&config, backend.as_ref(), transport.as_ref(), CommandLine::current()) {
        Ok(Launch::Primary(launch)) => launch,
        Ok(Launch::HandedOff(_)) => return ExitCode::SUCCESS,
        Err(e) => {
            error!("启动失败: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match app::run(config, launch) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("运行失败: {}", e);
            ExitCode::FAILURE
        }
    }
}
