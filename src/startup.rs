//! 启动流程：单实例检查 -> 第二实例转交参数后退出 / 主实例继续启动

use tracing::info;

use crate::args::{CommandLine, LaunchArgument};
use crate::config::ShellConfig;
use crate::engine::EngineProject;
use crate::errors::ShellResult;
use crate::handoff::{HandoffMessage, HandoffOutcome, HandoffTransport};
use crate::instance::{self, InstanceLock, InstanceLockBackend, InstanceState};

/// 主实例的启动信息
#[derive(Debug)]
pub struct PrimaryLaunch {
    pub lock: InstanceLock,
    pub command_line: CommandLine,
    pub launch_argument: LaunchArgument,
}

impl PrimaryLaunch {
    /// 引擎项目：资源目录 + 命令行参数
    pub fn engine_project(&self, config: &ShellConfig) -> EngineProject {
        EngineProject::new(&config.assets_path)
            .with_entrypoint_arguments(self.command_line.entrypoint_arguments())
    }
}

/// 启动结果
#[derive(Debug)]
pub enum Launch {
    /// 本进程是主实例
    Primary(PrimaryLaunch),
    /// 已有实例在运行，参数已转交（尽力而为），本进程应以 0 退出
    HandedOff(HandoffOutcome),
}

/// 执行单实例检查，第二实例在此完成转交
pub fn run(
    config: &ShellConfig,
    backend: &dyn InstanceLockBackend,
    transport: &dyn HandoffTransport,
    command_line: CommandLine,
) -> ShellResult<Launch> {
    match instance::acquire(backend, &config.lock_name)? {
        InstanceState::Primary(lock) => {
            let launch_argument = command_line.first_argument_or_empty();
            info!("主实例启动，启动参数: {:?}", launch_argument.as_str());
            Ok(Launch::Primary(PrimaryLaunch {
                lock,
                command_line,
                launch_argument,
            }))
        }
        InstanceState::Secondary => {
            let message = HandoffMessage::from_command_line(config.handoff_tag, &command_line);
            let outcome = transport.hand_off(&config.window_title, message.as_ref());
            info!("第二实例转交结果: {:?}", outcome);
            Ok(Launch::HandedOff(outcome))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::LoopbackTransport;
    use crate::instance::ProcessLocalBackend;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_first_launch_is_primary_with_argument() {
        let backend = ProcessLocalBackend::new();
        let transport = LoopbackTransport::new();
        let config = ShellConfig::default();

        let launch = run(&config, &backend, &transport, CommandLine::parse(r"nimbus.exe C:\file.txt")).unwrap();
        match launch {
            Launch::Primary(primary) => {
                assert_eq!(primary.launch_argument.as_str(), r"C:\file.txt");
                let project = primary.engine_project(&config);
                assert_eq!(project.assets_path, std::path::PathBuf::from("data"));
                assert_eq!(project.entrypoint_arguments, vec![r"C:\file.txt".to_string()]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_second_launch_hands_off_raw_arguments() {
        let backend = ProcessLocalBackend::new();
        let transport = LoopbackTransport::new();
        let config = ShellConfig::default();
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&received);
        transport.register("Nimbus", move |message: &HandoffMessage| {
            sink.borrow_mut().push(message.decode_text());
        });

        let _primary = run(&config, &backend, &transport, CommandLine::parse("nimbus.exe")).unwrap();
        let second = run(&config, &backend, &transport, CommandLine::parse(r"nimbus.exe C:\other.txt")).unwrap();

        assert!(matches!(second, Launch::HandedOff(HandoffOutcome::Delivered)));
        assert_eq!(*received.borrow(), vec![r"C:\other.txt".to_string()]);
    }

    #[test]
    fn test_second_launch_without_arguments_only_activates() {
        let backend = ProcessLocalBackend::new();
        let transport = LoopbackTransport::new();
        let config = ShellConfig::default();
        transport.register("Nimbus", |_: &HandoffMessage| panic!("不应收到消息"));

        let _primary = run(&config, &backend, &transport, CommandLine::parse("nimbus.exe")).unwrap();
        let second = run(&config, &backend, &transport, CommandLine::parse("nimbus.exe")).unwrap();

        assert!(matches!(second, Launch::HandedOff(HandoffOutcome::Activated)));
    }

    #[test]
    fn test_second_launch_without_window_still_exits() {
        let backend = ProcessLocalBackend::new();
        let transport = LoopbackTransport::new();
        let config = ShellConfig::default();

        let _primary = run(&config, &backend, &transport, CommandLine::parse("nimbus.exe")).unwrap();
        let second = run(&config, &backend, &transport, CommandLine::parse("nimbus.exe a.txt")).unwrap();

        assert!(matches!(second, Launch::HandedOff(HandoffOutcome::WindowNotFound)));
    }
}
