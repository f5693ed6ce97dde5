//! Scenario: starts that must fail without leaving a PID file.

use e2e_tests::assertions::*;
use e2e_tests::{run_scenario, TestConfigOptions, TestEnv};
use keeper_common::SupervisorError;
use std::path::Path;

fn fakesvc() -> &'static Path {
    Path::new(env!("CARGO_BIN_EXE_fakesvc"))
}

#[tokio::test]
async fn test_start_refused_when_port_taken() {
    run_scenario("Port In Use", || async {
        let env = TestEnv::new(fakesvc(), TestConfigOptions::default());
        let _squatter = std::net::TcpListener::bind(("127.0.0.1", env.port()))
            .map_err(|e| format!("could not occupy port: {}", e))?;

        match env.supervisor().start().await {
            Err(SupervisorError::PortInUse { port }) if port == env.port() => {}
            other => return Err(format!("expected PortInUse, got {:?}", other)),
        }
        assert_no_pid_file(&env)?;
        println!("✓ PortInUse, nothing spawned\n");
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_start_fails_when_service_exits_early() {
    run_scenario("Early Exit", || async {
        let env = TestEnv::new(
            fakesvc(),
            TestConfigOptions {
                fakesvc_args: vec!["--exit-after-ms".to_string(), "100".to_string()],
                ..Default::default()
            },
        );

        match env.supervisor().start().await {
            Err(SupervisorError::StartFailed { log_tail, .. }) => {
                if !log_tail.iter().any(|line| line.contains("exiting after 100ms")) {
                    return Err(format!("error.log tail missing exit reason: {:?}", log_tail));
                }
                println!("✓ StartFailed with log tail {:?}\n", log_tail);
            }
            other => return Err(format!("expected StartFailed, got {:?}", other)),
        }
        assert_no_pid_file(&env)?;
        Ok(())
    })
    .await;
}
