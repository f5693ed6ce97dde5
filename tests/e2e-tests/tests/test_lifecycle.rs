//! Scenario: start, status, stop and restart against a well-behaved service.

use e2e_tests::assertions::*;
use e2e_tests::{run_scenario, TestConfigOptions, TestEnv};
use keeper_common::SupervisorError;
use keeper_supervisor::{ServiceStatus, StopOutcome};
use std::path::Path;

fn fakesvc() -> &'static Path {
    Path::new(env!("CARGO_BIN_EXE_fakesvc"))
}

#[tokio::test]
async fn test_start_status_stop() {
    run_scenario("Start, Status, Stop", || async {
        let env = TestEnv::new(fakesvc(), TestConfigOptions::default());
        let supervisor = env.supervisor();

        println!("Step 1: Starting service on port {}...", env.port());
        let handle = supervisor
            .start()
            .await
            .map_err(|e| format!("start failed: {}", e))?;
        assert_process_alive(handle.pid)?;
        assert_pid_recorded(&env, handle.pid)?;
        if handle.port != env.port() {
            return Err(format!("handle port {} != {}", handle.port, env.port()));
        }
        println!("✓ Started (PID {})\n", handle.pid);

        println!("Step 2: Checking status...");
        let status = supervisor
            .status()
            .await
            .map_err(|e| format!("status failed: {}", e))?;
        let pid = assert_running(&env, &status)?;
        if pid != handle.pid {
            return Err(format!("status PID {} != started PID {}", pid, handle.pid));
        }
        if !matches!(status, ServiceStatus::Running { responding: true, .. }) {
            return Err(format!("expected a responding service, got: {}", status));
        }
        println!("✓ {}\n", status);

        println!("Step 3: Stopping service...");
        let outcome = supervisor
            .stop()
            .await
            .map_err(|e| format!("stop failed: {}", e))?;
        if outcome != (StopOutcome::Graceful { pid: handle.pid }) {
            return Err(format!("expected graceful stop, got {:?}", outcome));
        }
        assert_process_gone(handle.pid)?;
        assert_no_pid_file(&env)?;
        println!("✓ Stopped gracefully\n");

        println!("Step 4: Status after stop...");
        let status = supervisor
            .status()
            .await
            .map_err(|e| format!("status failed: {}", e))?;
        assert_not_running(&status)?;
        println!("✓ {}\n", status);

        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_start_twice_reports_already_running() {
    run_scenario("Start Twice", || async {
        let env = TestEnv::new(fakesvc(), TestConfigOptions::default());
        let supervisor = env.supervisor();

        let handle = supervisor
            .start()
            .await
            .map_err(|e| format!("start failed: {}", e))?;

        println!("Step 1: Starting again while running...");
        match supervisor.start().await {
            Err(SupervisorError::AlreadyRunning { pid }) if pid == handle.pid => {
                println!("✓ AlreadyRunning (PID {})\n", pid)
            }
            other => return Err(format!("expected AlreadyRunning, got {:?}", other)),
        }
        assert_pid_recorded(&env, handle.pid)?;

        supervisor
            .stop()
            .await
            .map_err(|e| format!("stop failed: {}", e))?;
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_stop_when_not_running() {
    run_scenario("Stop When Not Running", || async {
        let env = TestEnv::new(fakesvc(), TestConfigOptions::default());

        match env.supervisor().stop().await {
            Err(SupervisorError::NotRunning) => {}
            other => return Err(format!("expected NotRunning, got {:?}", other)),
        }
        assert_no_pid_file(&env)?;
        println!("✓ NotRunning\n");
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_restart_replaces_process() {
    run_scenario("Restart", || async {
        let env = TestEnv::new(fakesvc(), TestConfigOptions::default());
        let supervisor = env.supervisor();

        println!("Step 1: Restart from not running...");
        let first = supervisor
            .restart()
            .await
            .map_err(|e| format!("restart failed: {}", e))?;
        assert_process_alive(first.pid)?;
        println!("✓ Started (PID {})\n", first.pid);

        println!("Step 2: Restart while running...");
        let second = supervisor
            .restart()
            .await
            .map_err(|e| format!("restart failed: {}", e))?;
        if second.pid == first.pid {
            return Err(format!("restart kept PID {}", first.pid));
        }
        assert_process_gone(first.pid)?;
        assert_process_alive(second.pid)?;
        assert_pid_recorded(&env, second.pid)?;
        println!("✓ Replaced {} with {}\n", first.pid, second.pid);

        supervisor
            .stop()
            .await
            .map_err(|e| format!("stop failed: {}", e))?;
        Ok(())
    })
    .await;
}
