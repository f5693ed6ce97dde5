//! Scenario: the service dies behind the supervisor's back.

use e2e_tests::assertions::*;
use e2e_tests::{run_scenario, wait_until, TestConfigOptions, TestEnv};
use keeper_process::{force_kill, LivenessChecker, OsLiveness};
use keeper_supervisor::ServiceStatus;
use std::path::Path;
use std::time::Duration;

fn fakesvc() -> &'static Path {
    Path::new(env!("CARGO_BIN_EXE_fakesvc"))
}

#[tokio::test]
async fn test_killed_service_leaves_stale_handle() {
    run_scenario("Stale Handle After kill -9", || async {
        let env = TestEnv::new(fakesvc(), TestConfigOptions::default());
        let supervisor = env.supervisor();

        let handle = supervisor
            .start()
            .await
            .map_err(|e| format!("start failed: {}", e))?;

        println!("Step 1: Killing PID {} out of band...", handle.pid);
        force_kill(handle.pid).map_err(|e| format!("kill failed: {}", e))?;
        let dead = wait_until(Duration::from_secs(5), || {
            !OsLiveness.is_alive(handle.pid).unwrap_or(true)
        })
        .await;
        if !dead {
            return Err(format!("process {} survived SIGKILL", handle.pid));
        }
        assert_pid_recorded(&env, handle.pid)?;
        println!("✓ Process gone, PID file left behind\n");

        println!("Step 2: First status removes the stale PID file...");
        let status = supervisor
            .status()
            .await
            .map_err(|e| format!("status failed: {}", e))?;
        if status != (ServiceStatus::StaleHandle { pid: handle.pid }) {
            return Err(format!("expected stale handle, got: {}", status));
        }
        assert_no_pid_file(&env)?;
        println!("✓ {}\n", status);

        println!("Step 3: Second status reports not running...");
        let status = supervisor
            .status()
            .await
            .map_err(|e| format!("status failed: {}", e))?;
        assert_not_running(&status)?;
        println!("✓ {}\n", status);

        println!("Step 4: Start works again...");
        let again = supervisor
            .start()
            .await
            .map_err(|e| format!("start failed: {}", e))?;
        assert_process_alive(again.pid)?;
        supervisor
            .stop()
            .await
            .map_err(|e| format!("stop failed: {}", e))?;
        println!("✓ Restarted and stopped\n");

        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_corrupt_pid_file_is_cleared_on_start() {
    run_scenario("Corrupt PID File", || async {
        let env = TestEnv::new(fakesvc(), TestConfigOptions::default());
        let pid_file = env.paths().pid_file;
        std::fs::write(&pid_file, "not-a-pid\n").map_err(|e| e.to_string())?;

        let supervisor = env.supervisor();
        let handle = supervisor
            .start()
            .await
            .map_err(|e| format!("start failed: {}", e))?;
        assert_pid_recorded(&env, handle.pid)?;
        println!("✓ Corrupt PID file replaced by {}\n", handle.pid);

        supervisor
            .stop()
            .await
            .map_err(|e| format!("stop failed: {}", e))?;
        Ok(())
    })
    .await;
}
