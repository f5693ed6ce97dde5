//! Scenario: a service that ignores SIGTERM is killed after the retry budget.

use e2e_tests::assertions::*;
use e2e_tests::{run_scenario, TestConfigOptions, TestEnv};
use keeper_supervisor::StopOutcome;
use std::path::Path;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_forced_stop() {
    run_scenario("Forced Stop", || async {
        let env = TestEnv::new(
            Path::new(env!("CARGO_BIN_EXE_fakesvc")),
            TestConfigOptions {
                fakesvc_args: vec!["--ignore-sigterm".to_string()],
                stop_retries: 5,
                stop_backoff_ms: 100,
                ..Default::default()
            },
        );
        let supervisor = env.supervisor();

        println!("Step 1: Starting SIGTERM-ignoring service...");
        let handle = supervisor
            .start()
            .await
            .map_err(|e| format!("start failed: {}", e))?;
        println!("✓ Started (PID {})\n", handle.pid);

        println!("Step 2: Stopping...");
        let started = Instant::now();
        let outcome = supervisor
            .stop()
            .await
            .map_err(|e| format!("stop failed: {}", e))?;
        let elapsed = started.elapsed();

        if outcome != (StopOutcome::Forced { pid: handle.pid }) {
            return Err(format!("expected forced stop, got {:?}", outcome));
        }
        if elapsed < Duration::from_millis(500) {
            return Err(format!("SIGKILL sent before the retry budget ({:?})", elapsed));
        }
        assert_process_gone(handle.pid)?;
        assert_no_pid_file(&env)?;
        assert_log_contains(&env.paths().log_file, "ignoring as requested")?;
        println!("✓ Force-killed after {:?}\n", elapsed);

        Ok(())
    })
    .await;
}
