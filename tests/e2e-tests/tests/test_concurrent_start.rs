//! Scenario: two supervisors race to start the same service.

use e2e_tests::assertions::*;
use e2e_tests::{run_scenario, TestConfigOptions, TestEnv};
use keeper_common::SupervisorError;
use std::path::Path;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_start_spawns_once() {
    run_scenario("Concurrent Start", || async {
        let env = TestEnv::new(
            Path::new(env!("CARGO_BIN_EXE_fakesvc")),
            TestConfigOptions::default(),
        );
        let first = env.supervisor();
        let second = env.supervisor();

        println!("Step 1: Starting from two supervisors at once...");
        let (a, b) = tokio::join!(first.start(), second.start());

        let (winner, loser) = match (a, b) {
            (Ok(handle), Err(e)) | (Err(e), Ok(handle)) => (handle, e),
            (Ok(x), Ok(y)) => {
                return Err(format!("both starts succeeded (PIDs {} and {})", x.pid, y.pid))
            }
            (Err(x), Err(y)) => return Err(format!("both starts failed: {} / {}", x, y)),
        };
        match loser {
            SupervisorError::AlreadyRunning { pid } if pid == winner.pid => {}
            other => return Err(format!("loser should see AlreadyRunning, got {:?}", other)),
        }
        assert_pid_recorded(&env, winner.pid)?;
        assert_process_alive(winner.pid)?;
        println!("✓ Exactly one process started (PID {})\n", winner.pid);

        first
            .stop()
            .await
            .map_err(|e| format!("stop failed: {}", e))?;
        assert_process_gone(winner.pid)?;
        Ok(())
    })
    .await;
}
