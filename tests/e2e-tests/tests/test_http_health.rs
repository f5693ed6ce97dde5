//! Scenario: health probes against a live, failing and absent service.

use e2e_tests::{run_scenario, TestConfigOptions, TestEnv};
use keeper_monitoring::HealthStatus;
use keeper_supervisor::ServiceStatus;
use std::path::Path;

fn fakesvc() -> &'static Path {
    Path::new(env!("CARGO_BIN_EXE_fakesvc"))
}

#[tokio::test]
async fn test_health_of_running_service() {
    run_scenario("Health: Healthy", || async {
        let env = TestEnv::new(fakesvc(), TestConfigOptions::default());
        let supervisor = env.supervisor();
        supervisor
            .start()
            .await
            .map_err(|e| format!("start failed: {}", e))?;

        let report = supervisor.health().await;
        println!("Health report: {:?}", report);
        if report.status != HealthStatus::Healthy || report.attempts != 1 {
            return Err(format!("expected healthy on first attempt, got {:?}", report));
        }
        if report.last_status_code != Some(200) {
            return Err(format!("expected 200, got {:?}", report.last_status_code));
        }
        println!("✓ Healthy\n");

        supervisor
            .stop()
            .await
            .map_err(|e| format!("stop failed: {}", e))?;
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_health_of_failing_service() {
    run_scenario("Health: Unhealthy", || async {
        let env = TestEnv::new(
            fakesvc(),
            TestConfigOptions {
                fakesvc_args: vec!["--fail-health".to_string()],
                probe_attempts: 2,
                probe_delay_ms: 100,
                ..Default::default()
            },
        );
        let supervisor = env.supervisor();
        supervisor
            .start()
            .await
            .map_err(|e| format!("start failed: {}", e))?;

        let report = supervisor.health().await;
        println!("Health report: {:?}", report);
        if report.is_healthy() || report.attempts != 2 {
            return Err(format!("expected unhealthy after 2 attempts, got {:?}", report));
        }
        if report.last_status_code != Some(503) {
            return Err(format!("expected 503, got {:?}", report.last_status_code));
        }

        let status = supervisor
            .status()
            .await
            .map_err(|e| format!("status failed: {}", e))?;
        if !matches!(status, ServiceStatus::Running { responding: false, .. }) {
            return Err(format!("expected running but not responding, got: {}", status));
        }
        println!("✓ Unhealthy but running: {}\n", status);

        supervisor
            .stop()
            .await
            .map_err(|e| format!("stop failed: {}", e))?;
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_health_without_service() {
    run_scenario("Health: Nothing Listening", || async {
        let env = TestEnv::new(
            fakesvc(),
            TestConfigOptions {
                probe_attempts: 2,
                probe_delay_ms: 50,
                ..Default::default()
            },
        );

        let report = env.supervisor().health().await;
        println!("Health report: {:?}", report);
        if report.is_healthy() || report.last_status_code.is_some() {
            return Err(format!("expected connection failure, got {:?}", report));
        }
        if report.last_error.is_none() {
            return Err("unhealthy report carries no error".to_string());
        }
        println!("✓ Unhealthy: {:?}\n", report.last_error);
        Ok(())
    })
    .await;
}
