use super::*;
use anyhow::{anyhow, Result};

/// Validate the complete configuration
pub fn validate_config(config: &KeeperConfig) -> Result<()> {
    validate_service_config(&config.service)?;
    validate_timing_config(&config.timing)?;
    validate_probe_settings(&config.probe)?;

    if config.rotation.retention.is_zero() {
        return Err(anyhow!("Log rotation retention must be greater than 0"));
    }
    validate_backup_settings(&config.backup)?;

    Ok(())
}

fn validate_service_config(service: &ServiceConfig) -> Result<()> {
    if service.executable.trim().is_empty() {
        return Err(anyhow!("service.executable must be set"));
    }

    if service.port == 0 {
        return Err(anyhow!("Port must be between 1 and 65535, got: {}", service.port));
    }

    if service.workers == 0 {
        return Err(anyhow!("Worker count must be at least 1"));
    }

    if service.host.trim().is_empty() {
        return Err(anyhow!("service.host cannot be empty"));
    }

    match service.health_path.as_deref() {
        None | Some("") => Err(anyhow!("service.health_path must be set (e.g. /api/health)")),
        Some(path) if !path.starts_with('/') => {
            Err(anyhow!("service.health_path must start with '/': {}", path))
        }
        Some(_) => Ok(()),
    }
}

fn validate_timing_config(timing: &TimingConfig) -> Result<()> {
    if timing.stop_retries == 0 {
        return Err(anyhow!("timing.stop_retries must be at least 1"));
    }

    if timing.stop_backoff.is_zero() {
        return Err(anyhow!("timing.stop_backoff must be greater than 0"));
    }

    if timing.force_kill_timeout.is_zero() {
        return Err(anyhow!("timing.force_kill_timeout must be greater than 0"));
    }

    Ok(())
}

fn validate_probe_settings(probe: &ProbeSettings) -> Result<()> {
    if probe.attempts == 0 {
        return Err(anyhow!("probe.attempts must be at least 1"));
    }

    if probe.timeout.is_zero() {
        return Err(anyhow!("probe.timeout must be greater than 0"));
    }

    Ok(())
}

fn validate_backup_settings(backup: &BackupSettings) -> Result<()> {
    if backup.retention.is_zero() {
        return Err(anyhow!("Backup retention must be greater than 0"));
    }

    if backup.state_kind.is_empty()
        || !backup
            .state_kind
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(anyhow!(
            "backup.state_kind can only contain alphanumeric characters, hyphens, and underscores: {:?}",
            backup.state_kind
        ));
    }

    Ok(())
}
