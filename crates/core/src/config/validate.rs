use super::{types::Config, ConfigError};
use crate::command::CommandConfig;

/// Time a claim must outlive the run deadline by, covering the claim
/// acquisition, ledger write and release around the steps.
pub const CLAIM_MARGIN_SECS: u64 = 60;

/// Validate configuration
///
/// Expects `worker.holder_id` to have been resolved already.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

    match config.worker.holder_id.as_deref() {
        Some(holder) if !holder.trim().is_empty() => {}
        _ => return invalid("worker.holder_id cannot be empty"),
    }
    if config.worker.poll_interval_ms == 0 {
        return invalid("worker.poll_interval_ms cannot be 0");
    }
    if config.worker.batch_size == 0 {
        return invalid("worker.batch_size cannot be 0");
    }
    if config.worker.step_timeout_secs == 0 || config.worker.run_timeout_secs == 0 {
        return invalid("worker.step_timeout_secs and worker.run_timeout_secs cannot be 0");
    }
    if config.worker.stale_claim_secs
        <= config.worker.run_timeout_secs.saturating_add(CLAIM_MARGIN_SECS)
    {
        return Err(ConfigError::ValidationError(format!(
            "worker.stale_claim_secs must exceed worker.run_timeout_secs by more than {}s",
            CLAIM_MARGIN_SECS
        )));
    }

    if config.logo.enabled {
        check_pipeline(
            "logo",
            &config.logo.reports,
            config.logo.source_dir.is_some(),
            config.logo.stamper.as_ref(),
            "stamper",
        )?;
    }
    if config.mail.enabled {
        check_pipeline(
            "mail",
            &config.mail.reports,
            config.mail.source_dir.is_some(),
            config.mail.sender.as_ref(),
            "sender",
        )?;
    }

    if config.server.enabled && config.server.port == 0 {
        return invalid("server.port cannot be 0");
    }

    Ok(())
}

fn check_pipeline(
    section: &str,
    reports: &[String],
    has_source_dir: bool,
    command: Option<&CommandConfig>,
    command_name: &str,
) -> Result<(), ConfigError> {
    if reports.iter().all(|r| r.trim().is_empty()) {
        return Err(ConfigError::ValidationError(format!(
            "{}.reports cannot be empty when {} is enabled",
            section, section
        )));
    }
    if !has_source_dir {
        return Err(ConfigError::ValidationError(format!(
            "{}.source_dir is required",
            section
        )));
    }
    match command {
        Some(c) if !c.program.trim().is_empty() => Ok(()),
        _ => Err(ConfigError::ValidationError(format!(
            "{}.{}.program is required",
            section, command_name
        ))),
    }
}
