use super::{types::Config, ConfigError};

/// Validate configuration before a run.
///
/// Everything rejected here is a fatal configuration error: the run
/// must not start reading or writing anything.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let required = [
        ("sheets.spreadsheet_id", &config.sheets.spreadsheet_id),
        ("sheets.source_sheet", &config.sheets.source_sheet),
        ("sheets.target_sheet", &config.sheets.target_sheet),
        ("sheets.credentials", &config.sheets.credentials),
        ("columns.tax_id", &config.columns.tax_id),
        ("columns.name", &config.columns.name),
        ("columns.phone", &config.columns.phone),
        ("columns.status", &config.columns.status),
        ("workflow.triggering_status", &config.workflow.triggering_status),
        ("workflow.closed_status_id", &config.workflow.closed_status_id),
        ("workflow.notified_marker", &config.workflow.notified_marker),
        ("helpdesk.api_token", &config.helpdesk.api_token),
    ];
    for (key, value) in required {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!("{} cannot be empty", key)));
        }
    }

    if config.sheets.source_sheet == config.sheets.target_sheet {
        return Err(ConfigError::ValidationError(
            "sheets.source_sheet and sheets.target_sheet must differ".to_string(),
        ));
    }

    if !(-14..=14).contains(&config.clock.utc_offset_hours) {
        return Err(ConfigError::ValidationError(format!(
            "clock.utc_offset_hours must be within -14..=14, got {}",
            config.clock.utc_offset_hours
        )));
    }

    let timeouts = [
        ("sheets.timeout_secs", config.sheets.timeout_secs),
        ("helpdesk.timeout_secs", config.helpdesk.timeout_secs),
        ("chat.timeout_secs", config.chat.timeout_secs),
        ("workflow.step_timeout_secs", config.workflow.step_timeout_secs),
    ];
    for (key, value) in timeouts {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!("{} cannot be 0", key)));
        }
    }

    if config.workflow.create_ticket_fallback && config.workflow.channel_id.is_none() {
        return Err(ConfigError::ValidationError(
            "workflow.channel_id is required when create_ticket_fallback is enabled".to_string(),
        ));
    }

    if !config.chat.bot_token.is_empty() && config.chat.chat_id.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "chat.chat_id is required when chat.bot_token is set".to_string(),
        ));
    }

    if config.run.interval_secs == Some(0) {
        return Err(ConfigError::ValidationError(
            "run.interval_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}
