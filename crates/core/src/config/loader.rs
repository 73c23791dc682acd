use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Variables used by earlier deployments, mapped onto their config keys.
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("CREDENTIALS_JSON", "sheets.credentials"),
    ("USE_DESK_TOKEN", "helpdesk.api_token"),
    ("TELEGRAM_TOKEN", "chat.bot_token"),
    ("TELEGRAM_CHAT_ID", "chat.chat_id"),
];

/// Load configuration from file with environment variable overrides.
///
/// Precedence, lowest first: the TOML file, the legacy variables in
/// [`LEGACY_ENV_KEYS`], then `ESFWATCH_`-prefixed variables where `__`
/// separates nested keys (`ESFWATCH_HELPDESK__API_TOKEN`).
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let mut figment = Figment::new().merge(Toml::file(path));
    for (var, key) in LEGACY_ENV_KEYS {
        let key: &'static str = *key;
        figment = figment.merge(Env::raw().only(&[*var]).map(move |_| key.into()));
    }

    let config: Config = figment
        .merge(Env::prefixed("ESFWATCH_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[sheets]
spreadsheet_id = "abc"

[chat]
thread_id = 8282
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.sheets.spreadsheet_id, "abc");
        assert_eq!(config.chat.thread_id, Some(8282));
    }

    #[test]
    fn test_load_config_from_str_missing_sheets() {
        let toml = r#"
[workflow]
triggering_status = "X"
"#;
        let result = load_config_from_str(toml);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/esfwatch.toml"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[sheets]
spreadsheet_id = "from-file"
target_sheet = "Ledger"

[clock]
utc_offset_hours = 6
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.sheets.spreadsheet_id, "from-file");
        assert_eq!(config.sheets.target_sheet, "Ledger");
        assert_eq!(config.clock.utc_offset_hours, 6);
    }
}
