use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub columns: ColumnsConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub helpdesk: HelpdeskConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub run: RunConfig,
}

/// Spreadsheet holding both the source records and the ledger.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SheetsConfig {
    #[serde(deserialize_with = "lenient_string")]
    pub spreadsheet_id: String,
    #[serde(default = "default_source_sheet")]
    pub source_sheet: String,
    #[serde(default = "default_target_sheet")]
    pub target_sheet: String,
    /// Service-account key, either raw JSON or base64-encoded JSON.
    #[serde(default, deserialize_with = "lenient_string")]
    pub credentials: String,
    #[serde(default = "default_sheets_api_url")]
    pub api_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_source_sheet() -> String {
    "unique drivers main".to_string()
}

fn default_target_sheet() -> String {
    "NO_REQUIRED_PERMISSIONS".to_string()
}

fn default_sheets_api_url() -> String {
    "https://sheets.googleapis.com/v4".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_timeout() -> u32 {
    30
}

/// Header names of the required source columns.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ColumnsConfig {
    #[serde(default = "default_tax_id_column")]
    pub tax_id: String,
    #[serde(default = "default_name_column")]
    pub name: String,
    #[serde(default = "default_phone_column")]
    pub phone: String,
    #[serde(default = "default_status_column")]
    pub status: String,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            tax_id: default_tax_id_column(),
            name: default_name_column(),
            phone: default_phone_column(),
            status: default_status_column(),
        }
    }
}

fn default_tax_id_column() -> String {
    "tin".to_string()
}

fn default_name_column() -> String {
    "name".to_string()
}

fn default_phone_column() -> String {
    "phone".to_string()
}

fn default_status_column() -> String {
    "Статус ЭСФ".to_string()
}

/// How to pick the helpdesk ticket to reuse for a client.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TicketPolicy {
    /// Smallest ticket id, reused only if it is still open.
    #[default]
    OldestOpen,
    /// Scan ids from largest to smallest, reuse the first open one.
    LatestOpen,
}

/// What the reconciler writes when a known record moves away from the
/// triggering status.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatusChangePolicy {
    /// Only refresh `updated_at`; the stored status keeps its old value.
    #[default]
    TimestampOnly,
    /// Rewrite the stored status and refresh `updated_at`.
    OverwriteStatus,
}

/// Workflow behaviour and the fixed texts sent to external services.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_triggering_status")]
    pub triggering_status: String,
    /// Helpdesk status id that marks a ticket as closed.
    #[serde(default = "default_closed_status_id", deserialize_with = "lenient_string")]
    pub closed_status_id: String,
    #[serde(default)]
    pub ticket_policy: TicketPolicy,
    /// Create a new ticket when the client has no open one.
    #[serde(default)]
    pub create_ticket_fallback: bool,
    #[serde(default)]
    pub status_change_policy: StatusChangePolicy,
    #[serde(default = "default_ticket_subject")]
    pub ticket_subject: String,
    #[serde(default = "default_comment_message")]
    pub comment_message: String,
    #[serde(default = "default_comment_message")]
    pub new_ticket_message: String,
    /// Helpdesk channel for created tickets (required with the creation fallback).
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub channel_id: Option<String>,
    #[serde(default = "default_sender")]
    pub sender: String,
    #[serde(default = "default_client_name_prefix")]
    pub client_name_prefix: String,
    /// Value written to the `notified` column after a confirmed send.
    #[serde(default = "default_notified_marker")]
    pub notified_marker: String,
    #[serde(default = "default_notification_header")]
    pub notification_header: String,
    #[serde(default = "default_error_label")]
    pub error_label: String,
    /// Upper bound for a single external call made by the workflow.
    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            triggering_status: default_triggering_status(),
            closed_status_id: default_closed_status_id(),
            ticket_policy: TicketPolicy::default(),
            create_ticket_fallback: false,
            status_change_policy: StatusChangePolicy::default(),
            ticket_subject: default_ticket_subject(),
            comment_message: default_comment_message(),
            new_ticket_message: default_comment_message(),
            channel_id: None,
            sender: default_sender(),
            client_name_prefix: default_client_name_prefix(),
            notified_marker: default_notified_marker(),
            notification_header: default_notification_header(),
            error_label: default_error_label(),
            step_timeout_secs: default_step_timeout(),
        }
    }
}

fn default_triggering_status() -> String {
    "NO_REQUIRED_PERMISSIONS".to_string()
}

fn default_closed_status_id() -> String {
    "3".to_string()
}

fn default_ticket_subject() -> String {
    "OscarSigmaIP".to_string()
}

fn default_comment_message() -> String {
    "SIGMA IP".to_string()
}

fn default_sender() -> String {
    "client".to_string()
}

fn default_client_name_prefix() -> String {
    "ИИН".to_string()
}

fn default_notified_marker() -> String {
    "отправлено".to_string()
}

fn default_notification_header() -> String {
    "Ошибка у клиента:".to_string()
}

fn default_error_label() -> String {
    "NO_REQUIRED_TAXPAYER_STATE ( нет статус ИП )".to_string()
}

fn default_step_timeout() -> u32 {
    60
}

/// Helpdesk (UseDesk) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HelpdeskConfig {
    #[serde(default = "default_helpdesk_api_url")]
    pub api_url: String,
    /// Base of the ticket links written to the ledger.
    #[serde(default = "default_helpdesk_web_url")]
    pub web_url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub api_token: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

impl Default for HelpdeskConfig {
    fn default() -> Self {
        Self {
            api_url: default_helpdesk_api_url(),
            web_url: default_helpdesk_web_url(),
            api_token: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_helpdesk_api_url() -> String {
    "https://api.usedesk.ru".to_string()
}

fn default_helpdesk_web_url() -> String {
    "https://secure.usedesk.ru".to_string()
}

/// Chat (Telegram) configuration. An empty bot token disables notifications.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_api_url")]
    pub api_url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub bot_token: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub chat_id: String,
    #[serde(default)]
    pub thread_id: Option<i64>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_url: default_chat_api_url(),
            bot_token: String::new(),
            chat_id: String::new(),
            thread_id: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_chat_api_url() -> String {
    "https://api.telegram.org".to_string()
}

/// Civil time used for ledger timestamps.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClockConfig {
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: default_utc_offset(),
        }
    }
}

fn default_utc_offset() -> i32 {
    5
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Where to write the Prometheus text exposition after each run.
    #[serde(default)]
    pub textfile_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunConfig {
    /// Repeat the run every N seconds. Absent means a single run.
    #[serde(default)]
    pub interval_secs: Option<u64>,
    /// Plan ledger writes and list eligible entries without side effects.
    #[serde(default)]
    pub dry_run: bool,
}

/// Environment overrides arrive as parsed scalars, so a numeric chat id or
/// token must still land in a `String` field.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
}

impl From<Scalar> for String {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Str(s) => s,
            Scalar::Int(n) => n.to_string(),
            Scalar::Uint(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Scalar::deserialize(deserializer).map(String::from)
}

fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Scalar>::deserialize(deserializer).map(|v| v.map(String::from))
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub sheets: SanitizedSheetsConfig,
    pub columns: ColumnsConfig,
    pub workflow: WorkflowConfig,
    pub helpdesk: SanitizedHelpdeskConfig,
    pub chat: SanitizedChatConfig,
    pub clock: ClockConfig,
    pub metrics: MetricsConfig,
    pub run: RunConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSheetsConfig {
    pub spreadsheet_id: String,
    pub source_sheet: String,
    pub target_sheet: String,
    pub credentials_configured: bool,
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedHelpdeskConfig {
    pub api_url: String,
    pub web_url: String,
    pub api_token_configured: bool,
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedChatConfig {
    pub bot_token_configured: bool,
    pub chat_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i64>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            sheets: SanitizedSheetsConfig {
                spreadsheet_id: config.sheets.spreadsheet_id.clone(),
                source_sheet: config.sheets.source_sheet.clone(),
                target_sheet: config.sheets.target_sheet.clone(),
                credentials_configured: !config.sheets.credentials.is_empty(),
                timeout_secs: config.sheets.timeout_secs,
            },
            columns: config.columns.clone(),
            workflow: config.workflow.clone(),
            helpdesk: SanitizedHelpdeskConfig {
                api_url: config.helpdesk.api_url.clone(),
                web_url: config.helpdesk.web_url.clone(),
                api_token_configured: !config.helpdesk.api_token.is_empty(),
                timeout_secs: config.helpdesk.timeout_secs,
            },
            chat: SanitizedChatConfig {
                bot_token_configured: !config.chat.bot_token.is_empty(),
                chat_id: config.chat.chat_id.clone(),
                thread_id: config.chat.thread_id,
            },
            clock: config.clock.clone(),
            metrics: config.metrics.clone(),
            run: config.run.clone(),
        }
    }
}
