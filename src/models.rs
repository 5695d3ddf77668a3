//! Data models for OpenClaw dashboard payloads.
//!
//! Field names follow the camelCase JSON emitted by the `openclaw` CLI. Every
//! field the CLI may omit is optional or defaulted so that a partial payload
//! still decodes.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Decode an explicit `null` the same way as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The three CLI-backed resources served by the proxy and polled by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Sessions,
    Cron,
    Status,
}

impl Resource {
    pub const ALL: [Resource; 3] = [Resource::Sessions, Resource::Cron, Resource::Status];

    /// Key under which the proxy caches this resource.
    pub fn cache_key(&self) -> &'static str {
        match self {
            Resource::Sessions => "sessions",
            Resource::Cron => "cron",
            Resource::Status => "status",
        }
    }

    /// CLI subcommand producing this resource (`--json` is appended later).
    pub fn cli_args(&self) -> &'static [&'static str] {
        match self {
            Resource::Sessions => &["sessions"],
            Resource::Cron => &["cron", "list"],
            Resource::Status => &["status"],
        }
    }

    /// Path segment below the API base (`/api/<segment>`).
    pub fn path_segment(&self) -> &'static str {
        self.cache_key()
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.cache_key())
    }
}

// -----------------------------------------------------------------------------
// Sessions
// -----------------------------------------------------------------------------

/// A tracked unit of agent activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub age_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<i64>,
    /// Share of the context window in use, 0-100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_used: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_sent: Option<bool>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub flags: Vec<String>,
}

impl Session {
    pub fn session_type(&self) -> SessionType {
        SessionType::from_key(&self.key)
    }
}

/// Kind of session, derived from the colon-delimited session key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Main,
    Subagent,
    Cron,
    Other,
}

impl SessionType {
    pub fn from_key(key: &str) -> Self {
        if key.contains(":main:main") {
            SessionType::Main
        } else if key.contains(":subagent:") {
            SessionType::Subagent
        } else if key.contains(":cron:") {
            SessionType::Cron
        } else {
            SessionType::Other
        }
    }
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionType::Main => write!(f, "main"),
            SessionType::Subagent => write!(f, "subagent"),
            SessionType::Cron => write!(f, "cron"),
            SessionType::Other => write!(f, "other"),
        }
    }
}

/// Output of `openclaw sessions --json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub path: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sessions: Vec<Session>,
}

// -----------------------------------------------------------------------------
// Cron
// -----------------------------------------------------------------------------

/// When a cron job fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CronSchedule {
    Every {
        #[serde(rename = "everyMs")]
        every_ms: u64,
        #[serde(rename = "anchorMs", default, skip_serializing_if = "Option::is_none")]
        anchor_ms: Option<i64>,
    },
    Cron {
        expr: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tz: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// What a cron job does when it fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CronPayload {
    SystemEvent {
        #[serde(default, deserialize_with = "null_as_default")]
        text: String,
    },
    AgentTurn {
        #[serde(default, deserialize_with = "null_as_default")]
        message: String,
        #[serde(rename = "timeoutSeconds", default, skip_serializing_if = "Option::is_none")]
        timeout_seconds: Option<u64>,
    },
    #[serde(other)]
    Unknown,
}

impl CronPayload {
    /// The text or message the job delivers.
    pub fn summary(&self) -> &str {
        match self {
            CronPayload::SystemEvent { text } => text,
            CronPayload::AgentTurn { message, .. } => message,
            CronPayload::Unknown => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Ok,
    Error,
}

/// Last-known execution state of a cron job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJobState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_at_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_status: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_duration_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consecutive_errors: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronDelivery {
    #[serde(default, deserialize_with = "null_as_default")]
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_effort: Option<bool>,
}

/// A scheduled task definition plus its last-known state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJob {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub enabled: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at_ms: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at_ms: i64,
    pub schedule: CronSchedule,
    #[serde(default, deserialize_with = "null_as_default")]
    pub session_target: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub wake_mode: String,
    pub payload: CronPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<CronDelivery>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: CronJobState,
}

impl CronJob {
    pub fn has_errors(&self) -> bool {
        self.state.consecutive_errors.unwrap_or(0) > 0
    }
}

/// Output of `openclaw cron list --json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CronData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub jobs: Vec<CronJob>,
}

// -----------------------------------------------------------------------------
// Status
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatAgent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub agent_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub enabled: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub every: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub every_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatStatus {
    #[serde(default, deserialize_with = "null_as_default")]
    pub agents: Vec<HeartbeatAgent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDefaults {
    #[serde(default, deserialize_with = "null_as_default")]
    pub model: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub context_tokens: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSessions {
    #[serde(default, deserialize_with = "null_as_default")]
    pub count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub defaults: SessionDefaults,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayHost {
    #[serde(default, deserialize_with = "null_as_default")]
    pub host: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ip: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub platform: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayStatus {
    #[serde(default, deserialize_with = "null_as_default")]
    pub mode: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reachable: bool,
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub host: Option<GatewayHost>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayService {
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub installed: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub runtime_short: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub workspace_dir: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sessions_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_active_age_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentsStatus {
    #[serde(default, deserialize_with = "null_as_default")]
    pub default_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub agents: Vec<AgentInfo>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_sessions: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryPlugin {
    #[serde(default, deserialize_with = "null_as_default")]
    pub enabled: bool,
}

/// Output of `openclaw status --json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub heartbeat: HeartbeatStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub channel_summary: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sessions: StatusSessions,
    #[serde(default, deserialize_with = "null_as_default")]
    pub gateway: GatewayStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub gateway_service: GatewayService,
    #[serde(default, deserialize_with = "null_as_default")]
    pub agents: AgentsStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_plugin: Option<MemoryPlugin>,
}

// -----------------------------------------------------------------------------
// Aggregates
// -----------------------------------------------------------------------------

/// Everything one dashboard refresh shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub sessions: SessionsData,
    pub cron: CronData,
    pub status: StatusData,
    /// Epoch milliseconds of the refresh that produced this value.
    pub last_updated: i64,
}

/// A decoded API payload.
///
/// CLI-backed routes have known shapes; webhook pushes are producer-defined
/// and carried as opaque JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Sessions(SessionsData),
    Cron(CronData),
    Status(StatusData),
    Opaque(Value),
}

impl Payload {
    /// Decode a raw resource body into its typed variant.
    pub fn decode(resource: Resource, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match resource {
            Resource::Sessions => Payload::Sessions(serde_json::from_value(value)?),
            Resource::Cron => Payload::Cron(serde_json::from_value(value)?),
            Resource::Status => Payload::Status(serde_json::from_value(value)?),
        })
    }

    pub fn to_value(&self) -> Value {
        match self {
            Payload::Opaque(value) => value.clone(),
            other => serde_json::to_value(other).unwrap_or(Value::Null),
        }
    }
}
