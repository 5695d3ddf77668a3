//! Derived figures and display formatting for dashboard data.
//!
//! Everything here is pure: it takes decoded models and returns numbers or
//! strings for the terminal view and the `snapshot` command.

use std::collections::BTreeMap;

use crate::models::{CronJob, CronSchedule, GatewayStatus, Session, SessionType, StatusData};

/// Sessions updated within this window count as active.
pub const ACTIVE_WINDOW_MS: i64 = 300_000;

/// How many sessions the usage chart and session list show.
pub const TOP_SESSIONS: usize = 8;

// =============================================================================
// Token analytics
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenTotals {
    pub total: i64,
    pub input: i64,
    pub output: i64,
}

pub fn token_totals(sessions: &[Session]) -> TokenTotals {
    sessions.iter().fold(TokenTotals::default(), |mut acc, s| {
        acc.total = acc.total.saturating_add(s.total_tokens.unwrap_or(0));
        acc.input = acc.input.saturating_add(s.input_tokens.unwrap_or(0));
        acc.output = acc.output.saturating_add(s.output_tokens.unwrap_or(0));
        acc
    })
}

/// USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelRates {
    pub input: f64,
    pub output: f64,
}

const DEFAULT_RATES: ModelRates = ModelRates {
    input: 3.0,
    output: 15.0,
};

/// Approximate pricing, keyed by exact model id.
pub fn rates_for(model: Option<&str>) -> ModelRates {
    match model {
        Some("claude-sonnet-4-20250514") => DEFAULT_RATES,
        Some("claude-opus-4-5") => ModelRates {
            input: 15.0,
            output: 75.0,
        },
        Some("claude-haiku") => ModelRates {
            input: 0.25,
            output: 1.25,
        },
        _ => DEFAULT_RATES,
    }
}

/// Estimated spend from input/output counters; total-only sessions cost nothing.
pub fn estimated_cost(sessions: &[Session]) -> f64 {
    sessions
        .iter()
        .map(|s| {
            let rates = rates_for(s.model.as_deref());
            let input = s.input_tokens.unwrap_or(0) as f64 / 1_000_000.0 * rates.input;
            let output = s.output_tokens.unwrap_or(0) as f64 / 1_000_000.0 * rates.output;
            input + output
        })
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeUsage {
    pub session_type: SessionType,
    pub tokens: i64,
    pub count: usize,
}

/// Token usage grouped by session type, in type order.
pub fn usage_by_type(sessions: &[Session]) -> Vec<TypeUsage> {
    let mut groups: BTreeMap<SessionType, (i64, usize)> = BTreeMap::new();
    for session in sessions {
        let entry = groups.entry(session.session_type()).or_insert((0, 0));
        entry.0 += session.total_tokens.unwrap_or(0);
        entry.1 += 1;
    }

    groups
        .into_iter()
        .map(|(session_type, (tokens, count))| TypeUsage {
            session_type,
            tokens,
            count,
        })
        .collect()
}

/// Sessions with recorded usage, heaviest first.
pub fn top_sessions(sessions: &[Session], limit: usize) -> Vec<&Session> {
    let mut used: Vec<&Session> = sessions
        .iter()
        .filter(|s| s.total_tokens.unwrap_or(0) > 0)
        .collect();
    used.sort_by(|a, b| b.total_tokens.cmp(&a.total_tokens));
    used.truncate(limit);
    used
}

// =============================================================================
// Sessions panel
// =============================================================================

pub fn active_count(sessions: &[Session]) -> usize {
    sessions
        .iter()
        .filter(|s| s.age_ms < ACTIVE_WINDOW_MS)
        .count()
}

pub fn main_session(sessions: &[Session]) -> Option<&Session> {
    sessions.iter().find(|s| s.key.ends_with(":main"))
}

/// Sessions worth listing: those with token data plus anything on the main agent.
pub fn display_sessions(sessions: &[Session]) -> Vec<&Session> {
    sessions
        .iter()
        .filter(|s| s.total_tokens.is_some() || s.key.contains(":main:"))
        .take(TOP_SESSIONS)
        .collect()
}

/// Long human name for a session key.
pub fn session_name(key: &str) -> String {
    if key.ends_with(":main") {
        return "Main Session".to_string();
    }
    if let Some(rest) = key.split(":subagent:").nth(1) {
        let id = rest.split(':').next().unwrap_or("");
        return format!("Subagent {}", truncate_chars(id, 8));
    }
    if let Some(rest) = key.split(":cron:").nth(1) {
        return match rest.split(':').next() {
            Some(id) if !id.is_empty() => format!("Cron {}", truncate_chars(id, 8)),
            _ => "Cron Job".to_string(),
        };
    }
    key.rsplit(':').next().unwrap_or(key).to_string()
}

/// Short chart label for a session key.
pub fn session_label(key: &str) -> String {
    if key.ends_with(":main") {
        return "Main".to_string();
    }
    if let Some(rest) = key.split(":subagent:").nth(1) {
        return format!("Sub {}", truncate_chars(rest, 4));
    }
    if let Some(rest) = key.split(":cron:").nth(1) {
        return format!("Cron {}", truncate_chars(rest, 4));
    }
    let last = key.rsplit(':').next().unwrap_or(key);
    truncate_chars(last, 8)
}

pub fn model_name(model: &str) -> String {
    if model.contains("sonnet") {
        "Sonnet 4".to_string()
    } else if model.contains("opus") {
        "Opus 4".to_string()
    } else if model.contains("haiku") {
        "Haiku".to_string()
    } else {
        let tail = model.rsplit('/').next().unwrap_or(model);
        tail.split('-').take(2).collect::<Vec<_>>().join(" ")
    }
}

// =============================================================================
// Cron panel
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CronSummary {
    pub total: usize,
    pub enabled: usize,
    pub erroring: usize,
}

pub fn cron_summary(jobs: &[CronJob]) -> CronSummary {
    CronSummary {
        total: jobs.len(),
        enabled: jobs.iter().filter(|j| j.enabled).count(),
        erroring: jobs.iter().filter(|j| j.has_errors()).count(),
    }
}

/// Jobs ordered by next run; jobs without one sort last.
pub fn jobs_by_next_run(jobs: &[CronJob]) -> Vec<&CronJob> {
    let mut sorted: Vec<&CronJob> = jobs.iter().collect();
    sorted.sort_by_key(|j| j.state.next_run_at_ms.unwrap_or(i64::MAX));
    sorted
}

/// Badge text for a schedule.
pub fn describe_schedule(schedule: &CronSchedule) -> String {
    match schedule {
        CronSchedule::Cron { expr, .. } => {
            if expr == "*/30 * * * *" {
                "Every 30m".to_string()
            } else if expr == "0 * * * *" {
                "Hourly".to_string()
            } else if expr.starts_with("0 ") && expr.contains(" * * *") {
                match expr.split(' ').nth(1).and_then(|h| h.parse::<u32>().ok()) {
                    Some(hour) => format!("Daily {}:00", hour),
                    None => expr.clone(),
                }
            } else if expr.contains(" * * 5") {
                "Weekly Fri".to_string()
            } else {
                expr.clone()
            }
        }
        CronSchedule::Every { every_ms, .. } if *every_ms > 0 => {
            let mins = *every_ms as f64 / 60_000.0;
            if mins < 60.0 {
                format!("Every {}m", trim_float(mins))
            } else {
                format!("Every {}h", trim_float(mins / 60.0))
            }
        }
        CronSchedule::Every { .. } => "every".to_string(),
        CronSchedule::Unknown => "unknown".to_string(),
    }
}

// =============================================================================
// System status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Online,
    Offline,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusItem {
    pub label: &'static str,
    pub value: &'static str,
    pub health: Health,
    pub detail: String,
}

pub fn status_items(status: &StatusData) -> Vec<StatusItem> {
    let gateway: &GatewayStatus = &status.gateway;
    let running = status.gateway_service.runtime_short.contains("running");
    let has_channels = !status.channel_summary.is_empty();
    let memory = status.memory_plugin.as_ref().map_or(false, |m| m.enabled);

    vec![
        StatusItem {
            label: "Gateway",
            value: if gateway.reachable { "Connected" } else { "Disconnected" },
            health: if gateway.reachable { Health::Online } else { Health::Offline },
            detail: non_empty_or(&gateway.url, "Unknown"),
        },
        StatusItem {
            label: "Service",
            value: if running { "Running" } else { "Stopped" },
            health: if running { Health::Online } else { Health::Offline },
            detail: non_empty_or(&status.gateway_service.label, "Unknown"),
        },
        StatusItem {
            label: "Channels",
            value: if has_channels { "Active" } else { "None" },
            health: if has_channels { Health::Online } else { Health::Warning },
            detail: status
                .channel_summary
                .first()
                .cloned()
                .unwrap_or_else(|| "No channels".to_string()),
        },
        StatusItem {
            label: "Memory",
            value: if memory { "Enabled" } else { "Disabled" },
            health: if memory { Health::Online } else { Health::Warning },
            detail: "Vector + FTS".to_string(),
        },
    ]
}

// =============================================================================
// Formatting
// =============================================================================

/// `950ms`, `12.3s`, `4m 5s`, `2h 10m`.
pub fn format_duration(ms: i64) -> String {
    if ms < 1_000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1_000.0)
    } else if ms < 3_600_000 {
        format!("{}m {}s", ms / 60_000, (ms % 60_000) / 1_000)
    } else {
        format!("{}h {}m", ms / 3_600_000, (ms % 3_600_000) / 60_000)
    }
}

/// `just now`, `5m ago`, `3h ago`, `2d ago`.
pub fn format_age(ms: i64) -> String {
    if ms < 60_000 {
        "just now".to_string()
    } else if ms < 3_600_000 {
        format!("{}m ago", ms / 60_000)
    } else if ms < 86_400_000 {
        format!("{}h ago", ms / 3_600_000)
    } else {
        format!("{}d ago", ms / 86_400_000)
    }
}

/// `1.2M`, `45K`, `999`.
pub fn format_tokens(count: i64) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.0}K", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}

/// Time until (positive) or since (negative) an event, e.g. `in 5m` / `3h ago`.
pub fn format_relative(delta_ms: i64) -> String {
    if delta_ms >= 0 {
        match format_age(delta_ms).strip_suffix(" ago") {
            Some(span) => format!("in {}", span),
            None => "now".to_string(),
        }
    } else {
        format_age(delta_ms.saturating_neg())
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn trim_float(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.1}", value)
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}
