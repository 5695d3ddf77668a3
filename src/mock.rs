//! Embedded sample data shown when the API is unreachable or mock mode is on.

use serde_json::json;

use crate::models::{CronData, DashboardData, SessionsData, StatusData};

pub fn mock_dashboard(now_ms: i64) -> DashboardData {
    DashboardData {
        sessions: mock_sessions(now_ms),
        cron: mock_cron(now_ms),
        status: mock_status(),
        last_updated: now_ms,
    }
}

pub fn mock_sessions(now: i64) -> SessionsData {
    serde_json::from_value(json!({
        "path": "~/.openclaw/agents/main/sessions/sessions.json",
        "count": 61,
        "sessions": [
            {
                "key": "agent:main:main",
                "kind": "direct",
                "updatedAt": now - 60_000,
                "ageMs": 60_000,
                "sessionId": "main-session-id",
                "model": "claude-sonnet-4-20250514",
                "contextTokens": 200_000,
                "totalTokens": 115_080,
                "inputTokens": 23_000,
                "outputTokens": 15_900,
                "percentUsed": 58,
                "remainingTokens": 84_920,
                "systemSent": true
            },
            {
                "key": "agent:main:subagent:dashboard-dev",
                "kind": "direct",
                "updatedAt": now - 30_000,
                "ageMs": 30_000,
                "sessionId": "subagent-1",
                "model": "claude-sonnet-4-20250514",
                "contextTokens": 200_000,
                "totalTokens": 45_000,
                "percentUsed": 22
            },
            {
                "key": "agent:main:cron:clearmud-progress",
                "kind": "direct",
                "updatedAt": now - 200_000,
                "ageMs": 200_000,
                "sessionId": "cron-1",
                "model": "claude-sonnet-4-20250514",
                "contextTokens": 200_000,
                "totalTokens": 200_000,
                "inputTokens": 155,
                "outputTokens": 2_336,
                "percentUsed": 100,
                "systemSent": true
            },
            {
                "key": "agent:main:cron:daily-status",
                "kind": "direct",
                "updatedAt": now - 4_000_000,
                "ageMs": 4_000_000,
                "sessionId": "cron-2",
                "model": "claude-sonnet-4-20250514",
                "contextTokens": 200_000,
                "totalTokens": 180_000,
                "percentUsed": 90,
                "systemSent": true
            },
            {
                "key": "agent:main:subagent:email-agent",
                "kind": "direct",
                "updatedAt": now - 120_000,
                "ageMs": 120_000,
                "sessionId": "subagent-2",
                "model": "claude-sonnet-4-20250514",
                "contextTokens": 200_000,
                "totalTokens": 78_000,
                "percentUsed": 39
            }
        ]
    }))
    .unwrap_or_default()
}

pub fn mock_cron(now: i64) -> CronData {
    serde_json::from_value(json!({
        "jobs": [
            {
                "id": "clearmud-updates",
                "name": "Clearmud Strategy Status Updates",
                "enabled": true,
                "createdAtMs": now - 86_400_000,
                "updatedAtMs": now - 600_000,
                "schedule": {"kind": "every", "everyMs": 600_000},
                "sessionTarget": "main",
                "wakeMode": "now",
                "payload": {"kind": "systemEvent", "text": "Check Clearmud delivery status"},
                "state": {
                    "nextRunAtMs": now + 300_000,
                    "lastRunAtMs": now - 600_000,
                    "lastStatus": "ok",
                    "lastDurationMs": 10_526,
                    "consecutiveErrors": 0
                }
            },
            {
                "id": "daily-6am",
                "name": "Daily Status Report (6AM)",
                "enabled": true,
                "createdAtMs": now - 604_800_000,
                "updatedAtMs": now - 43_200_000,
                "schedule": {"kind": "cron", "expr": "0 6 * * *", "tz": "America/New_York"},
                "sessionTarget": "main",
                "wakeMode": "next-heartbeat",
                "payload": {"kind": "systemEvent", "text": "Morning status report"},
                "state": {
                    "nextRunAtMs": now + 28_800_000,
                    "lastRunAtMs": now - 57_600_000,
                    "lastStatus": "ok",
                    "lastDurationMs": 0,
                    "consecutiveErrors": 0
                }
            },
            {
                "id": "cmo-status",
                "name": "CMO App Status Check",
                "enabled": true,
                "createdAtMs": now - 604_800_000,
                "updatedAtMs": now - 3_600_000,
                "schedule": {"kind": "cron", "expr": "0 11 * * *", "tz": "America/New_York"},
                "sessionTarget": "main",
                "wakeMode": "now",
                "payload": {"kind": "systemEvent", "text": "CMO app build progress"},
                "state": {
                    "lastRunAtMs": now - 43_200_000,
                    "lastStatus": "error",
                    "lastDurationMs": 970_515,
                    "consecutiveErrors": 1,
                    "lastError": "Error: cron: job execution timed out"
                }
            },
            {
                "id": "pendant-extract",
                "name": "Daily Commitment Extraction",
                "enabled": true,
                "createdAtMs": now - 259_200_000,
                "updatedAtMs": now - 21_600_000,
                "schedule": {"kind": "cron", "expr": "0 17 * * *", "tz": "America/New_York"},
                "sessionTarget": "isolated",
                "wakeMode": "now",
                "payload": {"kind": "agentTurn", "message": "Extract commitments from Pendant API"},
                "state": {
                    "nextRunAtMs": now + 64_800_000,
                    "lastRunAtMs": now - 21_600_000,
                    "lastStatus": "ok",
                    "lastDurationMs": 583_547,
                    "consecutiveErrors": 0
                }
            },
            {
                "id": "linkedin-weekly",
                "name": "LinkedIn Weekly Report",
                "enabled": true,
                "createdAtMs": now - 1_209_600_000,
                "updatedAtMs": now - 172_800_000,
                "schedule": {"kind": "cron", "expr": "0 17 * * 5", "tz": "America/New_York"},
                "sessionTarget": "main",
                "wakeMode": "now",
                "payload": {"kind": "systemEvent", "text": "Weekly LinkedIn outreach report"},
                "state": {
                    "nextRunAtMs": now + 432_000_000,
                    "lastRunAtMs": now - 172_800_000,
                    "lastStatus": "ok",
                    "lastDurationMs": 30_585,
                    "consecutiveErrors": 0
                }
            }
        ]
    }))
    .unwrap_or_default()
}

pub fn mock_status() -> StatusData {
    serde_json::from_value(json!({
        "heartbeat": {
            "agents": [{"agentId": "main", "enabled": true, "every": "1h", "everyMs": 3_600_000}]
        },
        "channelSummary": ["iMessage: configured", "  - default"],
        "sessions": {
            "count": 61,
            "defaults": {"model": "claude-sonnet-4-20250514", "contextTokens": 200_000}
        },
        "gateway": {
            "mode": "local",
            "url": "ws://127.0.0.1:18789",
            "reachable": true,
            "self": {"host": "openclaw-host.local", "ip": "192.168.1.10", "platform": "macos (arm64)"}
        },
        "gatewayService": {
            "label": "LaunchAgent",
            "installed": true,
            "runtimeShort": "running (pid 85391, state active)"
        },
        "agents": {
            "defaultId": "main",
            "agents": [{
                "id": "main",
                "name": "main",
                "workspaceDir": "~/openclaw/workspace",
                "sessionsCount": 61,
                "lastActiveAgeMs": 23_706
            }],
            "totalSessions": 61
        },
        "memoryPlugin": {"enabled": true}
    }))
    .unwrap_or_default()
}
