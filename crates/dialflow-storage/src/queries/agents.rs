// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent CRUD operations.

use dialflow_core::DialflowError;
use dialflow_core::types::{Agent, AgentId, AgentStatus};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};
use crate::models::{counter, fmt_ts, parse_enum, parse_ts};

const AGENT_COLUMNS: &str = "id, name, status, max_daily_calls, calls_handled, conversions,
     satisfaction_total, satisfaction_count, created_at";

fn agent_from_row(row: &Row<'_>) -> rusqlite::Result<Agent> {
    Ok(Agent {
        id: AgentId(row.get(0)?),
        name: row.get(1)?,
        status: parse_enum(2, &row.get::<_, String>(2)?)?,
        max_daily_calls: row.get(3)?,
        calls_handled: counter(row.get(4)?),
        conversions: counter(row.get(5)?),
        satisfaction_total: counter(row.get(6)?),
        satisfaction_count: counter(row.get(7)?),
        created_at: parse_ts(8, &row.get::<_, String>(8)?)?,
    })
}

pub async fn create_agent(db: &Database, agent: &Agent) -> Result<(), DialflowError> {
    let agent = agent.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO agents (id, name, status, max_daily_calls, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    agent.id.as_str(),
                    agent.name,
                    agent.status.to_string(),
                    agent.max_daily_calls,
                    fmt_ts(agent.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_agent(db: &Database, id: &AgentId) -> Result<Option<Agent>, DialflowError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| -> Result<Option<Agent>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?1"),
                params![id.as_str()],
                agent_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_agents(db: &Database) -> Result<Vec<Agent>, DialflowError> {
    db.connection()
        .call(|conn| -> Result<Vec<Agent>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {AGENT_COLUMNS} FROM agents ORDER BY created_at, id"
            ))?;
            let rows = stmt.query_map([], agent_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_agent_status(
    db: &Database,
    id: &AgentId,
    status: AgentStatus,
) -> Result<bool, DialflowError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE agents SET status = ?1 WHERE id = ?2",
                params![status.to_string(), id.as_str()],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}
