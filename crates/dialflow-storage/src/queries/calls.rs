// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Call session lifecycle: the open-session guard, dispatch failures, and
//! atomic outcome application.

use chrono::{DateTime, Utc};
use dialflow_core::DialflowError;
use dialflow_core::types::{
    AgentId, CallNote, CallOutcome, CallSession, CallSessionId, CallbackId, CampaignId,
    CustomerId, Objection, OutcomeUpdate,
};
use rusqlite::{OptionalExtension, Row, Transaction, params};

use crate::database::{Database, map_tr_err};
use crate::models::{counter, fmt_opt_ts, fmt_ts, from_json, parse_enum, parse_opt_ts, parse_ts, to_json};
use crate::queries::callbacks::insert_callback;

const SESSION_COLUMNS: &str = "id, agent_id, customer_id, campaign_id, callback_id, call_type,
     phone_number, dispatched_at, connected_at, ended_at, outcome, duration_seconds,
     provider_call_id, failure_reason, notes";

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<CallSession> {
    let outcome: Option<String> = row.get(10)?;
    Ok(CallSession {
        id: CallSessionId(row.get(0)?),
        agent_id: AgentId(row.get(1)?),
        customer_id: CustomerId(row.get(2)?),
        campaign_id: row.get::<_, Option<String>>(3)?.map(CampaignId),
        callback_id: row.get::<_, Option<String>>(4)?.map(CallbackId),
        call_type: parse_enum(5, &row.get::<_, String>(5)?)?,
        phone_number: row.get(6)?,
        dispatched_at: parse_ts(7, &row.get::<_, String>(7)?)?,
        connected_at: parse_opt_ts(8, row.get(8)?)?,
        ended_at: parse_opt_ts(9, row.get(9)?)?,
        outcome: outcome.map(|raw| parse_enum::<CallOutcome>(10, &raw)).transpose()?,
        duration_seconds: row.get(11)?,
        provider_call_id: row.get(12)?,
        failure_reason: row.get(13)?,
        notes: row.get(14)?,
    })
}

/// Claim the customer and insert the session, or do nothing.
///
/// The claim is a conditional update on the customer row: it succeeds only
/// while the customer has no open session and is still callable. A
/// follow-up session also moves its callback to `completed`.
pub async fn open_call_session(db: &Database, session: &CallSession) -> Result<bool, DialflowError> {
    let session = session.clone();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let tx = conn.transaction()?;
            let claimed = tx.execute(
                "UPDATE customers SET open_session_id = ?1
                 WHERE id = ?2 AND open_session_id IS NULL AND do_not_call = 0
                   AND archived_at IS NULL AND interest_level != 'converted'",
                params![session.id.as_str(), session.customer_id.as_str()],
            )?;
            if claimed == 0 {
                return Ok(false);
            }

            tx.execute(
                &format!(
                    "INSERT INTO call_sessions ({SESSION_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
                ),
                params![
                    session.id.as_str(),
                    session.agent_id.as_str(),
                    session.customer_id.as_str(),
                    session.campaign_id.as_ref().map(CampaignId::as_str),
                    session.callback_id.as_ref().map(CallbackId::as_str),
                    session.call_type.to_string(),
                    session.phone_number,
                    fmt_ts(session.dispatched_at),
                    fmt_opt_ts(session.connected_at),
                    fmt_opt_ts(session.ended_at),
                    session.outcome.map(|o| o.to_string()),
                    session.duration_seconds,
                    session.provider_call_id,
                    session.failure_reason,
                    session.notes,
                ],
            )?;

            if let Some(callback_id) = &session.callback_id {
                tx.execute(
                    "UPDATE scheduled_callbacks SET status = 'completed', completed_at = ?1
                     WHERE id = ?2 AND status = 'scheduled'",
                    params![fmt_ts(session.dispatched_at), callback_id.as_str()],
                )?;
            }

            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn record_provider_call_id(
    db: &Database,
    id: &CallSessionId,
    provider_call_id: &str,
) -> Result<(), DialflowError> {
    let id = id.clone();
    let provider_call_id = provider_call_id.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE call_sessions SET provider_call_id = ?1 WHERE id = ?2",
                params![provider_call_id, id.as_str()],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Release the guard on the customer if it still points at `session_id`.
fn release_customer(
    tx: &Transaction<'_>,
    customer_id: &str,
    session_id: &str,
) -> rusqlite::Result<()> {
    tx.execute(
        "UPDATE customers SET open_session_id = NULL
         WHERE id = ?1 AND open_session_id = ?2",
        params![customer_id, session_id],
    )?;
    Ok(())
}

/// Conclude a session whose dispatch failed as `no_answer`.
///
/// Customer counters and interest stay as they were; only the guard is
/// released. A callback consumed by this session goes back to `scheduled`.
pub async fn fail_call_session(
    db: &Database,
    id: &CallSessionId,
    reason: &str,
    at: DateTime<Utc>,
) -> Result<bool, DialflowError> {
    let id = id.clone();
    let reason = reason.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let tx = conn.transaction()?;
            let open: Option<(String, Option<String>)> = tx
                .query_row(
                    "SELECT customer_id, callback_id FROM call_sessions
                     WHERE id = ?1 AND outcome IS NULL",
                    params![id.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((customer_id, callback_id)) = open else {
                return Ok(false);
            };

            tx.execute(
                "UPDATE call_sessions
                 SET outcome = 'no_answer', ended_at = ?1, duration_seconds = 0, failure_reason = ?2
                 WHERE id = ?3 AND outcome IS NULL",
                params![fmt_ts(at), reason, id.as_str()],
            )?;
            release_customer(&tx, &customer_id, id.as_str())?;
            if let Some(callback_id) = callback_id {
                tx.execute(
                    "UPDATE scheduled_callbacks
                     SET status = 'scheduled', completed_at = NULL,
                         campaign_id = CASE
                             WHEN campaign_id IN (SELECT id FROM campaigns
                                                  WHERE status IN ('completed', 'cancelled'))
                             THEN NULL ELSE campaign_id END
                     WHERE id = ?1 AND status = 'completed'",
                    params![callback_id],
                )?;
            }
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}

/// Stamp the connect time of a session that is still open and not yet connected.
pub async fn record_connected(
    db: &Database,
    id: &CallSessionId,
    at: DateTime<Utc>,
) -> Result<bool, DialflowError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE call_sessions SET connected_at = ?1
                 WHERE id = ?2 AND outcome IS NULL AND connected_at IS NULL",
                params![fmt_ts(at), id.as_str()],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_call_session(
    db: &Database,
    id: &CallSessionId,
) -> Result<Option<CallSession>, DialflowError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| -> Result<Option<CallSession>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM call_sessions WHERE id = ?1"),
                params![id.as_str()],
                session_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_open_sessions(
    db: &Database,
    agent_id: &AgentId,
) -> Result<Vec<CallSession>, DialflowError> {
    let agent_id = agent_id.clone();
    db.connection()
        .call(move |conn| -> Result<Vec<CallSession>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM call_sessions
                 WHERE agent_id = ?1 AND outcome IS NULL
                 ORDER BY dispatched_at, id"
            ))?;
            let rows = stmt.query_map(params![agent_id.as_str()], session_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Dispatches that reached the provider for an agent since `since`.
pub async fn count_dispatches_since(
    db: &Database,
    agent_id: &AgentId,
    since: DateTime<Utc>,
) -> Result<u64, DialflowError> {
    let agent_id = agent_id.clone();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM call_sessions
                 WHERE agent_id = ?1 AND dispatched_at >= ?2 AND failure_reason IS NULL",
                params![agent_id.as_str(), fmt_ts(since)],
                |row| row.get(0),
            )
        })
        .await
        .map(counter)
        .map_err(map_tr_err)
}

/// Write every effect of a concluded call in one transaction.
///
/// The session update is guarded on `outcome IS NULL`; when it matches no
/// row the whole call is a no-op and `false` is returned.
pub async fn apply_outcome(db: &Database, update: &OutcomeUpdate) -> Result<bool, DialflowError> {
    let update = update.clone();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let tx = conn.transaction()?;
            let concluded = tx.execute(
                "UPDATE call_sessions
                 SET outcome = ?1, connected_at = ?2, ended_at = ?3, duration_seconds = ?4,
                     notes = COALESCE(?5, notes)
                 WHERE id = ?6 AND outcome IS NULL",
                params![
                    update.outcome.to_string(),
                    fmt_opt_ts(update.connected_at),
                    fmt_ts(update.ended_at),
                    update.duration_seconds,
                    update.notes,
                    update.session_id.as_str(),
                ],
            )?;
            if concluded == 0 {
                return Ok(false);
            }

            apply_customer_update(&tx, &update)?;

            if let Some(callback) = &update.callback {
                insert_callback(&tx, callback)?;
            }

            let converted = i64::from(update.outcome == CallOutcome::Converted);
            let successful = i64::from(update.customer.successful);
            let satisfaction = update.satisfaction.map(i64::from).unwrap_or(0);
            let rated = i64::from(update.satisfaction.is_some());
            tx.execute(
                "UPDATE agents
                 SET calls_handled = calls_handled + 1,
                     conversions = conversions + ?1,
                     satisfaction_total = satisfaction_total + ?2,
                     satisfaction_count = satisfaction_count + ?3,
                     status = CASE
                         WHEN status = 'learning' AND calls_handled + 1 >= ?4 THEN 'active'
                         ELSE status
                     END
                 WHERE id = ?5",
                params![
                    converted,
                    satisfaction,
                    rated,
                    dialflow_core::types::AGENT_ACTIVATION_CALLS as i64,
                    update.agent_id.as_str(),
                ],
            )?;

            if let Some(campaign_id) = &update.campaign_id {
                tx.execute(
                    "UPDATE campaigns
                     SET calls_completed = calls_completed + 1,
                         successful_calls = successful_calls + ?1,
                         conversions = conversions + ?2,
                         updated_at = ?3
                     WHERE id = ?4",
                    params![successful, converted, fmt_ts(update.ended_at), campaign_id.as_str()],
                )?;
            }

            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}

fn apply_customer_update(tx: &Transaction<'_>, update: &OutcomeUpdate) -> rusqlite::Result<()> {
    let change = &update.customer;
    let (objections_raw, notes_raw): (String, String) = tx.query_row(
        "SELECT objections, notes FROM customers WHERE id = ?1",
        params![update.customer_id.as_str()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let mut objections: Vec<Objection> = from_json(0, &objections_raw)?;
    objections.extend(change.new_objections.iter().cloned());
    let mut notes: Vec<CallNote> = from_json(1, &notes_raw)?;
    notes.extend(change.new_note.iter().cloned());

    tx.execute(
        "UPDATE customers
         SET interest_level = ?1,
             total_calls = total_calls + 1,
             successful_calls = successful_calls + ?2,
             last_interaction = ?3,
             next_followup = COALESCE(?4, next_followup),
             objections = ?5,
             notes = ?6
         WHERE id = ?7",
        params![
            change.interest_level.to_string(),
            i64::from(change.successful),
            fmt_ts(change.last_interaction),
            fmt_opt_ts(change.next_followup),
            to_json(&objections)?,
            to_json(&notes)?,
            update.customer_id.as_str(),
        ],
    )?;
    release_customer(tx, update.customer_id.as_str(), update.session_id.as_str())
}
