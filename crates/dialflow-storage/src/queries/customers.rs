// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Customer directory operations.

use chrono::{DateTime, Utc};
use dialflow_core::DialflowError;
use dialflow_core::types::{AgentId, CallSessionId, Customer, CustomerId};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};
use crate::models::{fmt_opt_ts, fmt_ts, from_json, parse_enum, parse_opt_ts, parse_ts, to_json};

/// Column list shared with the campaign pool query (prefixed `c.`).
pub(crate) const CUSTOMER_COLUMNS: &str = "c.id, c.agent_id, c.phone_number, c.name,
     c.interest_level, c.do_not_call, c.last_interaction, c.next_followup, c.total_calls,
     c.successful_calls, c.objections, c.notes, c.open_session_id, c.archived_at, c.created_at";

pub(crate) fn customer_from_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: CustomerId(row.get(0)?),
        agent_id: AgentId(row.get(1)?),
        phone_number: row.get(2)?,
        name: row.get(3)?,
        interest_level: parse_enum(4, &row.get::<_, String>(4)?)?,
        do_not_call: row.get(5)?,
        last_interaction: parse_opt_ts(6, row.get(6)?)?,
        next_followup: parse_opt_ts(7, row.get(7)?)?,
        total_calls: row.get(8)?,
        successful_calls: row.get(9)?,
        objections: from_json(10, &row.get::<_, String>(10)?)?,
        notes: from_json(11, &row.get::<_, String>(11)?)?,
        open_session_id: row.get::<_, Option<String>>(12)?.map(CallSessionId),
        archived_at: parse_opt_ts(13, row.get(13)?)?,
        created_at: parse_ts(14, &row.get::<_, String>(14)?)?,
    })
}

/// Insert the customer unless `(agent_id, phone_number)` already exists, then
/// return whichever record is stored.
pub async fn upsert_customer(db: &Database, customer: &Customer) -> Result<Customer, DialflowError> {
    let customer = customer.clone();
    db.connection()
        .call(move |conn| -> Result<Customer, rusqlite::Error> {
            conn.execute(
                "INSERT INTO customers (id, agent_id, phone_number, name, interest_level,
                     do_not_call, last_interaction, next_followup, total_calls, successful_calls,
                     objections, notes, open_session_id, archived_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, NULL, ?13, ?14)
                 ON CONFLICT (agent_id, phone_number) DO NOTHING",
                params![
                    customer.id.as_str(),
                    customer.agent_id.as_str(),
                    customer.phone_number,
                    customer.name,
                    customer.interest_level.to_string(),
                    customer.do_not_call,
                    fmt_opt_ts(customer.last_interaction),
                    fmt_opt_ts(customer.next_followup),
                    customer.total_calls,
                    customer.successful_calls,
                    to_json(&customer.objections)?,
                    to_json(&customer.notes)?,
                    fmt_opt_ts(customer.archived_at),
                    fmt_ts(customer.created_at),
                ],
            )?;
            conn.query_row(
                &format!(
                    "SELECT {CUSTOMER_COLUMNS} FROM customers c
                     WHERE c.agent_id = ?1 AND c.phone_number = ?2"
                ),
                params![customer.agent_id.as_str(), customer.phone_number],
                customer_from_row,
            )
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_customer(db: &Database, id: &CustomerId) -> Result<Option<Customer>, DialflowError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| -> Result<Option<Customer>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {CUSTOMER_COLUMNS} FROM customers c WHERE c.id = ?1"),
                params![id.as_str()],
                customer_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find_customer_by_phone(
    db: &Database,
    agent_id: &AgentId,
    phone_number: &str,
) -> Result<Option<Customer>, DialflowError> {
    let agent_id = agent_id.clone();
    let phone_number = phone_number.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Customer>, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "SELECT {CUSTOMER_COLUMNS} FROM customers c
                     WHERE c.agent_id = ?1 AND c.phone_number = ?2"
                ),
                params![agent_id.as_str(), phone_number],
                customer_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_customers(db: &Database, agent_id: &AgentId) -> Result<Vec<Customer>, DialflowError> {
    let agent_id = agent_id.clone();
    db.connection()
        .call(move |conn| -> Result<Vec<Customer>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CUSTOMER_COLUMNS} FROM customers c
                 WHERE c.agent_id = ?1 ORDER BY c.created_at, c.id"
            ))?;
            let rows = stmt.query_map(params![agent_id.as_str()], customer_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_do_not_call(db: &Database, id: &CustomerId, flag: bool) -> Result<bool, DialflowError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE customers SET do_not_call = ?1 WHERE id = ?2",
                params![flag, id.as_str()],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Soft-delete: the row and its history stay, the customer leaves every pool.
pub async fn archive_customer(
    db: &Database,
    id: &CustomerId,
    at: DateTime<Utc>,
) -> Result<bool, DialflowError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE customers SET archived_at = ?1 WHERE id = ?2 AND archived_at IS NULL",
                params![fmt_ts(at), id.as_str()],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}
