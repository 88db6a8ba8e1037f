// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign definitions, status transitions, and pool enrollment.

use chrono::{DateTime, Utc};
use dialflow_core::DialflowError;
use dialflow_core::types::{
    AgentId, Campaign, CampaignId, CampaignStatus, Customer, CustomerFilter, CustomerId,
    TimeWindow,
};
use rusqlite::{OptionalExtension, Row, Transaction, params};

use crate::database::{Database, map_tr_err};
use crate::models::{counter, fmt_time, fmt_ts, from_json, parse_enum, parse_opt_ts, parse_time, parse_ts, to_json};
use crate::queries::customers::{CUSTOMER_COLUMNS, customer_from_row};

const CAMPAIGN_COLUMNS: &str = "id, agent_id, name, status, calls_per_hour, window_start,
     window_end, interest_levels, max_days_since_last_call, max_customers, start_immediately,
     calls_completed, successful_calls, conversions, created_at, updated_at, campaign_type";

fn campaign_from_row(row: &Row<'_>) -> rusqlite::Result<Campaign> {
    Ok(Campaign {
        id: CampaignId(row.get(0)?),
        agent_id: AgentId(row.get(1)?),
        name: row.get(2)?,
        status: parse_enum(3, &row.get::<_, String>(3)?)?,
        calls_per_hour: row.get(4)?,
        window: TimeWindow::new(
            parse_time(5, &row.get::<_, String>(5)?)?,
            parse_time(6, &row.get::<_, String>(6)?)?,
        ),
        filter: CustomerFilter {
            interest_levels: from_json(7, &row.get::<_, String>(7)?)?,
            max_days_since_last_call: row.get(8)?,
            max_customers: row.get(9)?,
        },
        start_immediately: row.get(10)?,
        calls_completed: counter(row.get(11)?),
        successful_calls: counter(row.get(12)?),
        conversions: counter(row.get(13)?),
        created_at: parse_ts(14, &row.get::<_, String>(14)?)?,
        updated_at: parse_ts(15, &row.get::<_, String>(15)?)?,
        campaign_type: row.get(16)?,
    })
}

fn enroll(tx: &Transaction<'_>, id: &CampaignId, pool: &[CustomerId]) -> rusqlite::Result<()> {
    tx.execute(
        "DELETE FROM campaign_customers WHERE campaign_id = ?1",
        params![id.as_str()],
    )?;
    let mut stmt = tx.prepare(
        "INSERT OR IGNORE INTO campaign_customers (campaign_id, customer_id) VALUES (?1, ?2)",
    )?;
    for customer_id in pool {
        stmt.execute(params![id.as_str(), customer_id.as_str()])?;
    }
    Ok(())
}

/// Insert a campaign and its enrolled pool in one transaction.
pub async fn create_campaign(
    db: &Database,
    campaign: &Campaign,
    pool: &[CustomerId],
) -> Result<(), DialflowError> {
    let campaign = campaign.clone();
    let pool = pool.to_vec();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            tx.execute(
                &format!(
                    "INSERT INTO campaigns ({CAMPAIGN_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
                ),
                params![
                    campaign.id.as_str(),
                    campaign.agent_id.as_str(),
                    campaign.name,
                    campaign.status.to_string(),
                    campaign.calls_per_hour,
                    fmt_time(campaign.window.start),
                    fmt_time(campaign.window.end),
                    to_json(&campaign.filter.interest_levels)?,
                    campaign.filter.max_days_since_last_call,
                    campaign.filter.max_customers,
                    campaign.start_immediately,
                    campaign.calls_completed as i64,
                    campaign.successful_calls as i64,
                    campaign.conversions as i64,
                    fmt_ts(campaign.created_at),
                    fmt_ts(campaign.updated_at),
                    campaign.campaign_type,
                ],
            )?;
            enroll(&tx, &campaign.id, &pool)?;
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_campaign(db: &Database, id: &CampaignId) -> Result<Option<Campaign>, DialflowError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| -> Result<Option<Campaign>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1"),
                params![id.as_str()],
                campaign_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// List campaigns, optionally filtered by status, oldest first.
pub async fn list_campaigns(
    db: &Database,
    status: Option<CampaignStatus>,
) -> Result<Vec<Campaign>, DialflowError> {
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| -> Result<Vec<Campaign>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns
                 WHERE ?1 IS NULL OR status = ?1
                 ORDER BY created_at, id"
            ))?;
            let rows = stmt.query_map(params![status], campaign_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Compare-and-set the status. Returns `false` if the stored status was not `from`.
pub async fn transition_campaign(
    db: &Database,
    id: &CampaignId,
    from: CampaignStatus,
    to: CampaignStatus,
    at: DateTime<Utc>,
) -> Result<bool, DialflowError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE campaigns SET status = ?1, updated_at = ?2
                 WHERE id = ?3 AND status = ?4",
                params![to.to_string(), fmt_ts(at), id.as_str(), from.to_string()],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Rewrite the editable definition and pool, guarded on the stored status
/// still matching `campaign.status`.
pub async fn update_campaign_definition(
    db: &Database,
    campaign: &Campaign,
    pool: &[CustomerId],
) -> Result<bool, DialflowError> {
    let campaign = campaign.clone();
    let pool = pool.to_vec();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE campaigns SET name = ?1, calls_per_hour = ?2, window_start = ?3,
                     window_end = ?4, interest_levels = ?5, max_days_since_last_call = ?6,
                     max_customers = ?7, updated_at = ?8, campaign_type = ?11
                 WHERE id = ?9 AND status = ?10",
                params![
                    campaign.name,
                    campaign.calls_per_hour,
                    fmt_time(campaign.window.start),
                    fmt_time(campaign.window.end),
                    to_json(&campaign.filter.interest_levels)?,
                    campaign.filter.max_days_since_last_call,
                    campaign.filter.max_customers,
                    fmt_ts(campaign.updated_at),
                    campaign.id.as_str(),
                    campaign.status.to_string(),
                    campaign.campaign_type,
                ],
            )?;
            if changed == 0 {
                return Ok(false);
            }
            enroll(&tx, &campaign.id, &pool)?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_campaign_pool(db: &Database, id: &CampaignId) -> Result<Vec<Customer>, DialflowError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| -> Result<Vec<Customer>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CUSTOMER_COLUMNS} FROM customers c
                 JOIN campaign_customers cc ON cc.customer_id = c.id
                 WHERE cc.campaign_id = ?1
                 ORDER BY c.created_at, c.id"
            ))?;
            let rows = stmt.query_map(params![id.as_str()], customer_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn count_open_sessions(db: &Database, id: &CampaignId) -> Result<u64, DialflowError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM call_sessions WHERE campaign_id = ?1 AND outcome IS NULL",
                params![id.as_str()],
                |row| row.get(0),
            )
        })
        .await
        .map(counter)
        .map_err(map_tr_err)
}

/// Most recent dispatch of the campaign, failed dispatches included.
pub async fn last_campaign_dispatch(
    db: &Database,
    id: &CampaignId,
) -> Result<Option<DateTime<Utc>>, DialflowError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
            let raw: Option<String> = conn.query_row(
                "SELECT MAX(dispatched_at) FROM call_sessions WHERE campaign_id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )?;
            parse_opt_ts(0, raw)
        })
        .await
        .map_err(map_tr_err)
}
