// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduled callback operations.
//!
//! Callbacks are only created inside outcome application, so insertion takes
//! the caller's transaction.

use dialflow_core::DialflowError;
use dialflow_core::types::{
    AgentId, CallbackId, CampaignId, CustomerId, ScheduledCallback,
};
use rusqlite::{Row, Transaction, params};

use crate::database::{Database, map_tr_err};
use crate::models::{fmt_opt_ts, fmt_ts, parse_enum, parse_opt_ts, parse_ts};

const CALLBACK_COLUMNS: &str = "id, agent_id, customer_id, campaign_id, scheduled_for, reason,
     priority, status, created_at, completed_at";

fn callback_from_row(row: &Row<'_>) -> rusqlite::Result<ScheduledCallback> {
    Ok(ScheduledCallback {
        id: CallbackId(row.get(0)?),
        agent_id: AgentId(row.get(1)?),
        customer_id: CustomerId(row.get(2)?),
        campaign_id: row.get::<_, Option<String>>(3)?.map(CampaignId),
        scheduled_for: parse_ts(4, &row.get::<_, String>(4)?)?,
        reason: row.get(5)?,
        priority: row.get(6)?,
        status: parse_enum(7, &row.get::<_, String>(7)?)?,
        created_at: parse_ts(8, &row.get::<_, String>(8)?)?,
        completed_at: parse_opt_ts(9, row.get(9)?)?,
    })
}

pub(crate) fn insert_callback(
    tx: &Transaction<'_>,
    callback: &ScheduledCallback,
) -> rusqlite::Result<()> {
    tx.execute(
        &format!(
            "INSERT INTO scheduled_callbacks ({CALLBACK_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ),
        params![
            callback.id.as_str(),
            callback.agent_id.as_str(),
            callback.customer_id.as_str(),
            callback.campaign_id.as_ref().map(CampaignId::as_str),
            fmt_ts(callback.scheduled_for),
            callback.reason,
            callback.priority,
            callback.status.to_string(),
            fmt_ts(callback.created_at),
            fmt_opt_ts(callback.completed_at),
        ],
    )?;
    Ok(())
}

/// Callbacks still `scheduled` for an agent, earliest first.
pub async fn list_pending_callbacks(
    db: &Database,
    agent_id: &AgentId,
) -> Result<Vec<ScheduledCallback>, DialflowError> {
    let agent_id = agent_id.clone();
    db.connection()
        .call(move |conn| -> Result<Vec<ScheduledCallback>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CALLBACK_COLUMNS} FROM scheduled_callbacks
                 WHERE agent_id = ?1 AND status = 'scheduled'
                 ORDER BY scheduled_for, id"
            ))?;
            let rows = stmt.query_map(params![agent_id.as_str()], callback_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn cancel_callback(db: &Database, id: &CallbackId) -> Result<bool, DialflowError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE scheduled_callbacks SET status = 'cancelled'
                 WHERE id = ?1 AND status = 'scheduled'",
                params![id.as_str()],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Hand a campaign's still-scheduled callbacks back to its agent, so any of
/// the agent's campaigns can serve them. Returns how many moved.
pub async fn release_campaign_callbacks(
    db: &Database,
    campaign_id: &CampaignId,
) -> Result<u64, DialflowError> {
    let campaign_id = campaign_id.clone();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE scheduled_callbacks SET campaign_id = NULL
                 WHERE campaign_id = ?1 AND status = 'scheduled'",
                params![campaign_id.as_str()],
            )
        })
        .await
        .map(|moved| moved as u64)
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures::{at, seed_agent, seed_campaign, seed_customer, setup_db};
    use dialflow_core::types::{CallbackStatus, CampaignStatus};

    async fn insert_all(db: &Database, batch: Vec<ScheduledCallback>) {
        db.connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let tx = conn.transaction()?;
                for callback in &batch {
                    insert_callback(&tx, callback)?;
                }
                tx.commit()
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn pending_callbacks_are_ordered_and_cancellable() {
        let (db, _dir) = setup_db().await;
        let agent = seed_agent(&db).await;
        let customer = seed_customer(&db, &agent, "+1001").await;

        let make = |hour: u32| ScheduledCallback {
            id: CallbackId::generate(),
            agent_id: agent.id.clone(),
            customer_id: customer.id.clone(),
            campaign_id: None,
            scheduled_for: at(hour, 0),
            reason: "customer requested callback".into(),
            priority: 3,
            status: CallbackStatus::Scheduled,
            created_at: at(8, 0),
            completed_at: None,
        };
        let late = make(15);
        let early = make(11);
        insert_all(&db, vec![late.clone(), early.clone()]).await;

        let pending = list_pending_callbacks(&db, &agent.id).await.unwrap();
        assert_eq!(pending, vec![early.clone(), late.clone()]);

        assert!(cancel_callback(&db, &early.id).await.unwrap());
        assert!(!cancel_callback(&db, &early.id).await.unwrap());
        let pending = list_pending_callbacks(&db, &agent.id).await.unwrap();
        assert_eq!(pending, vec![late]);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn releasing_a_campaign_keeps_only_scheduled_callbacks() {
        let (db, _dir) = setup_db().await;
        let agent = seed_agent(&db).await;
        let customer = seed_customer(&db, &agent, "+1001").await;
        let campaign = seed_campaign(&db, &agent, CampaignStatus::Cancelled).await;

        let make = |status: CallbackStatus| ScheduledCallback {
            id: CallbackId::generate(),
            agent_id: agent.id.clone(),
            customer_id: customer.id.clone(),
            campaign_id: Some(campaign.id.clone()),
            scheduled_for: at(11, 0),
            reason: "customer requested callback".into(),
            priority: 2,
            status,
            created_at: at(8, 0),
            completed_at: None,
        };
        let pending = make(CallbackStatus::Scheduled);
        let done = make(CallbackStatus::Completed);
        insert_all(&db, vec![pending.clone(), done.clone()]).await;

        assert_eq!(release_campaign_callbacks(&db, &campaign.id).await.unwrap(), 1);
        assert_eq!(release_campaign_callbacks(&db, &campaign.id).await.unwrap(), 0);

        let listed = list_pending_callbacks(&db, &agent.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, pending.id);
        assert!(listed[0].campaign_id.is_none());
        db.close().await.unwrap();
    }
}
