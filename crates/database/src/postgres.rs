// In crates/database/src/postgres.rs

use crate::{Error, Result, RuleStore};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use core_types::{
    CaptainAmericaStatus, Granularity, Instrument, IronManSetup, IronManStatus, RecordId,
    RuleKind, SwingHighLowPrice, SwingTarget, TradeRuleStatus,
};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use std::str::FromStr;

/// A `RuleStore` backed by PostgreSQL.
///
/// Multi-statement writes run inside a transaction and the schema's unique
/// indexes reject a second live record for the same key.
#[derive(Debug, Clone)]
pub struct PgStore(PgPool);

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self(pool)
    }
}

fn to_big(value: Decimal) -> Result<BigDecimal> {
    BigDecimal::from_str(&value.to_string()).map_err(|e| Error::Decimal(e.to_string()))
}

fn from_big(value: BigDecimal) -> Result<Decimal> {
    Decimal::from_str(&value.to_string()).map_err(|e| Error::Decimal(e.to_string()))
}

fn parse<T>(row: &PgRow, column: &str) -> Result<T>
where
    T: FromStr<Err = core_types::Error>,
{
    let raw: String = row.try_get(column).map_err(Error::OperationFailed)?;
    Ok(raw.parse()?)
}

fn captain_america_from_row(row: &PgRow) -> Result<CaptainAmericaStatus> {
    let setup_price: BigDecimal = row.try_get("setup_price").map_err(Error::OperationFailed)?;
    let setup_status: bool = row.try_get("setup_status").map_err(Error::OperationFailed)?;
    let trade_status: bool = row.try_get("trade_status").map_err(Error::OperationFailed)?;
    let second_judge: bool = row.try_get("second_judge").map_err(Error::OperationFailed)?;

    Ok(CaptainAmericaStatus {
        instrument: Instrument(row.try_get("instrument").map_err(Error::OperationFailed)?),
        granularity: parse(row, "granularity")?,
        line: parse(row, "line")?,
        setup_price: from_big(setup_price)?,
        phase: CaptainAmericaStatus::phase_from_flags(setup_status, trade_status, second_judge)?,
    })
}

fn iron_man_from_row(row: &PgRow) -> Result<IronManStatus> {
    Ok(IronManStatus {
        id: row.try_get("id").map_err(Error::OperationFailed)?,
        instrument: Instrument(row.try_get("instrument").map_err(Error::OperationFailed)?),
        granularity: parse(row, "granularity")?,
        swing_target_id: row.try_get("swing_target_id").map_err(Error::OperationFailed)?,
        trend: parse(row, "trend")?,
        active: row.try_get("status").map_err(Error::OperationFailed)?,
    })
}

fn swing_target_from_row(row: &PgRow) -> Result<SwingTarget> {
    Ok(SwingTarget {
        id: row.try_get("id").map_err(Error::OperationFailed)?,
        instrument: Instrument(row.try_get("instrument").map_err(Error::OperationFailed)?),
        granularity: parse(row, "granularity")?,
        swing_id: row.try_get("swing_id").map_err(Error::OperationFailed)?,
    })
}

fn trade_rule_from_row(row: &PgRow) -> Result<TradeRuleStatus> {
    Ok(TradeRuleStatus {
        id: row.try_get("id").map_err(Error::OperationFailed)?,
        rule: parse(row, "trade_rule")?,
        instrument: Instrument(row.try_get("instrument").map_err(Error::OperationFailed)?),
        granularity: parse(row, "granularity")?,
        candle_time: row.try_get("candle_time").map_err(Error::OperationFailed)?,
        active: row.try_get("status").map_err(Error::OperationFailed)?,
    })
}

async fn upsert_captain_america(conn: &mut PgConnection, status: &CaptainAmericaStatus) -> Result<()> {
    let (setup_status, trade_status, second_judge) = status.flags();
    sqlx::query(
        r#"
        INSERT INTO captain_america_status
            (instrument, granularity, line, setup_price, setup_status, trade_status, second_judge)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (instrument, granularity) DO UPDATE SET
            line = EXCLUDED.line,
            setup_price = EXCLUDED.setup_price,
            setup_status = EXCLUDED.setup_status,
            trade_status = EXCLUDED.trade_status,
            second_judge = EXCLUDED.second_judge,
            updated_at = NOW()
        "#,
    )
    .bind(status.instrument.as_str())
    .bind(status.granularity.as_str())
    .bind(status.line.as_str())
    .bind(to_big(status.setup_price)?)
    .bind(setup_status)
    .bind(trade_status)
    .bind(second_judge)
    .execute(&mut *conn)
    .await
    .map_err(Error::OperationFailed)?;

    Ok(())
}

/// Creates the queue entry for the key, or re-arms the existing one.
async fn arm_trade_rule(
    conn: &mut PgConnection,
    rule: RuleKind,
    instrument: &Instrument,
    granularity: Granularity,
    candle_time: DateTime<Utc>,
) -> Result<TradeRuleStatus> {
    let row = sqlx::query(
        r#"
        INSERT INTO trade_rule_status (trade_rule, instrument, granularity, candle_time, status)
        VALUES ($1, $2, $3, $4, TRUE)
        ON CONFLICT (trade_rule, instrument, granularity) DO UPDATE SET
            candle_time = EXCLUDED.candle_time,
            status = TRUE
        RETURNING id, trade_rule, instrument, granularity, candle_time, status
        "#,
    )
    .bind(rule.as_str())
    .bind(instrument.as_str())
    .bind(granularity.as_str())
    .bind(candle_time)
    .fetch_one(&mut *conn)
    .await
    .map_err(Error::OperationFailed)?;

    trade_rule_from_row(&row)
}

#[async_trait]
impl RuleStore for PgStore {
    async fn find_captain_america(
        &self,
        instrument: &Instrument,
        granularity: Granularity,
    ) -> Result<Option<CaptainAmericaStatus>> {
        let row = sqlx::query(
            r#"
            SELECT instrument, granularity, line, setup_price, setup_status, trade_status, second_judge
            FROM captain_america_status
            WHERE instrument = $1 AND granularity = $2
            "#,
        )
        .bind(instrument.as_str())
        .bind(granularity.as_str())
        .fetch_optional(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        row.as_ref().map(captain_america_from_row).transpose()
    }

    async fn save_captain_america(&self, status: &CaptainAmericaStatus) -> Result<()> {
        let mut conn = self.0.acquire().await.map_err(Error::OperationFailed)?;
        upsert_captain_america(&mut conn, status).await
    }

    async fn setup_captain_america(
        &self,
        status: &CaptainAmericaStatus,
        candle_time: DateTime<Utc>,
    ) -> Result<TradeRuleStatus> {
        let mut tx = self.0.begin().await.map_err(Error::OperationFailed)?;

        upsert_captain_america(&mut tx, status).await?;
        let entry = arm_trade_rule(
            &mut tx,
            RuleKind::CaptainAmerica,
            &status.instrument,
            status.granularity,
            candle_time,
        )
        .await?;

        tx.commit().await.map_err(Error::OperationFailed)?;
        Ok(entry)
    }

    async fn find_iron_man(
        &self,
        instrument: &Instrument,
        granularity: Granularity,
    ) -> Result<Option<IronManStatus>> {
        let row = sqlx::query(
            r#"
            SELECT id, instrument, granularity, swing_target_id, trend, status
            FROM iron_man_status
            WHERE instrument = $1 AND granularity = $2
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(instrument.as_str())
        .bind(granularity.as_str())
        .fetch_optional(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        row.as_ref().map(iron_man_from_row).transpose()
    }

    async fn create_iron_man(
        &self,
        setup: &IronManSetup,
        candle_time: DateTime<Utc>,
    ) -> Result<IronManStatus> {
        let mut tx = self.0.begin().await.map_err(Error::OperationFailed)?;

        sqlx::query(
            "UPDATE iron_man_status SET status = FALSE WHERE instrument = $1 AND granularity = $2 AND status",
        )
        .bind(setup.instrument.as_str())
        .bind(setup.granularity.as_str())
        .execute(&mut *tx)
        .await
        .map_err(Error::OperationFailed)?;

        let row = sqlx::query(
            r#"
            INSERT INTO iron_man_status (instrument, granularity, swing_target_id, trend, status)
            VALUES ($1, $2, $3, $4, TRUE)
            RETURNING id, instrument, granularity, swing_target_id, trend, status
            "#,
        )
        .bind(setup.instrument.as_str())
        .bind(setup.granularity.as_str())
        .bind(setup.swing_target_id)
        .bind(setup.trend.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::OperationFailed)?;
        let status = iron_man_from_row(&row)?;

        arm_trade_rule(&mut tx, RuleKind::IronMan, &setup.instrument, setup.granularity, candle_time).await?;

        tx.commit().await.map_err(Error::OperationFailed)?;
        Ok(status)
    }

    async fn complete_iron_man(&self, id: RecordId) -> Result<()> {
        let result = sqlx::query("UPDATE iron_man_status SET status = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.0)
            .await
            .map_err(Error::OperationFailed)?;

        if result.rows_affected() == 0 {
            return Err(Error::MissingRecord { table: "iron_man_status", id });
        }
        Ok(())
    }

    async fn find_current_swing_target(
        &self,
        instrument: &Instrument,
        granularity: Granularity,
    ) -> Result<Option<SwingTarget>> {
        let row = sqlx::query(
            r#"
            SELECT id, instrument, granularity, swing_id
            FROM swing_targets
            WHERE instrument = $1 AND granularity = $2
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(instrument.as_str())
        .bind(granularity.as_str())
        .fetch_optional(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        row.as_ref().map(swing_target_from_row).transpose()
    }

    async fn find_swing_target(&self, id: RecordId) -> Result<Option<SwingTarget>> {
        let row = sqlx::query("SELECT id, instrument, granularity, swing_id FROM swing_targets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.0)
            .await
            .map_err(Error::OperationFailed)?;

        row.as_ref().map(swing_target_from_row).transpose()
    }

    async fn find_swing_high_low(&self, swing_id: RecordId) -> Result<Option<SwingHighLowPrice>> {
        let row = sqlx::query(
            "SELECT swing_id, high_price, low_price FROM swing_high_low_prices WHERE swing_id = $1",
        )
        .bind(swing_id)
        .fetch_optional(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let high: BigDecimal = row.try_get("high_price").map_err(Error::OperationFailed)?;
        let low: BigDecimal = row.try_get("low_price").map_err(Error::OperationFailed)?;
        Ok(Some(SwingHighLowPrice {
            swing_id: row.try_get("swing_id").map_err(Error::OperationFailed)?,
            high_price: from_big(high)?,
            low_price: from_big(low)?,
        }))
    }

    async fn record_swing(
        &self,
        instrument: &Instrument,
        granularity: Granularity,
        high_price: Decimal,
        low_price: Decimal,
    ) -> Result<SwingTarget> {
        let mut tx = self.0.begin().await.map_err(Error::OperationFailed)?;

        let swing_id: RecordId = sqlx::query_scalar(
            "INSERT INTO swing_high_low_prices (high_price, low_price) VALUES ($1, $2) RETURNING swing_id",
        )
        .bind(to_big(high_price)?)
        .bind(to_big(low_price)?)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::OperationFailed)?;

        let row = sqlx::query(
            r#"
            INSERT INTO swing_targets (instrument, granularity, swing_id)
            VALUES ($1, $2, $3)
            RETURNING id, instrument, granularity, swing_id
            "#,
        )
        .bind(instrument.as_str())
        .bind(granularity.as_str())
        .bind(swing_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::OperationFailed)?;

        tx.commit().await.map_err(Error::OperationFailed)?;

        swing_target_from_row(&row)
    }

    async fn find_trade_rule(
        &self,
        rule: RuleKind,
        instrument: &Instrument,
        granularity: Granularity,
    ) -> Result<Option<TradeRuleStatus>> {
        let row = sqlx::query(
            r#"
            SELECT id, trade_rule, instrument, granularity, candle_time, status
            FROM trade_rule_status
            WHERE trade_rule = $1 AND instrument = $2 AND granularity = $3
            "#,
        )
        .bind(rule.as_str())
        .bind(instrument.as_str())
        .bind(granularity.as_str())
        .fetch_optional(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        row.as_ref().map(trade_rule_from_row).transpose()
    }

    async fn complete_trade_rule(&self, id: RecordId) -> Result<()> {
        let result = sqlx::query("UPDATE trade_rule_status SET status = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.0)
            .await
            .map_err(Error::OperationFailed)?;

        if result.rows_affected() == 0 {
            return Err(Error::MissingRecord { table: "trade_rule_status", id });
        }
        Ok(())
    }
}
