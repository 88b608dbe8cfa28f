//! Cached insight and period-trend storage

use super::documents::parse_ts;
use super::Database;
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::Serialize;

/// Cached category insight (trend + forecast), 24h TTL on top of hash validity
#[derive(Debug, Clone, Serialize)]
pub struct CategoryInsight {
    pub key: String,
    pub trend_text: String,
    pub forecast_text: String,
    pub contributing_count: usize,
    pub content_hash: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

/// Cached per-period trend; validity is hash-only
#[derive(Debug, Clone, Serialize)]
pub struct PeriodTrend {
    pub category: String,
    pub period_type: String,
    pub period_label: String,
    pub trend_text: String,
    pub contributing_count: usize,
    pub content_hash: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

impl Database {
    pub fn category_insight(&self, key: &str) -> Result<Option<CategoryInsight>> {
        let result = self.conn.query_row(
            "SELECT key, trend_text, forecast_text, contributing_count,
                    content_hash, model, created_at
             FROM category_insights WHERE key = ?1",
            params![key],
            |row| {
                Ok(CategoryInsight {
                    key: row.get(0)?,
                    trend_text: row.get(1)?,
                    forecast_text: row.get(2)?,
                    contributing_count: row.get::<_, i64>(3)? as usize,
                    content_hash: row.get(4)?,
                    model: row.get(5)?,
                    created_at: parse_ts(row.get(6)?).unwrap_or_else(Utc::now),
                })
            },
        );
        match result {
            Ok(insight) => Ok(Some(insight)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save_category_insight(
        &self,
        key: &str,
        trend_text: &str,
        forecast_text: &str,
        contributing_count: usize,
        content_hash: &str,
        model: &str,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO category_insights
             (key, trend_text, forecast_text, contributing_count, content_hash, model, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                key,
                trend_text,
                forecast_text,
                contributing_count as i64,
                content_hash,
                model,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn period_trend(
        &self,
        category: &str,
        period_type: &str,
        period_label: &str,
    ) -> Result<Option<PeriodTrend>> {
        let result = self.conn.query_row(
            "SELECT category, period_type, period_label, trend_text,
                    contributing_count, content_hash, model, created_at
             FROM period_trends
             WHERE category = ?1 AND period_type = ?2 AND period_label = ?3",
            params![category, period_type, period_label],
            |row| {
                Ok(PeriodTrend {
                    category: row.get(0)?,
                    period_type: row.get(1)?,
                    period_label: row.get(2)?,
                    trend_text: row.get(3)?,
                    contributing_count: row.get::<_, i64>(4)? as usize,
                    content_hash: row.get(5)?,
                    model: row.get(6)?,
                    created_at: parse_ts(row.get(7)?).unwrap_or_else(Utc::now),
                })
            },
        );
        match result {
            Ok(trend) => Ok(Some(trend)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save_period_trend(
        &self,
        category: &str,
        period_type: &str,
        period_label: &str,
        trend_text: &str,
        contributing_count: usize,
        content_hash: &str,
        model: &str,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO period_trends
             (category, period_type, period_label, trend_text, contributing_count,
              content_hash, model, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                category,
                period_type,
                period_label,
                trend_text,
                contributing_count as i64,
                content_hash,
                model,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Backdate a cached entry's timestamp (test support for TTL behavior)
    #[doc(hidden)]
    pub fn set_insight_created_at(&self, key: &str, created_at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE category_insights SET created_at = ?1 WHERE key = ?2",
            params![created_at.to_rfc3339(), key],
        )?;
        Ok(())
    }

    /// Backdate a period trend's timestamp (test support for no-TTL behavior)
    #[doc(hidden)]
    pub fn set_period_trend_created_at(
        &self,
        category: &str,
        period_type: &str,
        period_label: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE period_trends SET created_at = ?1
             WHERE category = ?2 AND period_type = ?3 AND period_label = ?4",
            params![created_at.to_rfc3339(), category, period_type, period_label],
        )?;
        Ok(())
    }
}
