//! Dashboard statistics over the durable record.

use crate::database::{to_db_time, Database};
use crate::error::Result;
use chrono::{DateTime, Duration, DurationRound, NaiveTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::HashMap;

/// Reporting window. Unknown names fall back to `Week`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    #[default]
    Week,
    Month,
}

impl Period {
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("day") => Period::Day,
            Some("month") => Period::Month,
            _ => Period::Week,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Period::Day => Duration::hours(24),
            Period::Week => Duration::days(7),
            Period::Month => Duration::days(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    /// Moves within ±5% count as stable.
    pub fn from_change(change: f64) -> Self {
        if change > 5.0 {
            Trend::Up
        } else if change < -5.0 {
            Trend::Down
        } else {
            Trend::Stable
        }
    }
}

/// One dashboard card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiMetric {
    pub label: String,
    pub value: String,
    pub change: f64,
    pub trend: Trend,
}

impl KpiMetric {
    fn new(label: &str, value: String, current: f64, previous: f64) -> Self {
        let change = percent_change(current, previous);
        Self { label: label.to_string(), value, change, trend: Trend::from_change(change) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelinePoint {
    pub date: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsResponse {
    pub period: Period,
    pub kpi_metrics: Vec<KpiMetric>,
    pub timeline: Vec<TimelinePoint>,
}

#[derive(Debug, Clone)]
pub struct StatsCollector {
    db: Database,
}

impl StatsCollector {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn collect(&self, period: Period) -> Result<StatsResponse> {
        self.collect_at(period, Utc::now()).await
    }

    /// Card values are all-time totals; `change` compares activity in the
    /// window ending at `now` against the window before it.
    pub async fn collect_at(&self, period: Period, now: DateTime<Utc>) -> Result<StatsResponse> {
        self.db
            .call(move |conn| {
                let kpi_metrics = kpi_metrics(conn, period, now)?;
                let timeline = timeline(conn, period, now)?;
                Ok(StatsResponse { period, kpi_metrics, timeline })
            })
            .await
    }
}

fn kpi_metrics(conn: &Connection, period: Period, now: DateTime<Utc>) -> Result<Vec<KpiMetric>> {
    let end = to_db_time(now);
    let mid = to_db_time(now - period.duration());
    let start = to_db_time(now - period.duration() * 2);

    let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };
    let count_between = |sql: &str, from: &str, to: &str| -> Result<i64> {
        Ok(conn.query_row(sql, params![from, to], |r| r.get(0))?)
    };
    let avg_between = |from: &str, to: &str| -> Result<f64> {
        let avg: Option<f64> = conn.query_row(
            "SELECT AVG(length) FROM messages WHERE created_at >= ?1 AND created_at < ?2",
            params![from, to],
            |r| r.get(0),
        )?;
        Ok(avg.unwrap_or(0.0))
    };

    const NEW_USERS: &str = "SELECT COUNT(*) FROM users WHERE created_at >= ?1 AND created_at < ?2";
    const NEW_MESSAGES: &str =
        "SELECT COUNT(*) FROM messages WHERE created_at >= ?1 AND created_at < ?2";
    const NEW_DELETIONS: &str =
        "SELECT COUNT(*) FROM messages WHERE deleted_at >= ?1 AND deleted_at < ?2";

    let total_users = count("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")?;
    let total_messages = count("SELECT COUNT(*) FROM messages WHERE deleted_at IS NULL")?;
    let total_deleted = count("SELECT COUNT(*) FROM messages WHERE deleted_at IS NOT NULL")?;
    let avg_now = avg_between(&mid, &end)?;
    let avg_prev = avg_between(&start, &mid)?;

    Ok(vec![
        KpiMetric::new(
            "Total Users",
            format_thousands(total_users),
            count_between(NEW_USERS, &mid, &end)? as f64,
            count_between(NEW_USERS, &start, &mid)? as f64,
        ),
        KpiMetric::new(
            "Total Messages",
            format_thousands(total_messages),
            count_between(NEW_MESSAGES, &mid, &end)? as f64,
            count_between(NEW_MESSAGES, &start, &mid)? as f64,
        ),
        KpiMetric::new(
            "Deleted Messages",
            format_thousands(total_deleted),
            count_between(NEW_DELETIONS, &mid, &end)? as f64,
            count_between(NEW_DELETIONS, &start, &mid)? as f64,
        ),
        KpiMetric::new(
            "Avg Message Length",
            format!("{} chars", avg_now.round() as i64),
            avg_now,
            avg_prev,
        ),
    ])
}

/// Messages sent per bucket: 24 hourly points for a day, otherwise one per day.
fn timeline(conn: &Connection, period: Period, now: DateTime<Utc>) -> Result<Vec<TimelinePoint>> {
    let (buckets, key_len, step, first) = match period {
        Period::Day => {
            let hour = now.duration_trunc(Duration::hours(1)).unwrap_or(now);
            (24, 13, Duration::hours(1), hour - Duration::hours(23))
        }
        Period::Week | Period::Month => {
            let days = if period == Period::Week { 7 } else { 30 };
            let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
            (days, 10, Duration::days(1), midnight - Duration::days(days - 1))
        }
    };

    let mut stmt = conn.prepare(
        "SELECT substr(created_at, 1, ?1) AS bucket, COUNT(*) FROM messages \
         WHERE created_at >= ?2 AND created_at <= ?3 GROUP BY bucket",
    )?;
    let counts = stmt
        .query_map(params![key_len, to_db_time(first), to_db_time(now)], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
        })?
        .collect::<rusqlite::Result<HashMap<_, _>>>()?;

    Ok((0..buckets)
        .map(|i| {
            let at = first + step * i as i32;
            let (key, date) = match period {
                Period::Day => {
                    let key = at.format("%Y-%m-%dT%H").to_string();
                    let date = format!("{key}:00:00");
                    (key, date)
                }
                _ => {
                    let key = at.format("%Y-%m-%d").to_string();
                    (key.clone(), key)
                }
            };
            TimelinePoint { value: counts.get(&key).copied().unwrap_or(0), date }
        })
        .collect())
}

/// Percent change rounded to one decimal. Growth from zero reads as 100%.
pub fn percent_change(current: f64, previous: f64) -> f64 {
    let raw = if previous == 0.0 {
        if current == 0.0 {
            0.0
        } else {
            100.0
        }
    } else {
        (current - previous) / previous * 100.0
    };
    (raw * 10.0).round() / 10.0
}

pub fn format_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
