//! SQLite checkpoint store for accepted results and failed attempts.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::migrations::upgrade_record;
use super::schema;
use crate::error::PersistenceError;
use crate::model::CategoryResult;
use crate::quality::QualityIssue;

/// A row of the failure log.
#[derive(Debug, Clone, Serialize)]
pub struct FailedAttempt {
    pub id: i64,
    pub category_path: String,
    pub reason: String,
    pub issues: Vec<QualityIssue>,
    pub cost: f64,
    pub failed_at: DateTime<Utc>,
}

/// Aggregates over the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StoreCounts {
    pub accepted: u64,
    pub failed_attempts: u64,
    pub selections: u64,
    pub accepted_cost: f64,
}

/// Durable store keyed by category path.
#[derive(Clone)]
pub struct CheckpointStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl CheckpointStore {
    /// Open (or create) the store at `path` and apply the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await?;

        for statement in schema::all_schema_statements() {
            sqlx::query(statement).execute(&pool).await?;
        }

        tracing::info!(path = %path.display(), "Checkpoint store opened");
        Ok(Self { pool, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or overwrite the accepted result for its category.
    pub async fn upsert_accepted(&self, result: &CategoryResult) -> Result<(), PersistenceError> {
        let payload = serde_json::to_string(result)?;
        sqlx::query(
            r#"
            INSERT INTO accepted_results (
                category_path, level1, level2, level3, schema_version,
                payload, selection_count, cost, model, accepted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT (category_path) DO UPDATE SET
                schema_version = excluded.schema_version,
                payload = excluded.payload,
                selection_count = excluded.selection_count,
                cost = excluded.cost,
                model = excluded.model,
                accepted_at = excluded.accepted_at
            "#,
        )
        .bind(result.category.path())
        .bind(&result.category.level1)
        .bind(&result.category.level2)
        .bind(&result.category.level3)
        .bind(result.schema_version as i64)
        .bind(&payload)
        .bind(result.selections.len() as i64)
        .bind(result.cost)
        .bind(&result.model)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Append a rejected or failed attempt to the audit log.
    pub async fn append_failure(
        &self,
        result: &CategoryResult,
        issues: &[QualityIssue],
        reason: &str,
    ) -> Result<(), PersistenceError> {
        let payload = serde_json::to_string(result)?;
        let issues = serde_json::to_string(issues)?;
        sqlx::query(
            r#"
            INSERT INTO failed_attempts (category_path, payload, issues, reason, cost, failed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(result.category.path())
        .bind(&payload)
        .bind(&issues)
        .bind(reason)
        .bind(result.cost)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Paths of every accepted category.
    pub async fn accepted_paths(&self) -> Result<HashSet<String>, PersistenceError> {
        let rows = sqlx::query("SELECT category_path FROM accepted_results")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get("category_path")).collect())
    }

    /// Every accepted result, upgraded to the current layout.
    pub async fn load_accepted(&self) -> Result<Vec<CategoryResult>, PersistenceError> {
        let rows = sqlx::query("SELECT payload FROM accepted_results ORDER BY category_path")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let payload: String = row.get("payload");
                let value: serde_json::Value = serde_json::from_str(&payload)?;
                upgrade_record(value)
            })
            .collect()
    }

    pub async fn get_accepted(&self, path: &str) -> Result<Option<CategoryResult>, PersistenceError> {
        let row = sqlx::query("SELECT payload FROM accepted_results WHERE category_path = ?1")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let payload: String = row.get("payload");
                Ok(Some(upgrade_record(serde_json::from_str(&payload)?)?))
            }
            None => Ok(None),
        }
    }

    /// Most recent failures first.
    pub async fn recent_failures(&self, limit: u32) -> Result<Vec<FailedAttempt>, PersistenceError> {
        let rows = sqlx::query(
            r#"
            SELECT id, category_path, reason, issues, cost, failed_at
            FROM failed_attempts
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let issues: String = row.get("issues");
                let failed_at: String = row.get("failed_at");
                Ok(FailedAttempt {
                    id: row.get("id"),
                    category_path: row.get("category_path"),
                    reason: row.get("reason"),
                    issues: serde_json::from_str(&issues)?,
                    cost: row.get("cost"),
                    failed_at: DateTime::parse_from_rfc3339(&failed_at)
                        .map(|t| t.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })
            .collect()
    }

    pub async fn counts(&self) -> Result<StoreCounts, PersistenceError> {
        let accepted = sqlx::query(
            "SELECT COUNT(*) AS n, COALESCE(SUM(selection_count), 0) AS s, COALESCE(SUM(cost), 0.0) AS c FROM accepted_results",
        )
        .fetch_one(&self.pool)
        .await?;
        let failed = sqlx::query("SELECT COUNT(*) AS n FROM failed_attempts")
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreCounts {
            accepted: accepted.get::<i64, _>("n") as u64,
            failed_attempts: failed.get::<i64, _>("n") as u64,
            selections: accepted.get::<i64, _>("s") as u64,
            accepted_cost: accepted.get::<f64, _>("c"),
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Category;
    use crate::quality::QualityFamily;

    fn result(level3: &str, selections: usize, cost: f64) -> CategoryResult {
        let mut r = CategoryResult::new(Category::new("个护健康", "剃须用品", level3), "deepseek-chat");
        r.cost = cost;
        for i in 0..selections {
            r.selections.push(crate::model::ProductSelection {
                price_range: "入门级".to_string(),
                dimension: format!("d{}", i),
                product_name: "x".to_string(),
                brand: "吉列".to_string(),
                company: String::new(),
                company_intro: String::new(),
                model: String::new(),
                price: 10.0,
                selection_reason: "r".to_string(),
                confidence_score: 80.0,
                data_sources: String::new(),
            });
        }
        r
    }

    async fn store() -> (tempfile::TempDir, CheckpointStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path().join("nested").join("checkpoint.db"))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_row_per_category() {
        let (_dir, store) = store().await;
        store.upsert_accepted(&result("手动剃须刀", 3, 0.01)).await.unwrap();
        store.upsert_accepted(&result("手动剃须刀", 9, 0.02)).await.unwrap();
        store.upsert_accepted(&result("电动剃须刀", 9, 0.03)).await.unwrap();

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.accepted, 2);
        assert_eq!(counts.selections, 18);
        assert!((counts.accepted_cost - 0.05).abs() < 1e-9);

        let latest = store
            .get_accepted("个护健康/剃须用品/手动剃须刀")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.selections.len(), 9);
    }

    #[tokio::test]
    async fn test_failures_are_appended() {
        let (_dir, store) = store().await;
        let r = result("手动剃须刀", 1, 0.01);
        let issues = vec![QualityIssue::new(QualityFamily::Brand, "generic brand 'Brand-A'")];
        store.append_failure(&r, &issues, "quality gate").await.unwrap();
        store.append_failure(&r, &[], "price_ranges stage failed").await.unwrap();

        let failures = store.recent_failures(10).await.unwrap();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].reason, "price_ranges stage failed");
        assert_eq!(failures[1].issues, issues);
        assert_eq!(store.counts().await.unwrap().failed_attempts, 2);
        assert!(store.accepted_paths().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reopen_sees_previous_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.db");
        {
            let store = CheckpointStore::open(&path).await.unwrap();
            store.upsert_accepted(&result("手动剃须刀", 9, 0.0)).await.unwrap();
            store.close().await;
        }
        let store = CheckpointStore::open(&path).await.unwrap();
        let paths = store.accepted_paths().await.unwrap();
        assert!(paths.contains("个护健康/剃须用品/手动剃须刀"));
        assert_eq!(store.load_accepted().await.unwrap().len(), 1);
    }
}
