use async_trait::async_trait;
use log::{error, info};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use std::collections::HashSet;

use super::{ConflictPolicy, RecordBatch, RecordStore, StoreError};
use crate::config::Config;
use crate::models::{DepartmentHires, EntityKind, QuarterlyHires};

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS departments (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS jobs (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS employees (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        hired_at TEXT NOT NULL,
        department_id INTEGER NOT NULL REFERENCES departments (id),
        job_id INTEGER NOT NULL REFERENCES jobs (id)
    )",
];

const QUARTERLY_HIRES_SQL: &str = "
    SELECT d.name AS department,
           j.name AS job,
           COUNT(*) FILTER (WHERE SUBSTRING(e.hired_at FROM 6 FOR 2) IN ('01', '02', '03')) AS q1,
           COUNT(*) FILTER (WHERE SUBSTRING(e.hired_at FROM 6 FOR 2) IN ('04', '05', '06')) AS q2,
           COUNT(*) FILTER (WHERE SUBSTRING(e.hired_at FROM 6 FOR 2) IN ('07', '08', '09')) AS q3,
           COUNT(*) FILTER (WHERE SUBSTRING(e.hired_at FROM 6 FOR 2) IN ('10', '11', '12')) AS q4
    FROM employees e
    JOIN departments d ON d.id = e.department_id
    JOIN jobs j ON j.id = e.job_id
    WHERE SUBSTRING(e.hired_at FROM 1 FOR 4) = $1
    GROUP BY d.name, j.name
    ORDER BY d.name, j.name";

const ABOVE_MEAN_HIRES_SQL: &str = "
    WITH hires AS (
        SELECT d.id, d.name AS department, COUNT(e.id) AS hired
        FROM departments d
        JOIN employees e ON e.department_id = d.id
        WHERE SUBSTRING(e.hired_at FROM 1 FOR 4) = $1
        GROUP BY d.id, d.name
    )
    SELECT id, department, hired
    FROM hires
    WHERE hired > (SELECT AVG(hired) FROM hires)
    ORDER BY hired DESC, id";

/// PostgreSQL-backed record store.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &Config) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;
        Ok(PgStore { pool })
    }

    /// Creates the three tables when they are missing.
    pub async fn create_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Database schema is ready");
        Ok(())
    }

    async fn write(conn: &mut PgConnection, batch: &RecordBatch, policy: ConflictPolicy) -> Result<Vec<i32>, sqlx::Error> {
        let mut builder: QueryBuilder<'_, Postgres> = match batch {
            RecordBatch::Departments(rows) => {
                let mut builder = QueryBuilder::new("INSERT INTO departments (id, name) ");
                builder.push_values(rows, |mut b, row| {
                    b.push_bind(row.id).push_bind(row.name.clone());
                });
                builder
            }
            RecordBatch::Jobs(rows) => {
                let mut builder = QueryBuilder::new("INSERT INTO jobs (id, name) ");
                builder.push_values(rows, |mut b, row| {
                    b.push_bind(row.id).push_bind(row.name.clone());
                });
                builder
            }
            RecordBatch::Employees(rows) => {
                let mut builder =
                    QueryBuilder::new("INSERT INTO employees (id, name, hired_at, department_id, job_id) ");
                builder.push_values(rows, |mut b, row| {
                    b.push_bind(row.id)
                        .push_bind(row.name.clone())
                        .push_bind(row.hired_at.clone())
                        .push_bind(row.department_id)
                        .push_bind(row.job_id);
                });
                builder
            }
        };

        if policy == ConflictPolicy::Skip {
            builder.push(" ON CONFLICT (id) DO NOTHING");
        }
        builder.push(" RETURNING id");

        builder.build_query_scalar::<i32>().fetch_all(&mut *conn).await
    }
}

/// The insert error is what the caller sees; a failed rollback is only
/// logged.
fn insert_failure(err: sqlx::Error, rollback: Result<(), sqlx::Error>) -> StoreError {
    if let Err(rollback_err) = rollback {
        error!("Rollback failed as well: {}", rollback_err);
    }
    StoreError::Sqlx(err)
}

#[async_trait]
impl RecordStore for PgStore {
    async fn existing_ids(&self, kind: EntityKind) -> Result<HashSet<i32>, StoreError> {
        let sql = format!("SELECT id FROM {}", kind.table_name());
        let ids = sqlx::query_scalar::<_, i32>(&sql).fetch_all(&self.pool).await?;
        Ok(ids.into_iter().collect())
    }

    async fn insert_batch(&self, batch: RecordBatch, policy: ConflictPolicy) -> Result<Vec<i32>, StoreError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;
        match Self::write(&mut *tx, &batch, policy).await {
            Ok(ids) => {
                tx.commit().await?;
                Ok(ids)
            }
            Err(err) => {
                error!("Insert into {} failed, rolling back: {}", batch.kind().table_name(), err);
                Err(insert_failure(err, tx.rollback().await))
            }
        }
    }

    async fn quarterly_hires(&self, year: i32) -> Result<Vec<QuarterlyHires>, StoreError> {
        let rows = sqlx::query_as::<_, QuarterlyHires>(QUARTERLY_HIRES_SQL)
            .bind(format!("{:04}", year))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn departments_above_mean(&self, year: i32) -> Result<Vec<DepartmentHires>, StoreError> {
        let rows = sqlx::query_as::<_, DepartmentHires>(ABOVE_MEAN_HIRES_SQL)
            .bind(format!("{:04}", year))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
