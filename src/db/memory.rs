use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::Mutex;

use super::{ConflictPolicy, RecordBatch, RecordStore, StoreError};
use crate::models::{Department, DepartmentHires, Employee, EntityKind, Job, QuarterlyHires};

#[derive(Default)]
struct Tables {
    departments: BTreeMap<i32, Department>,
    jobs: BTreeMap<i32, Job>,
    employees: BTreeMap<i32, Employee>,
}

impl Tables {
    fn ids(&self, kind: EntityKind) -> HashSet<i32> {
        match kind {
            EntityKind::Department => self.departments.keys().copied().collect(),
            EntityKind::Job => self.jobs.keys().copied().collect(),
            EntityKind::Employee => self.employees.keys().copied().collect(),
        }
    }

    fn hires_in(&self, year: i32) -> impl Iterator<Item = &Employee> {
        let year = format!("{:04}", year);
        self.employees
            .values()
            .filter(move |e| e.hired_at.get(..4) == Some(year.as_str()))
    }
}

/// Record store kept in process memory. Writes are all-or-nothing: a batch is
/// checked in full against the current tables before any row is applied.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Splits `ids` into the ones to write, honouring `policy` for ids already in
/// `taken` or repeated within the batch.
fn admit(
    table: &'static str,
    ids: impl Iterator<Item = i32>,
    taken: &HashSet<i32>,
    policy: ConflictPolicy,
) -> Result<Vec<bool>, StoreError> {
    let mut seen = HashSet::new();
    let mut admitted = Vec::new();
    for id in ids {
        let fresh = !taken.contains(&id) && seen.insert(id);
        if !fresh && policy == ConflictPolicy::Fail {
            return Err(StoreError::UniqueViolation { table, id });
        }
        admitted.push(fresh);
    }
    Ok(admitted)
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn existing_ids(&self, kind: EntityKind) -> Result<HashSet<i32>, StoreError> {
        Ok(self.tables.lock().await.ids(kind))
    }

    async fn insert_batch(&self, batch: RecordBatch, policy: ConflictPolicy) -> Result<Vec<i32>, StoreError> {
        let mut tables = self.tables.lock().await;
        let taken = tables.ids(batch.kind());
        let table = batch.kind().table_name();

        match batch {
            RecordBatch::Departments(rows) => {
                let admitted = admit(table, rows.iter().map(|r| r.id), &taken, policy)?;
                let mut inserted = Vec::new();
                for (row, fresh) in rows.into_iter().zip(admitted) {
                    if fresh {
                        inserted.push(row.id);
                        tables.departments.insert(row.id, row);
                    }
                }
                Ok(inserted)
            }
            RecordBatch::Jobs(rows) => {
                let admitted = admit(table, rows.iter().map(|r| r.id), &taken, policy)?;
                let mut inserted = Vec::new();
                for (row, fresh) in rows.into_iter().zip(admitted) {
                    if fresh {
                        inserted.push(row.id);
                        tables.jobs.insert(row.id, row);
                    }
                }
                Ok(inserted)
            }
            RecordBatch::Employees(rows) => {
                let admitted = admit(table, rows.iter().map(|r| r.id), &taken, policy)?;
                for (row, fresh) in rows.iter().zip(&admitted) {
                    if !*fresh {
                        continue;
                    }
                    if !tables.departments.contains_key(&row.department_id) {
                        return Err(StoreError::ForeignKeyViolation {
                            table,
                            column: "department_id",
                            id: row.department_id,
                        });
                    }
                    if !tables.jobs.contains_key(&row.job_id) {
                        return Err(StoreError::ForeignKeyViolation {
                            table,
                            column: "job_id",
                            id: row.job_id,
                        });
                    }
                }
                let mut inserted = Vec::new();
                for (row, fresh) in rows.into_iter().zip(admitted) {
                    if fresh {
                        inserted.push(row.id);
                        tables.employees.insert(row.id, row);
                    }
                }
                Ok(inserted)
            }
        }
    }

    async fn quarterly_hires(&self, year: i32) -> Result<Vec<QuarterlyHires>, StoreError> {
        let tables = self.tables.lock().await;
        let mut grouped: BTreeMap<(String, String), [i64; 4]> = BTreeMap::new();

        for employee in tables.hires_in(year) {
            let (Some(department), Some(job)) = (
                tables.departments.get(&employee.department_id),
                tables.jobs.get(&employee.job_id),
            ) else {
                continue;
            };
            let quarter = match employee.hired_at.get(5..7) {
                Some("01" | "02" | "03") => 0,
                Some("04" | "05" | "06") => 1,
                Some("07" | "08" | "09") => 2,
                Some("10" | "11" | "12") => 3,
                _ => {
                    grouped.entry((department.name.clone(), job.name.clone())).or_default();
                    continue;
                }
            };
            grouped.entry((department.name.clone(), job.name.clone())).or_default()[quarter] += 1;
        }

        Ok(grouped
            .into_iter()
            .map(|((department, job), [q1, q2, q3, q4])| QuarterlyHires {
                department,
                job,
                q1,
                q2,
                q3,
                q4,
            })
            .collect())
    }

    async fn departments_above_mean(&self, year: i32) -> Result<Vec<DepartmentHires>, StoreError> {
        let tables = self.tables.lock().await;
        let mut counts: BTreeMap<i32, i64> = BTreeMap::new();
        for employee in tables.hires_in(year) {
            if tables.departments.contains_key(&employee.department_id) {
                *counts.entry(employee.department_id).or_default() += 1;
            }
        }
        if counts.is_empty() {
            return Ok(Vec::new());
        }

        let mean = counts.values().sum::<i64>() as f64 / counts.len() as f64;
        let mut result: Vec<DepartmentHires> = counts
            .into_iter()
            .filter(|(_, hired)| *hired as f64 > mean)
            .filter_map(|(id, hired)| {
                tables.departments.get(&id).map(|d| DepartmentHires {
                    id,
                    department: d.name.clone(),
                    hired,
                })
            })
            .collect();
        result.sort_by(|a, b| b.hired.cmp(&a.hired).then(a.id.cmp(&b.id)));
        Ok(result)
    }
}
