pub mod department;
pub mod employee;
pub mod job;
pub mod report;

pub use department::Department;
pub use employee::Employee;
pub use job::Job;
pub use report::{DepartmentHires, QuarterlyHires};

/// The three collections held by the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Department,
    Job,
    Employee,
}

impl EntityKind {
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::Department => "departments",
            EntityKind::Job => "jobs",
            EntityKind::Employee => "employees",
        }
    }
}
