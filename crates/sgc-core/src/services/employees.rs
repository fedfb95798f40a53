use super::engine::SyncEngine;
use crate::db::StorageKey;
use crate::error::{Error, Result};
use crate::models::{max_record_id, Employee, NewEmployee};
use crate::sync::{PendingOperation, RowData};
use crate::util::{next_sequential_id, normalize_text_option};

impl SyncEngine {
    pub async fn employees(&self) -> Vec<Employee> {
        self.lock_collections().await.employees.clone()
    }

    /// Register an employee. Employees are not audited.
    pub async fn add_employee(&self, input: NewEmployee) -> Result<Employee> {
        let name = normalize_text_option(Some(input.name))
            .ok_or_else(|| Error::InvalidInput("employee name is required".to_string()))?;

        let _write = self.begin_write().await;
        let employee = {
            let mut collections = self.lock_collections().await;
            let employee = Employee {
                id: next_sequential_id(max_record_id(&collections.employees)),
                name,
                role: input.role,
                registration: input.registration.trim().to_string(),
            };
            collections.employees.push(employee.clone());
            self.persist(&collections, StorageKey::Employees);
            employee
        };

        self.publish(PendingOperation::upsert(RowData::Employee(employee.clone())))
            .await;
        Ok(employee)
    }
}
