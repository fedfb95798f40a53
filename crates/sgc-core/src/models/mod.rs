//! Data models for SGC

mod audit_log;
mod cemetery;
mod employee;
mod grave;
mod message;
mod user;

pub use audit_log::{AuditAction, AuditLog};
pub use cemetery::{Cemetery, NewCemetery};
pub use employee::{Employee, EmployeeRole, NewEmployee};
pub use grave::{
    Burial, BurialForm, Coordinates, Deceased, Grave, GraveKind, GraveLocation, GraveStatus,
    NewGraves, Responsible,
};
pub use message::{ChatMessage, MessageRow};
pub use user::{
    validate_password_format, NewUser, Session, SystemUser, UserRole, UserRow, UserUpdate,
    BOOTSTRAP_ADMIN_ID,
};

/// Deserialize a JSON `null` as the type's default.
///
/// Remote tables return `null` for unset text columns.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + serde::Deserialize<'de>,
{
    use serde::Deserialize;
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// An entity keyed by a numeric identifier unique within its collection.
pub trait Record {
    fn record_id(&self) -> i64;
}

/// Highest identifier in a collection, if any.
pub fn max_record_id<R: Record>(records: &[R]) -> Option<i64> {
    records.iter().map(Record::record_id).max()
}
