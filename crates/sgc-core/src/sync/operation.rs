//! Pending operations: queued mutations awaiting remote application

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{AuditLog, Cemetery, Employee, Grave, MessageRow, UserRow};
use crate::remote::{Action, RemoteDataService, RemoteError, RemoteResult, Table};
use crate::util::iso_timestamp_now;

/// Payload of a pending operation, one variant per table.
///
/// Serialized untagged: the table lives next to the payload, and the remote
/// expects the bare row (or row array for grave batches).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RowData {
    Graves(Vec<Grave>),
    Cemetery(Cemetery),
    Employee(Employee),
    User(UserRow),
    AuditLog(AuditLog),
    Message(MessageRow),
}

impl RowData {
    /// Table this payload belongs to
    pub const fn table(&self) -> Table {
        match self {
            Self::Graves(_) => Table::Graves,
            Self::Cemetery(_) => Table::Cemeteries,
            Self::Employee(_) => Table::Employees,
            Self::User(_) => Table::Users,
            Self::AuditLog(_) => Table::AuditLogs,
            Self::Message(_) => Table::Messages,
        }
    }

    /// Decode a raw payload as the row type of `table`.
    ///
    /// Grave payloads may be a single row or a batch.
    pub fn decode(table: Table, value: Value) -> serde_json::Result<Self> {
        Ok(match table {
            Table::Graves => match value {
                Value::Array(_) => Self::Graves(serde_json::from_value(value)?),
                single => Self::Graves(vec![serde_json::from_value(single)?]),
            },
            Table::Cemeteries => Self::Cemetery(serde_json::from_value(value)?),
            Table::Employees => Self::Employee(serde_json::from_value(value)?),
            Table::Users => Self::User(serde_json::from_value(value)?),
            Table::AuditLogs => Self::AuditLog(serde_json::from_value(value)?),
            Table::Messages => Self::Message(serde_json::from_value(value)?),
        })
    }

    /// Identifiers of the records this payload writes
    pub fn record_ids(&self) -> Vec<i64> {
        match self {
            Self::Graves(graves) => graves.iter().map(|grave| grave.id).collect(),
            Self::Cemetery(cemetery) => vec![cemetery.id],
            Self::Employee(employee) => vec![employee.id],
            Self::User(user) => user.id.into_iter().collect(),
            Self::AuditLog(log) => vec![log.id],
            Self::Message(row) => row.id.into_iter().collect(),
        }
    }
}

/// A mutation that could not be applied remotely yet.
///
/// Persisted as `{table, action, data, matchField, matchValue, timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawOperation")]
pub struct PendingOperation {
    pub table: Table,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<RowData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_value: Option<Value>,
    /// Enqueue time; informative only, queue position decides order
    pub timestamp: String,
}

impl PendingOperation {
    fn new(
        table: Table,
        action: Action,
        data: Option<RowData>,
        matcher: Option<(String, Value)>,
    ) -> Self {
        let (match_field, match_value) = matcher.unzip();
        Self {
            table,
            action,
            data,
            match_field,
            match_value,
            timestamp: iso_timestamp_now(),
        }
    }

    pub fn insert(data: RowData) -> Self {
        Self::new(data.table(), Action::Insert, Some(data), None)
    }

    pub fn upsert(data: RowData) -> Self {
        Self::new(data.table(), Action::Upsert, Some(data), None)
    }

    pub fn update(data: RowData, match_field: impl Into<String>, match_value: Value) -> Self {
        Self::new(
            data.table(),
            Action::Update,
            Some(data),
            Some((match_field.into(), match_value)),
        )
    }

    pub fn delete(table: Table, match_field: impl Into<String>, match_value: Value) -> Self {
        Self::new(
            table,
            Action::Delete,
            None,
            Some((match_field.into(), match_value)),
        )
    }

    /// Perform this operation against the remote.
    pub async fn apply(&self, remote: &dyn RemoteDataService) -> RemoteResult<()> {
        match self.action {
            Action::Insert => remote.insert(self.table, &self.payload()?).await,
            Action::Upsert => remote.upsert(self.table, &self.payload()?).await,
            Action::Update => {
                let (field, value) = self.matcher()?;
                remote.update(self.table, &self.payload()?, field, value).await
            }
            Action::Delete => {
                let (field, value) = self.matcher()?;
                remote.delete(self.table, field, value).await
            }
        }
    }

    fn payload(&self) -> RemoteResult<Value> {
        let data = self
            .data
            .as_ref()
            .ok_or_else(|| RemoteError::rejected(format!("{self} has no payload")))?;
        serde_json::to_value(data)
            .map_err(|error| RemoteError::rejected(format!("unencodable payload: {error}")))
    }

    fn matcher(&self) -> RemoteResult<(&str, &Value)> {
        match (self.match_field.as_deref(), self.match_value.as_ref()) {
            (Some(field), Some(value)) => Ok((field, value)),
            _ => Err(RemoteError::rejected(format!("{self} has no match filter"))),
        }
    }

    /// Record id targeted through an `id` match filter
    pub fn matched_id(&self) -> Option<i64> {
        if self.match_field.as_deref() != Some("id") {
            return None;
        }
        match self.match_value.as_ref()? {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.parse().ok(),
            _ => None,
        }
    }

    /// Ids of local records whose state this operation still has to publish
    pub fn written_ids(&self) -> Vec<i64> {
        match self.action {
            Action::Delete => Vec::new(),
            _ => {
                let mut ids = self
                    .data
                    .as_ref()
                    .map(RowData::record_ids)
                    .unwrap_or_default();
                ids.extend(self.matched_id());
                ids
            }
        }
    }
}

impl fmt::Display for PendingOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.table)?;
        if let (Some(field), Some(value)) = (&self.match_field, &self.match_value) {
            write!(f, " where {field}={value}")?;
        }
        if let Some(RowData::Graves(graves)) = &self.data {
            if graves.len() > 1 {
                write!(f, " ({} rows)", graves.len())?;
            }
        }
        Ok(())
    }
}

/// Persisted layout, decoded loosely then checked against the table.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOperation {
    table: Table,
    action: Action,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    match_field: Option<String>,
    #[serde(default)]
    match_value: Option<Value>,
    #[serde(default)]
    timestamp: String,
}

impl TryFrom<RawOperation> for PendingOperation {
    type Error = String;

    fn try_from(raw: RawOperation) -> Result<Self, Self::Error> {
        let data = raw
            .data
            .filter(|value| !value.is_null())
            .map(|value| RowData::decode(raw.table, value))
            .transpose()
            .map_err(|error| format!("{} payload does not match table: {error}", raw.table))?;

        match raw.action {
            Action::Insert | Action::Upsert | Action::Update if data.is_none() => {
                return Err(format!("{} {} requires data", raw.action, raw.table));
            }
            Action::Update | Action::Delete
                if raw.match_field.is_none() || raw.match_value.is_none() =>
            {
                return Err(format!(
                    "{} {} requires matchField and matchValue",
                    raw.action, raw.table
                ));
            }
            _ => {}
        }

        Ok(Self {
            table: raw.table,
            action: raw.action,
            data,
            match_field: raw.match_field,
            match_value: raw.match_value,
            timestamp: raw.timestamp,
        })
    }
}
