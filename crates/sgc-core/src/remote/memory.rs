//! In-process remote used by tests and offline demos

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{Action, RemoteDataService, RemoteError, RemoteResult, Table};

/// A call observed by [`MemoryRemote`], in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Select(Table),
    Mutation {
        table: Table,
        action: Action,
        data: Option<Value>,
        match_field: Option<String>,
        match_value: Option<Value>,
    },
}

impl RemoteCall {
    pub const fn table(&self) -> Table {
        match self {
            Self::Select(table) | Self::Mutation { table, .. } => *table,
        }
    }

    pub const fn action(&self) -> Option<Action> {
        match self {
            Self::Select(_) => None,
            Self::Mutation { action, .. } => Some(*action),
        }
    }
}

/// Delay injected into a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Latency {
    /// Wait, then take effect
    Before(Duration),
    /// Take effect, then wait before answering
    After(Duration),
}

type FailureRule = Box<dyn Fn(&RemoteCall) -> Option<RemoteError> + Send + Sync>;
type LatencyRule = Box<dyn Fn(&RemoteCall) -> Option<Latency> + Send + Sync>;

/// Table store keyed by each row's `id` column.
///
/// Inserting an existing id fails with a unique-violation message, the way
/// a Postgres primary key does. Rows inserted without an id get one
/// assigned.
pub struct MemoryRemote {
    tables: Mutex<BTreeMap<Table, BTreeMap<i64, Value>>>,
    calls: Mutex<Vec<RemoteCall>>,
    reachable: AtomicBool,
    next_id: AtomicI64,
    failure_rule: Mutex<Option<FailureRule>>,
    latency_rule: Mutex<Option<LatencyRule>>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self {
            tables: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            reachable: AtomicBool::new(true),
            next_id: AtomicI64::new(1_000_000),
            failure_rule: Mutex::new(None),
            latency_rule: Mutex::new(None),
        }
    }
}

impl std::fmt::Debug for MemoryRemote {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("MemoryRemote")
            .field("reachable", &self.is_reachable())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a table's contents
    pub fn seed(&self, table: Table, rows: Vec<Value>) {
        let mut tables = lock(&self.tables);
        let stored = tables.entry(table).or_default();
        stored.clear();
        for row in rows {
            let id = row_id(&row).unwrap_or_else(|| self.allocate_id());
            stored.insert(id, row);
        }
    }

    /// Current rows of a table, ordered by id
    pub fn rows(&self, table: Table) -> Vec<Value> {
        lock(&self.tables)
            .get(&table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Every call received so far
    pub fn calls(&self) -> Vec<RemoteCall> {
        lock(&self.calls).clone()
    }

    /// Mutating calls received so far
    pub fn mutations(&self) -> Vec<RemoteCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.action().is_some())
            .collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Simulate the network going away; every call fails as transient
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    /// Fail calls for which `rule` returns an error
    pub fn fail_matching(
        &self,
        rule: impl Fn(&RemoteCall) -> Option<RemoteError> + Send + Sync + 'static,
    ) {
        *lock(&self.failure_rule) = Some(Box::new(rule));
    }

    pub fn clear_failures(&self) {
        *lock(&self.failure_rule) = None;
    }

    /// Delay calls for which `rule` returns a latency
    pub fn delay_matching(
        &self,
        rule: impl Fn(&RemoteCall) -> Option<Latency> + Send + Sync + 'static,
    ) {
        *lock(&self.latency_rule) = Some(Box::new(rule));
    }

    pub fn clear_latency(&self) {
        *lock(&self.latency_rule) = None;
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Log the call, decide whether it fails before touching any table and
    /// serve any `Latency::Before` delay.
    ///
    /// Returns the delay to serve once the call took effect.
    async fn admit(&self, call: RemoteCall) -> RemoteResult<Option<Duration>> {
        lock(&self.calls).push(call.clone());

        if !self.is_reachable() {
            return Err(RemoteError::transient("network unreachable"));
        }
        let failure = lock(&self.failure_rule)
            .as_ref()
            .and_then(|rule| rule(&call));
        if let Some(error) = failure {
            return Err(error);
        }

        let latency = lock(&self.latency_rule)
            .as_ref()
            .and_then(|rule| rule(&call));
        match latency {
            Some(Latency::Before(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(None)
            }
            Some(Latency::After(delay)) => Ok(Some(delay)),
            None => Ok(None),
        }
    }

    fn mutation(
        table: Table,
        action: Action,
        data: Option<&Value>,
        match_field: Option<&str>,
        match_value: Option<&Value>,
    ) -> RemoteCall {
        RemoteCall::Mutation {
            table,
            action,
            data: data.cloned(),
            match_field: match_field.map(str::to_string),
            match_value: match_value.cloned(),
        }
    }
}

async fn answer<T>(result: RemoteResult<T>, after: Option<Duration>) -> RemoteResult<T> {
    if let Some(delay) = after {
        tokio::time::sleep(delay).await;
    }
    result
}

fn row_id(row: &Value) -> Option<i64> {
    row.get("id").and_then(Value::as_i64)
}

fn rows_of(data: &Value) -> Vec<Value> {
    match data {
        Value::Array(rows) => rows.clone(),
        row => vec![row.clone()],
    }
}

fn field_matches(row: &Value, field: &str, value: &Value) -> bool {
    match (row.get(field), value) {
        (Some(Value::Number(left)), Value::String(right)) => left.to_string() == *right,
        (Some(Value::String(left)), Value::Number(right)) => *left == right.to_string(),
        (Some(left), right) => left == right,
        (None, _) => false,
    }
}

fn merge_into(target: &mut Value, patch: &Value) {
    if let (Value::Object(target), Value::Object(patch)) = (target, patch) {
        for (key, value) in patch {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[async_trait]
impl RemoteDataService for MemoryRemote {
    async fn select(&self, table: Table) -> RemoteResult<Vec<Value>> {
        let after = self.admit(RemoteCall::Select(table)).await?;
        let rows = self.rows(table);
        answer(Ok(rows), after).await
    }

    async fn insert(&self, table: Table, data: &Value) -> RemoteResult<()> {
        let after = self
            .admit(Self::mutation(table, Action::Insert, Some(data), None, None))
            .await?;
        let result = self.insert_rows(table, rows_of(data));
        answer(result, after).await
    }

    async fn update(
        &self,
        table: Table,
        data: &Value,
        match_field: &str,
        match_value: &Value,
    ) -> RemoteResult<()> {
        let after = self
            .admit(Self::mutation(
                table,
                Action::Update,
                Some(data),
                Some(match_field),
                Some(match_value),
            ))
            .await?;

        {
            let mut tables = lock(&self.tables);
            if let Some(stored) = tables.get_mut(&table) {
                stored
                    .values_mut()
                    .filter(|row| field_matches(row, match_field, match_value))
                    .for_each(|row| merge_into(row, data));
            }
        }
        answer(Ok(()), after).await
    }

    async fn upsert(&self, table: Table, data: &Value) -> RemoteResult<()> {
        let after = self
            .admit(Self::mutation(table, Action::Upsert, Some(data), None, None))
            .await?;
        let result = self.upsert_rows(table, rows_of(data));
        answer(result, after).await
    }

    async fn delete(
        &self,
        table: Table,
        match_field: &str,
        match_value: &Value,
    ) -> RemoteResult<()> {
        let after = self
            .admit(Self::mutation(
                table,
                Action::Delete,
                None,
                Some(match_field),
                Some(match_value),
            ))
            .await?;

        {
            let mut tables = lock(&self.tables);
            if let Some(stored) = tables.get_mut(&table) {
                stored.retain(|_, row| !field_matches(row, match_field, match_value));
            }
        }
        answer(Ok(()), after).await
    }

    async fn ping(&self) -> RemoteResult<()> {
        if self.is_reachable() {
            Ok(())
        } else {
            Err(RemoteError::transient("network unreachable"))
        }
    }
}

impl MemoryRemote {
    fn insert_rows(&self, table: Table, rows: Vec<Value>) -> RemoteResult<()> {
        let mut tables = lock(&self.tables);
        let stored = tables.entry(table).or_default();

        // A batch insert is atomic: check every id before writing any row.
        if let Some(id) = rows
            .iter()
            .filter_map(row_id)
            .find(|id| stored.contains_key(id))
        {
            return Err(RemoteError::from_message(format!(
                "duplicate key value violates unique constraint \"{table}_pkey\" (id={id})"
            )));
        }

        for mut row in rows {
            let id = match row_id(&row) {
                Some(id) => id,
                None => {
                    let id = self.allocate_id();
                    if let Value::Object(fields) = &mut row {
                        fields.insert("id".to_string(), Value::from(id));
                    }
                    id
                }
            };
            stored.insert(id, row);
        }
        Ok(())
    }

    /// Merge rows into existing ones by id, the way PostgREST's
    /// `resolution=merge-duplicates` does: columns present in the payload
    /// overwrite, absent ones are kept.
    fn upsert_rows(&self, table: Table, rows: Vec<Value>) -> RemoteResult<()> {
        if rows.iter().any(|row| row_id(row).is_none()) {
            return Err(RemoteError::classified(
                "null value in column \"id\" violates not-null constraint",
                Some("23502".to_string()),
                Some(400),
            ));
        }

        let mut tables = lock(&self.tables);
        let stored = tables.entry(table).or_default();
        for row in rows {
            let Some(id) = row_id(&row) else { continue };
            match stored.get_mut(&id) {
                Some(existing) => merge_into(existing, &row),
                None => {
                    stored.insert(id, row);
                }
            }
        }
        Ok(())
    }
}
