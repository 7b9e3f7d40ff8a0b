use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::backend::Backend;
use crate::config::Table;
use crate::error::StoreError;
use crate::query::{Action, Embed, Filter, FilterOp, Order, Request};

/// In-process stand-in for the hosted table API. Evaluates requests with the
/// same filter, ordering, paging, embedding and single-row rules.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    tables: Arc<Mutex<HashMap<Table, Vec<Value>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads rows as given, filling in missing ids and timestamps.
    pub fn seed(&self, table: Table, rows: Vec<Value>) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        let stored = tables.entry(table).or_default();
        for row in rows {
            stored.push(Value::Object(prepare_row(table, row)?));
        }
        Ok(())
    }

    pub fn rows(&self, table: Table) -> Result<Vec<Value>, StoreError> {
        Ok(self.lock()?.get(&table).cloned().unwrap_or_default())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Table, Vec<Value>>>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::ConnectionFailed("in-memory store poisoned".into()))
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn execute(&self, request: Request) -> Result<Value, StoreError> {
        let mut tables = self.lock()?;
        debug!(table = %request.table, action = action_name(&request.action), "memory request");

        let rows = match &request.action {
            Action::Select => {
                let source = tables.get(&request.table).map(Vec::as_slice).unwrap_or(&[]);
                let mut rows: Vec<Value> = source
                    .iter()
                    .filter(|row| matches_all(row, &request.filters))
                    .cloned()
                    .collect();
                if let Some(order) = &request.order {
                    sort_rows(&mut rows, order);
                }
                let offset = request.offset.unwrap_or(0);
                let limit = request.limit.unwrap_or(usize::MAX);
                let mut rows: Vec<Value> = rows.into_iter().skip(offset).take(limit).collect();
                if let Some(embed) = &request.embed {
                    let children = tables.get(&embed.table).map(Vec::as_slice).unwrap_or(&[]);
                    for row in rows.iter_mut() {
                        attach_children(row, embed, children);
                    }
                }
                rows
            }
            Action::Insert(new_rows) => {
                if request.single && new_rows.len() != 1 {
                    return Err(StoreError::no_single_row(new_rows.len()));
                }
                let mut prepared = Vec::with_capacity(new_rows.len());
                for row in new_rows {
                    prepared.push(Value::Object(prepare_row(request.table, row.clone())?));
                }
                tables
                    .entry(request.table)
                    .or_default()
                    .extend(prepared.iter().cloned());
                prepared
            }
            Action::Update(patch) => {
                let patch = patch
                    .as_object()
                    .ok_or_else(|| StoreError::Decode("update patch must be a JSON object".into()))?;
                let stored = tables.entry(request.table).or_default();
                let hits: Vec<usize> = stored
                    .iter()
                    .enumerate()
                    .filter(|(_, row)| matches_all(row, &request.filters))
                    .map(|(i, _)| i)
                    .collect();
                // Rolled back, like the database does, when one row was expected.
                if request.single && hits.len() != 1 {
                    return Err(StoreError::no_single_row(hits.len()));
                }
                let mut updated = Vec::with_capacity(hits.len());
                for i in hits {
                    if let Some(obj) = stored[i].as_object_mut() {
                        for (k, v) in patch {
                            obj.insert(k.clone(), v.clone());
                        }
                    }
                    updated.push(stored[i].clone());
                }
                updated
            }
        };

        let rows: Vec<Value> = rows
            .into_iter()
            .map(|row| project(row, &request.columns, request.embed.as_ref()))
            .collect();

        if request.single {
            if rows.len() != 1 {
                return Err(StoreError::no_single_row(rows.len()));
            }
            return Ok(rows.into_iter().next().unwrap_or(Value::Null));
        }
        Ok(Value::Array(rows))
    }
}

fn action_name(action: &Action) -> &'static str {
    match action {
        Action::Select => "select",
        Action::Insert(_) => "insert",
        Action::Update(_) => "update",
    }
}

fn now_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

fn prepare_row(table: Table, row: Value) -> Result<Map<String, Value>, StoreError> {
    let Value::Object(mut obj) = row else {
        return Err(StoreError::Decode(format!(
            "rows inserted into {table} must be JSON objects"
        )));
    };
    if !obj.get("id").is_some_and(|id| !id.is_null()) {
        obj.insert("id".into(), Value::String(uuid::Uuid::new_v4().to_string()));
    }
    let now = now_string();
    obj.entry("created_at")
        .or_insert_with(|| Value::String(now.clone()));
    if table.tracks_updates() {
        obj.entry("updated_at").or_insert_with(|| Value::String(now));
    }
    Ok(obj)
}

fn matches_all(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|f| matches(row, f))
}

fn matches(row: &Value, filter: &Filter) -> bool {
    let field = row.get(&filter.column).unwrap_or(&Value::Null);
    match &filter.op {
        FilterOp::Eq(Value::Null) => field.is_null(),
        FilterOp::Eq(v) => compare(field, v) == Some(Ordering::Equal),
        FilterOp::Gte(v) => matches!(compare(field, v), Some(Ordering::Greater | Ordering::Equal)),
        FilterOp::Lte(v) => matches!(compare(field, v), Some(Ordering::Less | Ordering::Equal)),
        FilterOp::Contains(items) => match field.as_array() {
            Some(values) => items
                .iter()
                .all(|item| values.iter().any(|v| v.as_str() == Some(item.as_str()))),
            None => false,
        },
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Ascending puts nulls last, descending puts them first.
fn sort_rows(rows: &mut [Value], order: &Order) {
    rows.sort_by(|a, b| {
        let x = a.get(&order.column).unwrap_or(&Value::Null);
        let y = b.get(&order.column).unwrap_or(&Value::Null);
        let ord = match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => compare(x, y).unwrap_or(Ordering::Equal),
        };
        if order.ascending {
            ord
        } else {
            ord.reverse()
        }
    });
}

fn attach_children(row: &mut Value, embed: &Embed, children: &[Value]) {
    let Some(parent_id) = row.get("id").cloned() else {
        return;
    };
    let mut matched: Vec<Value> = children
        .iter()
        .filter(|c| c.get(embed.foreign_key) == Some(&parent_id))
        .cloned()
        .collect();
    if let Some(order) = &embed.order {
        sort_rows(&mut matched, order);
    }
    if let Some(obj) = row.as_object_mut() {
        obj.insert(embed.table.as_str().to_string(), Value::Array(matched));
    }
}

fn project(row: Value, columns: &str, embed: Option<&Embed>) -> Value {
    if columns.trim() == "*" {
        return row;
    }
    let Value::Object(obj) = row else {
        return row;
    };
    let wanted: Vec<&str> = columns.split(',').map(str::trim).collect();
    let kept = obj
        .into_iter()
        .filter(|(k, _)| {
            wanted.contains(&k.as_str()) || embed.is_some_and(|e| e.table.as_str() == k.as_str())
        })
        .collect();
    Value::Object(kept)
}
