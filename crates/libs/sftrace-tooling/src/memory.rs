use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ApiError;
use crate::soql::Select;
use crate::traits::ToolingApi;
use crate::types::*;

/// A write observed by [`InMemoryOrg`], in call order.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteOp {
    Create {
        surface: Surface,
        sobject: String,
        id: String,
        fields: Record,
    },
    Update {
        surface: Surface,
        sobject: String,
        id: String,
        fields: Record,
    },
}

impl WriteOp {
    pub fn sobject(&self) -> &str {
        match self {
            Self::Create { sobject, .. } | Self::Update { sobject, .. } => sobject,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Create { id, .. } | Self::Update { id, .. } => id,
        }
    }

    pub fn fields(&self) -> &Record {
        match self {
            Self::Create { fields, .. } | Self::Update { fields, .. } => fields,
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(self, Self::Create { .. })
    }
}

#[derive(Debug)]
struct StoredRecord {
    seq: u64,
    fields: Record,
}

#[derive(Debug, Default)]
struct OrgState {
    tables: HashMap<String, Vec<StoredRecord>>,
    next_seq: u64,
    queries: Vec<(Surface, String)>,
    writes: Vec<WriteOp>,
    failing_sobjects: HashSet<String>,
}

impl OrgState {
    fn next_id(&mut self, sobject: &str) -> (u64, String) {
        self.next_seq += 1;
        let prefix = match sobject {
            USER_SOBJECT => "005",
            DEBUG_LEVEL_SOBJECT => "7dl",
            TRACE_FLAG_SOBJECT => "7tf",
            _ => "a00",
        };
        (self.next_seq, format!("{prefix}{:012}", self.next_seq))
    }

    fn insert(&mut self, sobject: &str, mut fields: Record) -> String {
        let (seq, generated) = self.next_id(sobject);
        let id = match fields.get("Id").and_then(Value::as_str) {
            Some(existing) => existing.to_string(),
            None => generated,
        };
        fields.insert("Id".into(), Value::String(id.clone()));
        self.tables
            .entry(sobject.to_string())
            .or_default()
            .push(StoredRecord { seq, fields });
        id
    }

    fn fail_if_configured(&self, sobject: &str) -> Result<(), ApiError> {
        if self.failing_sobjects.contains(sobject) {
            log::debug!("in-memory org rejecting write to {sobject}");
            return Err(ApiError::Status {
                status: 500,
                message: format!("write to {sobject} rejected by in-memory org"),
            });
        }
        Ok(())
    }

    fn evaluate(&self, query: &Select) -> QueryResult {
        let Some(rows) = self.tables.get(query.sobject()) else {
            return QueryResult::default();
        };

        let mut matching: Vec<&StoredRecord> = rows
            .iter()
            .filter(|row| {
                query
                    .filters()
                    .iter()
                    .all(|filter| field_text(&row.fields, &filter.field) == Some(filter.value.clone()))
            })
            .collect();

        if let Some(order) = query.ordering() {
            if order.field == "CreatedDate" {
                matching.sort_by_key(|row| row.seq);
            } else {
                matching.sort_by_key(|row| field_text(&row.fields, &order.field));
            }
            if order.descending {
                matching.reverse();
            }
        }

        if let Some(limit) = query.row_limit() {
            matching.truncate(limit as usize);
        }

        QueryResult::from_records(matching.into_iter().map(|row| project(row, query)).collect())
    }
}

fn field_text(record: &Record, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn project(row: &StoredRecord, query: &Select) -> Record {
    if query.selected_fields().is_empty() {
        return row.fields.clone();
    }
    let mut projected = Record::new();
    for field in query.selected_fields() {
        if let Some(value) = row.fields.get(field) {
            projected.insert(field.clone(), value.clone());
        }
    }
    projected
}

/// An org held entirely in memory.
///
/// Records are kept per sObject in insertion order, which doubles as their
/// `CreatedDate`. Every rendered query and every write is recorded so callers
/// can assert on exactly what reached the org.
#[derive(Debug)]
pub struct InMemoryOrg {
    username: String,
    yield_after_query: bool,
    state: Mutex<OrgState>,
}

impl InMemoryOrg {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            yield_after_query: false,
            state: Mutex::new(OrgState::default()),
        }
    }

    /// Yield to the scheduler after each query has been evaluated, so
    /// concurrent callers can observe the same snapshot before either writes.
    pub fn with_query_yield(mut self) -> Self {
        self.yield_after_query = true;
        self
    }

    fn lock(&self) -> MutexGuard<'_, OrgState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a record without recording a write. An `Id` field is kept as-is.
    pub fn insert(&self, sobject: &str, fields: Record) -> String {
        self.lock().insert(sobject, fields)
    }

    /// Make every subsequent create/update against `sobject` fail.
    pub fn fail_writes_to(&self, sobject: &str) {
        self.lock().failing_sobjects.insert(sobject.to_string());
    }

    pub fn records(&self, sobject: &str) -> Vec<Record> {
        self.lock()
            .tables
            .get(sobject)
            .map(|rows| rows.iter().map(|row| row.fields.clone()).collect())
            .unwrap_or_default()
    }

    pub fn record(&self, sobject: &str, id: &str) -> Option<Record> {
        self.records(sobject)
            .into_iter()
            .find(|record| record.get("Id").and_then(Value::as_str) == Some(id))
    }

    /// Rendered query text, in call order.
    pub fn queries(&self) -> Vec<String> {
        self.lock().queries.iter().map(|(_, text)| text.clone()).collect()
    }

    pub fn queries_on(&self, surface: Surface) -> Vec<String> {
        self.lock()
            .queries
            .iter()
            .filter(|(s, _)| *s == surface)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn writes(&self) -> Vec<WriteOp> {
        self.lock().writes.clone()
    }
}

#[async_trait]
impl ToolingApi for InMemoryOrg {
    fn username(&self) -> &str {
        &self.username
    }

    async fn query(&self, surface: Surface, query: &Select) -> Result<QueryResult, ApiError> {
        let result = {
            let mut state = self.lock();
            state.queries.push((surface, query.to_soql()));
            state.evaluate(query)
        };
        if self.yield_after_query {
            tokio::task::yield_now().await;
        }
        Ok(result)
    }

    async fn create(
        &self,
        surface: Surface,
        sobject: &str,
        fields: Record,
    ) -> Result<SaveResult, ApiError> {
        let mut state = self.lock();
        state.fail_if_configured(sobject)?;
        let id = state.insert(sobject, fields.clone());
        log::trace!("in-memory org created {sobject} {id}");
        state.writes.push(WriteOp::Create {
            surface,
            sobject: sobject.to_string(),
            id: id.clone(),
            fields,
        });
        Ok(SaveResult { id, success: true })
    }

    async fn update(
        &self,
        surface: Surface,
        sobject: &str,
        id: &str,
        fields: Record,
    ) -> Result<(), ApiError> {
        let mut state = self.lock();
        state.fail_if_configured(sobject)?;
        let stored = state
            .tables
            .get_mut(sobject)
            .and_then(|rows| {
                rows.iter_mut()
                    .find(|row| row.fields.get("Id").and_then(Value::as_str) == Some(id))
            })
            .ok_or_else(|| ApiError::Api {
                code: "NOT_FOUND".into(),
                message: format!("{sobject} {id} does not exist"),
            })?;
        for (key, value) in &fields {
            stored.fields.insert(key.clone(), value.clone());
        }
        state.writes.push(WriteOp::Update {
            surface,
            sobject: sobject.to_string(),
            id: id.to_string(),
            fields,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn query_filters_orders_and_limits() {
        let org = InMemoryOrg::new("me@example.com");
        org.insert(
            TRACE_FLAG_SOBJECT,
            record(json!({ "TracedEntityId": "005A", "LogType": "USER_DEBUG", "DebugLevelId": "old" })),
        );
        org.insert(
            TRACE_FLAG_SOBJECT,
            record(json!({ "TracedEntityId": "005B", "LogType": "USER_DEBUG", "DebugLevelId": "other" })),
        );
        org.insert(
            TRACE_FLAG_SOBJECT,
            record(json!({ "TracedEntityId": "005A", "LogType": "USER_DEBUG", "DebugLevelId": "new" })),
        );

        let query = Select::from(TRACE_FLAG_SOBJECT)
            .fields(["Id", "DebugLevelId"])
            .where_eq("TracedEntityId", "005A")
            .expect("value")
            .order_by_desc("CreatedDate")
            .limit(1);
        let result = org.query(Surface::Tooling, &query).await.expect("query");

        assert_eq!(result.total_size, 1);
        let row: TraceFlagRow = result.first_as().expect("decode").expect("row");
        assert_eq!(row.debug_level_id.as_deref(), Some("new"));
        assert_eq!(org.queries_on(Surface::Tooling), vec![query.to_soql()]);
        assert!(org.writes().is_empty());
    }

    #[tokio::test]
    async fn create_assigns_prefixed_ids_and_records_the_write() {
        let org = InMemoryOrg::new("me@example.com");
        let saved = org
            .create(
                Surface::Tooling,
                DEBUG_LEVEL_SOBJECT,
                record(json!({ "DeveloperName": "Verbose" })),
            )
            .await
            .expect("create");

        assert!(saved.id.starts_with("7dl"));
        let stored = org.record(DEBUG_LEVEL_SOBJECT, &saved.id).expect("stored");
        assert_eq!(stored.get("DeveloperName"), Some(&json!("Verbose")));

        let writes = org.writes();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].is_create());
        assert_eq!(writes[0].id(), saved.id);
        assert!(!writes[0].fields().contains_key("Id"));
    }

    #[tokio::test]
    async fn update_merges_fields_and_rejects_unknown_ids() {
        let org = InMemoryOrg::new("me@example.com");
        org.insert(
            USER_SOBJECT,
            record(json!({ "Id": "005", "Username": "me@example.com" })),
        );

        org.update(
            Surface::Data,
            USER_SOBJECT,
            "005",
            record(json!({ "UserPreferencesUserDebugModePref": true })),
        )
        .await
        .expect("update");
        let stored = org.record(USER_SOBJECT, "005").expect("stored");
        assert_eq!(stored.get("Username"), Some(&json!("me@example.com")));
        assert_eq!(stored.get("UserPreferencesUserDebugModePref"), Some(&json!(true)));

        let err = org
            .update(Surface::Data, USER_SOBJECT, "missing", Record::new())
            .await
            .expect_err("unknown id");
        assert!(matches!(err, ApiError::Api { .. }));
    }

    #[tokio::test]
    async fn injected_write_failures_surface_as_api_errors() {
        let org = InMemoryOrg::new("me@example.com");
        org.fail_writes_to(TRACE_FLAG_SOBJECT);
        let err = org
            .create(Surface::Tooling, TRACE_FLAG_SOBJECT, Record::new())
            .await
            .expect_err("should fail");
        assert!(matches!(err, ApiError::Status { status: 500, .. }));
        assert!(org.records(TRACE_FLAG_SOBJECT).is_empty());
        assert!(org.writes().is_empty());
    }

    #[tokio::test]
    async fn single_record_query_requires_exactly_one_row() {
        let org = InMemoryOrg::new("me@example.com");
        let query = Select::from(USER_SOBJECT)
            .where_eq("Username", "nobody@example.com")
            .expect("value");
        let err = org
            .single_record_query(Surface::Data, &query)
            .await
            .expect_err("no rows");
        assert_eq!(
            err,
            ApiError::UnexpectedRowCount {
                sobject: "User".into(),
                found: 0
            }
        );

        org.insert(USER_SOBJECT, record(json!({ "Username": "nobody@example.com" })));
        let row = org
            .single_record_query(Surface::Data, &query)
            .await
            .expect("one row");
        assert!(row.contains_key("Id"));
    }

    #[tokio::test]
    async fn usable_behind_trait_object() {
        let org: std::sync::Arc<dyn ToolingApi> =
            std::sync::Arc::new(InMemoryOrg::new("me@example.com"));
        assert_eq!(org.username(), "me@example.com");
        let result = org
            .query(Surface::Data, &Select::from(USER_SOBJECT))
            .await
            .expect("query");
        assert!(result.is_empty());
    }
}
