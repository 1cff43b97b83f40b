use async_trait::async_trait;

use crate::error::ApiError;
use crate::soql::Select;
use crate::types::{QueryResult, Record, SaveResult, Surface};

/// Read/create/update operations exposed by a connected org.
///
/// Implementations are injected into the engine; the engine never reaches a
/// global connection.
#[async_trait]
pub trait ToolingApi: Send + Sync {
    /// Username the connection is authenticated as.
    fn username(&self) -> &str;

    /// Run a query and return every matching row.
    async fn query(&self, surface: Surface, query: &Select) -> Result<QueryResult, ApiError>;

    /// Insert a record and return the new id.
    async fn create(
        &self,
        surface: Surface,
        sobject: &str,
        fields: Record,
    ) -> Result<SaveResult, ApiError>;

    /// Patch the given fields onto an existing record.
    async fn update(
        &self,
        surface: Surface,
        sobject: &str,
        id: &str,
        fields: Record,
    ) -> Result<(), ApiError>;

    /// Run a query that must match exactly one row.
    async fn single_record_query(
        &self,
        surface: Surface,
        query: &Select,
    ) -> Result<Record, ApiError> {
        let mut records = self.query(surface, query).await?.records;
        if records.len() != 1 {
            return Err(ApiError::UnexpectedRowCount {
                sobject: query.sobject().to_string(),
                found: records.len(),
            });
        }
        Ok(records.remove(0))
    }
}
