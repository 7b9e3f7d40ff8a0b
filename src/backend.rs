use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;
use crate::query::Request;

/// Executes one request against the hosted table API.
///
/// Select requests yield a JSON array of rows, or a single object when
/// `request.single` is set. Inserts and updates yield the affected rows in
/// the same shapes. A single-object request that does not match exactly one
/// row fails with [`StoreError::no_single_row`].
#[async_trait]
pub trait Backend: Send + Sync {
    async fn execute(&self, request: Request) -> Result<Value, StoreError>;
}
