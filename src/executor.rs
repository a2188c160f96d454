use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::convert::Row;
use crate::error::RepoError;
use crate::query::{PlaceholderStyle, SqlValue};

pub type BoxedRow = Box<dyn Row>;

/// Rows delivered as the store produces them. Dropping the stream stops
/// consumption and releases the connection.
pub type RowStream = BoxStream<'static, Result<BoxedRow, RepoError>>;

/// Per-statement access to a database connection owned by the host.
#[async_trait]
pub trait Executor: Send + Sync + 'static {
    fn style(&self) -> PlaceholderStyle;

    async fn fetch(&self, sql: &str, params: &[SqlValue]) -> Result<RowStream, RepoError>;

    /// Runs a statement without a result set and returns the affected row count.
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, RepoError>;
}
