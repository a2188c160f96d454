#![allow(dead_code)]

pub mod scenarios;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use boutique_orm::{
    BoxedRow, Executor, GenericRepository, MemoryRow, PlaceholderStyle, RepoError, RowStream,
    SqlValue,
};
use boutique_orm::{Entity, Validatable};
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;

/// Scripted reply for the next statement.
pub enum Reply {
    Rows(Vec<MemoryRow>),
    Affected(u64),
    Fail(RepoError),
}

/// In-memory executor that answers statements from a queue and records them.
///
/// An exhausted queue answers with no rows and zero affected rows.
pub struct ScriptedExecutor {
    style: PlaceholderStyle,
    replies: Mutex<VecDeque<Reply>>,
    log: Mutex<Vec<(String, Vec<SqlValue>)>>,
}

impl ScriptedExecutor {
    pub fn new(style: PlaceholderStyle) -> Self {
        Self {
            style,
            replies: Mutex::new(VecDeque::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn postgres() -> Self {
        Self::new(PlaceholderStyle::Dollar)
    }

    pub fn mssql() -> Self {
        Self::new(PlaceholderStyle::AtP)
    }

    pub fn rows(self, rows: Vec<MemoryRow>) -> Self {
        self.replies.lock().unwrap().push_back(Reply::Rows(rows));
        self
    }

    pub fn affected(self, n: u64) -> Self {
        self.replies.lock().unwrap().push_back(Reply::Affected(n));
        self
    }

    pub fn fail(self, err: RepoError) -> Self {
        self.replies.lock().unwrap().push_back(Reply::Fail(err));
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<SqlValue>)> {
        self.log.lock().unwrap().clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.calls().into_iter().map(|(sql, _)| sql).collect()
    }

    fn record(&self, sql: &str, params: &[SqlValue]) -> Option<Reply> {
        self.log.lock().unwrap().push((sql.to_string(), params.to_vec()));
        self.replies.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    fn style(&self) -> PlaceholderStyle {
        self.style
    }

    async fn fetch(&self, sql: &str, params: &[SqlValue]) -> Result<RowStream, RepoError> {
        match self.record(sql, params) {
            Some(Reply::Rows(rows)) => Ok(stream::iter(
                rows.into_iter().map(|r| Ok(Box::new(r) as BoxedRow)),
            )
            .boxed()),
            Some(Reply::Fail(err)) => Err(err),
            Some(Reply::Affected(_)) => Err(RepoError::Connectivity(format!(
                "script expected an execute, got fetch of {sql}"
            ))),
            None => Ok(stream::empty().boxed()),
        }
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, RepoError> {
        match self.record(sql, params) {
            Some(Reply::Affected(n)) => Ok(n),
            Some(Reply::Fail(err)) => Err(err),
            Some(Reply::Rows(_)) => Err(RepoError::Connectivity(format!(
                "script expected a fetch, got execute of {sql}"
            ))),
            None => Ok(0),
        }
    }
}

/// Repository over a shared scripted executor, so the test can inspect the log.
pub fn repo<T>(exec: ScriptedExecutor) -> (GenericRepository<T, ScriptedExecutor>, Arc<ScriptedExecutor>)
where
    T: Entity + Validatable,
{
    let exec = Arc::new(exec);
    (GenericRepository::shared(exec.clone()), exec)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn key_row(id: i64) -> MemoryRow {
    MemoryRow::new().with("id", id)
}

pub fn count_row(total: i64) -> MemoryRow {
    MemoryRow::new().with("total", total)
}

pub fn customer_row(prefix: &str, id: i64, city: &str) -> MemoryRow {
    MemoryRow::new()
        .with(format!("{prefix}_id"), id)
        .with(format!("{prefix}_gender"), "MALE")
        .with(format!("{prefix}_phone"), "555-0100")
        .with(format!("{prefix}_address_line_1"), "1 Place Bellecour")
        .with(format!("{prefix}_address_line_2"), SqlValue::Null)
        .with(format!("{prefix}_city"), city)
        .with(format!("{prefix}_country"), "FR")
}

pub fn order_row(prefix: &str, id: i64, status: &str) -> MemoryRow {
    MemoryRow::new()
        .with(format!("{prefix}_id"), id)
        .with(format!("{prefix}_quantity"), 2)
        .with(format!("{prefix}_total_price"), Decimal::new(3998, 2))
        .with(format!("{prefix}_status"), status)
}

/// Target row of the eager join, tagged with its owning order.
pub fn linked_product_row(order_id: i64, id: i64, name: &str) -> MemoryRow {
    MemoryRow::new()
        .with("p_id", id)
        .with("p_name", name)
        .with("p_price", Decimal::new(1999, 2))
        .with("j_product_order_id", order_id)
}
