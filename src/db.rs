use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use secrecy::ExposeSecret;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_postgres::NoTls;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::config::DatabaseConfig;
use crate::error::RepoError;
use crate::executor::{BoxedRow, Executor, RowStream};
use crate::query::{PlaceholderStyle, SqlValue};

/// Rows buffered between the SQL Server reader task and the consumer.
const MSSQL_ROW_BUFFER: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DbKind {
    Mssql,
    Postgres,
}

impl DbKind {
    pub fn default_port(self) -> u16 {
        match self {
            DbKind::Mssql => 1433,
            DbKind::Postgres => 5432,
        }
    }
}

impl FromStr for DbKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mssql" | "sqlserver" => Ok(DbKind::Mssql),
            "postgres" | "postgresql" | "pg" => Ok(DbKind::Postgres),
            other => Err(format!("unsupported database kind '{}'", other)),
        }
    }
}

/// Shared handle to a single connection.
///
/// A SQL Server connection serves one statement at a time; while a row stream
/// from it is alive, other statements on the same handle wait.
#[derive(Clone)]
pub enum DatabaseRef {
    Mssql(Arc<Mutex<tiberius::Client<Compat<TcpStream>>>>),
    Postgres(Arc<tokio_postgres::Client>),
}

impl DatabaseRef {
    pub fn kind(&self) -> DbKind {
        match self {
            DatabaseRef::Mssql(_) => DbKind::Mssql,
            DatabaseRef::Postgres(_) => DbKind::Postgres,
        }
    }
}

pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseRef> {
    let password = config.password.expose_secret();
    match config.kind {
        DbKind::Mssql => {
            connect_mssql(&config.host, config.port, &config.database, &config.user, password).await
        }
        DbKind::Postgres => {
            connect_postgres(&config.host, config.port, &config.database, &config.user, password)
                .await
        }
    }
}

pub async fn connect_mssql(
    host: &str,
    port: u16,
    db: &str,
    user: &str,
    pass: &str,
) -> Result<DatabaseRef> {
    let mut config = tiberius::Config::new();
    config.host(host);
    config.port(port);
    config.database(db);
    config.authentication(tiberius::AuthMethod::sql_server(user, pass));
    config.trust_cert();

    let tcp = TcpStream::connect((host, port)).await?;
    tcp.set_nodelay(true)?;
    let client = tiberius::Client::connect(config, tcp.compat_write()).await?;
    tracing::debug!(host, port, db, "connected to SQL Server");
    Ok(DatabaseRef::Mssql(Arc::new(Mutex::new(client))))
}

pub async fn connect_postgres(
    host: &str,
    port: u16,
    db: &str,
    user: &str,
    pass: &str,
) -> Result<DatabaseRef> {
    let base = format!(
        "host={} port={} dbname={} user={} password={}",
        host, port, db, user, pass
    );

    let builder = TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()?;
    let connector = MakeTlsConnector::new(builder);
    let tls_config = format!("{} sslmode=require", base);

    match tokio_postgres::connect(&tls_config, connector).await {
        Ok((client, connection)) => {
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "postgres connection error");
                }
            });
            tracing::debug!(host, port, db, tls = true, "connected to PostgreSQL");
            Ok(DatabaseRef::Postgres(Arc::new(client)))
        }
        Err(e) if e.to_string().contains("server does not support TLS") => {
            let plain_config = format!("{} sslmode=disable", base);
            let (client, connection) = tokio_postgres::connect(&plain_config, NoTls).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "postgres connection error");
                }
            });
            tracing::debug!(host, port, db, tls = false, "connected to PostgreSQL");
            Ok(DatabaseRef::Postgres(Arc::new(client)))
        }
        Err(e) => Err(e.into()),
    }
}

type PgParam = Box<dyn tokio_postgres::types::ToSql + Send + Sync>;

/// NULL accepted by any column type; `Option::<i32>::None` only binds to integers.
#[derive(Debug)]
struct PgNull;

impl tokio_postgres::types::ToSql for PgNull {
    fn to_sql(
        &self,
        _ty: &tokio_postgres::types::Type,
        _out: &mut tokio_postgres::types::private::BytesMut,
    ) -> Result<tokio_postgres::types::IsNull, Box<dyn std::error::Error + Sync + Send>> {
        Ok(tokio_postgres::types::IsNull::Yes)
    }

    fn accepts(_ty: &tokio_postgres::types::Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}
type MsParam = Box<dyn tiberius::ToSql + Send + Sync>;

fn pg_params(params: &[SqlValue]) -> Vec<PgParam> {
    params
        .iter()
        .map(|p| -> PgParam {
            match p {
                SqlValue::I32(v) => Box::new(*v),
                SqlValue::I64(v) => Box::new(*v),
                SqlValue::Bool(v) => Box::new(*v),
                SqlValue::Text(v) => Box::new(v.clone()),
                SqlValue::Decimal(v) => Box::new(*v),
                SqlValue::DateTime(v) => Box::new(*v),
                SqlValue::Null => Box::new(PgNull),
            }
        })
        .collect()
}

fn ms_params(params: &[SqlValue]) -> Vec<MsParam> {
    params
        .iter()
        .map(|p| -> MsParam {
            match p {
                SqlValue::I32(v) => Box::new(*v),
                SqlValue::I64(v) => Box::new(*v),
                SqlValue::Bool(v) => Box::new(*v),
                SqlValue::Text(v) => Box::new(v.clone()),
                SqlValue::Decimal(v) => Box::new(*v),
                SqlValue::DateTime(v) => Box::new(*v),
                SqlValue::Null => Box::new(Option::<i32>::None),
            }
        })
        .collect()
}

#[async_trait]
impl Executor for DatabaseRef {
    fn style(&self) -> PlaceholderStyle {
        match self.kind() {
            DbKind::Mssql => PlaceholderStyle::AtP,
            DbKind::Postgres => PlaceholderStyle::Dollar,
        }
    }

    async fn fetch(&self, sql: &str, params: &[SqlValue]) -> Result<RowStream, RepoError> {
        match self {
            DatabaseRef::Mssql(conn) => {
                let conn = Arc::clone(conn);
                let sql = sql.to_owned();
                let params = params.to_vec();
                let (tx, rx) = mpsc::channel::<Result<BoxedRow, RepoError>>(MSSQL_ROW_BUFFER);
                tokio::spawn(async move {
                    let mut guard = conn.lock().await;
                    let boxed = ms_params(&params);
                    let refs: Vec<&dyn tiberius::ToSql> =
                        boxed.iter().map(|b| &**b as &dyn tiberius::ToSql).collect();
                    let mut results = match guard.query(sql.as_str(), &refs[..]).await {
                        Ok(results) => results,
                        Err(e) => {
                            let _ = tx.send(Err(e.into())).await;
                            return;
                        }
                    };
                    loop {
                        match results.try_next().await {
                            Ok(Some(item)) => {
                                if let Some(row) = item.into_row() {
                                    if tx.send(Ok(Box::new(row) as BoxedRow)).await.is_err() {
                                        // consumer went away
                                        break;
                                    }
                                }
                            }
                            Ok(None) => break,
                            Err(e) => {
                                let _ = tx.send(Err(e.into())).await;
                                break;
                            }
                        }
                    }
                });
                Ok(stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                })
                .boxed())
            }
            DatabaseRef::Postgres(pg) => {
                let rows = pg.query_raw(sql, pg_params(params)).await?;
                Ok(rows
                    .map_ok(|row| Box::new(row) as BoxedRow)
                    .map_err(RepoError::from)
                    .boxed())
            }
        }
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, RepoError> {
        match self {
            DatabaseRef::Mssql(conn) => {
                let mut guard = conn.lock().await;
                let boxed = ms_params(params);
                let refs: Vec<&dyn tiberius::ToSql> =
                    boxed.iter().map(|b| &**b as &dyn tiberius::ToSql).collect();
                let res = guard.execute(sql, &refs[..]).await?;
                Ok(res.total())
            }
            DatabaseRef::Postgres(pg) => {
                let boxed = pg_params(params);
                let refs: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> =
                    boxed.iter().map(|b| &**b as _).collect();
                Ok(pg.execute(sql, &refs[..]).await?)
            }
        }
    }
}
