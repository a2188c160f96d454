use std::marker::PhantomData;
use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt, TryStreamExt};

use crate::db::DatabaseRef;
use crate::error::RepoError;
use crate::executor::{Executor, RowStream};
use crate::mapping::Entity;
use crate::sql::{self, AliasedColumn, TableRef};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// SQL Server: `@P1`, `OFFSET .. ROWS FETCH NEXT .. ROWS ONLY`.
    AtP,
    /// PostgreSQL: `$1`, `LIMIT .. OFFSET ..`.
    Dollar,
}

impl PlaceholderStyle {
    pub fn placeholder(self, idx: usize) -> String {
        match self {
            PlaceholderStyle::AtP => format!("@P{}", idx),
            PlaceholderStyle::Dollar => format!("${}", idx),
        }
    }
}

/// A scalar bound as a statement parameter or decoded from a result column.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    I32(i32),
    I64(i64),
    Bool(bool),
    Text(String),
    Decimal(rust_decimal::Decimal),
    DateTime(chrono::NaiveDateTime),
    Null,
}

impl SqlValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::I32(_) => "i32",
            SqlValue::I64(_) => "i64",
            SqlValue::Bool(_) => "bool",
            SqlValue::Text(_) => "text",
            SqlValue::Decimal(_) => "decimal",
            SqlValue::DateTime(_) => "timestamp",
            SqlValue::Null => "null",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

pub trait ToParam {
    fn to_param(self) -> SqlValue;
}

impl ToParam for i32 {
    fn to_param(self) -> SqlValue {
        SqlValue::I32(self)
    }
}
impl ToParam for i64 {
    fn to_param(self) -> SqlValue {
        SqlValue::I64(self)
    }
}
impl ToParam for bool {
    fn to_param(self) -> SqlValue {
        SqlValue::Bool(self)
    }
}
impl ToParam for String {
    fn to_param(self) -> SqlValue {
        SqlValue::Text(self)
    }
}
impl<'a> ToParam for &'a str {
    fn to_param(self) -> SqlValue {
        SqlValue::Text(self.to_string())
    }
}
impl ToParam for rust_decimal::Decimal {
    fn to_param(self) -> SqlValue {
        SqlValue::Decimal(self)
    }
}
impl ToParam for chrono::NaiveDateTime {
    fn to_param(self) -> SqlValue {
        SqlValue::DateTime(self)
    }
}
impl ToParam for SqlValue {
    fn to_param(self) -> SqlValue {
        self
    }
}

impl<T: ToParam> ToParam for Option<T> {
    fn to_param(self) -> SqlValue {
        match self {
            Some(v) => v.to_param(),
            None => SqlValue::Null,
        }
    }
}

/// Predicate tree for WHERE and JOIN .. ON clauses.
///
/// Values always travel as bound parameters.
#[derive(Clone, Debug)]
pub enum Expr {
    Col(String),
    Param(SqlValue),
    Binary {
        left: Box<Expr>,
        op: &'static str,
        right: Box<Expr>,
    },
    Like {
        left: Box<Expr>,
        right: SqlValue,
    },
    InList {
        left: Box<Expr>,
        list: Vec<SqlValue>,
    },
    IsNull(Box<Expr>),
    Group(Box<Expr>),
}

impl Expr {
    fn binary(self, op: &'static str, rhs: Expr) -> Expr {
        Expr::Binary {
            left: Box::new(self),
            op,
            right: Box::new(rhs),
        }
    }

    pub fn eq(self, rhs: Expr) -> Expr {
        self.binary("=", rhs)
    }
    pub fn ne(self, rhs: Expr) -> Expr {
        self.binary("<>", rhs)
    }
    pub fn gt(self, rhs: Expr) -> Expr {
        self.binary(">", rhs)
    }
    pub fn ge(self, rhs: Expr) -> Expr {
        self.binary(">=", rhs)
    }
    pub fn lt(self, rhs: Expr) -> Expr {
        self.binary("<", rhs)
    }
    pub fn le(self, rhs: Expr) -> Expr {
        self.binary("<=", rhs)
    }
    pub fn and(self, rhs: Expr) -> Expr {
        self.binary("AND", rhs)
    }
    pub fn or(self, rhs: Expr) -> Expr {
        self.binary("OR", rhs)
    }
    pub fn like(self, pattern: impl ToParam) -> Expr {
        Expr::Like {
            left: Box::new(self),
            right: pattern.to_param(),
        }
    }
    pub fn in_list(self, list: Vec<SqlValue>) -> Expr {
        Expr::InList {
            left: Box::new(self),
            list,
        }
    }
    pub fn is_null(self) -> Expr {
        Expr::IsNull(Box::new(self))
    }
    pub fn group(self) -> Expr {
        Expr::Group(Box::new(self))
    }

    pub fn to_sql_with(&self, style: PlaceholderStyle, params: &mut Vec<SqlValue>) -> String {
        match self {
            Expr::Col(c) => c.clone(),
            Expr::Param(p) => {
                params.push(p.clone());
                style.placeholder(params.len())
            }
            Expr::Binary { left, op, right } => {
                let l = left.to_sql_with(style, params);
                let r = right.to_sql_with(style, params);
                if *op == "AND" || *op == "OR" {
                    format!("{} {} {}", l, op, r)
                } else {
                    format!("({} {} {})", l, op, r)
                }
            }
            Expr::Like { left, right } => {
                let l = left.to_sql_with(style, params);
                params.push(right.clone());
                format!("({} LIKE {})", l, style.placeholder(params.len()))
            }
            Expr::InList { left, list } => {
                if list.is_empty() {
                    return "(1 = 0)".to_string();
                }
                let l = left.to_sql_with(style, params);
                let mut phs = Vec::with_capacity(list.len());
                for p in list {
                    params.push(p.clone());
                    phs.push(style.placeholder(params.len()));
                }
                format!("{} IN ({})", l, phs.join(", "))
            }
            Expr::IsNull(e) => format!("{} IS NULL", e.to_sql_with(style, params)),
            Expr::Group(e) => format!("({})", e.to_sql_with(style, params)),
        }
    }
}

#[macro_export]
macro_rules! col {
    ($name:expr) => {
        $crate::query::Expr::Col($name.to_string())
    };
}

#[macro_export]
macro_rules! val {
    ($v:expr) => {
        $crate::query::Expr::Param($crate::query::ToParam::to_param($v))
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    fn to_sql(self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL JOIN",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    fn to_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }

    /// Parses a `field[,asc|desc]` request parameter.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split(',').map(str::trim);
        let field = parts.next().filter(|f| !f.is_empty())?;
        let direction = match parts.next() {
            None => Direction::Asc,
            Some(d) if d.eq_ignore_ascii_case("asc") => Direction::Asc,
            Some(d) if d.eq_ignore_ascii_case("desc") => Direction::Desc,
            Some(_) => return None,
        };
        Some(Self {
            field: field.to_string(),
            direction,
        })
    }
}

/// Zero-based page request with optional sort keys.
///
/// Without a sort key the row order is whatever the store returns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pageable {
    pub page: u64,
    pub size: u64,
    pub sort: Vec<Sort>,
}

impl Pageable {
    pub fn of(page: u64, size: u64) -> Self {
        Self {
            page,
            size,
            sort: Vec::new(),
        }
    }

    pub fn sorted_by(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_mul(self.size)
    }
}

struct JoinClause {
    join_type: JoinType,
    table: String,
    on: Expr,
}

pub type EntityStream<T> = BoxStream<'static, Result<T, RepoError>>;

#[allow(non_snake_case)]
pub struct Query<T, E = DatabaseRef>
where
    T: Entity,
    E: Executor,
{
    table: TableRef,
    columns: Vec<AliasedColumn>,
    style: PlaceholderStyle,
    db: Option<Arc<E>>,
    joins: Vec<JoinClause>,
    filters: Vec<Expr>,
    order_by: Vec<String>,
    top: Option<u64>,
    skip: Option<u64>,
    _t: PhantomData<T>,
}

#[allow(non_snake_case)]
impl<T, E> Query<T, E>
where
    T: Entity,
    E: Executor,
{
    /// Selects every declared column of `T`, aliased with the table alias as prefix.
    pub fn new(table: TableRef, style: PlaceholderStyle) -> Self {
        let columns = sql::columns(&table, T::table(), &table.alias);
        Self {
            table,
            columns,
            style,
            db: None,
            joins: Vec::new(),
            filters: Vec::new(),
            order_by: Vec::new(),
            top: None,
            skip: None,
            _t: PhantomData,
        }
    }

    pub fn with_db(mut self, db: Arc<E>) -> Self {
        self.db = Some(db);
        self
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Adds an extra projected column, e.g. a join-table key.
    pub fn Column(mut self, column: AliasedColumn) -> Self {
        self.columns.push(column);
        self
    }

    pub fn Where(mut self, expr: Expr) -> Self {
        self.filters.push(expr);
        self
    }

    pub fn Join(mut self, join_type: JoinType, table: &str, on_expr: Expr) -> Self {
        self.joins.push(JoinClause {
            join_type,
            table: table.to_string(),
            on: on_expr,
        });
        self
    }

    pub fn OrderBy(mut self, ob: &str) -> Self {
        self.order_by.push(ob.to_string());
        self
    }

    pub fn Top(mut self, n: u64) -> Self {
        self.top = Some(n);
        self
    }

    pub fn Skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    /// Applies page, size and sort keys. Sort fields must name a column of `T`.
    pub fn Paginate(mut self, pageable: &Pageable) -> Result<Self, RepoError> {
        let meta = T::table();
        for sort in &pageable.sort {
            let column = meta
                .resolve_field(&sort.field)
                .ok_or_else(|| RepoError::InvalidSort {
                    table: meta.name,
                    field: sort.field.clone(),
                })?;
            self.order_by.push(format!(
                "{} {}",
                self.table.column(column),
                sort.direction.to_sql()
            ));
        }
        Ok(self.Skip(pageable.offset()).Top(pageable.size))
    }

    pub fn to_sql(&self) -> (String, Vec<SqlValue>) {
        let mut params = Vec::new();
        let mut sql = String::from("SELECT ");
        if self.style == PlaceholderStyle::AtP && self.skip.is_none() {
            if let Some(n) = self.top {
                sql.push_str(&format!("TOP({}) ", n));
            }
        }
        if self.columns.is_empty() {
            sql.push('*');
        } else {
            let cols: Vec<String> = self.columns.iter().map(AliasedColumn::to_sql).collect();
            sql.push_str(&cols.join(", "));
        }
        sql.push_str(" FROM ");
        sql.push_str(&self.table.to_sql());
        for j in &self.joins {
            sql.push(' ');
            sql.push_str(j.join_type.to_sql());
            sql.push(' ');
            sql.push_str(&j.table);
            sql.push_str(" ON ");
            sql.push_str(&j.on.to_sql_with(self.style, &mut params));
        }
        let mut it = self.filters.iter();
        if let Some(first) = it.next() {
            sql.push_str(" WHERE ");
            sql.push_str(&first.to_sql_with(self.style, &mut params));
            for f in it {
                sql.push_str(" AND ");
                sql.push_str(&f.to_sql_with(self.style, &mut params));
            }
        }
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        } else if self.style == PlaceholderStyle::AtP && self.skip.is_some() {
            // OFFSET requires an ORDER BY on SQL Server
            sql.push_str(" ORDER BY (SELECT NULL)");
        }
        match self.style {
            PlaceholderStyle::Dollar => {
                if let Some(n) = self.top {
                    sql.push_str(&format!(" LIMIT {}", n));
                }
                if let Some(m) = self.skip {
                    sql.push_str(&format!(" OFFSET {}", m));
                }
            }
            PlaceholderStyle::AtP => {
                if let Some(m) = self.skip {
                    sql.push_str(&format!(" OFFSET {} ROWS", m));
                    if let Some(n) = self.top {
                        sql.push_str(&format!(" FETCH NEXT {} ROWS ONLY", n));
                    }
                }
            }
        }
        (sql, params)
    }

    /// Runs the statement and yields raw rows as they arrive.
    ///
    /// A limit of zero yields nothing and sends no statement, on either dialect.
    pub async fn to_rows(self) -> Result<RowStream, RepoError> {
        let db = self
            .db
            .clone()
            .ok_or_else(|| RepoError::Connectivity("query is not bound to a database".into()))?;
        if self.top == Some(0) {
            return Ok(futures::stream::empty().boxed());
        }
        let (sql, params) = self.to_sql();
        tracing::trace!(%sql, params = params.len(), "select");
        db.fetch(&sql, &params).await
    }

    /// Runs the statement and maps each row into `T`.
    ///
    /// A row that fails to decode yields an error item; later rows still flow.
    pub async fn to_stream(self) -> Result<EntityStream<T>, RepoError> {
        let prefix = self.table.alias.clone();
        let rows = self.to_rows().await?;
        Ok(rows
            .map(move |row| row.and_then(|r| T::from_row(r.as_ref(), &prefix)))
            .boxed())
    }

    pub async fn to_list_async(self) -> Result<Vec<T>, RepoError> {
        self.to_stream().await?.try_collect().await
    }

    pub async fn to_single_async(self) -> Result<Option<T>, RepoError> {
        let mut stream = self.Top(1).to_stream().await?;
        stream.try_next().await
    }
}
