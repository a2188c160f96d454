extern crate self as boutique_orm;

pub mod config;
pub mod convert;
pub mod db;
pub mod domain;
pub mod error;
pub mod executor;
pub mod infrastructure;
pub mod mapping;
pub mod query;
pub mod repository;
pub mod services;
pub mod sql;

pub use config::{ConfigError, DatabaseConfig, RepositoryConfig};
pub use convert::{ColumnKind, FromSqlValue, MemoryRow, Row};
pub use db::{connect, connect_mssql, connect_postgres, DatabaseRef, DbKind};
pub use error::RepoError;
pub use executor::{BoxedRow, Executor, RowStream};
pub use infrastructure::generic_repository::GenericRepository;
pub use mapping::{ColumnMeta, Entity, HasRelation, Related, RelationMeta, TableMeta, Validatable};
pub use query::{
    Direction, EntityStream, Expr, JoinType, Pageable, PlaceholderStyle, Query, Sort, SqlValue,
    ToParam,
};
pub use repository::{Crud, EagerRepository, QueryExecutor, Repository};
pub use services::{EntityService, Merge, Page};

pub use boutique_orm_macros::Entity; // derive macro

#[doc(hidden)]
pub use regex as __regex;
#[doc(hidden)]
pub use serde as __serde;
