use serde::{Deserialize, Serialize};

use crate::convert::{ColumnKind, Row};
use crate::error::RepoError;
use crate::query::SqlValue;

#[derive(Debug)]
pub struct ColumnMeta {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub is_key: bool,
}

/// Many-to-many link through a join table.
#[derive(Debug)]
pub struct RelationMeta {
    pub name: &'static str,
    pub join_table: &'static str,
    /// Join-table column referencing the owning entity.
    pub owner_column: &'static str,
    /// Join-table column referencing the target entity.
    pub target_column: &'static str,
}

#[derive(Debug)]
pub struct TableMeta {
    pub name: &'static str,
    pub key: &'static str,
    pub columns: &'static [ColumnMeta],
    pub relation: Option<&'static RelationMeta>,
}

impl TableMeta {
    pub fn column(&self, name: &str) -> Option<&'static ColumnMeta> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns written by INSERT and UPDATE, in declaration order.
    pub fn writable_columns(&self) -> impl Iterator<Item = &'static ColumnMeta> {
        self.columns.iter().filter(|c| !c.is_key)
    }

    /// Resolves a sort field given either as the column name or as its
    /// camelCase property name (`totalPrice` for `total_price`).
    pub fn resolve_field(&self, field: &str) -> Option<&'static str> {
        self.columns
            .iter()
            .find(|c| c.name == field || camel_case(c.name) == field)
            .map(|c| c.name)
    }
}

fn camel_case(column: &str) -> String {
    let mut out = String::with_capacity(column.len());
    let mut upper = false;
    for ch in column.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// A persisted record with a static column mapping.
///
/// Implemented by `#[derive(Entity)]`.
pub trait Entity: Sized + Send + Sync + 'static {
    fn table() -> &'static TableMeta;

    /// Builds the entity from columns named `<prefix>_<column>`.
    fn from_row(row: &dyn Row, prefix: &str) -> Result<Self, RepoError>;

    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: i64);

    /// Values of the writable columns, in declaration order.
    fn values(&self) -> Vec<SqlValue>;

    /// Target ids of the many-to-many association, when it is resolved.
    fn related_ids(&self) -> Option<Vec<i64>> {
        None
    }
}

pub trait Validatable {
    fn validate(&self) -> Result<(), Vec<String>>;
}

/// Entity owning a many-to-many association that can be eagerly loaded.
pub trait HasRelation: Entity {
    type Target: Entity;

    fn relation() -> &'static RelationMeta;
    fn related(&self) -> &Related<Self::Target>;
    fn related_mut(&mut self) -> &mut Related<Self::Target>;
}

/// State of a many-to-many association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Related<T> {
    /// Not fetched; saving leaves the join rows untouched.
    Unloaded,
    /// Only the target ids are known.
    Ids(Vec<i64>),
    /// Fully fetched target records.
    Loaded(Vec<T>),
}

impl<T> Default for Related<T> {
    fn default() -> Self {
        Related::Unloaded
    }
}

impl<T: Entity> Related<T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Related::Loaded(_))
    }

    pub fn ids(&self) -> Option<Vec<i64>> {
        match self {
            Related::Unloaded => None,
            Related::Ids(ids) => Some(ids.clone()),
            Related::Loaded(items) => Some(items.iter().filter_map(Entity::id).collect()),
        }
    }

    pub fn loaded(&self) -> Option<&[T]> {
        match self {
            Related::Loaded(items) => Some(items),
            _ => None,
        }
    }
}
