//! Table references, aliased column lists and the write statements derived
//! from an entity's [`TableMeta`].
//!
//! Every selected column is exposed as `<prefix>_<column>`, which is the key
//! the generated row mappers read back.

use crate::mapping::{RelationMeta, TableMeta};
use crate::query::PlaceholderStyle;

/// Alias of the primary table in every entity query.
pub const ENTITY_ALIAS: &str = "e";
/// Alias of a many-to-many join table.
pub const JOIN_ALIAS: &str = "j";
/// Alias of the entity reached through a join table.
pub const TARGET_ALIAS: &str = "p";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableRef {
    pub name: &'static str,
    pub alias: String,
}

impl TableRef {
    pub fn aliased(name: &'static str, alias: impl Into<String>) -> Self {
        Self {
            name,
            alias: alias.into(),
        }
    }

    pub fn to_sql(&self) -> String {
        format!("{} {}", self.name, self.alias)
    }

    /// Qualified column reference, `alias.column`.
    pub fn column(&self, column: &str) -> String {
        format!("{}.{}", self.alias, column)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AliasedColumn {
    /// Qualified source column, e.g. `e.city`.
    pub source: String,
    /// Result-set name, e.g. `e_city`.
    pub alias: String,
}

impl AliasedColumn {
    pub fn new(table: &TableRef, column: &str, prefix: &str) -> Self {
        Self {
            source: table.column(column),
            alias: format!("{}_{}", prefix, column),
        }
    }

    pub fn to_sql(&self) -> String {
        format!("{} AS {}", self.source, self.alias)
    }
}

pub fn columns(table: &TableRef, meta: &TableMeta, prefix: &str) -> Vec<AliasedColumn> {
    meta.columns
        .iter()
        .map(|c| AliasedColumn::new(table, c.name, prefix))
        .collect()
}

fn placeholders(style: PlaceholderStyle, from: usize, count: usize) -> Vec<String> {
    (from..from + count).map(|i| style.placeholder(i)).collect()
}

/// `INSERT` of every non-key column, handing back the generated key.
pub fn build_insert(meta: &TableMeta, style: PlaceholderStyle) -> String {
    let cols: Vec<&str> = meta.writable_columns().map(|c| c.name).collect();
    let vals = placeholders(style, 1, cols.len());
    match style {
        PlaceholderStyle::Dollar if cols.is_empty() => {
            format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", meta.name, meta.key)
        }
        PlaceholderStyle::Dollar => format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            meta.name,
            cols.join(", "),
            vals.join(", "),
            meta.key
        ),
        PlaceholderStyle::AtP if cols.is_empty() => format!(
            "INSERT INTO {} OUTPUT INSERTED.{} DEFAULT VALUES",
            meta.name, meta.key
        ),
        PlaceholderStyle::AtP => format!(
            "INSERT INTO {} ({}) OUTPUT INSERTED.{} VALUES ({})",
            meta.name,
            cols.join(", "),
            meta.key,
            vals.join(", ")
        ),
    }
}

/// `UPDATE` of every non-key column by key. The key is the last parameter.
/// A key-only table has nothing to set, so its row is only looked up.
///
/// Returns the key of the touched row, so an empty result means the id does
/// not exist.
pub fn build_update(meta: &TableMeta, style: PlaceholderStyle) -> String {
    let cols: Vec<&str> = meta.writable_columns().map(|c| c.name).collect();
    let sets: Vec<String> = cols
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = {}", c, style.placeholder(i + 1)))
        .collect();
    if sets.is_empty() {
        return format!(
            "SELECT {} FROM {} WHERE {} = {}",
            meta.key,
            meta.name,
            meta.key,
            style.placeholder(1)
        );
    }
    let sets = sets.join(", ");
    let key_ph = style.placeholder(cols.len() + 1);
    match style {
        PlaceholderStyle::Dollar => format!(
            "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
            meta.name, sets, meta.key, key_ph, meta.key
        ),
        PlaceholderStyle::AtP => format!(
            "UPDATE {} SET {} OUTPUT INSERTED.{} WHERE {} = {}",
            meta.name, sets, meta.key, meta.key, key_ph
        ),
    }
}

pub fn build_delete_by_key(meta: &TableMeta, style: PlaceholderStyle) -> String {
    format!(
        "DELETE FROM {} WHERE {} = {}",
        meta.name,
        meta.key,
        style.placeholder(1)
    )
}

/// Counting statement; the count comes back as column `total`.
pub fn build_count(meta: &TableMeta, style: PlaceholderStyle, by_key: bool) -> String {
    let count = match style {
        PlaceholderStyle::Dollar => "COUNT(*)",
        PlaceholderStyle::AtP => "COUNT_BIG(*)",
    };
    let mut sql = format!("SELECT {} AS total FROM {}", count, meta.name);
    if by_key {
        sql.push_str(&format!(" WHERE {} = {}", meta.key, style.placeholder(1)));
    }
    sql
}

pub fn build_unlink(relation: &RelationMeta, style: PlaceholderStyle) -> String {
    format!(
        "DELETE FROM {} WHERE {} = {}",
        relation.join_table,
        relation.owner_column,
        style.placeholder(1)
    )
}

pub fn build_link(relation: &RelationMeta, style: PlaceholderStyle) -> String {
    format!(
        "INSERT INTO {} ({}, {}) VALUES ({}, {})",
        relation.join_table,
        relation.owner_column,
        relation.target_column,
        style.placeholder(1),
        style.placeholder(2)
    )
}
