//! Column-level type coercion between driver rows and entity fields.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::error::RepoError;
use crate::query::{SqlValue, ToParam};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    I32,
    I64,
    Bool,
    Text,
    Decimal,
    Timestamp,
    /// Closed enumeration stored as text.
    Enum,
}

/// Named-column access to one fetched row.
pub trait Row: Send {
    /// Reads `column` as `kind`. A NULL column yields [`SqlValue::Null`].
    fn read(&self, column: &str, kind: ColumnKind) -> Result<SqlValue, RepoError>;
}

/// Field types an entity column can hold.
pub trait FromSqlValue: Sized {
    const KIND: ColumnKind;

    /// Converts a non-null value.
    fn from_value(value: SqlValue, column: &str) -> Result<Self, RepoError>;
}

impl FromSqlValue for i32 {
    const KIND: ColumnKind = ColumnKind::I32;

    fn from_value(value: SqlValue, column: &str) -> Result<Self, RepoError> {
        match value {
            SqlValue::I32(v) => Ok(v),
            SqlValue::I64(v) => i32::try_from(v)
                .map_err(|_| RepoError::decode(column, format!("{v} does not fit in i32"))),
            other => Err(RepoError::type_mismatch(column, "i32", &other)),
        }
    }
}

impl FromSqlValue for i64 {
    const KIND: ColumnKind = ColumnKind::I64;

    fn from_value(value: SqlValue, column: &str) -> Result<Self, RepoError> {
        match value {
            SqlValue::I64(v) => Ok(v),
            SqlValue::I32(v) => Ok(i64::from(v)),
            other => Err(RepoError::type_mismatch(column, "i64", &other)),
        }
    }
}

impl FromSqlValue for bool {
    const KIND: ColumnKind = ColumnKind::Bool;

    fn from_value(value: SqlValue, column: &str) -> Result<Self, RepoError> {
        match value {
            SqlValue::Bool(v) => Ok(v),
            other => Err(RepoError::type_mismatch(column, "bool", &other)),
        }
    }
}

impl FromSqlValue for String {
    const KIND: ColumnKind = ColumnKind::Text;

    fn from_value(value: SqlValue, column: &str) -> Result<Self, RepoError> {
        match value {
            SqlValue::Text(v) => Ok(v),
            other => Err(RepoError::type_mismatch(column, "text", &other)),
        }
    }
}

impl FromSqlValue for Decimal {
    const KIND: ColumnKind = ColumnKind::Decimal;

    fn from_value(value: SqlValue, column: &str) -> Result<Self, RepoError> {
        match value {
            SqlValue::Decimal(v) => Ok(v),
            SqlValue::I64(v) => Ok(Decimal::from(v)),
            SqlValue::I32(v) => Ok(Decimal::from(v)),
            other => Err(RepoError::type_mismatch(column, "decimal", &other)),
        }
    }
}

impl FromSqlValue for NaiveDateTime {
    const KIND: ColumnKind = ColumnKind::Timestamp;

    fn from_value(value: SqlValue, column: &str) -> Result<Self, RepoError> {
        match value {
            SqlValue::DateTime(v) => Ok(v),
            other => Err(RepoError::type_mismatch(column, "timestamp", &other)),
        }
    }
}

/// Reads `column` as `T`; NULL becomes `None`.
pub fn convert<T: FromSqlValue>(row: &dyn Row, column: &str) -> Result<Option<T>, RepoError> {
    match row.read(column, T::KIND)? {
        SqlValue::Null => Ok(None),
        value => T::from_value(value, column).map(Some),
    }
}

/// Rejects NULL for a column whose field is not optional.
pub fn required<T>(value: Option<T>, column: &str) -> Result<T, RepoError> {
    value.ok_or_else(|| RepoError::decode(column, "unexpected NULL"))
}

/// Row built in memory from `(column, value)` pairs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryRow {
    columns: Vec<(String, SqlValue)>,
}

impl MemoryRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl ToParam) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl ToParam) {
        self.columns.push((column.into(), value.to_param()));
    }
}

impl Row for MemoryRow {
    fn read(&self, column: &str, _kind: ColumnKind) -> Result<SqlValue, RepoError> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| RepoError::missing_column(column))
    }
}

impl Row for tokio_postgres::Row {
    fn read(&self, column: &str, kind: ColumnKind) -> Result<SqlValue, RepoError> {
        let idx = self
            .columns()
            .iter()
            .position(|c| c.name() == column)
            .ok_or_else(|| RepoError::missing_column(column))?;
        let value = match kind {
            ColumnKind::I32 => self
                .try_get::<_, Option<i32>>(idx)
                .map(|v| v.map(SqlValue::I32)),
            ColumnKind::I64 => match self.try_get::<_, Option<i64>>(idx) {
                Ok(v) => Ok(v.map(SqlValue::I64)),
                // integer columns narrower than BIGINT
                Err(_) => self
                    .try_get::<_, Option<i32>>(idx)
                    .map(|v| v.map(|n| SqlValue::I64(i64::from(n)))),
            },
            ColumnKind::Bool => self
                .try_get::<_, Option<bool>>(idx)
                .map(|v| v.map(SqlValue::Bool)),
            ColumnKind::Text | ColumnKind::Enum => self
                .try_get::<_, Option<String>>(idx)
                .map(|v| v.map(SqlValue::Text)),
            ColumnKind::Decimal => self
                .try_get::<_, Option<Decimal>>(idx)
                .map(|v| v.map(SqlValue::Decimal)),
            ColumnKind::Timestamp => self
                .try_get::<_, Option<NaiveDateTime>>(idx)
                .map(|v| v.map(SqlValue::DateTime)),
        };
        value
            .map(|v| v.unwrap_or(SqlValue::Null))
            .map_err(|e| RepoError::decode(column, e.to_string()))
    }
}

impl Row for tiberius::Row {
    fn read(&self, column: &str, kind: ColumnKind) -> Result<SqlValue, RepoError> {
        let idx = self
            .columns()
            .iter()
            .position(|c| c.name() == column)
            .ok_or_else(|| RepoError::missing_column(column))?;
        let value = match kind {
            ColumnKind::I32 => self
                .try_get::<i32, _>(idx)
                .map(|v| v.map(SqlValue::I32)),
            ColumnKind::I64 => match self.try_get::<i64, _>(idx) {
                Ok(v) => Ok(v.map(SqlValue::I64)),
                Err(_) => self
                    .try_get::<i32, _>(idx)
                    .map(|v| v.map(|n| SqlValue::I64(i64::from(n)))),
            },
            ColumnKind::Bool => self
                .try_get::<bool, _>(idx)
                .map(|v| v.map(SqlValue::Bool)),
            ColumnKind::Text | ColumnKind::Enum => self
                .try_get::<&str, _>(idx)
                .map(|v| v.map(|s| SqlValue::Text(s.to_string()))),
            ColumnKind::Decimal => self
                .try_get::<Decimal, _>(idx)
                .map(|v| v.map(SqlValue::Decimal)),
            ColumnKind::Timestamp => self
                .try_get::<NaiveDateTime, _>(idx)
                .map(|v| v.map(SqlValue::DateTime)),
        };
        value
            .map(|v| v.unwrap_or(SqlValue::Null))
            .map_err(|e| RepoError::decode(column, e.to_string()))
    }
}

/// Declares a closed enumeration persisted as text.
///
/// Each member maps to exactly one stored spelling; any other stored text
/// fails to decode.
#[macro_export]
macro_rules! db_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn from_db(raw: &str) -> Option<Self> {
                match raw {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::RepoError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_db(s).ok_or_else(|| {
                    $crate::RepoError::decode(stringify!($name), format!("unknown value '{}'", s))
                })
            }
        }

        impl $crate::convert::FromSqlValue for $name {
            const KIND: $crate::convert::ColumnKind = $crate::convert::ColumnKind::Enum;

            fn from_value(
                value: $crate::query::SqlValue,
                column: &str,
            ) -> Result<Self, $crate::RepoError> {
                match value {
                    $crate::query::SqlValue::Text(raw) => Self::from_db(&raw).ok_or_else(|| {
                        $crate::RepoError::decode(
                            column,
                            format!("'{}' is not a {} member", raw, stringify!($name)),
                        )
                    }),
                    other => Err($crate::RepoError::type_mismatch(column, stringify!($name), &other)),
                }
            }
        }

        impl $crate::query::ToParam for $name {
            fn to_param(self) -> $crate::query::SqlValue {
                $crate::query::SqlValue::Text(self.as_str().to_string())
            }
        }

        impl $crate::__serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: $crate::__serde::Serializer,
            {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> $crate::__serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: $crate::__serde::Deserializer<'de>,
            {
                let raw = <String as $crate::__serde::Deserialize>::deserialize(deserializer)?;
                Self::from_db(&raw).ok_or_else(|| {
                    <D::Error as $crate::__serde::de::Error>::custom(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        raw
                    ))
                })
            }
        }
    };
}
