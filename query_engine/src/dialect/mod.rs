//! Dialect layer
//!
//! One `Dialect` tag per supported database plus a strategy object per
//! dialect implementing the shared `DialectTemplates` interface. Builders
//! select the strategy once at construction; there is no fallback dialect —
//! an unrecognized tag is a fatal configuration error.

pub mod statements;
pub mod templates;

use crate::errors::EngineError;
use std::str::FromStr;
use templates::{DialectTemplates, MySqlTemplates, PostgresTemplates, SqliteTemplates};

/// Neutral parameter marker used while fragments are being composed.
///
/// Fragments from nested builders are concatenated freely and only at the
/// moment a query executes is this token resolved, left-to-right, into the
/// dialect's placeholder style. Resolving once avoids double-substitution
/// when fragments from several builders are merged.
pub const PLACEHOLDER: &str = "PLACEHOLDER";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    MariaDb,
    Postgres,
    Sqlite,
}

static MYSQL_TEMPLATES: MySqlTemplates = MySqlTemplates;
static POSTGRES_TEMPLATES: PostgresTemplates = PostgresTemplates;
static SQLITE_TEMPLATES: SqliteTemplates = SqliteTemplates;

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::MariaDb => "mariadb",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }

    /// The template strategy for this dialect. MariaDB shares the MySQL
    /// templates; only the tag differs.
    pub fn templates(&self) -> &'static dyn DialectTemplates {
        match self {
            Self::MySql | Self::MariaDb => &MYSQL_TEMPLATES,
            Self::Postgres => &POSTGRES_TEMPLATES,
            Self::Sqlite => &SQLITE_TEMPLATES,
        }
    }

    /// Quote a possibly table-qualified identifier (`users.id`)
    pub fn quote_path(&self, path: &str) -> String {
        let templates = self.templates();
        path.split('.')
            .map(|part| templates.quote(part))
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl FromStr for Dialect {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mysql" => Ok(Self::MySql),
            "mariadb" => Ok(Self::MariaDb),
            "postgres" => Ok(Self::Postgres),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(EngineError::UnsupportedDialect(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_parsing() {
        assert_eq!("postgres".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("mariadb".parse::<Dialect>().unwrap(), Dialect::MariaDb);
        assert!(matches!(
            "oracle".parse::<Dialect>(),
            Err(EngineError::UnsupportedDialect(_))
        ));
    }

    #[test]
    fn test_identifier_quoting() {
        assert_eq!(Dialect::MySql.quote_path("users.id"), "`users`.`id`");
        assert_eq!(Dialect::Postgres.quote_path("users.id"), "\"users\".\"id\"");
        assert_eq!(Dialect::Sqlite.quote_path("id"), "\"id\"");
    }
}
