use crate::Statement;
use crate::TablespaceError;
use std::collections::BTreeMap;
use tokio_postgres::Client;

/// Current server-side state of a tablespace. Re-fetched per
/// reconciliation, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablespaceInfo {
    pub owner: String,
    pub location: String,
    pub options: BTreeMap<String, String>,
}

/// SQL surface for tablespace reconciliation.
/// Abstracts the system catalogs from the planning logic.
#[allow(async_fn_in_trait)]
pub trait Catalog {
    /// Number of `pg_tablespace` rows matching the name.
    async fn count(&self, name: &str) -> Result<u64, TablespaceError>;
    /// Current owner, location, and options, if the tablespace exists.
    async fn fetch(&self, name: &str) -> Result<Option<TablespaceInfo>, TablespaceError>;
    /// Execute one DDL statement under autocommit.
    async fn apply(&self, statement: &Statement) -> Result<(), TablespaceError>;

    /// True iff exactly one catalog row matches the name. More than one
    /// row is a data-integrity anomaly and surfaces as an error rather
    /// than masquerading as presence or absence.
    async fn exists(&self, name: &str) -> Result<bool, TablespaceError> {
        match self.count(name).await? {
            0 => Ok(false),
            1 => Ok(true),
            n => Err(TablespaceError::Consistency(format!(
                "{} pg_tablespace rows named {}",
                n, name
            ))),
        }
    }
}

impl Catalog for Client {
    async fn count(&self, name: &str) -> Result<u64, TablespaceError> {
        self.query_one(
            "SELECT COUNT(*) FROM pg_tablespace WHERE spcname = $1",
            &[&name],
        )
        .await
        .map(|row| row.get::<_, i64>(0) as u64)
        .map_err(|e| TablespaceError::Query("tablespace existence check", e))
    }

    async fn fetch(&self, name: &str) -> Result<Option<TablespaceInfo>, TablespaceError> {
        self.query_opt(
            "SELECT r.rolname, pg_tablespace_location(t.oid), t.spcoptions \
             FROM pg_tablespace t JOIN pg_roles r ON t.spcowner = r.oid \
             WHERE t.spcname = $1",
            &[&name],
        )
        .await
        .map_err(|e| TablespaceError::Query("tablespace detail lookup", e))
        .map(|opt| {
            opt.map(|row| TablespaceInfo {
                owner: row.get(0),
                location: row.get(1),
                options: row
                    .get::<_, Option<Vec<String>>>(2)
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|entry| entry.split_once('='))
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect(),
            })
        })
    }

    async fn apply(&self, statement: &Statement) -> Result<(), TablespaceError> {
        let sql = statement.sql();
        log::debug!("issuing {}", sql);
        // Simple query protocol: each statement is its own implicit
        // transaction, which CREATE/DROP TABLESPACE require.
        self.batch_execute(&sql)
            .await
            .map_err(|e| TablespaceError::Query("tablespace ddl", e))
    }
}

impl<C: Catalog> Catalog for &C {
    async fn count(&self, name: &str) -> Result<u64, TablespaceError> {
        C::count(self, name).await
    }
    async fn fetch(&self, name: &str) -> Result<Option<TablespaceInfo>, TablespaceError> {
        C::fetch(self, name).await
    }
    async fn apply(&self, statement: &Statement) -> Result<(), TablespaceError> {
        C::apply(self, statement).await
    }
}
