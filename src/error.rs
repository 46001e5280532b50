/// PostgreSQL error type alias.
pub type PgErr = tokio_postgres::Error;

/// Errors that can occur during a reconciliation run.
/// Every variant is terminal for the invocation; nothing is retried.
#[derive(Debug)]
pub enum TablespaceError {
    /// The server lacks a capability the request depends on.
    /// Probed once at startup, before any tablespace inspection.
    Capability(String),
    /// Connecting or establishing the session failed.
    Connection(PgErr),
    /// A catalog read or DDL statement failed mid-reconciliation.
    /// State is left exactly as the database left it.
    Query(&'static str, PgErr),
    /// A requested change PostgreSQL cannot perform.
    Unsupported(String),
    /// The system catalogs returned something self-contradictory.
    Consistency(String),
}

impl std::fmt::Display for TablespaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Capability(s) => write!(f, "missing server capability: {}", s),
            Self::Connection(e) => write!(f, "connection failed: {}", e),
            Self::Query(op, e) => write!(f, "query failed during {}: {}", op, e),
            Self::Unsupported(s) => write!(f, "unsupported operation: {}", s),
            Self::Consistency(s) => write!(f, "catalog inconsistency: {}", s),
        }
    }
}

impl std::error::Error for TablespaceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_classes_are_distinguishable() {
        let capability = TablespaceError::Capability("tablespace options".into());
        let unsupported = TablespaceError::Unsupported("relocation".into());
        let consistency = TablespaceError::Consistency("duplicate rows".into());
        assert!(capability.to_string().starts_with("missing server capability"));
        assert!(unsupported.to_string().starts_with("unsupported operation"));
        assert!(consistency.to_string().starts_with("catalog inconsistency"));
    }
}
