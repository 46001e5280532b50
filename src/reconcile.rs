use crate::Capabilities;
use crate::Catalog;
use crate::DesiredState;
use crate::OptionValue;
use crate::Statement;
use crate::TablespaceError;
use crate::TablespaceInfo;
use crate::TablespaceSpec;
use crate::valid_option_name;
use serde::Serialize;
use std::collections::BTreeMap;

/// Outcome of one reconciliation run. `queries` lists the DDL issued,
/// or, in check mode, the DDL that would have been issued.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub changed: bool,
    pub name: String,
    pub state: String,
    pub queries: Vec<String>,
}

/// Plan the DDL that converges current state toward the spec.
///
/// Pure: no I/O, no state across invocations. An empty plan means the
/// tablespace already matches every requested attribute. Unrequested
/// attributes are never compared and never generate DDL.
pub fn plan(
    spec: &TablespaceSpec,
    current: Option<&TablespaceInfo>,
) -> Result<Vec<Statement>, TablespaceError> {
    for name in spec.options.keys() {
        if !valid_option_name(name) {
            return Err(TablespaceError::Unsupported(format!(
                "{:?} is not a valid tablespace option name",
                name
            )));
        }
    }
    match (spec.desired, current) {
        (DesiredState::Absent, None) => Ok(vec![]),
        (DesiredState::Absent, Some(_)) => Ok(vec![Statement::Drop {
            name: spec.name.clone(),
        }]),
        (DesiredState::Present, None) => Ok(vec![Statement::Create {
            name: spec.name.clone(),
            owner: spec.owner.clone(),
            location: spec.location.clone(),
            // Reset requests are meaningless at creation time.
            options: spec
                .options
                .iter()
                .filter_map(|(name, value)| match value {
                    OptionValue::Set(v) => Some((name.clone(), v.clone())),
                    OptionValue::Reset => None,
                })
                .collect(),
        }]),
        (DesiredState::Present, Some(info)) => {
            if let Some(location) = &spec.location {
                if location != &info.location {
                    return Err(TablespaceError::Unsupported(format!(
                        "tablespace {} is at {} and cannot move to {}; locations are fixed at creation",
                        spec.name, info.location, location
                    )));
                }
            }
            let mut statements = vec![];
            if let Some(owner) = &spec.owner {
                if owner != &info.owner {
                    statements.push(Statement::SetOwner {
                        name: spec.name.clone(),
                        owner: owner.clone(),
                    });
                }
            }
            let mut set = BTreeMap::new();
            let mut reset = vec![];
            for (name, value) in &spec.options {
                match value {
                    OptionValue::Set(v) => {
                        if info.options.get(name) != Some(v) {
                            set.insert(name.clone(), v.clone());
                        }
                    }
                    OptionValue::Reset => {
                        if info.options.contains_key(name) {
                            reset.push(name.clone());
                        }
                    }
                }
            }
            if !set.is_empty() {
                statements.push(Statement::SetOptions {
                    name: spec.name.clone(),
                    set,
                });
            }
            if !reset.is_empty() {
                statements.push(Statement::ResetOptions {
                    name: spec.name.clone(),
                    options: reset,
                });
            }
            Ok(statements)
        }
    }
}

/// Drives the check-then-act loop for one tablespace over a [`Catalog`].
pub struct Reconciler<C: Catalog> {
    catalog: C,
    capabilities: Capabilities,
}

impl<C: Catalog> Reconciler<C> {
    pub fn new(catalog: C, capabilities: Capabilities) -> Self {
        Self {
            catalog,
            capabilities,
        }
    }

    /// Reject requests the probed server cannot honor, before any
    /// inspection of the tablespace itself.
    fn guard(&self, spec: &TablespaceSpec) -> Result<(), TablespaceError> {
        if !spec.options.is_empty() && !self.capabilities.supports_options() {
            return Err(TablespaceError::Capability(format!(
                "tablespace options require PostgreSQL 9.0, server reports {}",
                self.capabilities.server_version
            )));
        }
        Ok(())
    }

    /// Current state, or absence. Existence confirmed by the catalog but
    /// missing from the detail join is surfaced, not defaulted.
    async fn inspect(&self, name: &str) -> Result<Option<TablespaceInfo>, TablespaceError> {
        if self.catalog.exists(name).await? {
            match self.catalog.fetch(name).await? {
                Some(info) => Ok(Some(info)),
                None => Err(TablespaceError::Consistency(format!(
                    "tablespace {} exists but the owner join returned no row",
                    name
                ))),
            }
        } else {
            Ok(None)
        }
    }

    /// Plan against fetched state, then apply each statement unless in
    /// check mode. The applied sequence is at-least-once-attempt, not
    /// atomic: a failed statement leaves state as the database left it.
    async fn converge(
        &self,
        spec: &TablespaceSpec,
        check: bool,
    ) -> Result<Vec<Statement>, TablespaceError> {
        self.guard(spec)?;
        let current = self.inspect(&spec.name).await?;
        let statements = plan(spec, current.as_ref())?;
        if check {
            log::info!("check mode, withholding {} statement(s)", statements.len());
        } else {
            for statement in &statements {
                log::info!("{}", statement.sql());
                self.catalog.apply(statement).await?;
            }
        }
        Ok(statements)
    }

    /// Create or alter until the tablespace matches the spec. Returns
    /// whether anything changed; a second identical call returns false.
    pub async fn ensure_present(&self, spec: &TablespaceSpec) -> Result<bool, TablespaceError> {
        self.converge(spec, false)
            .await
            .map(|statements| !statements.is_empty())
    }

    /// Drop the tablespace if it exists. Returns whether anything
    /// changed; absent is a no-op.
    pub async fn ensure_absent(&self, name: &str) -> Result<bool, TablespaceError> {
        self.converge(&TablespaceSpec::absent(name), false)
            .await
            .map(|statements| !statements.is_empty())
    }

    /// True iff the tablespace exists and matches every requested
    /// attribute. Same comparison as [`plan`]; issues no DDL.
    pub async fn matches(&self, spec: &TablespaceSpec) -> Result<bool, TablespaceError> {
        self.guard(spec)?;
        match self.inspect(&spec.name).await? {
            None => Ok(false),
            Some(info) => Ok(plan(spec, Some(&info))?.is_empty()),
        }
    }

    /// Run one full reconciliation, honoring the spec's desired state.
    /// In check mode all inspection runs but no DDL is issued; the
    /// report carries the changes a real run would have made.
    pub async fn reconcile(
        &self,
        spec: &TablespaceSpec,
        check: bool,
    ) -> Result<Report, TablespaceError> {
        let statements = self.converge(spec, check).await?;
        Ok(Report {
            changed: !statements.is_empty(),
            name: spec.name.clone(),
            state: spec.desired.as_str().to_string(),
            queries: statements.iter().map(|s| s.sql()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// In-memory stand-in for the system catalogs. Applies statements
    /// semantically and records every piece of DDL it executes.
    #[derive(Default)]
    struct Memory {
        spaces: Mutex<Vec<(String, TablespaceInfo)>>,
        issued: Mutex<Vec<String>>,
    }

    impl Memory {
        fn with(name: &str, owner: &str, location: &str) -> Self {
            let memory = Self::default();
            memory.spaces.lock().unwrap().push((
                name.to_string(),
                TablespaceInfo {
                    owner: owner.to_string(),
                    location: location.to_string(),
                    options: BTreeMap::new(),
                },
            ));
            memory
        }

        fn set_option(&self, name: &str, option: &str, value: &str) {
            let mut spaces = self.spaces.lock().unwrap();
            let (_, info) = spaces.iter_mut().find(|(n, _)| n == name).unwrap();
            info.options.insert(option.to_string(), value.to_string());
        }

        fn duplicate(&self, name: &str) {
            let mut spaces = self.spaces.lock().unwrap();
            let row = spaces.iter().find(|(n, _)| n == name).unwrap().clone();
            spaces.push(row);
        }

        fn issued(&self) -> Vec<String> {
            self.issued.lock().unwrap().clone()
        }
    }

    impl Catalog for Memory {
        async fn count(&self, name: &str) -> Result<u64, TablespaceError> {
            Ok(self
                .spaces
                .lock()
                .unwrap()
                .iter()
                .filter(|(n, _)| n == name)
                .count() as u64)
        }

        async fn fetch(&self, name: &str) -> Result<Option<TablespaceInfo>, TablespaceError> {
            Ok(self
                .spaces
                .lock()
                .unwrap()
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, info)| info.clone()))
        }

        async fn apply(&self, statement: &Statement) -> Result<(), TablespaceError> {
            self.issued.lock().unwrap().push(statement.sql());
            let mut spaces = self.spaces.lock().unwrap();
            match statement {
                Statement::Create {
                    name,
                    owner,
                    location,
                    options,
                } => spaces.push((
                    name.clone(),
                    TablespaceInfo {
                        owner: owner.clone().unwrap_or_else(|| "postgres".to_string()),
                        location: location.clone().unwrap_or_default(),
                        options: options.clone(),
                    },
                )),
                Statement::SetOwner { name, owner } => {
                    let (_, info) = spaces.iter_mut().find(|(n, _)| n == name).unwrap();
                    info.owner = owner.clone();
                }
                Statement::SetOptions { name, set } => {
                    let (_, info) = spaces.iter_mut().find(|(n, _)| n == name).unwrap();
                    info.options.extend(set.clone());
                }
                Statement::ResetOptions { name, options } => {
                    let (_, info) = spaces.iter_mut().find(|(n, _)| n == name).unwrap();
                    info.options.retain(|option, _| !options.contains(option));
                }
                Statement::Drop { name } => spaces.retain(|(n, _)| n != name),
            }
            Ok(())
        }
    }

    fn modern() -> Capabilities {
        Capabilities {
            server_version: 170_000,
        }
    }

    #[tokio::test]
    async fn ensure_present_is_idempotent() {
        let memory = Memory::default();
        let reconciler = Reconciler::new(&memory, modern());
        let spec = TablespaceSpec::new("fast-raid");
        assert!(reconciler.ensure_present(&spec).await.unwrap());
        assert!(!reconciler.ensure_present(&spec).await.unwrap());
    }

    #[tokio::test]
    async fn ensure_absent_is_idempotent() {
        let memory = Memory::with("fast-raid", "postgres", "/mnt/ssd");
        let reconciler = Reconciler::new(&memory, modern());
        assert!(reconciler.ensure_absent("fast-raid").await.unwrap());
        assert!(!reconciler.ensure_absent("fast-raid").await.unwrap());
    }

    #[tokio::test]
    async fn bare_create_has_no_clauses() {
        let memory = Memory::default();
        let reconciler = Reconciler::new(&memory, modern());
        let spec = TablespaceSpec::new("fast-raid");
        assert!(reconciler.ensure_present(&spec).await.unwrap());
        assert_eq!(memory.issued(), vec![r#"CREATE TABLESPACE "fast-raid""#]);
        assert!(!reconciler.ensure_present(&spec).await.unwrap());
        assert_eq!(memory.issued().len(), 1);
    }

    #[tokio::test]
    async fn unrequested_owner_is_never_altered() {
        let memory = Memory::with("fast-raid", "bob", "/mnt/ssd");
        let reconciler = Reconciler::new(&memory, modern());
        let spec = TablespaceSpec::new("fast-raid");
        assert!(!reconciler.ensure_present(&spec).await.unwrap());
        assert!(memory.issued().is_empty());
    }

    #[tokio::test]
    async fn owner_mismatch_alters_ownership() {
        let memory = Memory::with("fast-raid", "bob", "/mnt/ssd");
        let reconciler = Reconciler::new(&memory, modern());
        let spec = TablespaceSpec::new("fast-raid").owned_by("alice");
        assert!(reconciler.ensure_present(&spec).await.unwrap());
        assert_eq!(
            memory.issued(),
            vec![r#"ALTER TABLESPACE "fast-raid" OWNER TO "alice""#]
        );
        assert!(!reconciler.ensure_present(&spec).await.unwrap());
    }

    #[tokio::test]
    async fn check_mode_agrees_with_application() {
        let memory = Memory::default();
        let reconciler = Reconciler::new(&memory, modern());
        let spec = TablespaceSpec::new("fast-raid").owned_by("alice");
        let dry = reconciler.reconcile(&spec, true).await.unwrap();
        assert!(dry.changed);
        assert!(memory.issued().is_empty());
        assert!(!reconciler.matches(&spec).await.unwrap());
        let wet = reconciler.reconcile(&spec, false).await.unwrap();
        assert_eq!(wet.changed, dry.changed);
        assert_eq!(wet.queries, dry.queries);
        assert!(reconciler.matches(&spec).await.unwrap());
        assert!(!reconciler.reconcile(&spec, true).await.unwrap().changed);
    }

    #[tokio::test]
    async fn round_trip_create_then_drop() {
        let memory = Memory::default();
        let reconciler = Reconciler::new(&memory, modern());
        let spec = TablespaceSpec::new("fast-raid");
        assert!(reconciler.ensure_present(&spec).await.unwrap());
        assert!(memory.exists("fast-raid").await.unwrap());
        assert!(reconciler.ensure_absent("fast-raid").await.unwrap());
        assert!(!memory.exists("fast-raid").await.unwrap());
    }

    #[tokio::test]
    async fn absent_on_nonexistent_issues_nothing() {
        let memory = Memory::default();
        let reconciler = Reconciler::new(&memory, modern());
        let report = reconciler
            .reconcile(&TablespaceSpec::absent("fast-raid"), false)
            .await
            .unwrap();
        assert!(!report.changed);
        assert!(report.queries.is_empty());
        assert!(memory.issued().is_empty());
    }

    #[tokio::test]
    async fn relocation_is_rejected_before_any_ddl() {
        let memory = Memory::with("fast-raid", "postgres", "/mnt/ssd");
        let reconciler = Reconciler::new(&memory, modern());
        let spec = TablespaceSpec::new("fast-raid").located_at("/mnt/nvme");
        let error = reconciler.ensure_present(&spec).await.unwrap_err();
        assert!(matches!(error, TablespaceError::Unsupported(_)));
        assert!(memory.issued().is_empty());
    }

    #[tokio::test]
    async fn matching_location_is_a_noop() {
        let memory = Memory::with("fast-raid", "postgres", "/mnt/ssd");
        let reconciler = Reconciler::new(&memory, modern());
        let spec = TablespaceSpec::new("fast-raid").located_at("/mnt/ssd");
        assert!(!reconciler.ensure_present(&spec).await.unwrap());
    }

    #[tokio::test]
    async fn options_set_and_reset_converge() {
        let memory = Memory::with("fast-raid", "postgres", "/mnt/ssd");
        memory.set_option("fast-raid", "seq_page_cost", "2");
        let reconciler = Reconciler::new(&memory, modern());
        let spec = TablespaceSpec::new("fast-raid")
            .with_option("random_page_cost", OptionValue::Set("1.1".into()))
            .with_option("seq_page_cost", OptionValue::Reset);
        assert!(reconciler.ensure_present(&spec).await.unwrap());
        assert_eq!(
            memory.issued(),
            vec![
                r#"ALTER TABLESPACE "fast-raid" SET (random_page_cost = 1.1)"#,
                r#"ALTER TABLESPACE "fast-raid" RESET (seq_page_cost)"#,
            ]
        );
        assert!(!reconciler.ensure_present(&spec).await.unwrap());
    }

    #[tokio::test]
    async fn options_require_a_modern_server() {
        let memory = Memory::default();
        let ancient = Capabilities {
            server_version: 80_400,
        };
        let reconciler = Reconciler::new(&memory, ancient);
        let spec =
            TablespaceSpec::new("fast-raid").with_option("seq_page_cost", OptionValue::Set("1".into()));
        let error = reconciler.ensure_present(&spec).await.unwrap_err();
        assert!(matches!(error, TablespaceError::Capability(_)));
        assert!(memory.issued().is_empty());
    }

    #[tokio::test]
    async fn duplicate_catalog_rows_surface() {
        let memory = Memory::with("fast-raid", "postgres", "/mnt/ssd");
        memory.duplicate("fast-raid");
        let reconciler = Reconciler::new(&memory, modern());
        let error = reconciler
            .ensure_present(&TablespaceSpec::new("fast-raid"))
            .await
            .unwrap_err();
        assert!(matches!(error, TablespaceError::Consistency(_)));
    }

    #[test]
    fn plan_returns_explicitly_empty_when_owner_matches() {
        let spec = TablespaceSpec::new("fast-raid").owned_by("alice");
        let info = TablespaceInfo {
            owner: "alice".to_string(),
            location: "/mnt/ssd".to_string(),
            options: BTreeMap::new(),
        };
        assert_eq!(plan(&spec, Some(&info)).unwrap(), vec![]);
    }

    #[test]
    fn plan_creates_with_requested_clauses_only() {
        let spec = TablespaceSpec::new("fast-raid").owned_by("alice");
        let statements = plan(&spec, None).unwrap();
        assert_eq!(
            statements,
            vec![Statement::Create {
                name: "fast-raid".into(),
                owner: Some("alice".into()),
                location: None,
                options: BTreeMap::new(),
            }]
        );
    }

    #[test]
    fn plan_drops_reset_requests_at_creation() {
        let spec = TablespaceSpec::new("fast-raid")
            .with_option("random_page_cost", OptionValue::Set("1.1".into()))
            .with_option("seq_page_cost", OptionValue::Reset);
        match plan(&spec, None).unwrap().as_slice() {
            [Statement::Create { options, .. }] => {
                assert_eq!(options.len(), 1);
                assert_eq!(options.get("random_page_cost").map(String::as_str), Some("1.1"));
            }
            other => panic!("unexpected plan {:?}", other),
        }
    }

    #[test]
    fn plan_rejects_hostile_option_names() {
        let spec =
            TablespaceSpec::new("fast-raid").with_option("x; DROP TABLE", OptionValue::Reset);
        assert!(matches!(
            plan(&spec, None),
            Err(TablespaceError::Unsupported(_))
        ));
    }
}
