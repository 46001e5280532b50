use std::collections::BTreeMap;

/// Whether the tablespace should exist after reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DesiredState {
    Present,
    Absent,
}

impl DesiredState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }
}

impl std::fmt::Display for DesiredState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A requested tablespace option: a concrete value, or reset to the
/// server default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Set(String),
    Reset,
}

/// Desired state for one tablespace, constructed from invocation
/// parameters. Immutable input to planning; holds no server state.
#[derive(Debug, Clone)]
pub struct TablespaceSpec {
    pub name: String,
    pub owner: Option<String>,
    pub location: Option<String>,
    pub options: BTreeMap<String, OptionValue>,
    pub desired: DesiredState,
}

impl TablespaceSpec {
    /// A spec requesting bare presence: no owner, location, or options.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            owner: None,
            location: None,
            options: BTreeMap::new(),
            desired: DesiredState::Present,
        }
    }

    /// A spec requesting absence.
    pub fn absent(name: &str) -> Self {
        Self {
            desired: DesiredState::Absent,
            ..Self::new(name)
        }
    }

    pub fn owned_by(mut self, owner: &str) -> Self {
        self.owner = Some(owner.to_string());
        self
    }

    pub fn located_at(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    pub fn with_option(mut self, name: &str, value: OptionValue) -> Self {
        self.options.insert(name.to_string(), value);
        self
    }
}

/// Parse a `NAME=VALUE` option argument. The literal value `reset`
/// requests a reset to the server default.
pub fn parse_set(arg: &str) -> Result<(String, OptionValue), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {:?}", arg))?;
    if !crate::valid_option_name(name) {
        return Err(format!("{:?} is not a valid tablespace option name", name));
    }
    if value.is_empty() {
        return Err(format!("option {:?} has an empty value", name));
    }
    match value {
        "reset" => Ok((name.to_string(), OptionValue::Reset)),
        other => Ok((name.to_string(), OptionValue::Set(other.to_string()))),
    }
}
