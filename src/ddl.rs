use std::collections::BTreeMap;

/// Quote a SQL identifier, doubling embedded double quotes.
pub fn quote_ident(raw: &str) -> String {
    format!("\"{}\"", raw.replace('"', "\"\""))
}

/// Quote a SQL string literal, doubling embedded single quotes.
pub fn quote_literal(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

/// True iff the name is an identifier PostgreSQL accepts for tablespace
/// options. Anything else never reaches DDL text.
pub fn valid_option_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some('a'..='z' | '_'))
        && chars.all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_'))
}

/// Render an option value: bare for SQL numbers, quoted otherwise.
fn render_value(raw: &str) -> String {
    if raw.parse::<f64>().is_ok() {
        raw.to_string()
    } else {
        quote_literal(raw)
    }
}

fn render_options(options: &BTreeMap<String, String>) -> String {
    options
        .iter()
        .map(|(name, value)| format!("{} = {}", name, render_value(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One planned DDL statement. Planning produces these as data; rendering
/// to SQL text happens exactly once, in [`Statement::sql`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Create {
        name: String,
        owner: Option<String>,
        location: Option<String>,
        options: BTreeMap<String, String>,
    },
    SetOwner {
        name: String,
        owner: String,
    },
    SetOptions {
        name: String,
        set: BTreeMap<String, String>,
    },
    ResetOptions {
        name: String,
        options: Vec<String>,
    },
    Drop {
        name: String,
    },
}

impl Statement {
    /// The SQL text of this statement, with identifiers quoted and
    /// values escaped. Clauses appear only for requested attributes.
    pub fn sql(&self) -> String {
        match self {
            Self::Create {
                name,
                owner,
                location,
                options,
            } => {
                let mut sql = format!("CREATE TABLESPACE {}", quote_ident(name));
                if let Some(owner) = owner {
                    sql.push_str(&format!(" OWNER {}", quote_ident(owner)));
                }
                if let Some(location) = location {
                    sql.push_str(&format!(" LOCATION {}", quote_literal(location)));
                }
                if !options.is_empty() {
                    sql.push_str(&format!(" WITH ({})", render_options(options)));
                }
                sql
            }
            Self::SetOwner { name, owner } => format!(
                "ALTER TABLESPACE {} OWNER TO {}",
                quote_ident(name),
                quote_ident(owner)
            ),
            Self::SetOptions { name, set } => format!(
                "ALTER TABLESPACE {} SET ({})",
                quote_ident(name),
                render_options(set)
            ),
            Self::ResetOptions { name, options } => format!(
                "ALTER TABLESPACE {} RESET ({})",
                quote_ident(name),
                options.join(", ")
            ),
            Self::Drop { name } => format!("DROP TABLESPACE {}", quote_ident(name)),
        }
    }
}
