use crate::TablespaceError;
use crate::quote_ident;
use tokio_postgres::Client;
use tokio_postgres::Config;
use tokio_postgres::NoTls;

/// Connection parameters assembled from the invocation.
///
/// Absent fields are left out of the driver [`Config`] entirely so that
/// its own defaults apply; an empty string never reaches the driver.
#[derive(Debug, Clone, Default)]
pub struct ConnectionParams {
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub port: Option<u16>,
    pub dbname: Option<String>,
    pub session_role: Option<String>,
}

impl ConnectionParams {
    /// Build params from raw invocation values, normalizing empty
    /// strings to absent fields.
    pub fn new(
        host: Option<String>,
        user: Option<String>,
        password: Option<String>,
        port: Option<u16>,
        dbname: Option<String>,
        session_role: Option<String>,
    ) -> Self {
        fn scrub(field: Option<String>) -> Option<String> {
            field.filter(|s| !s.is_empty())
        }
        Self {
            host: scrub(host),
            user: scrub(user),
            password: scrub(password),
            port,
            dbname: scrub(dbname),
            session_role: scrub(session_role),
        }
    }

    /// The driver configuration, with only the present fields set.
    pub fn config(&self) -> Config {
        let mut config = Config::new();
        if let Some(host) = &self.host {
            config.host(host);
        }
        if let Some(user) = &self.user {
            config.user(user);
        }
        if let Some(password) = &self.password {
            config.password(password);
        }
        if let Some(port) = self.port {
            config.port(port);
        }
        if let Some(dbname) = &self.dbname {
            config.dbname(dbname);
        }
        config
    }
}

/// Server facts probed once at startup and passed down by value, rather
/// than consulted through a process-wide flag.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub server_version: u32,
}

impl Capabilities {
    /// Tablespace options landed in PostgreSQL 9.0.
    pub const OPTIONS_SINCE: u32 = 90_000;

    pub fn supports_options(&self) -> bool {
        self.server_version >= Self::OPTIONS_SINCE
    }
}

/// Establish the invocation's single database connection.
///
/// Spawns the connection task, quiets notices, assumes the session role
/// if one was requested, and probes server capabilities. Any failure
/// here aborts before any tablespace inspection.
pub async fn connect(params: &ConnectionParams) -> Result<(Client, Capabilities), TablespaceError> {
    log::info!("connecting to database");
    let tls = NoTls;
    let (client, connection) = params
        .config()
        .connect(tls)
        .await
        .map_err(TablespaceError::Connection)?;
    tokio::spawn(connection);
    client
        .batch_execute("SET client_min_messages TO WARNING")
        .await
        .map_err(TablespaceError::Connection)?;
    if let Some(role) = &params.session_role {
        log::info!("assuming session role {}", role);
        client
            .batch_execute(&format!("SET ROLE {}", quote_ident(role)))
            .await
            .map_err(TablespaceError::Connection)?;
    }
    let server_version = client
        .query_one("SELECT current_setting('server_version_num')::int", &[])
        .await
        .map(|row| row.get::<_, i32>(0) as u32)
        .map_err(|e| TablespaceError::Capability(format!("server version probe failed: {}", e)))?;
    log::debug!("server_version_num {}", server_version);
    Ok((client, Capabilities { server_version }))
}
