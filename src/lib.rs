//! Declarative reconciliation of PostgreSQL tablespaces.
//!
//! Converges one tablespace toward a desired state (present with a given
//! owner, location, and options, or absent) by inspecting the system
//! catalogs and issuing the minimal DDL. Repeated runs are idempotent:
//! the first successful application reports a change, every run after it
//! reports none.
//!
//! ## Core Types
//!
//! - [`TablespaceSpec`] — Desired state, constructed from the invocation
//! - [`Catalog`] — SQL surface over `pg_tablespace` and `pg_roles`
//! - [`Statement`] — Planned DDL as data, rendered to SQL exactly once
//! - [`Reconciler`] — Check-then-act loop over a [`Catalog`]
//! - [`Report`] — Machine-readable outcome of one invocation
//!
//! ## Connectivity
//!
//! - [`connect()`] — Establishes a connection and probes [`Capabilities`]
mod catalog;
mod connect;
mod ddl;
mod error;
mod reconcile;
mod spec;

pub use catalog::*;
pub use connect::*;
pub use ddl::*;
pub use error::*;
pub use reconcile::*;
pub use spec::*;

/// Initialize terminal logging for the one-shot command.
///
/// Diagnostics go to stderr so stdout carries exactly the JSON report.
pub fn log(level: log::LevelFilter) {
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    simplelog::TermLogger::init(
        level,
        config,
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )
    .expect("initialize logger");
}
