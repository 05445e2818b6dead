//! # Connection Management
//!
//! Opens exactly one connection per request for whichever backend the
//! descriptor names, and owns it until [`ConnectionHandle::close`] runs.
//! There is no retry and no sharing between requests.

pub mod url;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ExtractionConfig;
use crate::connector::{
    Connector, DatabaseConnector, MySqlConnector, PostgresConnector, SqliteConnector,
};
use crate::error::{Result, SmartBiError};
use crate::schema::types::DatabaseKind;

pub use self::url::{parse_connection_url, ConnectionDescriptor};

/// Where a handle is connected, in the same shape for every backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub database_type: DatabaseKind,
    pub host: Option<String>,
    pub database: Option<String>,
    pub connected_at: DateTime<Utc>,
}

impl ConnectionInfo {
    pub fn from_descriptor(descriptor: &ConnectionDescriptor) -> Self {
        let host = match descriptor.kind {
            DatabaseKind::SQLite => descriptor
                .path
                .as_ref()
                .map(|p| p.display().to_string()),
            _ => descriptor.host.clone(),
        };
        Self {
            database_type: descriptor.kind,
            host,
            database: descriptor.database_name.clone(),
            connected_at: Utc::now(),
        }
    }
}

/// An open connection plus what it is connected to.
///
/// Close it exactly once with [`close`](Self::close); further calls are
/// no-ops. Dropping an open handle still releases the pool but logs a
/// warning.
pub struct ConnectionHandle {
    connector: DatabaseConnector,
    info: ConnectionInfo,
    closed: bool,
}

impl ConnectionHandle {
    pub fn new(connector: DatabaseConnector, info: ConnectionInfo) -> Self {
        Self {
            connector,
            info,
            closed: false,
        }
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    pub fn connector(&self) -> &DatabaseConnector {
        &self.connector
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.connector.close().await;
        self.closed = true;
        tracing::debug!("Closed {} connection", self.info.database_type);
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!(
                "{} connection dropped without being closed",
                self.info.database_type
            );
        }
    }
}

/// Open a connection for `descriptor`. One attempt, no retry.
pub async fn connect(
    descriptor: &ConnectionDescriptor,
    config: &ExtractionConfig,
) -> Result<ConnectionHandle> {
    tracing::info!("Connecting to {}", descriptor.redacted());

    let connector = match descriptor.kind {
        DatabaseKind::PostgreSQL => {
            PostgresConnector::connect(descriptor.raw_url(), &config.postgres_schema)
                .await
                .map(DatabaseConnector::Postgres)
        }
        DatabaseKind::MySQL => MySqlConnector::connect(descriptor.raw_url())
            .await
            .map(DatabaseConnector::MySql),
        DatabaseKind::SQLite => {
            let path = descriptor
                .path
                .as_deref()
                .ok_or_else(|| SmartBiError::InvalidHost {
                    reason: "sqlite URL has no file path".to_string(),
                })?;
            SqliteConnector::open_read_only_with(path, &descriptor.query_params)
                .await
                .map(DatabaseConnector::Sqlite)
        }
    }
    .map_err(|e| SmartBiError::Connection {
        message: format!("could not connect to {}", descriptor.kind),
        connection_hint: descriptor.redacted(),
        source: e,
    })?;

    let info = ConnectionInfo::from_descriptor(descriptor);
    tracing::info!("Connected to {} database", info.database_type);
    Ok(ConnectionHandle::new(connector, info))
}
