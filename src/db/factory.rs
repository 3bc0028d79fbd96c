//! Named-instance connector factory.
//!
//! Instances are looked up by name (`ANALYTICS_DB`, `LOCAL_DB`) and their
//! parameters resolved from `<NAME>_<KEY>` configuration entries.

use crate::db::database::{Database, DatabaseOptions};
use crate::error::{DbError, DbResult};
use crate::models::ConnectionParams;
use std::sync::Arc;
use tracing::{debug, info_span};

/// Instance names the factory accepts by default.
pub const SUPPORTED_INSTANCES: [&str; 2] = ["ANALYTICS_DB", "LOCAL_DB"];

type Lookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Builds `Database` handles for named instances.
#[derive(Clone)]
pub struct ConnectorFactory {
    instances: Vec<String>,
    lookup: Lookup,
}

impl ConnectorFactory {
    /// Factory reading the process environment, after loading `.env` from
    /// the working directory. Values from `.env` win over existing ones.
    pub fn from_env() -> Self {
        match dotenvy::dotenv_override() {
            Ok(path) => debug!(path = %path.display(), "Loaded .env file"),
            Err(e) => debug!(error = %e, "No .env file loaded"),
        }
        Self::with_lookup(|key| std::env::var(key).ok())
    }

    /// Factory resolving keys through `lookup`.
    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            instances: SUPPORTED_INSTANCES.iter().map(|s| s.to_string()).collect(),
            lookup: Arc::new(lookup),
        }
    }

    /// Replace the set of accepted instance names.
    pub fn with_instances<I, S>(mut self, instances: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.instances = instances
            .into_iter()
            .map(|s| s.as_ref().to_uppercase())
            .collect();
        self
    }

    pub fn supported_instances(&self) -> &[String] {
        &self.instances
    }

    pub fn is_supported(&self, name: &str) -> bool {
        let name = name.to_uppercase();
        self.instances.iter().any(|i| *i == name)
    }

    /// Resolve an instance's parameters without connecting.
    ///
    /// Names are case-insensitive. Unsupported names fail before any
    /// configuration is read.
    pub fn resolve_params(&self, name: &str) -> DbResult<ConnectionParams> {
        if !self.is_supported(name) {
            return Err(DbError::not_implemented(name));
        }
        ConnectionParams::from_lookup(name, |key| (self.lookup)(key))
    }

    /// Connect to an instance and reflect its schema.
    pub async fn get_connector(
        &self,
        name: &str,
        verbose: bool,
        echo: bool,
    ) -> DbResult<Database> {
        let params = self.resolve_params(name)?;
        let span = info_span!("database", instance = %name.to_uppercase());
        Database::connect(params, DatabaseOptions::new(verbose, echo), span).await
    }
}

impl std::fmt::Debug for ConnectorFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorFactory")
            .field("instances", &self.instances)
            .finish_non_exhaustive()
    }
}
