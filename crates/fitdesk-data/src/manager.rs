use crate::auth::{Authorizer, Session};
use crate::config::Config;
use fitdesk_cache::Cache;
use fitdesk_db::Database;
use fitdesk_types::{DataError, DataResult};
use fitdesk_validate::Schema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// Everything a concrete manager needs, injected at construction.
#[derive(Clone)]
pub struct ManagerContext {
    pub db: Arc<Database>,
    pub cache: Cache,
    pub authorizer: Arc<dyn Authorizer>,
    pub session: Option<Session>,
    pub config: Config,
}

/// Shared foundation for every concrete data manager: group-scoped
/// cached reads, schema validation, capability checks, and opt-in
/// error logging. Methods here return results or booleans and never
/// panic; callers own control flow.
pub trait DataManager {
    /// Fixed cache group, distinct per concrete manager, so clearing
    /// one manager's entries cannot affect another's.
    fn cache_group(&self) -> &'static str;

    fn context(&self) -> &ManagerContext;

    fn cached_read<T, F>(&self, key: &str, ttl: Duration, generator: F) -> DataResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> DataResult<T>,
    {
        self.context()
            .cache
            .get_or_compute(self.cache_group(), key, ttl, generator)
    }

    fn invalidate(&self, key: &str) {
        self.context().cache.invalidate(self.cache_group(), key);
    }

    fn invalidate_all(&self) {
        self.context().cache.invalidate_group(self.cache_group());
    }

    fn validate(&self, input: &Map<String, Value>, schema: &Schema) -> DataResult<Map<String, Value>> {
        fitdesk_validate::validate(input, schema).map_err(DataError::from)
    }

    /// False without a session; otherwise the host's capability check
    /// decides.
    fn authorized(&self, capability: &str, object_id: Option<i64>) -> bool {
        let ctx = self.context();
        match ctx.session {
            None => false,
            Some(session) => ctx
                .authorizer
                .has_capability(session.user_id, capability, object_id),
        }
    }

    fn require(&self, capability: &str, object_id: Option<i64>) -> DataResult<()> {
        if self.authorized(capability, object_id) {
            Ok(())
        } else {
            Err(DataError::Authorization {
                capability: capability.to_string(),
            })
        }
    }

    /// Emits only when the debug flag is set; never fails and never
    /// blocks the response path.
    fn log_error(&self, message: &str, context: &str) {
        if self.context().config.debug_log {
            error!(manager = self.cache_group(), context, "{message}");
        }
    }
}
