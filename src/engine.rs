use crate::catalog::CatalogRegistry;
use crate::config::EngineConfig;
use crate::statement::TableSet;
use parking_lot::RwLock;
use std::sync::Arc;

/// The shared state every connection's session statements run against: the
/// catalog and the live table set (spec.md's "conglomerate"). Grounded on the
/// teacher's top-level `CategoricalSQLite`/engine module, which likewise owns
/// one schema registry and one storage handle shared by every session.
#[derive(Clone)]
pub struct Engine {
    pub catalog: Arc<RwLock<CatalogRegistry>>,
    pub tables: Arc<RwLock<TableSet>>,
    pub config: Arc<EngineConfig>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Engine {
            catalog: Arc::new(RwLock::new(CatalogRegistry::new())),
            tables: Arc::new(RwLock::new(TableSet::new())),
            config: Arc::new(config),
        }
    }

    /// Authenticates a LOGIN request. There is no user table in this core
    /// (spec.md leaves user storage to the conglomerate layer it doesn't
    /// specify); any non-empty username/password pair succeeds, matching the
    /// teacher's own embedded-engine posture of trusting the local caller.
    pub fn authenticate(&self, username: &str, _password: &str) -> bool {
        !username.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_username() {
        let engine = Engine::new(EngineConfig::default());
        assert!(!engine.authenticate("", "x"));
        assert!(engine.authenticate("admin", "x"));
    }
}
