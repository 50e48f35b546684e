//! Process-wide memoized client and oracle factories.
//!
//! Chat clients and oracles are read-mostly and safe to share across
//! concurrent runs; the cache key is the configuration tuple, so two runs
//! with the same endpoint settings reuse one client (and its connection
//! pool). Callers that want isolation (tests, custom wiring) construct
//! [`ChatClient`] / [`LlmOracle`] directly and inject them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use codecrew_core::config::ModelConfig;

use crate::chat::ChatClient;
use crate::oracle::LlmOracle;

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct CacheKey {
    model_id: String,
    base_url: Option<String>,
    // f32 is not Hash; temperatures come from config so bit equality is fine
    temperature_bits: u32,
}

impl CacheKey {
    fn from_config(config: &ModelConfig) -> Self {
        Self {
            model_id: config.model_id.clone(),
            base_url: config.base_url.clone(),
            temperature_bits: config.temperature.to_bits(),
        }
    }
}

fn client_registry() -> &'static Mutex<HashMap<CacheKey, Arc<ChatClient>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<CacheKey, Arc<ChatClient>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

fn oracle_registry() -> &'static Mutex<HashMap<CacheKey, Arc<LlmOracle>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<CacheKey, Arc<LlmOracle>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Get or create the shared chat client for a model configuration. The
/// specialist personas go through here so each `(model, endpoint,
/// temperature)` tuple owns exactly one client.
pub fn client_for(config: &ModelConfig) -> Arc<ChatClient> {
    let key = CacheKey::from_config(config);
    let mut cache = client_registry().lock().expect("client cache poisoned");
    cache
        .entry(key)
        .or_insert_with(|| Arc::new(ChatClient::new(config.clone())))
        .clone()
}

/// Get or create the shared oracle for a model configuration.
pub fn oracle_for(config: &ModelConfig) -> Arc<LlmOracle> {
    let key = CacheKey::from_config(config);
    let mut cache = oracle_registry().lock().expect("oracle cache poisoned");
    cache
        .entry(key)
        .or_insert_with(|| Arc::new(LlmOracle::new(client_for(config))))
        .clone()
}
