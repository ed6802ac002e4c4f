//! Provider/model resolution for a run.

use engine_client::{EngineApi, ModelSpec, ProviderCatalog, ProvidersConfig};
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};

/// Pick the provider/model pair a run will use.
///
/// Both config endpoints are read concurrently. The pair is resolved once
/// per run, before any session exists, so a misconfigured engine fails the
/// request with zero side effects.
pub async fn resolve_model(engine: &dyn EngineApi) -> HarnessResult<ModelSpec> {
    let (config, catalog) = tokio::try_join!(engine.provider_config(), engine.provider_catalog())?;
    let spec = select_model(&config, &catalog).ok_or(HarnessError::NoUsableModel)?;
    debug!(provider = %spec.provider_id, model = %spec.model_id, "resolved model");
    Ok(spec)
}

/// Selection order: the configured default provider when it is connected
/// and carries a configured default model; otherwise the first connected
/// provider, in returned order, offering a configured default model or,
/// failing that, the first model id in its catalog.
fn select_model(config: &ProvidersConfig, catalog: &ProviderCatalog) -> Option<ModelSpec> {
    let connected = |id: &str| catalog.connected.iter().any(|c| c == id);

    let default_provider = config
        .default_provider
        .as_deref()
        .or(catalog.default_provider.as_deref());
    if let Some(id) = default_provider {
        if connected(id) {
            if let Some(model_id) = configured_default_model(config, id) {
                return Some(ModelSpec {
                    provider_id: id.to_string(),
                    model_id,
                });
            }
        }
    }

    for id in &catalog.connected {
        let model_id =
            configured_default_model(config, id).or_else(|| first_catalog_model(catalog, id));
        if let Some(model_id) = model_id {
            return Some(ModelSpec {
                provider_id: id.clone(),
                model_id,
            });
        }
    }

    None
}

fn configured_default_model(config: &ProvidersConfig, provider_id: &str) -> Option<String> {
    config
        .providers
        .get(provider_id)
        .and_then(|settings| settings.default_model.clone())
        .filter(|model| !model.is_empty())
}

fn first_catalog_model(catalog: &ProviderCatalog, provider_id: &str) -> Option<String> {
    catalog
        .all
        .iter()
        .find(|entry| entry.id == provider_id)
        .and_then(|entry| entry.models.keys().next().cloned())
}
