//! Image-pull secret refresh for private registries.

use anyhow::Result;
use tracing::debug;

use crate::clients::kube::KubeClient;
use crate::db::Store;

/// Re-applies a docker-registry pull secret for every registry attached to
/// the namespace, so short-lived credentials (ECR tokens) stay usable.
///
/// Callers treat this as best-effort: the deploy may still succeed on public
/// images, so failures are discarded (and logged) at the call site.
pub struct RegistrySecretRefresher {
    store: Store,
}

impl RegistrySecretRefresher {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn refresh(&self, client: &KubeClient, namespace: &str) -> Result<()> {
        let registries = self.store.registries_for_namespace(namespace).await?;

        if registries.is_empty() {
            return Ok(());
        }

        for registry in &registries {
            client
                .apply_pull_secret(
                    namespace,
                    &registry.secret_name(),
                    &registry.server_url,
                    &registry.username,
                    &registry.password,
                )
                .await?;

            debug!(
                registry = %registry.name,
                namespace,
                "Image-pull secret refreshed"
            );
        }

        Ok(())
    }
}
