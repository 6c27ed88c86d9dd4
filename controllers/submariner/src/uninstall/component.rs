//! Registry entries for the uninstall orchestrator.

use super::workload::Workload;
use crate::apply::kind_of;
use crate::client::ClusterClient;
use cluster_client::{ClusterError, ignore_not_found};
use tracing::{debug, info};

/// Uninstall operations on one component, independent of its workload kind
#[async_trait::async_trait]
pub trait UninstallTarget: Send + Sync {
    /// Kind of the steady-state workload
    fn kind(&self) -> &str;

    /// Name of the steady-state workload; its pods carry `app=<name>`
    fn name(&self) -> &str;

    fn namespace(&self) -> &str;

    /// Name of the uninstall workload
    fn uninstall_name(&self) -> &str;

    /// Delete the steady-state workload; absence is success
    async fn delete_resource(&self, client: &dyn ClusterClient) -> Result<(), ClusterError>;

    /// Create the uninstall workload unless it already exists
    async fn create_uninstall(&self, client: &dyn ClusterClient) -> Result<(), ClusterError>;

    /// Whether the uninstall workload finished; absence counts as not ready
    async fn uninstall_ready(&self, client: &dyn ClusterClient) -> Result<bool, ClusterError>;

    /// Delete the uninstall workload; absence is success
    async fn delete_uninstall(&self, client: &dyn ClusterClient) -> Result<(), ClusterError>;
}

/// `UninstallTarget` for a DaemonSet or Deployment
pub struct WorkloadComponent<W: Workload> {
    kind: String,
    name: String,
    namespace: String,
    uninstall_name: String,
    uninstall: W,
}

impl<W: Workload> WorkloadComponent<W> {
    /// Pair a steady-state workload with its uninstall variant
    pub fn new(resource: &W, pause_image: &str) -> Self {
        let uninstall = resource.uninstall_variant(pause_image);
        Self {
            kind: kind_of::<W>(),
            name: resource.meta().name.clone().unwrap_or_default(),
            namespace: resource.meta().namespace.clone().unwrap_or_default(),
            uninstall_name: uninstall.meta().name.clone().unwrap_or_default(),
            uninstall,
        }
    }
}

#[async_trait::async_trait]
impl<W: Workload> UninstallTarget for WorkloadComponent<W> {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn uninstall_name(&self) -> &str {
        &self.uninstall_name
    }

    async fn delete_resource(&self, client: &dyn ClusterClient) -> Result<(), ClusterError> {
        if ignore_not_found(W::store(client).delete(&self.namespace, &self.name).await)?.is_some() {
            info!("Deleted {} {}/{}", self.kind, self.namespace, self.name);
        }
        Ok(())
    }

    async fn create_uninstall(&self, client: &dyn ClusterClient) -> Result<(), ClusterError> {
        let store = W::store(client);
        if ignore_not_found(store.get(&self.namespace, &self.uninstall_name).await)?.is_some() {
            return Ok(());
        }
        match store.create(&self.namespace, &self.uninstall).await {
            Ok(_) => {
                info!(
                    "Created uninstall {} {}/{}",
                    self.kind, self.namespace, self.uninstall_name
                );
                Ok(())
            }
            Err(e) if e.is_already_exists() => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn uninstall_ready(&self, client: &dyn ClusterClient) -> Result<bool, ClusterError> {
        let current =
            ignore_not_found(W::store(client).get(&self.namespace, &self.uninstall_name).await)?;
        match current {
            Some(workload) => Ok(workload.is_uninstall_ready()),
            None => {
                debug!(
                    "Uninstall {} {}/{} not found",
                    self.kind, self.namespace, self.uninstall_name
                );
                Ok(false)
            }
        }
    }

    async fn delete_uninstall(&self, client: &dyn ClusterClient) -> Result<(), ClusterError> {
        ignore_not_found(
            W::store(client)
                .delete(&self.namespace, &self.uninstall_name)
                .await,
        )?;
        Ok(())
    }
}

type InstalledCheck = Box<dyn Fn() -> bool + Send + Sync>;

/// One managed workload in the uninstall registry
pub struct Component {
    target: Box<dyn UninstallTarget>,
    check_installed: Option<InstalledCheck>,
}

impl Component {
    /// Component for a steady-state workload, torn down with its uninstall variant
    pub fn new<W: Workload>(resource: &W, pause_image: &str) -> Self {
        Self::from_target(Box::new(WorkloadComponent::new(resource, pause_image)))
    }

    pub fn from_target(target: Box<dyn UninstallTarget>) -> Self {
        Self {
            target,
            check_installed: None,
        }
    }

    /// Skip the component whenever `check` returns false
    #[must_use]
    pub fn with_check_installed(mut self, check: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.check_installed = Some(Box::new(check));
        self
    }

    pub fn target(&self) -> &dyn UninstallTarget {
        self.target.as_ref()
    }

    pub fn is_installed(&self) -> bool {
        self.check_installed.as_ref().is_none_or(|check| check())
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("kind", &self.target.kind())
            .field("name", &self.target.name())
            .field("namespace", &self.target.namespace())
            .field("conditional", &self.check_installed.is_some())
            .finish()
    }
}
