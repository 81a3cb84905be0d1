//! Collection pipeline for one scrape
//!
//! Strictly sequential walk over the PBS API:
//! 1. datastore usage list
//! 2. per datastore: namespace list (benign skip while the store is being deleted)
//! 3. per non-root namespace: snapshot list, folded per VM
//! 4. node status of `localhost`
//!
//! The first error aborts the walk. Samples are only returned when every
//! step succeeded.

use crate::aggregate::aggregate;
use crate::client::{ApiClient, ApiResponse, Target, DATASTORE_API, DATASTORE_USAGE_API, NODE_API};
use crate::error::CollectError;
use crate::metrics::{self, MetricSample};
use crate::models::{
    ApiEnvelope, DatastoreUsage, HostStatus, NamespaceRef, NodeStatusPayload, SnapshotRecord,
};
use tracing::{debug, info};

const BEING_DELETED: &str = "datastore is being deleted";

/// PBS answers 400 with this message while a datastore removal is running.
/// That is the only non-2xx answer a scrape tolerates.
pub fn is_datastore_being_deleted(status: u16, body: &str) -> bool {
    status == 400 && body.to_lowercase().contains(BEING_DELETED)
}

/// Single-use collector bound to one target.
pub struct Collector<'a> {
    client: &'a ApiClient,
    target: Target,
    samples: Vec<MetricSample>,
}

impl<'a> Collector<'a> {
    pub fn new(client: &'a ApiClient, target: Target) -> Self {
        Self {
            client,
            target,
            samples: Vec::new(),
        }
    }

    /// Run the whole pipeline, consuming the collector.
    pub async fn collect(mut self) -> Result<Vec<MetricSample>, CollectError> {
        let datastores: Vec<DatastoreUsage> = self
            .fetch(DATASTORE_USAGE_API, &[])
            .await?
            .error_for_status()?
            .json::<ApiEnvelope<_>>()?
            .data;

        for datastore in &datastores {
            self.collect_datastore(datastore).await?;
        }

        self.collect_host().await?;

        Ok(self.samples)
    }

    async fn collect_datastore(&mut self, datastore: &DatastoreUsage) -> Result<(), CollectError> {
        let store = datastore.name.as_str();
        debug!(
            "Store {}: avail={} total={} used={}",
            store, datastore.avail, datastore.total, datastore.used
        );

        self.samples
            .push(MetricSample::new(&metrics::AVAILABLE, &[store], datastore.avail as f64));
        self.samples
            .push(MetricSample::new(&metrics::SIZE, &[store], datastore.total as f64));
        self.samples
            .push(MetricSample::new(&metrics::USED, &[store], datastore.used as f64));

        let path = format!("{}/{}/namespace", DATASTORE_API, store);
        let response = self.fetch(&path, &[]).await?;
        if is_datastore_being_deleted(response.status, &response.body) {
            info!("Datastore: {} is being deleted, skip scrape datastore metric", store);
            return Ok(());
        }

        let namespaces: Vec<NamespaceRef> =
            response.error_for_status()?.json::<ApiEnvelope<_>>()?.data;

        for namespace in namespaces.iter().filter(|ns| !ns.is_root()) {
            self.collect_namespace(store, &namespace.name).await?;
        }

        Ok(())
    }

    async fn collect_namespace(&mut self, store: &str, namespace: &str) -> Result<(), CollectError> {
        debug!("Namespace {} of store {}", namespace, store);

        let path = format!("{}/{}/snapshots", DATASTORE_API, store);
        let snapshots: Vec<SnapshotRecord> = self
            .fetch(&path, &[("ns", namespace)])
            .await?
            .error_for_status()?
            .json::<ApiEnvelope<_>>()?
            .data;

        self.samples.push(MetricSample::new(
            &metrics::SNAPSHOT_COUNT,
            &[store, namespace],
            snapshots.len() as f64,
        ));

        for (vm_id, vm) in aggregate(&snapshots) {
            let labels = [store, namespace, vm_id.as_str(), vm.display_name.as_str()];
            let verified = if vm.latest_verification.is_ok() { 1.0 } else { 0.0 };

            self.samples
                .push(MetricSample::new(&metrics::SNAPSHOT_VM_COUNT, &labels, vm.count as f64));
            self.samples.push(MetricSample::new(
                &metrics::SNAPSHOT_VM_LAST_TIMESTAMP,
                &labels,
                vm.latest_timestamp as f64,
            ));
            self.samples
                .push(MetricSample::new(&metrics::SNAPSHOT_VM_LAST_VERIFY, &labels, verified));
        }

        Ok(())
    }

    async fn collect_host(&mut self) -> Result<(), CollectError> {
        // Any node name is accepted by the status endpoint, the node's IP is not.
        let path = format!("{}/localhost/status", NODE_API);
        let response = self.fetch(&path, &[]).await?.error_for_status()?;
        let payload = response.json::<ApiEnvelope<NodeStatusPayload>>()?.data;
        let host = HostStatus::try_from(payload)
            .map_err(|reason| CollectError::decode(&response.url, reason))?;

        let [load1, load5, load15] = host.load;
        let values = [
            (&metrics::HOST_CPU_USAGE, host.cpu),
            (&metrics::HOST_MEMORY_FREE, host.memory.free as f64),
            (&metrics::HOST_MEMORY_TOTAL, host.memory.total as f64),
            (&metrics::HOST_MEMORY_USED, host.memory.used as f64),
            (&metrics::HOST_SWAP_FREE, host.swap.free as f64),
            (&metrics::HOST_SWAP_TOTAL, host.swap.total as f64),
            (&metrics::HOST_SWAP_USED, host.swap.used as f64),
            (&metrics::HOST_DISK_AVAILABLE, host.root.avail as f64),
            (&metrics::HOST_DISK_TOTAL, host.root.total as f64),
            (&metrics::HOST_DISK_USED, host.root.used as f64),
            (&metrics::HOST_UPTIME, host.uptime as f64),
            (&metrics::HOST_IO_WAIT, host.io_wait),
            (&metrics::HOST_LOAD1, load1),
            (&metrics::HOST_LOAD5, load5),
            (&metrics::HOST_LOAD15, load15),
        ];
        self.samples.extend(
            values
                .into_iter()
                .map(|(desc, value)| MetricSample::unlabeled(desc, value)),
        );

        Ok(())
    }

    async fn fetch(&self, path: &str, query: &[(&str, &str)]) -> Result<ApiResponse, CollectError> {
        self.client.get(&self.target, path, query).await
    }
}
