use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::Api;
use kube::Client;
use std::collections::BTreeMap;

/// Annotation whose presence switches the pod into disaster state
///
/// Only the key matters; any value (including empty) counts.
pub const DISASTER_ANNOTATION: &str = "disaster";

/// Source of the annotation set for this process's own pod
///
/// `Ok(None)` means the query succeeded but the object carried no
/// annotations at all.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn annotations(&self) -> Result<Option<BTreeMap<String, String>>, kube::Error>;

    /// Human-readable identity for log fields
    fn describe(&self) -> String;
}

/// Metadata-only reads of a single pod through the Kubernetes API
pub struct PodMetadata {
    api: Api<Pod>,
    namespace: String,
    name: String,
}

impl PodMetadata {
    pub fn new(client: Client, namespace: &str, name: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl MetadataSource for PodMetadata {
    async fn annotations(&self) -> Result<Option<BTreeMap<String, String>>, kube::Error> {
        let meta = self.api.get_metadata(&self.name).await?;
        Ok(meta.metadata.annotations)
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Whether an annotation set carries the disaster marker
pub fn has_disaster_marker(annotations: Option<&BTreeMap<String, String>>) -> bool {
    annotations.is_some_and(|a| a.contains_key(DISASTER_ANNOTATION))
}
