/// Deployment-wide bucket for reference snapshots.
pub const DEFAULT_BUCKET: &str = "integrity";

/// Identity under which a snapshot is stored: snapshots are keyed by the
/// workload's namespace and image plus the hash algorithm, so snapshots
/// taken under different algorithms never get compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotKey {
    pub namespace: String,
    pub image: String,
    pub tag: String,
    pub algorithm: String,
}

impl SnapshotKey {
    /// Build a key from an image reference (`name:tag`, tag defaulting to
    /// `latest`). Registry hosts with ports are handled: only a colon after
    /// the last slash separates the tag.
    pub fn from_image(namespace: &str, image_ref: &str, algorithm: &str) -> Self {
        let (image, tag) = split_image_ref(image_ref);
        Self {
            namespace: namespace.to_string(),
            image: image.to_string(),
            tag: tag.to_string(),
            algorithm: algorithm.to_lowercase(),
        }
    }

    /// Object name in the store: `<namespace>/<image>/<tag>.<algorithm>`.
    pub fn object_name(&self) -> String {
        format!(
            "{}/{}/{}.{}",
            self.namespace, self.image, self.tag, self.algorithm
        )
    }
}

fn split_image_ref(image_ref: &str) -> (&str, &str) {
    let name_start = image_ref.rfind('/').map_or(0, |i| i + 1);
    let last_segment = image_ref.get(name_start..).unwrap_or(image_ref);
    match last_segment.find(':') {
        Some(colon) => {
            let split_at = name_start + colon;
            let name = image_ref.get(..split_at).unwrap_or(image_ref);
            let tag = image_ref.get(split_at + 1..).unwrap_or("latest");
            (name, tag)
        }
        None => (image_ref, "latest"),
    }
}
