use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use digest::DynDigest;
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use tracing::debug;

/// Produces a fresh streaming digest. Each worker calls the factory once and
/// reuses the instance across files via `finalize_reset`.
pub type DigestFactory = Arc<dyn Fn() -> Box<dyn DynDigest + Send> + Send + Sync>;

/// A resolved algorithm: the name that keys snapshots plus the digest
/// factory behind it.
#[derive(Clone)]
pub struct Algorithm {
    name: Arc<str>,
    factory: DigestFactory,
}

impl Algorithm {
    /// Lowercase algorithm name. This is the name that was configured, not
    /// necessarily the digest actually in use: an unknown name keeps its
    /// spelling so the mismatch surfaces as a snapshot retrieval miss.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn digest(&self) -> Box<dyn DynDigest + Send> {
        (self.factory)()
    }
}

impl fmt::Debug for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Algorithm").field("name", &self.name).finish()
    }
}

/// Name → digest-factory table. Built once at startup, read-only afterwards;
/// share as `Arc<DigestRegistry>`.
pub struct DigestRegistry {
    factories: HashMap<String, DigestFactory>,
}

fn factory_of<D>() -> DigestFactory
where
    D: DynDigest + Send + Default + 'static,
{
    Arc::new(|| Box::new(D::default()) as Box<dyn DynDigest + Send>)
}

impl DigestRegistry {
    /// Registry with the default algorithm set.
    pub fn with_defaults() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("md5", factory_of::<Md5>());
        registry.register("sha1", factory_of::<Sha1>());
        registry.register("sha224", factory_of::<Sha224>());
        registry.register("sha256", factory_of::<Sha256>());
        registry.register("sha384", factory_of::<Sha384>());
        registry.register("sha512", factory_of::<Sha512>());
        registry
    }

    /// Register an additional algorithm. Names are case-insensitive; a later
    /// registration under the same name replaces the earlier one.
    pub fn register(&mut self, name: &str, factory: DigestFactory) {
        self.factories.insert(name.to_lowercase(), factory);
    }

    /// Resolve a configured name to an [`Algorithm`]. Unknown names fall
    /// back to SHA-256 but keep their spelling: stale configuration must not
    /// crash the engine, and the odd name keys the snapshot so the mismatch
    /// shows up as a retrieval miss instead of silent acceptance.
    pub fn resolve(&self, name: &str) -> Algorithm {
        let name = name.to_lowercase();
        let factory = match self.factories.get(&name) {
            Some(factory) => Arc::clone(factory),
            None => {
                debug!(algorithm = %name, "unknown hash algorithm, using sha256");
                factory_of::<Sha256>()
            }
        };
        Algorithm {
            name: name.into(),
            factory,
        }
    }
}

impl fmt::Debug for DigestRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("DigestRegistry").field("algorithms", &names).finish()
    }
}
