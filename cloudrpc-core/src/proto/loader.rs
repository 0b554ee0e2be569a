//! # Proto Loader
//!
//! Resolves the descriptor set of a [`ProtoService`] from a base directory and produces a
//! [`StubConstructor`] for it.
//!
//! Decoded pools are cached per path: services sharing a descriptor set (e.g. `Publisher`
//! and `Subscriber` in `pubsub.binpb`) decode it once.
use super::stub::StubConstructor;
use crate::{
    client::ProtoService,
    error::{ConfigurationError, DispatchError, ProtocolError},
};
use prost_reflect::DescriptorPool;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};
use tracing::debug;

#[derive(Debug, Default)]
pub struct ProtoLoader {
    base_dir: PathBuf,
    pools: Mutex<HashMap<PathBuf, DescriptorPool>>,
}

impl ProtoLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            pools: Mutex::default(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Registers an in-memory descriptor set under `path`.
    ///
    /// Proto services whose `path` matches are served from these bytes and never touch
    /// the filesystem. Useful for descriptor sets embedded with `include_bytes!`.
    pub fn with_file_descriptor_set(
        self,
        path: impl Into<PathBuf>,
        bytes: &[u8],
    ) -> Result<Self, ConfigurationError> {
        let path = path.into();
        let pool = DescriptorPool::decode(bytes).map_err(|source| {
            ConfigurationError::InvalidDescriptor {
                path: path.clone(),
                source,
            }
        })?;

        self.lock_pools().insert(path, pool);
        Ok(self)
    }

    /// Loads the definition of `proto` and returns a constructor for its stubs.
    ///
    /// # Returns
    ///
    /// * `Ok(StubConstructor)` - The service exists in the descriptor set.
    /// * `Err(DispatchError::Configuration)` - The file cannot be read or decoded.
    /// * `Err(DispatchError::Protocol)` - The file does not define `proto.service`.
    pub fn load(&self, proto: &ProtoService) -> Result<StubConstructor, DispatchError> {
        let pool = self.pool(&proto.path)?;

        let service = pool.get_service_by_name(&proto.service).ok_or_else(|| {
            ProtocolError::ServiceNotFound {
                service: proto.service.clone(),
                path: proto.path.clone(),
            }
        })?;

        Ok(StubConstructor::new(service))
    }

    fn pool(&self, path: &Path) -> Result<DescriptorPool, ConfigurationError> {
        if let Some(pool) = self.lock_pools().get(path) {
            return Ok(pool.clone());
        }

        let full_path = self.base_dir.join(path);
        debug!(path = %full_path.display(), "Loading file descriptor set");

        let bytes = std::fs::read(&full_path).map_err(|source| {
            ConfigurationError::DescriptorNotFound {
                path: full_path.clone(),
                source,
            }
        })?;

        let pool = DescriptorPool::decode(bytes.as_slice()).map_err(|source| {
            ConfigurationError::InvalidDescriptor {
                path: full_path,
                source,
            }
        })?;

        Ok(self
            .lock_pools()
            .entry(path.to_path_buf())
            .or_insert(pool)
            .clone())
    }

    fn lock_pools(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, DescriptorPool>> {
        self.pools.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
