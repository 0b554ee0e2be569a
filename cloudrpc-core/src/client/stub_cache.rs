use crate::{error::DispatchError, proto::stub::Stub};
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

/// Live stubs of one client, keyed by logical service name.
///
/// Populated lazily and never evicted. Stubs are built outside the lock; when first calls
/// for a service race, the first stub inserted is kept and handed to every caller.
#[derive(Debug)]
pub struct StubCache<S> {
    stubs: Mutex<HashMap<String, Stub<S>>>,
}

impl<S> Default for StubCache<S> {
    fn default() -> Self {
        Self {
            stubs: Mutex::new(HashMap::new()),
        }
    }
}

impl<S: Clone> StubCache<S> {
    /// Returns the stub of `service`, building it with `create` on first use.
    ///
    /// `create` may block (it reads descriptor files) and runs without the lock held.
    /// A failed `create` leaves the cache untouched.
    pub fn get_or_try_insert_with<F>(
        &self,
        service: &str,
        create: F,
    ) -> Result<Stub<S>, DispatchError>
    where
        F: FnOnce() -> Result<Stub<S>, DispatchError>,
    {
        if let Some(stub) = self.lock().get(service) {
            return Ok(stub.clone());
        }

        let stub = create()?;

        Ok(self
            .lock()
            .entry(service.to_string())
            .or_insert(stub)
            .clone())
    }

    pub fn contains(&self, service: &str) -> bool {
        self.lock().contains_key(service)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Stub<S>>> {
        self.stubs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
