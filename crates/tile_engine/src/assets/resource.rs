//! Pollable resource slots
//!
//! A [`Resource`] starts out pending and is filled exactly once, usually by a
//! background loader thread. The frame loop polls it instead of blocking.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::assets::AssetError;

struct Slot<T> {
    name: String,
    value: OnceLock<Result<Arc<T>, AssetError>>,
}

/// Shared handle to a value that may still be loading
pub struct Resource<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Resource<T> {
    /// An empty slot plus the writer that fills it
    pub fn pending(name: impl Into<String>) -> (Self, ResourceWriter<T>) {
        let slot = Arc::new(Slot {
            name: name.into(),
            value: OnceLock::new(),
        });
        (Self { slot: Arc::clone(&slot) }, ResourceWriter { slot })
    }

    /// A slot that is already loaded
    pub fn ready(name: impl Into<String>, value: T) -> Self {
        let (resource, writer) = Self::pending(name);
        writer.complete(Ok(value));
        resource
    }

    /// A slot that already failed
    pub fn failed(name: impl Into<String>, error: AssetError) -> Self {
        let (resource, writer) = Self::pending(name);
        writer.complete(Err(error));
        resource
    }

    /// Name used in log messages
    pub fn name(&self) -> &str {
        &self.slot.name
    }

    /// Loaded successfully
    pub fn is_loaded(&self) -> bool {
        matches!(self.slot.value.get(), Some(Ok(_)))
    }

    /// Finished, successfully or not
    pub fn is_settled(&self) -> bool {
        self.slot.value.get().is_some()
    }

    /// The value, once loaded
    pub fn get(&self) -> Option<Arc<T>> {
        match self.slot.value.get() {
            Some(Ok(value)) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    /// The failure, if loading failed
    pub fn error(&self) -> Option<&AssetError> {
        match self.slot.value.get() {
            Some(Err(e)) => Some(e),
            _ => None,
        }
    }
}

impl<T: Send + Sync + 'static> Resource<T> {
    /// Run `load` on a background thread and return the slot it fills
    pub fn spawn<F>(name: impl Into<String>, load: F) -> Self
    where
        F: FnOnce() -> Result<T, AssetError> + Send + 'static,
    {
        let (resource, writer) = Self::pending(name);
        let thread_name = format!("load:{}", resource.name());

        // The closure is shared so it can still run inline if the thread
        // cannot be created
        let job = Arc::new(std::sync::Mutex::new(Some((load, writer))));
        let worker_job = Arc::clone(&job);
        let spawned = std::thread::Builder::new().name(thread_name).spawn(move || {
            let taken = worker_job.lock().ok().and_then(|mut guard| guard.take());
            if let Some((load, writer)) = taken {
                writer.complete(load());
            }
        });

        if let Err(e) = spawned {
            log::warn!("Could not spawn loader thread for '{}': {e}; loading inline", resource.name());
            let taken = job.lock().ok().and_then(|mut guard| guard.take());
            if let Some((load, writer)) = taken {
                writer.complete(load());
            }
        }
        resource
    }
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self { slot: Arc::clone(&self.slot) }
    }
}

impl<T> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.slot.value.get() {
            None => "pending",
            Some(Ok(_)) => "loaded",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("Resource")
            .field("name", &self.slot.name)
            .field("state", &state)
            .finish()
    }
}

/// Write side of a [`Resource`]
pub struct ResourceWriter<T> {
    slot: Arc<Slot<T>>,
}

impl<T> ResourceWriter<T> {
    /// Fill the slot; later writes are ignored
    pub fn complete(self, result: Result<T, AssetError>) {
        match &result {
            Ok(_) => log::debug!("Resource '{}' loaded", self.slot.name),
            Err(e) => log::warn!("Resource '{}' failed: {e}", self.slot.name),
        }
        let _ = self.slot.value.set(result.map(Arc::new));
    }
}

impl<T> Drop for ResourceWriter<T> {
    fn drop(&mut self) {
        if self.slot.value.get().is_none() {
            let _ = self.slot.value.set(Err(AssetError::LoadFailed(format!(
                "loader for '{}' exited without a result",
                self.slot.name
            ))));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait_settled<T>(resource: &Resource<T>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !resource.is_settled() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_pending_then_complete() {
        let (resource, writer) = Resource::<u32>::pending("answer");
        assert!(!resource.is_settled());
        assert!(resource.get().is_none());

        writer.complete(Ok(42));
        assert!(resource.is_loaded());
        assert_eq!(resource.get().as_deref(), Some(&42));
    }

    #[test]
    fn test_dropped_writer_fails_slot() {
        let (resource, writer) = Resource::<u32>::pending("abandoned");
        drop(writer);
        assert!(resource.is_settled());
        assert!(matches!(resource.error(), Some(AssetError::LoadFailed(_))));
    }

    #[test]
    fn test_spawn_loads_in_background() {
        let resource = Resource::spawn("numbers", || Ok(vec![1, 2, 3]));
        wait_settled(&resource);
        assert_eq!(resource.get().map(|v| v.len()), Some(3));

        let failing: Resource<u8> = Resource::spawn("missing", || Err(AssetError::NotFound("x".into())));
        wait_settled(&failing);
        assert!(matches!(failing.error(), Some(AssetError::NotFound(_))));
    }
}
