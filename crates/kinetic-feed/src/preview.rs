use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

/// Client-local stand-ins for media that has not been uploaded yet (object
/// URLs in a browser). Every handle must be released once its optimistic
/// entry settles.
#[derive(Clone, Default)]
pub struct PreviewRegistry {
    inner: Arc<Mutex<PreviewState>>,
}

#[derive(Default)]
struct PreviewState {
    next: u64,
    live: HashSet<u64>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct PreviewHandle {
    id: u64,
}

impl PreviewHandle {
    pub fn url(&self) -> String {
        format!("preview://{}", self.id)
    }
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self) -> PreviewHandle {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.next += 1;
        let id = state.next;
        state.live.insert(id);
        PreviewHandle { id }
    }

    pub fn release(&self, handle: PreviewHandle) {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if state.live.remove(&handle.id) {
            debug!("Released preview {}", handle.id);
        }
    }

    pub fn is_live(&self, handle: &PreviewHandle) -> bool {
        let state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.live.contains(&handle.id)
    }

    pub fn live_count(&self) -> usize {
        let state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.live.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique_until_released() {
        let registry = PreviewRegistry::new();
        let a = registry.register();
        let b = registry.register();
        assert_ne!(a.url(), b.url());
        assert_eq!(registry.live_count(), 2);

        registry.release(a);
        assert!(registry.is_live(&b));
        assert_eq!(registry.live_count(), 1);
    }
}
