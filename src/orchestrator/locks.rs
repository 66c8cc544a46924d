use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-session async locks; entries disappear once no turn holds them.
#[derive(Default)]
pub(crate) struct SessionLocks {
    slots: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl SessionLocks {
    pub(crate) async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self
                .slots
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            slots.retain(|_, weak| weak.strong_count() > 0);
            match slots.get(session_id).and_then(Weak::upgrade) {
                Some(existing) => existing,
                None => {
                    let created = Arc::new(AsyncMutex::new(()));
                    slots.insert(session_id.to_string(), Arc::downgrade(&created));
                    created
                }
            }
        };
        slot.lock_owned().await
    }

    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.slots
            .lock()
            .map(|slots| slots.values().filter(|weak| weak.strong_count() > 0).count())
            .unwrap_or(0)
    }
}
