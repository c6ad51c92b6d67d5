use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

/// One async mutex per doctor. Holding a doctor's guard serialises every
/// check-then-write on that doctor's calendar, including removal of the
/// doctor itself; different doctors never contend.
#[derive(Default)]
pub struct DoctorLockRegistry {
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl DoctorLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Arc<AsyncMutex<()>>>> {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub async fn acquire(&self, doctor_id: Uuid) -> OwnedMutexGuard<()> {
        debug!("Acquiring scheduling lock for doctor {}", doctor_id);
        let lock = Arc::clone(self.entries().entry(doctor_id).or_default());
        lock.lock_owned().await
    }

    /// Drops the entry of a removed doctor. Tasks already waiting on the old
    /// mutex still get it and then find the doctor gone.
    pub fn release(&self, doctor_id: Uuid) {
        if self.entries().remove(&doctor_id).is_some() {
            debug!("Released scheduling lock for doctor {}", doctor_id);
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
