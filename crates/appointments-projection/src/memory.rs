//! In-memory read store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ProjectionError;
use crate::projection::AppointmentProjection;
use crate::store::{ReadModelStore, UpsertOutcome};

#[derive(Debug, Default)]
struct State {
    rows: HashMap<Uuid, AppointmentProjection>,
    writes: usize,
    failures_remaining: u32,
    unavailable: bool,
}

/// Read store backed by a shared map. Failures can be injected to exercise
/// the worker's retry path.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReadModelStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryReadModelStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` calls fail with `ProjectionError::ReadStore`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_next(&self, count: u32) {
        self.state.lock().unwrap().failures_remaining = count;
    }

    /// Makes every call fail until reset.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    /// Number of stored projections.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().rows.len()
    }

    /// Returns `true` if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of upserts that mutated the store.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.state.lock().unwrap().writes
    }
}

fn check_available(state: &mut State) -> Result<(), ProjectionError> {
    if state.unavailable {
        return Err(ProjectionError::ReadStore("read store unavailable".into()));
    }
    if state.failures_remaining > 0 {
        state.failures_remaining -= 1;
        return Err(ProjectionError::ReadStore("injected read store failure".into()));
    }
    Ok(())
}

fn poisoned() -> ProjectionError {
    ProjectionError::ReadStore("in-memory read store lock poisoned".into())
}

#[async_trait]
impl ReadModelStore for InMemoryReadModelStore {
    async fn upsert_if_newer(
        &self,
        projection: &AppointmentProjection,
    ) -> Result<UpsertOutcome, ProjectionError> {
        let mut state = self.state.lock().map_err(|_| poisoned())?;
        check_available(&mut state)?;

        if state
            .rows
            .get(&projection.appointment_id)
            .is_some_and(|stored| stored.version >= projection.version)
        {
            return Ok(UpsertOutcome::Stale);
        }
        state
            .rows
            .insert(projection.appointment_id, projection.clone());
        state.writes += 1;
        Ok(UpsertOutcome::Applied)
    }

    async fn get(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<AppointmentProjection>, ProjectionError> {
        let mut state = self.state.lock().map_err(|_| poisoned())?;
        check_available(&mut state)?;
        Ok(state.rows.get(&appointment_id).cloned())
    }
}
