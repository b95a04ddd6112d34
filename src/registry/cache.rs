use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use super::CommandDescriptor;
use super::ServiceId;
use crate::RegistryError;

/// The authoritative in-process snapshot of command descriptors.
///
/// The map is an immutable value behind an [`ArcSwap`]: readers take a
/// snapshot reference and never observe an in-progress mutation. A single
/// mutation lock serializes `replace_all` / `apply_diff` / `replace_one`,
/// so concurrent diffs apply one at a time and each becomes visible
/// all-or-nothing.
pub(crate) struct CommandCache {
    snapshot: ArcSwap<HashMap<ServiceId, CommandDescriptor>>,
    mutation: Mutex<()>,
}

impl CommandCache {
    pub(crate) fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(HashMap::new()),
            mutation: Mutex::new(()),
        }
    }

    /// Current snapshot; wait-free, never blocks on writers.
    pub(crate) fn snapshot(&self) -> Arc<HashMap<ServiceId, CommandDescriptor>> {
        self.snapshot.load_full()
    }

    pub(crate) fn commands(&self) -> Vec<CommandDescriptor> {
        self.snapshot.load().values().cloned().collect()
    }

    pub(crate) fn get(&self, service_id: &str) -> Option<CommandDescriptor> {
        self.snapshot.load().get(service_id).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    /// Replace the whole snapshot.
    pub(crate) fn replace_all(&self, descriptors: Vec<CommandDescriptor>) {
        let next: HashMap<ServiceId, CommandDescriptor> = descriptors
            .into_iter()
            .map(|d| (d.service_id.clone(), d))
            .collect();

        let _guard = self.mutation.lock();
        self.snapshot.store(Arc::new(next));
    }

    /// Remove every id in `removed` and upsert every descriptor in
    /// `upserts` as one atomic step.
    ///
    /// Returns the descriptors that were actually removed, captured from
    /// the pre-mutation snapshot so callers can emit events for them.
    pub(crate) fn apply_diff(
        &self,
        removed: &HashSet<ServiceId>,
        upserts: Vec<CommandDescriptor>,
    ) -> Vec<CommandDescriptor> {
        let _guard = self.mutation.lock();

        let current = self.snapshot.load_full();
        let mut next: HashMap<ServiceId, CommandDescriptor> = (*current).clone();

        let mut dropped = Vec::with_capacity(removed.len());
        for id in removed {
            if let Some(descriptor) = next.remove(id) {
                dropped.push(descriptor);
            }
        }
        for descriptor in upserts {
            next.insert(descriptor.service_id.clone(), descriptor);
        }

        self.snapshot.store(Arc::new(next));
        dropped
    }

    /// Replace one tracked descriptor, returning the previous one.
    ///
    /// The id must already be tracked; an absent id is an invariant breach
    /// and the mutation is aborted.
    pub(crate) fn replace_one(
        &self,
        descriptor: CommandDescriptor,
    ) -> std::result::Result<CommandDescriptor, RegistryError> {
        let _guard = self.mutation.lock();

        let service_id = descriptor.service_id.clone();
        let current = self.snapshot.load_full();
        let mut next: HashMap<ServiceId, CommandDescriptor> = (*current).clone();

        match next.insert(service_id.clone(), descriptor) {
            Some(old) => {
                self.snapshot.store(Arc::new(next));
                Ok(old)
            }
            None => Err(RegistryError::UntrackedCommand { service_id }),
        }
    }
}
