//! Worker registry and least-loaded selection.
//!
//! Workers are keyed by address in a `BTreeMap`, so every scan visits them
//! in address order and ties on load resolve to the lowest address.

use std::collections::BTreeMap;

use crack_core::JobId;

use crate::jobs::TaskKey;

/// A worker as seen by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worker {
    pub address: String,
    /// Declared capacity.
    pub slots: u32,
    /// Registration generation; a re-registered worker gets a new one.
    pub generation: u64,
    /// Assigned tasks, in assignment order.
    pub tasks: Vec<TaskKey>,
}

impl Worker {
    pub fn load(&self) -> usize {
        self.tasks.len()
    }

    pub fn has_spare_slot(&self) -> bool {
        self.tasks.len() < self.slots as usize
    }

    pub fn holds(&self, key: &TaskKey) -> bool {
        self.tasks.contains(key)
    }

    pub fn holds_job(&self, job_id: JobId) -> bool {
        self.tasks.iter().any(|k| k.job_id == job_id)
    }
}

#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: BTreeMap<String, Worker>,
    next_generation: u64,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a worker and return its registration generation.
    pub fn register(&mut self, address: &str, slots: u32) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.workers.insert(
            address.to_string(),
            Worker {
                address: address.to_string(),
                slots,
                generation,
                tasks: Vec::new(),
            },
        );
        generation
    }

    pub fn get(&self, address: &str) -> Option<&Worker> {
        self.workers.get(address)
    }

    pub fn get_mut(&mut self, address: &str) -> Option<&mut Worker> {
        self.workers.get_mut(address)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.workers.contains_key(address)
    }

    /// Remove `address` only if it is still the given registration.
    pub fn remove_generation(&mut self, address: &str, generation: u64) -> Option<Worker> {
        match self.workers.get(address) {
            Some(w) if w.generation == generation => self.workers.remove(address),
            _ => None,
        }
    }

    /// The least-loaded worker with a spare slot.
    pub fn least_loaded_available(&self) -> Option<&Worker> {
        self.workers
            .values()
            .filter(|w| w.has_spare_slot())
            .min_by_key(|w| w.load())
    }

    /// Worker addresses, ascending by assigned task count.
    pub fn by_load(&self) -> Vec<String> {
        let mut workers: Vec<&Worker> = self.workers.values().collect();
        workers.sort_by_key(|w| w.load());
        workers.into_iter().map(|w| w.address.clone()).collect()
    }

    /// Addresses of workers holding a task of `job_id`, except `except`.
    pub fn holders_of(&self, job_id: JobId, except: Option<TaskKey>) -> Vec<String> {
        self.workers
            .values()
            .filter(|w| {
                w.tasks
                    .iter()
                    .any(|k| k.job_id == job_id && Some(*k) != except)
            })
            .map(|w| w.address.clone())
            .collect()
    }

    /// Drop every assignment of `job_id` from every worker.
    pub fn unassign_job(&mut self, job_id: JobId) {
        for worker in self.workers.values_mut() {
            worker.tasks.retain(|k| k.job_id != job_id);
        }
    }

    pub fn total_slots(&self) -> u64 {
        self.workers.values().map(|w| u64::from(w.slots)).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Worker> {
        self.workers.values()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}
