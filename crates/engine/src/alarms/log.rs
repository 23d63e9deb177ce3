use std::collections::{HashSet, VecDeque};

use fleetwatch_shared::models::{Alarm, Severity};

/// Most alarms kept at once.
pub const DEFAULT_CAPACITY: usize = 50;

/// Counts over the current log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlarmStats {
    pub total: usize,
    pub unread: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// Newest-first alarm buffer with unique ids and a hard size cap.
#[derive(Debug, Clone)]
pub struct AlarmLog {
    entries: VecDeque<Alarm>,
    capacity: usize,
}

impl Default for AlarmLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl AlarmLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        AlarmLog {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a fetched batch and return the alarms that were actually new, newest first.
    ///
    /// Ids already in the log, or repeated within the batch, are dropped. The
    /// oldest entries are evicted once the log is over capacity.
    pub fn ingest(&mut self, batch: Vec<Alarm>) -> Vec<Alarm> {
        let mut seen: HashSet<&str> = self.entries.iter().map(|a| a.id.as_str()).collect();
        let mut fresh: Vec<Alarm> = Vec::with_capacity(batch.len());
        for alarm in &batch {
            if seen.insert(alarm.id.as_str()) {
                fresh.push(alarm.clone());
            }
        }
        drop(seen);

        // Stable, so equal timestamps keep upstream order.
        fresh.sort_by(|a, b| b.raised_at.cmp(&a.raised_at));

        for alarm in fresh.iter().rev() {
            self.entries.push_front(alarm.clone());
        }
        let evicted = self.entries.len().saturating_sub(self.capacity);
        self.entries.truncate(self.capacity);
        if evicted > 0 {
            tracing::debug!(evicted, capacity = self.capacity, "Evicted oldest alarms");
        }
        fresh
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alarm> {
        self.entries.iter()
    }

    pub fn snapshot(&self) -> Vec<Alarm> {
        self.entries.iter().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<&Alarm> {
        self.entries.iter().find(|a| a.id == id)
    }

    /// Returns false if no alarm has this id.
    pub fn mark_read(&mut self, id: &str) -> bool {
        match self.entries.iter_mut().find(|a| a.id == id) {
            Some(alarm) => {
                alarm.is_read = true;
                true
            }
            None => false,
        }
    }

    /// Returns how many alarms flipped from unread to read.
    pub fn mark_all_read(&mut self) -> usize {
        let mut n = 0;
        for alarm in self.entries.iter_mut().filter(|a| !a.is_read) {
            alarm.is_read = true;
            n += 1;
        }
        n
    }

    pub fn remove(&mut self, id: &str) -> Option<Alarm> {
        let idx = self.entries.iter().position(|a| a.id == id)?;
        self.entries.remove(idx)
    }

    /// Returns how many alarms were dropped.
    pub fn clear(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }

    pub fn unread(&self) -> Vec<Alarm> {
        self.entries.iter().filter(|a| !a.is_read).cloned().collect()
    }

    pub fn stats(&self) -> AlarmStats {
        self.entries.iter().fold(AlarmStats::default(), |mut s, a| {
            s.total += 1;
            if !a.is_read {
                s.unread += 1;
            }
            match a.severity {
                Severity::High => s.high += 1,
                Severity::Medium => s.medium += 1,
                Severity::Low => s.low += 1,
            }
            s
        })
    }
}
