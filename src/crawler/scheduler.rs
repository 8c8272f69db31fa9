//! Frontier queue and crawl-limit accounting
//!
//! This module handles:
//! - The breadth-first frontier of URLs to fetch
//! - Duplicate suppression for queued URLs
//! - The shared crawl budget reserved before each fetch

use crate::storage::FrontierRecord;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

/// A URL queued for fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// Normalized absolute URL, also the dedup key
    pub url: Url,

    /// Link distance from the entry URL
    pub depth: u32,

    /// Page the link was found on, for diagnostics
    pub origin: Option<Url>,
}

impl FrontierEntry {
    pub fn to_record(&self) -> FrontierRecord {
        FrontierRecord {
            url: self.url.to_string(),
            depth: self.depth,
            origin: self.origin.as_ref().map(|u| u.to_string()),
        }
    }

    /// Rebuilds an entry from the persisted frontier
    ///
    /// Returns None if the stored URL no longer parses.
    pub fn from_record(record: &FrontierRecord) -> Option<Self> {
        let url = Url::parse(&record.url).ok()?;
        Some(Self {
            url,
            depth: record.depth,
            origin: record.origin.as_deref().and_then(|o| Url::parse(o).ok()),
        })
    }
}

/// Strict FIFO frontier
///
/// Entries come out in the order they were pushed, so depth never decreases
/// along the queue. A URL can be queued at most once at a time.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    queued: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry unless the URL is already queued
    ///
    /// # Returns
    ///
    /// `true` if the entry was added
    pub fn push(&mut self, entry: FrontierEntry) -> bool {
        if !self.queued.insert(entry.url.to_string()) {
            return false;
        }
        self.queue.push_back(entry);
        true
    }

    /// Returns an entry to the head of the queue
    pub fn push_front(&mut self, entry: FrontierEntry) {
        if self.queued.insert(entry.url.to_string()) {
            self.queue.push_front(entry);
        }
    }

    pub fn pop(&mut self) -> Option<FrontierEntry> {
        let entry = self.queue.pop_front()?;
        self.queued.remove(entry.url.as_str());
        Some(entry)
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.queued.contains(url.as_str())
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Accepted-document budget shared by the coordinator and its workers
///
/// A slot is reserved before a fetch starts and either committed when the
/// document is accepted or released when the fetch fails. `used` counts
/// committed and reserved slots together and never exceeds the limit, so
/// concurrent fetches cannot overshoot it.
#[derive(Debug)]
pub struct CrawlBudget {
    limit: Option<u64>,
    used: AtomicU64,
    accepted: AtomicU64,
}

impl CrawlBudget {
    /// Creates a budget, with `already_accepted` documents counted up front
    pub fn new(limit: Option<u64>, already_accepted: u64) -> Self {
        Self {
            limit,
            used: AtomicU64::new(already_accepted),
            accepted: AtomicU64::new(already_accepted),
        }
    }

    /// Tries to reserve a slot for one fetch
    pub fn try_reserve(&self) -> bool {
        let limit = self.limit.unwrap_or(u64::MAX);
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                (used < limit).then_some(used + 1)
            })
            .is_ok()
    }

    /// Turns a reservation into an accepted document
    pub fn commit(&self) {
        self.accepted.fetch_add(1, Ordering::SeqCst);
    }

    /// Gives a reservation back after a failed fetch
    pub fn release(&self) {
        let _ = self
            .used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| used.checked_sub(1));
    }

    /// True once accepted documents alone have used up the limit
    pub fn is_exhausted(&self) -> bool {
        self.limit
            .is_some_and(|limit| self.accepted.load(Ordering::SeqCst) >= limit)
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn entry(path: &str, depth: u32) -> FrontierEntry {
        FrontierEntry {
            url: Url::parse(&format!("https://example.com{}", path)).unwrap(),
            depth,
            origin: None,
        }
    }

    #[test]
    fn test_fifo_order() {
        let mut frontier = Frontier::new();
        frontier.push(entry("/", 0));
        frontier.push(entry("/a", 1));
        frontier.push(entry("/b", 1));

        let order: Vec<String> = std::iter::from_fn(|| frontier.pop())
            .map(|e| e.url.path().to_string())
            .collect();
        assert_eq!(order, vec!["/", "/a", "/b"]);
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_duplicate_push_ignored() {
        let mut frontier = Frontier::new();
        assert!(frontier.push(entry("/a", 1)));
        assert!(!frontier.push(entry("/a", 2)));
        assert_eq!(frontier.len(), 1);
        assert!(frontier.contains(&entry("/a", 0).url));

        frontier.pop();
        assert!(!frontier.contains(&entry("/a", 0).url));
        assert!(frontier.push(entry("/a", 2)));
    }

    #[test]
    fn test_push_front() {
        let mut frontier = Frontier::new();
        frontier.push(entry("/a", 1));
        frontier.push_front(entry("/", 0));
        assert_eq!(frontier.pop().unwrap().depth, 0);
    }

    #[test]
    fn test_record_conversion() {
        let mut e = entry("/a", 2);
        e.origin = Some(Url::parse("https://example.com/").unwrap());

        let record = e.to_record();
        assert_eq!(record.origin.as_deref(), Some("https://example.com/"));
        assert_eq!(FrontierEntry::from_record(&record), Some(e));
    }

    #[test]
    fn test_unlimited_budget() {
        let budget = CrawlBudget::new(None, 0);
        for _ in 0..100 {
            assert!(budget.try_reserve());
            budget.commit();
        }
        assert_eq!(budget.accepted(), 100);
        assert!(!budget.is_exhausted());
    }

    #[test]
    fn test_budget_reservations() {
        let budget = CrawlBudget::new(Some(2), 0);
        assert!(budget.try_reserve());
        assert!(budget.try_reserve());
        assert!(!budget.try_reserve());

        budget.release();
        assert!(budget.try_reserve());

        budget.commit();
        budget.commit();
        assert!(budget.is_exhausted());
        assert!(!budget.try_reserve());
    }

    #[test]
    fn test_budget_restored_count() {
        let budget = CrawlBudget::new(Some(3), 2);
        assert!(budget.try_reserve());
        assert!(!budget.try_reserve());
    }

    #[test]
    fn test_concurrent_reservations_never_overshoot() {
        let budget = Arc::new(CrawlBudget::new(Some(10), 0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let budget = Arc::clone(&budget);
                std::thread::spawn(move || {
                    let mut won = 0;
                    for _ in 0..100 {
                        if budget.try_reserve() {
                            budget.commit();
                            won += 1;
                        }
                    }
                    won
                })
            })
            .collect();

        let total: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 10);
        assert_eq!(budget.accepted(), 10);
    }
}
