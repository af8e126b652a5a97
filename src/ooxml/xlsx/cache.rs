//! Per-workbook cache of parsed worksheets.
//!
//! A worksheet is parsed, normalized and overlay-resolved once, on first
//! access, and shared afterwards. Concurrent first accesses to the same
//! part wait on one [`OnceCell`] so the part is never parsed twice.

use crate::common::error::Result;
use crate::ooxml::xlsx::worksheet::Worksheet;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

pub type SharedWorksheet = Arc<Mutex<Worksheet>>;

type Slot = Arc<OnceCell<SharedWorksheet>>;

#[derive(Debug, Default)]
pub struct WorksheetCache {
    slots: RwLock<HashMap<String, Slot>>,
}

impl WorksheetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached worksheet of `part`, loading it with `load` on first use.
    ///
    /// A failed load leaves the slot empty, so the next call tries again.
    pub fn get_or_load<F>(&self, part: &str, load: F) -> Result<SharedWorksheet>
    where
        F: FnOnce() -> Result<Worksheet>,
    {
        let slot = self.slot(part);
        let sheet = slot.get_or_try_init(|| {
            log::debug!("parsing worksheet {part}");
            load().map(|ws| Arc::new(Mutex::new(ws)))
        })?;
        Ok(Arc::clone(sheet))
    }

    /// The cached worksheet of `part`, if it has been loaded.
    pub fn get(&self, part: &str) -> Option<SharedWorksheet> {
        self.slots.read().get(part)?.get().cloned()
    }

    /// Parts with a loaded worksheet, sorted by name.
    pub fn loaded(&self) -> Vec<(String, SharedWorksheet)> {
        let slots = self.slots.read();
        let mut loaded: Vec<_> = slots
            .iter()
            .filter_map(|(part, slot)| slot.get().map(|ws| (part.clone(), Arc::clone(ws))))
            .collect();
        loaded.sort_by(|a, b| a.0.cmp(&b.0));
        loaded
    }

    /// Drop the cached worksheet of `part`; the next access reparses it.
    pub fn invalidate(&self, part: &str) {
        self.slots.write().remove(part);
    }

    fn slot(&self, part: &str) -> Slot {
        if let Some(slot) = self.slots.read().get(part) {
            return Arc::clone(slot);
        }
        Arc::clone(self.slots.write().entry(part.to_string()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_worksheet_is_loaded_once() {
        let cache = WorksheetCache::new();
        let loads = AtomicUsize::new(0);
        let load = || {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok(Worksheet::default())
        };

        let first = cache.get_or_load("xl/worksheets/sheet1.xml", load).unwrap();
        let second = cache.get_or_load("xl/worksheets/sheet1.xml", load).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.loaded().len(), 1);
    }

    #[test]
    fn test_concurrent_first_access() {
        let cache = WorksheetCache::new();
        let loads = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    cache
                        .get_or_load("xl/worksheets/sheet1.xml", || {
                            loads.fetch_add(1, Ordering::SeqCst);
                            Ok(Worksheet::default())
                        })
                        .unwrap();
                });
            }
        });
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_load_is_retried() {
        let cache = WorksheetCache::new();
        let err = cache.get_or_load("sheet", || Err(Error::MissingPart("sheet".into())));
        assert!(err.is_err());
        assert!(cache.get("sheet").is_none());
        assert!(cache.get_or_load("sheet", || Ok(Worksheet::default())).is_ok());

        cache.invalidate("sheet");
        assert!(cache.get("sheet").is_none());
    }
}
