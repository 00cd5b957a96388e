//! RFC 7541 §2.3.2 / §4: the dynamic table, FIFO with size-bounded eviction.

use std::collections::VecDeque;

/// Every entry in the dynamic table costs its name+value octet length plus
/// 32 bytes of accounting overhead (RFC 7541 §4.1).
const ENTRY_OVERHEAD: usize = 32;

#[derive(Debug, Clone)]
struct Entry {
    name: Box<str>,
    value: Box<str>,
}

impl Entry {
    fn size(&self) -> usize {
        self.name.len() + self.value.len() + ENTRY_OVERHEAD
    }
}

/// Shared by encoder and decoder; each side keeps its own table but the
/// insertion/eviction discipline is identical.
#[derive(Debug)]
pub struct DynamicTable {
    entries: VecDeque<Entry>,
    size: usize,
    max_size: usize,
}

impl DynamicTable {
    pub fn new(max_size: usize) -> Self {
        DynamicTable {
            entries: VecDeque::new(),
            size: 0,
            max_size,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// A SETTINGS_HEADER_TABLE_SIZE update or an explicit dynamic table size
    /// update (RFC 7541 §6.3) both funnel through here.
    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        self.evict_to_fit();
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        let entry = Entry {
            name: name.into(),
            value: value.into(),
        };
        let entry_size = entry.size();

        // An entry larger than the whole table is simply not stored, per
        // RFC 7541 §4.4, and this counts as evicting the entire table.
        if entry_size > self.max_size {
            self.entries.clear();
            self.size = 0;
            return;
        }

        self.entries.push_front(entry);
        self.size += entry_size;
        self.evict_to_fit();
    }

    fn evict_to_fit(&mut self) {
        while self.size > self.max_size {
            let evicted = self.entries.pop_back().expect("size>0 implies entries non-empty");
            self.size -= evicted.size();
        }
    }

    /// Dynamic table entries are indexed starting at 62 in the combined
    /// address space (RFC 7541 §2.3.3); `index` here is already relative
    /// (0-based into `entries`, most-recently-inserted first).
    pub fn get(&self, index: usize) -> Option<(&str, &str)> {
        self.entries.get(index).map(|e| (&*e.name, &*e.value))
    }

    pub fn find(&self, name: &str, value: &str) -> Option<(usize, bool)> {
        let mut name_only = None;
        for (i, e) in self.entries.iter().enumerate() {
            if &*e.name == name {
                if &*e.value == value {
                    return Some((i, true));
                }
                if name_only.is_none() {
                    name_only = Some((i, false));
                }
            }
        }
        name_only
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
