//! Stream registry: `active_streams` and `closing_streams` (`spec.md` §3),
//! each a slab of `Stream` values double-indexed by an opaque key and by
//! `StreamId`, following the teacher's `proto::streams::store::Store`.

use std::collections::HashMap;
use std::ops;

use slab::Slab;

use crate::frame::StreamId;
use crate::proto::stream::Stream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(usize);

#[derive(Debug, Default)]
pub struct Store {
    slab: Slab<Stream>,
    ids: HashMap<StreamId, Key>,
}

impl Store {
    pub fn new() -> Store {
        Store { slab: Slab::new(), ids: HashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.slab.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slab.is_empty()
    }

    /// Inserts a stream before its wire id is known (`StreamId::ZERO`);
    /// callers rebind with `bind_id` once the codec assigns one.
    pub fn insert(&mut self, stream: Stream) -> Key {
        Key(self.slab.insert(stream))
    }

    pub fn bind_id(&mut self, key: Key, id: StreamId) {
        self.ids.insert(id, key);
    }

    pub fn remove(&mut self, key: Key) -> Stream {
        let stream = self.slab.remove(key.0);
        self.ids.retain(|_, &mut k| k != key);
        stream
    }

    pub fn find_key(&self, id: StreamId) -> Option<Key> {
        self.ids.get(&id).copied()
    }

    pub fn find_by_id(&mut self, id: StreamId) -> Option<&mut Stream> {
        let key = *self.ids.get(&id)?;
        self.slab.get_mut(key.0)
    }

    pub fn get(&self, key: Key) -> Option<&Stream> {
        self.slab.get(key.0)
    }

    pub fn get_mut(&mut self, key: Key) -> Option<&mut Stream> {
        self.slab.get_mut(key.0)
    }

    pub fn for_each_mut<F: FnMut(Key, &mut Stream)>(&mut self, mut f: F) {
        for (idx, stream) in self.slab.iter_mut() {
            f(Key(idx), stream);
        }
    }

    pub fn keys(&self) -> Vec<Key> {
        self.slab.iter().map(|(idx, _)| Key(idx)).collect()
    }
}

impl ops::Index<Key> for Store {
    type Output = Stream;

    fn index(&self, key: Key) -> &Stream {
        &self.slab[key.0]
    }
}

impl ops::IndexMut<Key> for Store {
    fn index_mut(&mut self, key: Key) -> &mut Stream {
        &mut self.slab[key.0]
    }
}
