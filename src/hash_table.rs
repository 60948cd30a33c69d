//! HashTable: open addressing with quadratic probing over stable entry handles.
//!
//! The slot array holds only tags and handles; keys and values live in a
//! generational arena. Rehashing rebuilds the slot array and never moves an
//! entry, so a [`Handle`] taken before a rehash still resolves afterwards.

use crate::error::{Error, InvariantViolation, Result};
use crate::protocol::{ElementProtocol, Natural};
use crate::reentrancy::DebugReentrancy;
use core::cmp::Ordering;
use core::mem;
use slotmap::{DefaultKey, SlotMap};
use tracing::{debug, trace};

pub const DEFAULT_INITIAL_CAPACITY: usize = 64;
pub const DEFAULT_LOAD_FACTOR: f64 = 0.75;

/// Sizing parameters for a [`HashTable`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HashTableConfig {
    /// Slot count at creation. Growth doubles it.
    pub initial_capacity: usize,
    /// Maximum fraction of non-empty slots (live entries plus tombstones).
    pub load_factor: f64,
}

impl Default for HashTableConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            load_factor: DEFAULT_LOAD_FACTOR,
        }
    }
}

impl HashTableConfig {
    pub fn validate(&self) -> Result<()> {
        if self.initial_capacity == 0 {
            return Err(Error::InvalidConfig("initial capacity must be non-zero"));
        }
        if !(self.load_factor > 0.0 && self.load_factor <= 1.0) {
            return Err(Error::InvalidConfig("load factor must lie in (0, 1]"));
        }
        Ok(())
    }
}

/// Stable reference to a live entry. Handles of removed entries never
/// resolve again, even if the arena reuses the storage.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Handle(DefaultKey);

impl Handle {
    pub(crate) fn new(k: DefaultKey) -> Self {
        Handle(k)
    }

    pub(crate) fn raw_handle(&self) -> DefaultKey {
        self.0
    }

    pub fn key<'a, K, V, KP, VP>(&self, table: &'a HashTable<K, V, KP, VP>) -> Option<&'a K>
    where
        KP: ElementProtocol<K>,
        VP: ElementProtocol<V>,
    {
        table.handle_key(*self)
    }

    pub fn value<'a, K, V, KP, VP>(&self, table: &'a HashTable<K, V, KP, VP>) -> Option<&'a V>
    where
        KP: ElementProtocol<K>,
        VP: ElementProtocol<V>,
    {
        table.handle_value(*self)
    }

    pub fn value_mut<'a, K, V, KP, VP>(
        &self,
        table: &'a mut HashTable<K, V, KP, VP>,
    ) -> Option<&'a mut V>
    where
        KP: ElementProtocol<K>,
        VP: ElementProtocol<V>,
    {
        table.handle_value_mut(*self)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Slot {
    Empty,
    Occupied(DefaultKey),
    Tombstone,
}

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
}

/// Outcome of walking a key's probe sequence.
enum Probe {
    Found { slot: usize, entry: DefaultKey },
    Vacant { slot: usize, fresh: bool },
    Exhausted,
}

/// Where an insertion lands once the table has room for it.
enum Placement {
    Existing(DefaultKey),
    Vacant { slot: usize, fresh: bool, hash: u64 },
}

/// Slot indices `(home + i²) % capacity` for `i = 0..capacity`. The sequence
/// repeats with period `capacity`, so one pass covers every reachable slot.
fn probe_sequence(hash: u64, capacity: usize) -> impl Iterator<Item = usize> {
    let home = (hash % capacity as u64) as usize;
    let mut square = 0usize;
    (0..capacity).map(move |i| {
        let idx = (home + square) % capacity;
        square = (square + 2 * i + 1) % capacity;
        idx
    })
}

pub struct HashTable<K, V, KP = Natural, VP = Natural>
where
    KP: ElementProtocol<K>,
    VP: ElementProtocol<V>,
{
    key_protocol: KP,
    value_protocol: VP,
    slots: Vec<Slot>,
    entries: SlotMap<DefaultKey, Entry<K, V>>,
    // live entries plus tombstones
    occupied: usize,
    load_factor: f64,
    reentrancy: DebugReentrancy,
}

impl<K, V> HashTable<K, V>
where
    Natural: ElementProtocol<K> + ElementProtocol<V>,
{
    pub fn new() -> Result<Self> {
        Self::with_protocols(Natural::new(), Natural::new())
    }
}

/// Iterator over `(key, value)` pairs.
pub struct Iter<'a, K, V> {
    it: slotmap::basic::Iter<'a, DefaultKey, Entry<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(_, e)| (&e.key, &e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

/// Iterator over `(key, &mut value)` pairs.
pub struct IterMut<'a, K, V> {
    it: slotmap::basic::IterMut<'a, DefaultKey, Entry<K, V>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(_, e)| (&e.key, &mut e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

/// Iterator over `(handle, key, value)` triples.
pub struct Entries<'a, K, V> {
    it: slotmap::basic::Iter<'a, DefaultKey, Entry<K, V>>,
}

impl<'a, K, V> Iterator for Entries<'a, K, V> {
    type Item = (Handle, &'a K, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it
            .next()
            .map(|(k, e)| (Handle::new(k), &e.key, &e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<K, V, KP, VP> HashTable<K, V, KP, VP>
where
    KP: ElementProtocol<K>,
    VP: ElementProtocol<V>,
{
    pub fn with_protocols(key_protocol: KP, value_protocol: VP) -> Result<Self> {
        Self::with_config(key_protocol, value_protocol, HashTableConfig::default())
    }

    /// Create a table. On allocation failure nothing is constructed and the
    /// protocols are dropped.
    pub fn with_config(key_protocol: KP, value_protocol: VP, config: HashTableConfig) -> Result<Self> {
        config.validate()?;
        let slots = empty_slots(config.initial_capacity)?;
        Ok(Self {
            key_protocol,
            value_protocol,
            slots,
            entries: SlotMap::with_key(),
            occupied: 0,
            load_factor: config.load_factor,
            reentrancy: DebugReentrancy::new(),
        })
    }

    pub fn key_protocol(&self) -> &KP {
        &self.key_protocol
    }

    pub fn value_protocol(&self) -> &VP {
        &self.value_protocol
    }

    /// Live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live entries plus tombstones.
    pub fn occupied(&self) -> usize {
        self.occupied
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn load_factor(&self) -> f64 {
        self.load_factor
    }

    fn exceeds_load(&self, occupied: usize, capacity: usize) -> bool {
        occupied as f64 / capacity as f64 > self.load_factor
    }

    fn hash_key(&self, key: &K) -> u64 {
        let _g = self.reentrancy.enter();
        self.key_protocol.hash(key)
    }

    fn probe(&self, key: &K, hash: u64) -> Probe {
        let _g = self.reentrancy.enter();
        let mut reusable = None;
        for idx in probe_sequence(hash, self.slots.len()) {
            match self.slots[idx] {
                Slot::Empty => {
                    return match reusable {
                        Some(slot) => Probe::Vacant { slot, fresh: false },
                        None => Probe::Vacant {
                            slot: idx,
                            fresh: true,
                        },
                    };
                }
                Slot::Tombstone => {
                    if reusable.is_none() {
                        reusable = Some(idx);
                    }
                }
                Slot::Occupied(k) => {
                    let matches = self.entries.get(k).map_or(false, |e| {
                        e.hash == hash
                            && self.key_protocol.compare(&e.key, key) == Ordering::Equal
                    });
                    if matches {
                        return Probe::Found { slot: idx, entry: k };
                    }
                }
            }
        }
        match reusable {
            Some(slot) => Probe::Vacant { slot, fresh: false },
            None => Probe::Exhausted,
        }
    }

    fn locate(&self, key: &K) -> Option<(usize, DefaultKey)> {
        let hash = self.hash_key(key);
        match self.probe(key, hash) {
            Probe::Found { slot, entry } => Some((slot, entry)),
            Probe::Vacant { .. } | Probe::Exhausted => None,
        }
    }

    /// Make room for `key` and report where it lives or would go. Grows the
    /// table first if one more occupied slot would break the load factor, and
    /// again if the key's probe sequence has no free slot.
    fn place(&mut self, key: &K) -> Result<Placement> {
        while self.exceeds_load(self.occupied + 1, self.capacity()) {
            self.grow()?;
        }
        let hash = self.hash_key(key);
        loop {
            match self.probe(key, hash) {
                Probe::Found { entry, .. } => return Ok(Placement::Existing(entry)),
                Probe::Vacant { slot, fresh } => {
                    return Ok(Placement::Vacant { slot, fresh, hash })
                }
                Probe::Exhausted => {
                    debug!(capacity = self.capacity(), "probe sequence exhausted, growing");
                    self.grow()?;
                }
            }
        }
    }

    fn grow(&mut self) -> Result<()> {
        let doubled = self
            .capacity()
            .checked_mul(2)
            .ok_or(Error::AllocationFailure {
                requested: usize::MAX,
            })?;
        self.rehash(doubled)
    }

    fn occupy(&mut self, slot: usize, fresh: bool, entry: Entry<K, V>) -> DefaultKey {
        let k = self.entries.insert(entry);
        self.slots[slot] = Slot::Occupied(k);
        if fresh {
            self.occupied += 1;
        } else {
            trace!(slot, "reusing tombstone");
        }
        k
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let (_, k) = self.locate(key)?;
        self.entries.get(k).map(|e| &e.value)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let (_, k) = self.locate(key)?;
        self.entries.get_mut(k).map(|e| &mut e.value)
    }

    /// The table's own copy of `key` together with its value.
    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        let (_, k) = self.locate(key)?;
        self.entries.get(k).map(|e| (&e.key, &e.value))
    }

    pub fn contains(&self, key: &K) -> bool {
        self.locate(key).is_some()
    }

    pub fn find(&self, key: &K) -> Option<Handle> {
        self.locate(key).map(|(_, k)| Handle::new(k))
    }

    /// Insert or overwrite. The table stores copies of `key` and `value`; an
    /// overwritten value is destroyed.
    pub fn set(&mut self, key: &K, value: &V) -> Result<Handle> {
        match self.place(key)? {
            Placement::Existing(k) => {
                let fresh = self.value_protocol.copy(value);
                if let Some(e) = self.entries.get_mut(k) {
                    let old = mem::replace(&mut e.value, fresh);
                    self.value_protocol.destroy(old);
                }
                Ok(Handle::new(k))
            }
            Placement::Vacant { slot, fresh, hash } => {
                let entry = Entry {
                    key: self.key_protocol.copy(key),
                    value: self.value_protocol.copy(value),
                    hash,
                };
                Ok(Handle::new(self.occupy(slot, fresh, entry)))
            }
        }
    }

    /// Insert `key` with a default-constructed value. Leaves an existing
    /// entry untouched.
    pub fn add(&mut self, key: &K) -> Result<Handle> {
        match self.place(key)? {
            Placement::Existing(k) => Ok(Handle::new(k)),
            Placement::Vacant { slot, fresh, hash } => {
                let entry = Entry {
                    key: self.key_protocol.copy(key),
                    value: self.value_protocol.create_default(),
                    hash,
                };
                Ok(Handle::new(self.occupy(slot, fresh, entry)))
            }
        }
    }

    /// Destroy the value under `key` and store a default one. No-op when
    /// the key is absent.
    pub fn reset(&mut self, key: &K) {
        let Some((_, k)) = self.locate(key) else {
            return;
        };
        let fresh = self.value_protocol.create_default();
        if let Some(e) = self.entries.get_mut(k) {
            let old = mem::replace(&mut e.value, fresh);
            self.value_protocol.destroy(old);
        }
    }

    /// Destroy the entry under `key`, leaving a tombstone. Returns whether
    /// the key was present.
    pub fn remove(&mut self, key: &K) -> bool {
        let Some((slot, k)) = self.locate(key) else {
            return false;
        };
        // Unlink before destroying so the table is consistent if destroy
        // runs user code.
        self.slots[slot] = Slot::Tombstone;
        if let Some(e) = self.entries.remove(k) {
            self.key_protocol.destroy(e.key);
            self.value_protocol.destroy(e.value);
        }
        true
    }

    /// Destroy every entry. Capacity is kept; tombstones are cleared.
    pub fn clear(&mut self) {
        self.slots.fill(Slot::Empty);
        self.occupied = 0;
        for (_, e) in self.entries.drain() {
            self.key_protocol.destroy(e.key);
            self.value_protocol.destroy(e.value);
        }
    }

    /// Rebuild the slot array at `new_capacity` by reinserting every live
    /// entry along its probe sequence. Tombstones are dropped.
    ///
    /// Fails with [`Error::CapacityTooSmall`] if the entries would break the
    /// load factor, or [`Error::AllocationFailure`]; either way the table is
    /// unchanged. If some key finds no free slot on its probe sequence at
    /// `new_capacity`, the target doubles until every key is placed.
    pub fn rehash(&mut self, new_capacity: usize) -> Result<()> {
        let required = ((self.len() as f64 / self.load_factor).ceil() as usize).max(1);
        if new_capacity < required {
            return Err(Error::CapacityTooSmall {
                requested: new_capacity,
                required,
            });
        }
        let mut target = new_capacity;
        let slots = loop {
            if let Some(slots) = self.replay(target)? {
                break slots;
            }
            debug!(target, "entries do not fit their probe sequences, doubling");
            target = target.checked_mul(2).ok_or(Error::AllocationFailure {
                requested: usize::MAX,
            })?;
        };
        debug!(
            from = self.capacity(),
            to = target,
            len = self.len(),
            "rehashed table"
        );
        self.slots = slots;
        self.occupied = self.len();
        Ok(())
    }

    /// Place every live entry into a fresh array using the stored hashes.
    /// `None` if some entry's probe sequence is full.
    fn replay(&self, capacity: usize) -> Result<Option<Vec<Slot>>> {
        let mut slots = empty_slots(capacity)?;
        for (k, e) in self.entries.iter() {
            let Some(idx) = probe_sequence(e.hash, capacity).find(|&i| slots[i] == Slot::Empty)
            else {
                return Ok(None);
            };
            slots[idx] = Slot::Occupied(k);
        }
        Ok(Some(slots))
    }

    pub(crate) fn handle_key(&self, h: Handle) -> Option<&K> {
        self.entries.get(h.raw_handle()).map(|e| &e.key)
    }

    pub(crate) fn handle_value(&self, h: Handle) -> Option<&V> {
        self.entries.get(h.raw_handle()).map(|e| &e.value)
    }

    pub(crate) fn handle_value_mut(&mut self, h: Handle) -> Option<&mut V> {
        self.entries.get_mut(h.raw_handle()).map(|e| &mut e.value)
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            it: self.entries.iter(),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            it: self.entries.iter_mut(),
        }
    }

    /// Like [`iter`](Self::iter), also yielding each entry's handle.
    pub fn entries(&self) -> Entries<'_, K, V> {
        Entries {
            it: self.entries.iter(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.iter_mut().map(|(_, v)| v)
    }

    /// Copy every entry into a new table governed by other protocols. Hashes
    /// are recomputed under the new key protocol.
    pub fn clone_with<KP2, VP2>(
        &self,
        key_protocol: KP2,
        value_protocol: VP2,
    ) -> Result<HashTable<K, V, KP2, VP2>>
    where
        KP2: ElementProtocol<K>,
        VP2: ElementProtocol<V>,
    {
        let config = HashTableConfig {
            initial_capacity: self.capacity(),
            load_factor: self.load_factor,
        };
        let mut clone = HashTable::with_config(key_protocol, value_protocol, config)?;
        for (k, v) in self.iter() {
            clone.set(k, v)?;
        }
        Ok(clone)
    }

    pub fn try_clone(&self) -> Result<Self>
    where
        KP: Clone,
        VP: Clone,
    {
        self.clone_with(self.key_protocol.clone(), self.value_protocol.clone())
    }

    /// Check the structural invariants: `len <= occupied <= capacity`, slot
    /// tags agree with the counters and the arena, the load factor holds, and
    /// every key is the first match along its own probe sequence (so it is
    /// reachable and has no equal twin).
    pub fn validate(&self) -> core::result::Result<(), InvariantViolation> {
        let (size, occupied, capacity) = (self.len(), self.occupied, self.capacity());
        if size > occupied {
            return Err(InvariantViolation::SizeExceedsOccupied { size, occupied });
        }
        if occupied > capacity {
            return Err(InvariantViolation::OccupiedExceedsCapacity { occupied, capacity });
        }
        if self.exceeds_load(occupied, capacity) {
            return Err(InvariantViolation::SlotAccounting("load factor exceeded"));
        }
        let mut live = 0;
        let mut tombstones = 0;
        for slot in &self.slots {
            match slot {
                Slot::Empty => {}
                Slot::Tombstone => tombstones += 1,
                Slot::Occupied(k) => {
                    if !self.entries.contains_key(*k) {
                        return Err(InvariantViolation::SlotAccounting(
                            "slot references a missing entry",
                        ));
                    }
                    live += 1;
                }
            }
        }
        if live != size {
            return Err(InvariantViolation::SlotAccounting(
                "occupied slots differ from entry count",
            ));
        }
        if live + tombstones != occupied {
            return Err(InvariantViolation::SlotAccounting(
                "occupied counter differs from non-empty slots",
            ));
        }
        for (k, e) in self.entries.iter() {
            match self.probe(&e.key, e.hash) {
                Probe::Found { entry, .. } if entry == k => {}
                Probe::Found { .. } => return Err(InvariantViolation::DuplicateKey),
                Probe::Vacant { .. } | Probe::Exhausted => {
                    return Err(InvariantViolation::UnreachableEntry)
                }
            }
        }
        Ok(())
    }
}

fn empty_slots(capacity: usize) -> Result<Vec<Slot>> {
    let mut slots = Vec::new();
    slots
        .try_reserve_exact(capacity)
        .map_err(|_| Error::AllocationFailure {
            requested: capacity,
        })?;
    slots.resize(capacity, Slot::Empty);
    Ok(slots)
}

impl<K, V, KP, VP> Drop for HashTable<K, V, KP, VP>
where
    KP: ElementProtocol<K>,
    VP: ElementProtocol<V>,
{
    fn drop(&mut self) {
        for (_, e) in self.entries.drain() {
            self.key_protocol.destroy(e.key);
            self.value_protocol.destroy(e.value);
        }
    }
}

impl<'a, K, V, KP, VP> IntoIterator for &'a HashTable<K, V, KP, VP>
where
    KP: ElementProtocol<K>,
    VP: ElementProtocol<V>,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
