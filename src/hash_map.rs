use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;

use crate::allocator::Allocator;
use crate::allocator::Heap;
use crate::error::TryReserveError;
use crate::hash_table;
use crate::hash_table::Bucket;
use crate::hash_table::Entry as TableEntry;
use crate::hash_table::HashTable;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// The hasher builder used when none is specified: foldhash's
        /// randomly seeded fast hasher.
        pub type DefaultHashBuilder = foldhash::fast::RandomState;
    } else if #[cfg(feature = "std")] {
        /// The hasher builder used when none is specified: the standard
        /// library's randomly seeded SipHash.
        pub type DefaultHashBuilder = std::collections::hash_map::RandomState;
    } else {
        /// The hasher builder used when none is specified: SipHash with fixed
        /// keys. Enable `foldhash` or `std` for a randomly seeded hasher.
        #[allow(deprecated)]
        pub type DefaultHashBuilder = core::hash::BuildHasherDefault<core::hash::SipHasher>;
    }
}

/// Hashes `key` and folds the 64-bit result into the 32 bits the table
/// stores.
#[inline]
fn make_hash<Q, S>(hash_builder: &S, key: &Q) -> u32
where
    Q: Hash + ?Sized,
    S: BuildHasher,
{
    let hash = hash_builder.hash_one(key);
    (hash ^ (hash >> 32)) as u32
}

#[inline]
fn equivalent_key<Q, K, V>(key: &Q) -> impl Fn(&(K, V)) -> bool + '_
where
    K: Borrow<Q>,
    Q: Eq + ?Sized,
{
    move |(k, _)| <K as Borrow<Q>>::borrow(k) == key
}

/// A hash map built on the open-addressing [`HashTable`].
///
/// `HashMap<K, V, S, A>` stores key-value pairs where keys implement
/// `Hash + Eq`, hashes them with the builder `S`, and allocates from `A`.
///
/// Inserting never overwrites: [`insert`](HashMap::insert) and
/// [`emplace`](HashMap::emplace) leave an existing value in place and report
/// that nothing was inserted. Use [`insert_or_assign`](HashMap::insert_or_assign)
/// to overwrite.
///
/// # Performance Characteristics
///
/// - **Memory**: `(K, V)` plus a `u32` hash tag per slot. At most 7/8 of the
///   slots are in use, counting tombstones left by removals.
///
/// # Examples
///
/// ```rust
/// use open_hash::HashMap;
///
/// let mut scores: HashMap<&str, u32> = HashMap::new();
/// scores.insert("hello", 5);
/// scores.insert("world", 10);
///
/// assert_eq!(scores.len(), 2);
/// assert_eq!(scores.get("hello"), Some(&5));
/// assert_eq!(scores.erase("hello"), 1);
/// assert_eq!(scores.erase("hello"), 0);
/// ```
pub struct HashMap<K, V, S = DefaultHashBuilder, A: Allocator = Heap> {
    table: HashTable<(K, V), A>,
    hash_builder: S,
}

impl<K, V, S, A> Debug for HashMap<K, V, S, A>
where
    K: Debug,
    V: Debug,
    A: Allocator,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S, A> Clone for HashMap<K, V, S, A>
where
    K: Clone,
    V: Clone,
    S: Clone,
    A: Allocator + Default,
{
    /// Deep-copies the map. The copy allocates from a fresh `A::default()`;
    /// the source's allocator is not copied.
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            hash_builder: self.hash_builder.clone(),
        }
    }

    /// Replaces the contents of `self` with copies of `source`'s entries.
    /// `self` keeps its own allocator.
    fn clone_from(&mut self, source: &Self) {
        self.table.clone_from(&source.table);
        self.hash_builder.clone_from(&source.hash_builder);
    }
}

impl<K, V, S, A> PartialEq for HashMap<K, V, S, A>
where
    K: Hash + Eq,
    V: PartialEq,
    S: BuildHasher,
    A: Allocator,
{
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter()
            .all(|(k, v)| other.get(k).is_some_and(|other_v| v == other_v))
    }
}

impl<K, V, S, A> Eq for HashMap<K, V, S, A>
where
    K: Hash + Eq,
    V: Eq,
    S: BuildHasher,
    A: Allocator,
{
}

impl<K, V, S> HashMap<K, V, S, Heap>
where
    S: Default,
{
    /// Creates an empty map using the default hasher builder.
    ///
    /// No memory is allocated until the first insertion.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use open_hash::HashMap;
    /// let map: HashMap<i32, String> = HashMap::new();
    /// assert!(map.is_empty());
    /// assert_eq!(map.bucket_count(), 0);
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates an empty map that holds at least `capacity` entries before
    /// growing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use open_hash::HashMap;
    /// let map: HashMap<i32, String> = HashMap::with_capacity(100);
    /// assert!(map.capacity() >= 100);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }

    /// Creates an empty map with at least `buckets` slots.
    ///
    /// The bucket count starts at 64 and doubles until it reaches `buckets`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use open_hash::HashMap;
    /// let map: HashMap<i32, String> = HashMap::with_bucket_count(100);
    /// assert_eq!(map.bucket_count(), 128);
    /// ```
    pub fn with_bucket_count(buckets: usize) -> Self {
        Self::with_bucket_count_and_hasher_in(buckets, S::default(), Heap)
    }
}

impl<K, V, S> HashMap<K, V, S, Heap> {
    /// Creates an empty map with the given hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use open_hash::HashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let map: HashMap<i32, String, _> = HashMap::with_hasher(SimpleHasher);
    /// assert!(map.is_empty());
    /// ```
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_hasher_in(hash_builder, Heap)
    }

    /// Creates an empty map with room for `capacity` entries and the given
    /// hasher builder.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self::with_capacity_and_hasher_in(capacity, hash_builder, Heap)
    }
}

impl<K, V, S, A> HashMap<K, V, S, A>
where
    A: Allocator,
{
    /// Creates an empty map that allocates from `alloc`.
    pub fn new_in(alloc: A) -> Self
    where
        S: Default,
    {
        Self::with_hasher_in(S::default(), alloc)
    }

    /// Creates an empty map with the given hasher builder and allocator.
    pub fn with_hasher_in(hash_builder: S, alloc: A) -> Self {
        Self {
            table: HashTable::new_in(alloc),
            hash_builder,
        }
    }

    /// Creates an empty map with room for `capacity` entries, the given hasher
    /// builder and allocator.
    pub fn with_capacity_and_hasher_in(capacity: usize, hash_builder: S, alloc: A) -> Self {
        Self {
            table: HashTable::with_capacity_in(capacity, alloc),
            hash_builder,
        }
    }

    /// Creates an empty map with at least `buckets` slots, the given hasher
    /// builder and allocator. A hint of zero allocates nothing.
    pub fn with_bucket_count_and_hasher_in(buckets: usize, hash_builder: S, alloc: A) -> Self {
        Self {
            table: HashTable::with_bucket_count_in(buckets, alloc),
            hash_builder,
        }
    }

    /// The map's hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// The allocator backing this map.
    pub fn allocator(&self) -> &A {
        self.table.allocator()
    }

    /// Returns the number of entries in the map.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map contains no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of entries the map can hold before it grows.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Number of slots in the storage array; zero or a power of two.
    pub fn bucket_count(&self) -> usize {
        self.table.bucket_count()
    }

    /// Number of slots that are occupied or hold a tombstone.
    ///
    /// A value far above [`len`](HashMap::len) means many removals since the
    /// last growth or clear.
    pub fn nonempty_bucket_count(&self) -> usize {
        self.table.nonempty_bucket_count()
    }

    /// Bytes of slot storage currently allocated.
    pub fn used_memory(&self) -> usize {
        self.table.used_memory()
    }

    /// Removes all entries, keeping the allocated storage.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use open_hash::HashMap;
    /// let mut map: HashMap<i32, &str> = HashMap::new();
    /// map.insert(1, "a");
    /// map.clear();
    /// assert!(map.is_empty());
    /// assert_eq!(map.nonempty_bucket_count(), 0);
    /// ```
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Shrinks the storage as much as possible and drops tombstones.
    pub fn shrink_to_fit(&mut self) {
        self.table.shrink_to_fit();
    }

    /// Reserves room for at least `additional` more entries.
    pub fn reserve(&mut self, additional: usize) {
        self.table.reserve(additional);
    }

    /// Fallible version of [`reserve`](HashMap::reserve).
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        self.table.try_reserve(additional)
    }

    /// Ensures the map has at least `min_buckets` slots.
    pub fn reserve_buckets(&mut self, min_buckets: usize) {
        self.table.reserve_buckets(min_buckets);
    }

    /// Iterates over `(&K, &V)` pairs in slot order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use open_hash::HashMap;
    /// let mut map: HashMap<&str, i32> = HashMap::new();
    /// map.insert("a", 1);
    /// map.insert("b", 2);
    ///
    /// let mut pairs: Vec<_> = map.iter().collect();
    /// pairs.sort();
    /// assert_eq!(pairs, [(&"a", &1), (&"b", &2)]);
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V, A> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Iterates over `(&K, &mut V)` pairs in slot order.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.table.iter_mut(),
        }
    }

    /// Iterates over the keys in slot order.
    pub fn keys(&self) -> Keys<'_, K, V, A> {
        Keys { inner: self.iter() }
    }

    /// Iterates over the values in slot order.
    pub fn values(&self) -> Values<'_, K, V, A> {
        Values { inner: self.iter() }
    }

    /// Iterates over mutable references to the values in slot order.
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Removes and yields every entry. The map is empty afterwards even if the
    /// iterator is dropped early.
    pub fn drain(&mut self) -> Drain<'_, K, V, A> {
        Drain {
            inner: self.table.drain(),
        }
    }

    /// Keeps only the entries for which `f` returns `true`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use open_hash::HashMap;
    /// let mut map: HashMap<i32, i32> = (0..8).map(|x| (x, x * 10)).collect();
    /// map.retain(|k, _| k % 2 == 0);
    /// assert_eq!(map.len(), 4);
    /// ```
    pub fn retain(&mut self, mut f: impl FnMut(&K, &mut V) -> bool) {
        self.table.retain(|(k, v)| f(k, v));
    }

    /// Exchanges the contents and hasher builders of two maps.
    ///
    /// # Panics
    ///
    /// Panics if the allocators compare unequal.
    pub fn swap(&mut self, other: &mut Self)
    where
        A: PartialEq,
    {
        self.table.swap(&mut other.table);
        core::mem::swap(&mut self.hash_builder, &mut other.hash_builder);
    }

    /// Deep-copies the map into one backed by `alloc`.
    pub fn clone_in(&self, alloc: A) -> Self
    where
        K: Clone,
        V: Clone,
        S: Clone,
    {
        Self {
            table: self.table.clone_in(alloc),
            hash_builder: self.hash_builder.clone(),
        }
    }

    /// Probe-length distribution of the entries.
    #[cfg(any(test, feature = "stats"))]
    pub fn probe_histogram(&self) -> hash_table::ProbeHistogram {
        self.table.probe_histogram()
    }

    /// Occupancy and memory statistics of the underlying table.
    #[cfg(any(test, feature = "stats"))]
    pub fn debug_stats(&self) -> hash_table::DebugStats {
        self.table.debug_stats()
    }
}

impl<K, V, S, A> HashMap<K, V, S, A>
where
    K: Hash + Eq,
    S: BuildHasher,
    A: Allocator,
{
    /// Inserts `key` with `value` unless the key is already present.
    ///
    /// Returns a reference to the value stored under `key` and whether a new
    /// entry was created. An existing value is left untouched and `value` is
    /// dropped.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use open_hash::HashMap;
    /// let mut map: HashMap<i32, &str> = HashMap::new();
    /// assert_eq!(map.insert(37, "a"), (&mut "a", true));
    /// assert_eq!(map.insert(37, "b"), (&mut "a", false));
    /// assert_eq!(map.get(&37), Some(&"a"));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> (&mut V, bool) {
        self.emplace(key, || value)
    }

    /// Inserts `key` with the value built by `make` unless the key is already
    /// present. `make` only runs when a new entry is created.
    pub fn emplace(&mut self, key: K, make: impl FnOnce() -> V) -> (&mut V, bool) {
        let hash = make_hash(&self.hash_builder, &key);
        match self.table.entry(hash, equivalent_key(&key)) {
            TableEntry::Occupied(entry) => (&mut entry.into_mut().1, false),
            TableEntry::Vacant(entry) => (&mut entry.insert((key, make())).1, true),
        }
    }

    /// Inserts `key` with `value`, overwriting any existing value.
    ///
    /// Returns the previous value, if any. The stored key is not replaced.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use open_hash::HashMap;
    /// let mut map: HashMap<i32, &str> = HashMap::new();
    /// assert_eq!(map.insert_or_assign(37, "a"), None);
    /// assert_eq!(map.insert_or_assign(37, "b"), Some("a"));
    /// assert_eq!(map.get(&37), Some(&"b"));
    /// ```
    pub fn insert_or_assign(&mut self, key: K, value: V) -> Option<V> {
        let hash = make_hash(&self.hash_builder, &key);
        match self.table.entry(hash, equivalent_key(&key)) {
            TableEntry::Occupied(entry) => {
                Some(core::mem::replace(&mut entry.into_mut().1, value))
            }
            TableEntry::Vacant(entry) => {
                entry.insert((key, value));
                None
            }
        }
    }

    /// Returns a mutable reference to the value under `key`, inserting
    /// `V::default()` first if the key is missing.
    ///
    /// **This inserts on a miss.** A mistyped key silently creates a new
    /// entry rather than failing; use [`get_mut`](HashMap::get_mut) when the
    /// key is expected to exist.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use open_hash::HashMap;
    /// let mut counts: HashMap<&str, u32> = HashMap::new();
    /// *counts.get_or_insert_default("apple") += 1;
    /// *counts.get_or_insert_default("apple") += 1;
    /// assert_eq!(counts.get("apple"), Some(&2));
    ///
    /// // Reading through it still creates the entry.
    /// assert_eq!(*counts.get_or_insert_default("aple"), 0);
    /// assert_eq!(counts.len(), 2);
    /// ```
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.emplace(key, V::default).0
    }

    /// Returns a reference to the value under `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use open_hash::HashMap;
    /// let mut map: HashMap<String, i32> = HashMap::new();
    /// map.insert("one".to_string(), 1);
    /// assert_eq!(map.get("one"), Some(&1));
    /// assert_eq!(map.get("two"), None);
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).map(|(_, v)| v)
    }

    /// Returns the stored key and value for `key`.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = make_hash(&self.hash_builder, key);
        self.table
            .find(hash, equivalent_key(key))
            .map(|(k, v)| (k, v))
    }

    /// Returns a mutable reference to the value under `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = make_hash(&self.hash_builder, key);
        self.table
            .find_mut(hash, equivalent_key(key))
            .map(|(_, v)| v)
    }

    /// Returns `true` if the map contains `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Removes `key` and returns how many entries were removed (zero or one).
    pub fn erase<Q>(&mut self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = make_hash(&self.hash_builder, key);
        self.table.erase(hash, equivalent_key(key))
    }

    /// Removes `key` and returns its value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Removes `key` and returns the stored key and value.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = make_hash(&self.hash_builder, key);
        self.table.remove(hash, equivalent_key(key))
    }

    /// Returns a handle to the slot holding `key`.
    ///
    /// The handle stays valid until the map grows, is cleared, or the entry
    /// is removed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use open_hash::HashMap;
    /// let mut map: HashMap<&str, i32> = HashMap::new();
    /// map.insert("k", 1);
    /// let bucket = map.bucket("k").unwrap();
    /// assert_eq!(map.bucket_entry(bucket), (&"k", &1));
    /// assert_eq!(map.erase_bucket(bucket), ("k", 1));
    /// assert!(map.is_empty());
    /// ```
    pub fn bucket<Q>(&self, key: &Q) -> Option<Bucket>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = make_hash(&self.hash_builder, key);
        self.table.find_bucket(hash, equivalent_key(key))
    }

    /// Reads the entry behind a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not refer to a live entry of this map.
    pub fn bucket_entry(&self, bucket: Bucket) -> (&K, &V) {
        let (k, v) = self.table.get(bucket);
        (k, v)
    }

    /// Removes the entry behind a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not refer to a live entry of this map.
    pub fn erase_bucket(&mut self, bucket: Bucket) -> (K, V) {
        self.table.remove_bucket(bucket)
    }

    /// Gets the entry for `key` for in-place manipulation.
    ///
    /// The map grows first if it is at its load limit, so this may
    /// invalidate bucket handles even when the key is present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use open_hash::HashMap;
    /// let mut map: HashMap<&str, u32> = HashMap::new();
    /// for word in ["a", "b", "a"] {
    ///     map.entry(word).and_modify(|n| *n += 1).or_insert(1);
    /// }
    /// assert_eq!(map.get("a"), Some(&2));
    /// assert_eq!(map.get("b"), Some(&1));
    /// ```
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V, A> {
        let hash = make_hash(&self.hash_builder, &key);
        match self.table.entry(hash, equivalent_key(&key)) {
            TableEntry::Occupied(entry) => Entry::Occupied(OccupiedEntry { entry }),
            TableEntry::Vacant(entry) => Entry::Vacant(VacantEntry { entry, key }),
        }
    }
}

impl<K, V, S, A> Default for HashMap<K, V, S, A>
where
    S: Default,
    A: Allocator + Default,
{
    fn default() -> Self {
        Self::with_hasher_in(S::default(), A::default())
    }
}

impl<K, V, S, A> Extend<(K, V)> for HashMap<K, V, S, A>
where
    K: Hash + Eq,
    S: BuildHasher,
    A: Allocator,
{
    /// Inserts every pair, overwriting values of keys already present.
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        self.reserve(lower);
        for (k, v) in iter {
            self.insert_or_assign(k, v);
        }
    }
}

impl<K, V, S, A> FromIterator<(K, V)> for HashMap<K, V, S, A>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
    A: Allocator + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}

impl<'a, K, V, S, A: Allocator> IntoIterator for &'a HashMap<K, V, S, A> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S, A: Allocator> IntoIterator for &'a mut HashMap<K, V, S, A> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K, V, S, A: Allocator> IntoIterator for HashMap<K, V, S, A> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V, A>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: self.table.into_iter(),
        }
    }
}

/// A view into a single entry in the map, which may either be vacant or
/// occupied.
///
/// This enum is constructed from the [`entry`] method on [`HashMap`].
///
/// [`entry`]: HashMap::entry
pub enum Entry<'a, K, V, A: Allocator = Heap> {
    /// A vacant entry.
    Vacant(VacantEntry<'a, K, V, A>),
    /// An occupied entry.
    Occupied(OccupiedEntry<'a, K, V, A>),
}

impl<'a, K, V, A: Allocator> Entry<'a, K, V, A> {
    /// Inserts `default` if the entry is vacant and returns a mutable
    /// reference to the value.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts the result of `default` if the entry is vacant.
    pub fn or_insert_with<F>(self, default: F) -> &'a mut V
    where
        F: FnOnce() -> V,
    {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Provides in-place mutable access to an occupied entry before any
    /// potential inserts.
    pub fn and_modify<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut V),
    {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
            Entry::Vacant(entry) => Entry::Vacant(entry),
        }
    }

    /// Returns a reference to this entry's key.
    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(entry) => entry.key(),
            Entry::Vacant(entry) => entry.key(),
        }
    }
}

impl<'a, K, V, A> Entry<'a, K, V, A>
where
    V: Default,
    A: Allocator,
{
    /// Inserts the default value if the entry is vacant.
    pub fn or_default(self) -> &'a mut V {
        self.or_insert_with(Default::default)
    }
}

/// A view into a vacant entry in the map.
pub struct VacantEntry<'a, K, V, A: Allocator = Heap> {
    entry: hash_table::VacantEntry<'a, (K, V), A>,
    key: K,
}

impl<'a, K, V, A: Allocator> VacantEntry<'a, K, V, A> {
    /// Gets a reference to the key that would be used when inserting.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Take ownership of the key.
    pub fn into_key(self) -> K {
        self.key
    }

    /// Inserts the value and returns a mutable reference to it.
    pub fn insert(self, value: V) -> &'a mut V {
        &mut self.entry.insert((self.key, value)).1
    }
}

/// A view into an occupied entry in the map.
pub struct OccupiedEntry<'a, K, V, A: Allocator = Heap> {
    entry: hash_table::OccupiedEntry<'a, (K, V), A>,
}

impl<'a, K, V, A: Allocator> OccupiedEntry<'a, K, V, A> {
    /// Gets a reference to the key in the entry.
    pub fn key(&self) -> &K {
        &self.entry.get().0
    }

    /// Gets a reference to the value in the entry.
    pub fn get(&self) -> &V {
        &self.entry.get().1
    }

    /// Gets a mutable reference to the value in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        &mut self.entry.get_mut().1
    }

    /// Converts the entry into a mutable reference to the value.
    pub fn into_mut(self) -> &'a mut V {
        &mut self.entry.into_mut().1
    }

    /// Replaces the value and returns the old one.
    pub fn insert(&mut self, value: V) -> V {
        core::mem::replace(&mut self.entry.get_mut().1, value)
    }

    /// Removes the entry from the map and returns the value.
    pub fn remove(self) -> V {
        self.entry.remove().1
    }

    /// Removes the entry from the map and returns the key and value.
    pub fn remove_entry(self) -> (K, V) {
        self.entry.remove()
    }
}

/// An iterator over the key-value pairs of a `HashMap`.
pub struct Iter<'a, K, V, A: Allocator = Heap> {
    inner: hash_table::Iter<'a, (K, V), A>,
}

impl<K, V, A: Allocator> Clone for Iter<'_, K, V, A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V, A: Allocator> Iterator for Iter<'a, K, V, A> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, A: Allocator> ExactSizeIterator for Iter<'_, K, V, A> {}

/// A mutable iterator over the entries of a `HashMap`.
pub struct IterMut<'a, K, V> {
    inner: hash_table::IterMut<'a, (K, V)>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (&*k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

/// An iterator over the keys of a `HashMap`.
pub struct Keys<'a, K, V, A: Allocator = Heap> {
    inner: Iter<'a, K, V, A>,
}

impl<'a, K, V, A: Allocator> Iterator for Keys<'a, K, V, A> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, A: Allocator> ExactSizeIterator for Keys<'_, K, V, A> {}

/// An iterator over the values of a `HashMap`.
pub struct Values<'a, K, V, A: Allocator = Heap> {
    inner: Iter<'a, K, V, A>,
}

impl<'a, K, V, A: Allocator> Iterator for Values<'a, K, V, A> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, A: Allocator> ExactSizeIterator for Values<'_, K, V, A> {}

/// A mutable iterator over the values of a `HashMap`.
pub struct ValuesMut<'a, K, V> {
    inner: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}

/// A draining iterator over the entries of a `HashMap`.
pub struct Drain<'a, K, V, A: Allocator = Heap> {
    inner: hash_table::Drain<'a, (K, V), A>,
}

impl<K, V, A: Allocator> Iterator for Drain<'_, K, V, A> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, A: Allocator> ExactSizeIterator for Drain<'_, K, V, A> {}

/// An owning iterator over the entries of a `HashMap`.
pub struct IntoIter<K, V, A: Allocator = Heap> {
    inner: hash_table::IntoIter<(K, V), A>,
}

impl<K, V, A: Allocator> Iterator for IntoIter<K, V, A> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, A: Allocator> ExactSizeIterator for IntoIter<K, V, A> {}
