use core::alloc::Layout;
use core::fmt::Debug;
use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::mem::needs_drop;
use core::ptr::NonNull;

use crate::algorithm::Cursor;
use crate::allocator::Allocator;
use crate::allocator::Heap;
use crate::error::Fallibility;
use crate::error::TryReserveError;
use crate::lifetime;

/// Slot tag of a slot that has never held a value since the last clear.
const UNUSED: u32 = 0xFFFF_FFFF;

/// Slot tag of a removed value. Probing continues past it.
const DELETED: u32 = 0xFFFF_FFFE;

/// Applied to every caller hash so it can never equal `UNUSED` or `DELETED`.
const HASH_MASK: u32 = 0xFFFF_FFFD;

/// Bucket count of the first allocation.
pub const INITIAL_CAPACITY: usize = 64;

#[inline(always)]
fn mask_hash(hash: u32) -> u32 {
    hash & HASH_MASK
}

#[inline(always)]
fn is_occupied(tag: u32) -> bool {
    tag < DELETED
}

/// The table never lets used (occupied + deleted) slots reach 7/8 of the
/// bucket count.
#[inline(always)]
fn exceeds_load(num_used: usize, buckets: usize) -> bool {
    num_used as u128 * 8 >= buckets as u128 * 7
}

#[inline(always)]
fn nodes_layout<V>(buckets: usize) -> Option<Layout> {
    Layout::array::<Node<V>>(buckets).ok()
}

#[repr(C)]
struct Node<V> {
    hash: u32,
    data: MaybeUninit<V>,
}

/// Finds the first unused slot on the probe sequence of `hash`.
///
/// # Safety
/// `nodes` must point to `mask + 1` nodes with initialized tags, at least one
/// of which is `UNUSED`.
#[inline]
unsafe fn probe_unused<V>(nodes: NonNull<Node<V>>, mask: usize, hash: u32) -> usize {
    let mut index = hash as usize & mask;
    let mut probes = 0;
    // SAFETY: `index` is always masked into bounds, and an unused slot exists.
    unsafe {
        while (*nodes.as_ptr().add(index)).hash != UNUSED {
            probes += 1;
            index = (index + probes) & mask;
        }
    }
    index
}

/// Allocates `buckets` nodes and tags every one `UNUSED`.
fn allocate_nodes<V, A: Allocator>(
    alloc: &A,
    buckets: usize,
    fallibility: Fallibility,
) -> Result<NonNull<Node<V>>, TryReserveError> {
    assert!(
        buckets.is_power_of_two(),
        "bucket count must be a power of two"
    );
    let Some(layout) = nodes_layout::<V>(buckets) else {
        return Err(fallibility.capacity_overflow());
    };
    let nodes = match alloc.allocate(layout) {
        Ok(ptr) => ptr.cast::<Node<V>>(),
        Err(_) => return Err(fallibility.alloc_err(layout)),
    };

    for i in 0..buckets {
        // SAFETY: `i < buckets` and the block holds `buckets` nodes. Only the
        // tag is written; payloads stay uninitialized.
        unsafe {
            core::ptr::addr_of_mut!((*nodes.as_ptr().add(i)).hash).write(UNUSED);
        }
    }

    Ok(nodes)
}

/// Distribution of probe counts across occupied slots.
///
/// Index `n` holds the number of entries found after `n` probe steps; index 0
/// counts entries sitting in their home slot.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeHistogram {
    /// Entry counts per probe length.
    pub counts: alloc::vec::Vec<usize>,
}

#[cfg(any(test, feature = "stats"))]
impl ProbeHistogram {
    /// Longest probe sequence of any entry.
    pub fn max_probe(&self) -> usize {
        self.counts.len().saturating_sub(1)
    }

    /// Number of entries the histogram covers.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Mean probe count across entries.
    pub fn mean(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let weighted: usize = self.counts.iter().enumerate().map(|(n, c)| n * c).sum();
        weighted as f64 / total as f64
    }

    /// Pretty-prints the histogram as a horizontal bar chart on stdout.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        let max = self.counts.iter().copied().max().unwrap_or(0);
        if max == 0 {
            println!("probe histogram: empty");
            return;
        }

        let max_bar = 60usize;
        let total_units = max_bar * 8;
        println!("probe histogram ({} entries):", self.total());

        let make_bar = |count: usize| -> alloc::string::String {
            if count == 0 {
                return alloc::string::String::new();
            }
            let units = ((count as u128 * total_units as u128).div_ceil(max as u128)) as usize;
            let mut bar = "█".repeat(units / 8);
            let partial = ['▏', '▎', '▍', '▌', '▋', '▊', '▉'];
            if units % 8 > 0 {
                bar.push(partial[units % 8 - 1]);
            }
            bar
        };

        for (probes, &count) in self.counts.iter().enumerate() {
            println!("{:>3} | {} ({})", probes, make_bar(count), count);
        }
    }
}

/// Table occupancy statistics.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of live entries.
    pub populated: usize,
    /// Number of deleted slots still counted against the load factor.
    pub tombstones: usize,
    /// Total slots allocated.
    pub bucket_count: usize,
    /// Entries the table can hold before it grows.
    pub capacity: usize,
    /// Live entries over bucket count.
    pub load_factor: f64,
    /// Live plus deleted slots over bucket count.
    pub used_factor: f64,
    /// Longest probe sequence of any entry.
    pub max_probe: usize,
    /// Bytes of slot storage.
    pub total_bytes: usize,
    /// Bytes held by unused and deleted slots.
    pub wasted_bytes: usize,
}

#[cfg(any(test, feature = "stats"))]
impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Hash Table Debug Statistics ===");
        println!(
            "Population: {}/{} ({:.2}% load factor)",
            self.populated,
            self.bucket_count,
            self.load_factor * 100.0
        );
        println!(
            "Used slots: {} ({} tombstones, {:.2}% of buckets)",
            self.populated + self.tombstones,
            self.tombstones,
            self.used_factor * 100.0
        );
        println!("Capacity before growth: {}", self.capacity);
        println!("Longest probe: {}", self.max_probe);
        println!("Total Allocated: {} bytes", self.total_bytes);
        println!(
            "Memory: {} bytes wasted ({:.02}%)",
            self.wasted_bytes,
            if self.total_bytes == 0 {
                0.0
            } else {
                (self.wasted_bytes as f64 / self.total_bytes as f64) * 100.0
            }
        );
    }
}

/// A handle to an occupied slot.
///
/// Handles are plain values: they stay valid until the table reallocates,
/// is cleared, or the slot is removed. Passing a stale handle or a handle
/// from another table to [`HashTable::get`] and friends panics when the
/// slot is no longer occupied, and is caught by a debug assertion otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    index: usize,
    origin: usize,
}

impl Bucket {
    /// Slot index of this handle in the table's storage.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// An open-addressing hash table with tombstone deletion.
///
/// `HashTable<V>` stores values of type `V` in a flat, power-of-two sized
/// array of slots. Like other raw tables, it does not know how to hash or
/// compare its values: every operation takes the value's 32-bit hash and an
/// equality predicate.
///
/// Collisions are resolved with triangular probing (`i, i+1, i+3, i+6, ...`
/// modulo the bucket count), which visits every slot of a power-of-two
/// table. Removal leaves a tombstone so that probe chains passing through the
/// slot stay intact; tombstones are reused by later inserts and discarded
/// when the table grows.
///
/// ## Performance Characteristics
///
/// - **Memory**: `size_of::<V>()` plus a `u32` tag per slot, rounded up to
///   `V`'s alignment. At most 7/8 of the slots are in use.
///
/// ## Example
///
/// ```rust
/// # use core::hash::Hash;
/// # use core::hash::Hasher;
/// #
/// # use open_hash::hash_table::Entry;
/// # use open_hash::hash_table::HashTable;
/// # use siphasher::sip::SipHasher;
/// #
/// # #[derive(Debug, PartialEq)]
/// # struct Person {
/// #     id: u64,
/// #     name: String,
/// # }
/// #
/// # fn hash_id(id: u64) -> u32 {
/// #     let mut hasher = SipHasher::new();
/// #     id.hash(&mut hasher);
/// #     hasher.finish() as u32
/// # }
///
/// let mut table = HashTable::new();
/// let hash = hash_id(123);
///
/// match table.entry(hash, |p: &Person| p.id == 123) {
///     Entry::Vacant(entry) => {
///         entry.insert(Person {
///             id: 123,
///             name: "Alice".to_string(),
///         });
///     }
///     Entry::Occupied(_) => {
///         println!("Person already exists");
///     }
/// }
///
/// assert_eq!(table.find(hash, |p| p.id == 123).unwrap().name, "Alice");
/// ```
pub struct HashTable<V, A: Allocator = Heap> {
    nodes: NonNull<Node<V>>,
    capacity: usize,
    capacity_mask: usize,
    size: usize,
    num_used: usize,
    alloc: A,
    _phantom: PhantomData<V>,
}

// SAFETY: The table owns its values; sharing or sending it is exactly as safe
// as sharing or sending the values and the allocator.
unsafe impl<V: Send, A: Allocator + Send> Send for HashTable<V, A> {}
// SAFETY: See above.
unsafe impl<V: Sync, A: Allocator + Sync> Sync for HashTable<V, A> {}

struct Slots<'a, V, A: Allocator>(&'a HashTable<V, A>);

impl<V: Debug, A: Allocator> Debug for Slots<'_, V, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut list = f.debug_list();
        for index in 0..self.0.capacity {
            let node = self.0.node(index);
            match node.hash {
                UNUSED => list.entry(&format_args!("..")),
                DELETED => list.entry(&format_args!("xx")),
                hash => {
                    // SAFETY: The tag says occupied.
                    let value = unsafe { node.data.assume_init_ref() };
                    list.entry(&format_args!("{hash:08x}: {value:?}"))
                }
            };
        }
        list.finish()
    }
}

impl<V: Debug, A: Allocator> Debug for HashTable<V, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HashTable")
            .field("len", &self.size)
            .field("bucket_count", &self.capacity)
            .field("nonempty_bucket_count", &self.num_used)
            .field("slots", &Slots(self))
            .finish()
    }
}

impl<V, A: Allocator + Default> Default for HashTable<V, A> {
    fn default() -> Self {
        Self::new_in(A::default())
    }
}

impl<V, A> Clone for HashTable<V, A>
where
    V: Clone,
    A: Allocator + Default,
{
    /// Deep-copies every entry into a table using a fresh `A::default()`.
    /// The source's allocator is not copied.
    fn clone(&self) -> Self {
        self.clone_in(A::default())
    }

    /// Replaces the contents of `self` with copies of `source`'s entries.
    ///
    /// `self` keeps its own allocator, and keeps its storage when it already
    /// has at least as many buckets as `source`.
    fn clone_from(&mut self, source: &Self) {
        if core::ptr::eq(self, source) {
            return;
        }

        self.clear();
        if self.capacity < source.capacity {
            self.free_nodes();
            let nodes = allocate_nodes(&self.alloc, source.capacity, Fallibility::Abort);
            if let Ok(nodes) = nodes {
                self.nodes = nodes;
                self.capacity = source.capacity;
                self.capacity_mask = source.capacity - 1;
            }
        }
        self.copy_entries_from(source);
    }
}

impl<V, A: Allocator> Drop for HashTable<V, A> {
    fn drop(&mut self) {
        self.drop_values();
        self.free_nodes();
    }
}

impl<V> HashTable<V, Heap> {
    /// Creates an empty table. No memory is allocated until the first
    /// insertion.
    pub const fn new() -> Self {
        Self::new_in(Heap)
    }

    /// Creates an empty table that can hold at least `capacity` values
    /// without growing.
    ///
    /// ```rust
    /// # use open_hash::hash_table::HashTable;
    /// let table: HashTable<u64> = HashTable::with_capacity(100);
    /// assert!(table.capacity() >= 100);
    /// assert!(table.bucket_count().is_power_of_two());
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_in(capacity, Heap)
    }

    /// Creates an empty table with room for at least `buckets` slots.
    ///
    /// The bucket count starts at [`INITIAL_CAPACITY`] and doubles until it
    /// reaches `buckets`. A hint of zero allocates nothing.
    pub fn with_bucket_count(buckets: usize) -> Self {
        Self::with_bucket_count_in(buckets, Heap)
    }
}

impl<V, A: Allocator> HashTable<V, A> {
    /// Creates an empty table that allocates from `alloc`.
    pub const fn new_in(alloc: A) -> Self {
        Self {
            nodes: NonNull::dangling(),
            capacity: 0,
            capacity_mask: 0,
            size: 0,
            num_used: 0,
            alloc,
            _phantom: PhantomData,
        }
    }

    /// [`with_capacity`](HashTable::with_capacity) with an explicit
    /// allocator.
    pub fn with_capacity_in(capacity: usize, alloc: A) -> Self {
        let mut table = Self::new_in(alloc);
        table.reserve(capacity);
        table
    }

    /// [`with_bucket_count`](HashTable::with_bucket_count) with an explicit
    /// allocator.
    pub fn with_bucket_count_in(buckets: usize, alloc: A) -> Self {
        let mut table = Self::new_in(alloc);
        if buckets > 0 {
            table.reserve_buckets(buckets);
        }
        table
    }

    /// The allocator backing this table.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    #[inline(always)]
    fn node(&self, index: usize) -> &Node<V> {
        debug_assert!(index < self.capacity);
        // SAFETY: Callers only pass indices below `capacity`, and every node
        // of a live allocation has an initialized tag.
        unsafe { &*self.nodes.as_ptr().add(index) }
    }

    #[inline(always)]
    fn node_mut(&mut self, index: usize) -> &mut Node<V> {
        debug_assert!(index < self.capacity);
        // SAFETY: As in `node`, and `&mut self` guarantees exclusivity.
        unsafe { &mut *self.nodes.as_ptr().add(index) }
    }

    #[inline(always)]
    fn origin(&self) -> usize {
        self.nodes.as_ptr() as usize
    }

    #[inline(always)]
    fn bucket_at(&self, index: usize) -> Bucket {
        Bucket {
            index,
            origin: self.origin(),
        }
    }

    fn check_bucket(&self, bucket: Bucket) {
        debug_assert!(
            bucket.origin == self.origin(),
            "bucket handle belongs to another table or a previous allocation"
        );
        assert!(
            bucket.index < self.capacity && is_occupied(self.node(bucket.index).hash),
            "bucket handle does not refer to an occupied slot"
        );
    }

    /// Read-only probe: index of the slot holding the matching value.
    fn lookup(&self, hash: u32, eq: impl Fn(&V) -> bool) -> Option<usize> {
        if self.size == 0 {
            return None;
        }

        debug_assert!(self.num_used < self.capacity);

        let hash = mask_hash(hash);
        let mut index = hash as usize & self.capacity_mask;
        let mut probes = 0;
        loop {
            debug_assert!(probes < self.capacity, "probe sequence has no unused slot");
            let node = self.node(index);
            if node.hash == UNUSED {
                return None;
            }
            // SAFETY: Equal tags below `DELETED` mean the slot is occupied.
            if node.hash == hash && eq(unsafe { node.data.assume_init_ref() }) {
                return Some(index);
            }
            probes += 1;
            index = (index + probes) & self.capacity_mask;
        }
    }

    /// Probe for insertion: the matching slot if the value is present,
    /// otherwise the first tombstone on the probe sequence, otherwise the
    /// unused slot that ended it.
    ///
    /// Requires at least one unused slot.
    fn find_for_insert(&self, hash: u32, eq: impl Fn(&V) -> bool) -> usize {
        debug_assert!(self.num_used < self.capacity);

        let mut index = hash as usize & self.capacity_mask;
        let home = self.node(index);
        // SAFETY: Tag matches an occupied hash.
        if home.hash == hash && eq(unsafe { home.data.assume_init_ref() }) {
            return index;
        }

        let mut reusable = None;
        let mut probes = 0;
        loop {
            debug_assert!(probes < self.capacity, "probe sequence has no unused slot");
            let node = self.node(index);
            match node.hash {
                UNUSED => return reusable.unwrap_or(index),
                DELETED => {
                    reusable.get_or_insert(index);
                }
                // SAFETY: Tag matches an occupied hash.
                tag if tag == hash && eq(unsafe { node.data.assume_init_ref() }) => {
                    return index;
                }
                _ => {}
            }
            probes += 1;
            index = (index + probes) & self.capacity_mask;
        }
    }

    /// Grows ahead of an insertion that may consume an unused slot.
    fn reserve_for_insert(&mut self) {
        if exceeds_load(self.num_used, self.capacity) {
            self.grow();
        }
    }

    fn grow(&mut self) {
        let buckets = if self.capacity == 0 {
            INITIAL_CAPACITY
        } else {
            match self.capacity.checked_mul(2) {
                Some(buckets) => buckets,
                None => {
                    let _ = Fallibility::Abort.capacity_overflow();
                    return;
                }
            }
        };
        let _ = self.resize_rehash(buckets, Fallibility::Abort);
    }

    /// Moves every live value into a fresh array of `buckets` slots and drops
    /// the tombstones.
    fn resize_rehash(
        &mut self,
        buckets: usize,
        fallibility: Fallibility,
    ) -> Result<(), TryReserveError> {
        debug_assert!(!exceeds_load(self.size, buckets) || self.size == 0);
        let new_nodes = allocate_nodes::<V, A>(&self.alloc, buckets, fallibility)?;
        let new_mask = buckets - 1;

        for index in 0..self.capacity {
            let node = self.node(index);
            if !is_occupied(node.hash) {
                continue;
            }
            // SAFETY: The fresh array has unused slots to spare. The payload
            // is relocated bitwise and the old copy is never touched again.
            unsafe {
                let target = probe_unused(new_nodes, new_mask, node.hash);
                let dst = new_nodes.as_ptr().add(target);
                lifetime::move_construct_n(node.data.as_ptr(), 1, (*dst).data.as_mut_ptr());
                (*dst).hash = node.hash;
            }
        }

        self.free_nodes();
        self.nodes = new_nodes;
        self.capacity = buckets;
        self.capacity_mask = new_mask;
        self.num_used = self.size;
        Ok(())
    }

    /// Drops every live value, leaving tags untouched.
    fn drop_values(&mut self) {
        if !needs_drop::<V>() || self.size == 0 {
            return;
        }
        for index in 0..self.capacity {
            let node = self.node_mut(index);
            if is_occupied(node.hash) {
                // SAFETY: Occupied slots hold live values.
                unsafe { lifetime::destruct(node.data.as_mut_ptr()) };
            }
        }
    }

    /// Releases the slot array without touching values or counters.
    fn free_nodes(&mut self) {
        if self.capacity == 0 {
            return;
        }
        if let Some(layout) = nodes_layout::<V>(self.capacity) {
            // SAFETY: The array was allocated from `self.alloc` with this
            // layout.
            unsafe { self.alloc.deallocate(self.nodes.cast(), layout) };
        }
        self.nodes = NonNull::dangling();
        self.capacity = 0;
        self.capacity_mask = 0;
    }

    /// Returns the value matching `hash` and `eq`, if present.
    ///
    /// ```rust
    /// # use open_hash::hash_table::HashTable;
    /// let mut table = HashTable::new();
    /// table.entry(7, |v: &(u32, &str)| v.0 == 7).or_insert((7, "seven"));
    /// assert_eq!(table.find(7, |v| v.0 == 7), Some(&(7, "seven")));
    /// assert_eq!(table.find(8, |v| v.0 == 8), None);
    /// ```
    pub fn find(&self, hash: u32, eq: impl Fn(&V) -> bool) -> Option<&V> {
        let index = self.lookup(hash, eq)?;
        // SAFETY: `lookup` only returns occupied slots.
        Some(unsafe { self.node(index).data.assume_init_ref() })
    }

    /// Returns a mutable reference to the value matching `hash` and `eq`.
    pub fn find_mut(&mut self, hash: u32, eq: impl Fn(&V) -> bool) -> Option<&mut V> {
        let index = self.lookup(hash, eq)?;
        // SAFETY: `lookup` only returns occupied slots.
        Some(unsafe { self.node_mut(index).data.assume_init_mut() })
    }

    /// Returns a handle to the slot holding the matching value.
    pub fn find_bucket(&self, hash: u32, eq: impl Fn(&V) -> bool) -> Option<Bucket> {
        self.lookup(hash, eq).map(|index| self.bucket_at(index))
    }

    /// Reads the value behind a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not refer to an occupied slot of this table.
    pub fn get(&self, bucket: Bucket) -> &V {
        self.check_bucket(bucket);
        // SAFETY: Checked occupied.
        unsafe { self.node(bucket.index).data.assume_init_ref() }
    }

    /// Mutable access to the value behind a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not refer to an occupied slot of this table.
    pub fn get_mut(&mut self, bucket: Bucket) -> &mut V {
        self.check_bucket(bucket);
        // SAFETY: Checked occupied.
        unsafe { self.node_mut(bucket.index).data.assume_init_mut() }
    }

    /// Looks up the slot for a value, growing first if the table is at its
    /// load limit. Any previously obtained handles are invalidated by the
    /// growth.
    ///
    /// ```rust
    /// # use open_hash::hash_table::HashTable;
    /// let mut table = HashTable::new();
    /// *table.entry(3, |v: &(u32, u32)| v.0 == 3).or_insert((3, 0)) = (3, 1);
    /// table
    ///     .entry(3, |v: &(u32, u32)| v.0 == 3)
    ///     .and_modify(|v| v.1 += 1);
    /// assert_eq!(table.find(3, |v| v.0 == 3), Some(&(3, 2)));
    /// ```
    pub fn entry(&mut self, hash: u32, eq: impl Fn(&V) -> bool) -> Entry<'_, V, A> {
        self.reserve_for_insert();
        let hash = mask_hash(hash);
        let index = self.find_for_insert(hash, eq);
        if is_occupied(self.node(index).hash) {
            Entry::Occupied(OccupiedEntry { table: self, index })
        } else {
            Entry::Vacant(VacantEntry {
                table: self,
                index,
                hash,
            })
        }
    }

    /// Inserts the value built by `make` unless a matching value exists.
    ///
    /// Returns the slot handle and whether a new value was inserted. `make`
    /// only runs on insertion; an existing value is never overwritten.
    pub fn emplace(
        &mut self,
        hash: u32,
        eq: impl Fn(&V) -> bool,
        make: impl FnOnce() -> V,
    ) -> (Bucket, bool) {
        match self.entry(hash, eq) {
            Entry::Occupied(entry) => (entry.bucket(), false),
            Entry::Vacant(entry) => {
                let index = entry.index;
                let table = entry.insert_slot(make());
                (table.bucket_at(index), true)
            }
        }
    }

    /// Removes and returns the matching value.
    pub fn remove(&mut self, hash: u32, eq: impl Fn(&V) -> bool) -> Option<V> {
        let index = self.lookup(hash, eq)?;
        // SAFETY: `lookup` only returns occupied slots.
        Some(unsafe { self.take(index) })
    }

    /// Removes the matching value and returns how many values were removed
    /// (zero or one).
    pub fn erase(&mut self, hash: u32, eq: impl Fn(&V) -> bool) -> usize {
        match self.lookup(hash, eq) {
            Some(index) => {
                // SAFETY: `lookup` only returns occupied slots.
                unsafe { self.destroy(index) };
                1
            }
            None => 0,
        }
    }

    /// Removes the value behind a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not refer to an occupied slot of this table.
    pub fn remove_bucket(&mut self, bucket: Bucket) -> V {
        self.check_bucket(bucket);
        // SAFETY: Checked occupied.
        unsafe { self.take(bucket.index) }
    }

    /// Moves the value out of an occupied slot and leaves a tombstone.
    ///
    /// # Safety
    /// `index` must be an occupied slot.
    unsafe fn take(&mut self, index: usize) -> V {
        let node = self.node_mut(index);
        node.hash = DELETED;
        // SAFETY: Caller guarantees the slot was occupied; the tag no longer
        // claims the payload.
        let value = unsafe { node.data.assume_init_read() };
        self.size -= 1;
        value
    }

    /// Drops the value in an occupied slot and leaves a tombstone.
    ///
    /// # Safety
    /// `index` must be an occupied slot.
    unsafe fn destroy(&mut self, index: usize) {
        let node = self.node_mut(index);
        node.hash = DELETED;
        self.size -= 1;
        // SAFETY: Caller guarantees the slot held a live value.
        unsafe { lifetime::destruct(self.node_mut(index).data.as_mut_ptr()) };
    }

    /// Keeps only the values for which `f` returns `true`.
    pub fn retain(&mut self, mut f: impl FnMut(&mut V) -> bool) {
        for index in 0..self.capacity {
            if self.size == 0 {
                break;
            }
            let node = self.node_mut(index);
            if !is_occupied(node.hash) {
                continue;
            }
            // SAFETY: Occupied.
            if !f(unsafe { node.data.assume_init_mut() }) {
                // SAFETY: Occupied.
                unsafe { self.destroy(index) };
            }
        }
    }

    /// Removes every value and resets every slot to unused. The storage is
    /// kept.
    ///
    /// Clearing is the only way slots return to the unused state.
    pub fn clear(&mut self) {
        self.drop_values();
        for index in 0..self.capacity {
            self.node_mut(index).hash = UNUSED;
        }
        self.size = 0;
        self.num_used = 0;
    }

    /// Reserves room for at least `additional` more values.
    ///
    /// # Panics
    ///
    /// Panics if the new bucket count overflows `usize`; allocation failure
    /// goes through [`handle_alloc_error`](alloc::alloc::handle_alloc_error).
    pub fn reserve(&mut self, additional: usize) {
        let _ = self.reserve_inner(additional, Fallibility::Abort);
    }

    /// Fallible version of [`reserve`](HashTable::reserve).
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        self.reserve_inner(additional, Fallibility::Return)
    }

    fn reserve_inner(
        &mut self,
        additional: usize,
        fallibility: Fallibility,
    ) -> Result<(), TryReserveError> {
        if additional == 0 {
            return Ok(());
        }
        let Some(needed) = self.size.checked_add(additional) else {
            return Err(fallibility.capacity_overflow());
        };
        if needed.checked_mul(8).is_none() {
            return Err(fallibility.capacity_overflow());
        }

        let mut buckets = self.capacity.max(INITIAL_CAPACITY);
        while exceeds_load(needed, buckets) {
            match buckets.checked_mul(2) {
                Some(doubled) => buckets = doubled,
                None => return Err(fallibility.capacity_overflow()),
            }
        }

        if buckets > self.capacity {
            self.resize_rehash(buckets, fallibility)?;
        }
        Ok(())
    }

    /// Ensures the table has at least `min_buckets` slots.
    ///
    /// Starting from [`INITIAL_CAPACITY`] (or the current bucket count, if
    /// larger) the count doubles until it reaches `min_buckets`; the table is
    /// reallocated only if that exceeds the current bucket count.
    pub fn reserve_buckets(&mut self, min_buckets: usize) {
        let mut buckets = if self.capacity == 0 {
            INITIAL_CAPACITY
        } else {
            self.capacity
        };
        while buckets < min_buckets {
            match buckets.checked_mul(2) {
                Some(doubled) => buckets = doubled,
                None => {
                    let _ = Fallibility::Abort.capacity_overflow();
                    return;
                }
            }
        }
        if buckets > self.capacity {
            let _ = self.resize_rehash(buckets, Fallibility::Abort);
        }
    }

    /// Shrinks the storage to the smallest power-of-two bucket count that
    /// holds the current values, dropping tombstones. An empty table
    /// releases its storage entirely.
    pub fn shrink_to_fit(&mut self) {
        if self.size == 0 {
            self.free_nodes();
            self.num_used = 0;
            return;
        }

        let mut buckets = INITIAL_CAPACITY;
        while exceeds_load(self.size, buckets) {
            buckets *= 2;
        }
        if buckets < self.capacity || self.num_used > self.size {
            let _ = self.resize_rehash(buckets, Fallibility::Abort);
        }
    }

    /// Exchanges the contents of two tables. Allocators stay in place.
    ///
    /// # Panics
    ///
    /// Panics if the allocators compare unequal, since each table would end
    /// up freeing memory it did not allocate.
    pub fn swap(&mut self, other: &mut Self)
    where
        A: PartialEq,
    {
        assert!(
            self.alloc == other.alloc,
            "swapped tables must use equal allocators"
        );
        core::mem::swap(&mut self.nodes, &mut other.nodes);
        core::mem::swap(&mut self.capacity, &mut other.capacity);
        core::mem::swap(&mut self.capacity_mask, &mut other.capacity_mask);
        core::mem::swap(&mut self.size, &mut other.size);
        core::mem::swap(&mut self.num_used, &mut other.num_used);
    }

    /// Deep-copies the table into a new one backed by `alloc`, keeping the
    /// bucket count.
    pub fn clone_in(&self, alloc: A) -> Self
    where
        V: Clone,
    {
        let mut table = Self::new_in(alloc);
        if self.capacity > 0 {
            if let Ok(nodes) = allocate_nodes(&table.alloc, self.capacity, Fallibility::Abort) {
                table.nodes = nodes;
                table.capacity = self.capacity;
                table.capacity_mask = self.capacity_mask;
            }
        }
        table.copy_entries_from(self);
        table
    }

    /// Clones every value of `source` into this empty table, which must have
    /// at least as many buckets. Tombstones are not carried over.
    fn copy_entries_from(&mut self, source: &Self)
    where
        V: Clone,
    {
        debug_assert!(self.size == 0 && self.num_used == 0);
        debug_assert!(self.capacity >= source.capacity);

        for index in 0..source.capacity {
            let node = source.node(index);
            if !is_occupied(node.hash) {
                continue;
            }
            // SAFETY: `self` has at least as many buckets as `source` and no
            // used slots yet, so unused slots remain. The source slot is
            // occupied.
            unsafe {
                let target = probe_unused(self.nodes, self.capacity_mask, node.hash);
                let dst = self.node_mut(target);
                lifetime::copy_construct(dst.data.as_mut_ptr(), node.data.assume_init_ref());
                dst.hash = node.hash;
            }
            self.size += 1;
            self.num_used += 1;
        }
    }

    /// Cursor at the first occupied slot.
    pub fn begin(&self) -> RawCursor<'_, V, A> {
        let mut cursor = RawCursor {
            table: self,
            index: 0,
        };
        cursor.skip_vacant();
        cursor
    }

    /// Cursor one past the last slot.
    pub fn end(&self) -> RawCursor<'_, V, A> {
        RawCursor {
            table: self,
            index: self.capacity,
        }
    }

    /// Iterates over the values in slot order.
    pub fn iter(&self) -> Iter<'_, V, A> {
        Iter {
            table: self,
            index: 0,
            remaining: self.size,
        }
    }

    /// Iterates over mutable references to the values in slot order.
    pub fn iter_mut(&mut self) -> IterMut<'_, V> {
        IterMut {
            nodes: self.nodes,
            capacity: self.capacity,
            index: 0,
            remaining: self.size,
            _marker: PhantomData,
        }
    }

    /// Removes and yields every value. The table is empty afterwards even
    /// if the iterator is dropped early; its storage is kept.
    ///
    /// ```rust
    /// # use open_hash::hash_table::HashTable;
    /// let mut table = HashTable::new();
    /// for k in 0..4u32 {
    ///     table.entry(k, |v: &u32| *v == k).or_insert(k);
    /// }
    /// let mut drained: Vec<u32> = table.drain().collect();
    /// drained.sort();
    /// assert_eq!(drained, [0, 1, 2, 3]);
    /// assert!(table.is_empty());
    /// assert_eq!(table.nonempty_bucket_count(), 0);
    /// ```
    pub fn drain(&mut self) -> Drain<'_, V, A> {
        Drain {
            table: self,
            index: 0,
        }
    }

    /// Returns `true` if the table holds no values.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Number of slots in the storage array; zero or a power of two.
    pub fn bucket_count(&self) -> usize {
        self.capacity
    }

    /// Number of occupied plus deleted slots. Useful for judging hash
    /// quality and tombstone build-up.
    pub fn nonempty_bucket_count(&self) -> usize {
        self.num_used
    }

    /// Bytes of slot storage currently allocated.
    pub fn used_memory(&self) -> usize {
        self.capacity * core::mem::size_of::<Node<V>>()
    }

    /// Number of values the table can hold before it grows, assuming no
    /// tombstones.
    pub fn capacity(&self) -> usize {
        // Largest used count an insertion may reach before `exceeds_load`
        // triggers growth: ceil(7/8 * buckets).
        self.capacity - self.capacity / 8
    }

    /// Probe count of every live value.
    #[cfg(any(test, feature = "stats"))]
    pub fn probe_histogram(&self) -> ProbeHistogram {
        let mut counts = alloc::vec::Vec::new();
        for index in 0..self.capacity {
            let hash = self.node(index).hash;
            if !is_occupied(hash) {
                continue;
            }
            let mut slot = hash as usize & self.capacity_mask;
            let mut probes = 0;
            while slot != index && probes <= self.capacity {
                probes += 1;
                slot = (slot + probes) & self.capacity_mask;
            }
            if counts.len() <= probes {
                counts.resize(probes + 1, 0);
            }
            counts[probes] += 1;
        }
        ProbeHistogram { counts }
    }

    /// Returns occupancy and memory statistics.
    #[cfg(any(test, feature = "stats"))]
    pub fn debug_stats(&self) -> DebugStats {
        let ratio = |n: usize| {
            if self.capacity == 0 {
                0.0
            } else {
                n as f64 / self.capacity as f64
            }
        };
        let node_size = core::mem::size_of::<Node<V>>();
        DebugStats {
            populated: self.size,
            tombstones: self.num_used - self.size,
            bucket_count: self.capacity,
            capacity: self.capacity(),
            load_factor: ratio(self.size),
            used_factor: ratio(self.num_used),
            max_probe: self.probe_histogram().max_probe(),
            total_bytes: self.used_memory(),
            wasted_bytes: (self.capacity - self.size) * node_size,
        }
    }
}

/// A view into a single slot, which is either vacant or occupied.
///
/// This enum is constructed from the [`entry`] method on [`HashTable`].
///
/// [`entry`]: HashTable::entry
///
/// # Examples
///
/// ```rust
/// # use open_hash::hash_table::Entry;
/// # use open_hash::hash_table::HashTable;
/// let mut table = HashTable::new();
///
/// match table.entry(42, |s: &String| s == "key") {
///     Entry::Vacant(entry) => {
///         entry.insert("key".to_string());
///     }
///     Entry::Occupied(entry) => {
///         println!("Key already exists: {}", entry.get());
///     }
/// }
/// assert_eq!(table.len(), 1);
/// ```
pub enum Entry<'a, V, A: Allocator = Heap> {
    /// No matching value; the slot is unused or a tombstone.
    Vacant(VacantEntry<'a, V, A>),
    /// A matching value is present.
    Occupied(OccupiedEntry<'a, V, A>),
}

impl<'a, V, A: Allocator> Entry<'a, V, A> {
    /// Inserts `default` if vacant and returns a mutable reference to the
    /// value.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts the result of `default` if vacant.
    pub fn or_insert_with(self, default: impl FnOnce() -> V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Runs `f` on the value if occupied. Returns `None` for a vacant entry.
    pub fn and_modify(self, f: impl FnOnce(&mut V)) -> Option<&'a mut V> {
        match self {
            Entry::Occupied(entry) => {
                let value = entry.into_mut();
                f(value);
                Some(value)
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Inserts `V::default()` if vacant.
    pub fn or_default(self) -> &'a mut V
    where
        V: Default,
    {
        self.or_insert_with(V::default)
    }
}

/// A vacant slot, ready to receive a value.
pub struct VacantEntry<'a, V, A: Allocator = Heap> {
    table: &'a mut HashTable<V, A>,
    index: usize,
    hash: u32,
}

impl<'a, V, A: Allocator> VacantEntry<'a, V, A> {
    /// Writes the value into the slot and returns the table.
    fn insert_slot(self, value: V) -> &'a mut HashTable<V, A> {
        let table = self.table;
        let node = table.node_mut(self.index);
        let was_unused = node.hash == UNUSED;
        node.data.write(value);
        node.hash = self.hash;
        table.size += 1;
        if was_unused {
            table.num_used += 1;
        }
        table
    }

    /// Inserts `value` and returns a mutable reference to it.
    pub fn insert(self, value: V) -> &'a mut V {
        let index = self.index;
        let table = self.insert_slot(value);
        // SAFETY: Just written.
        unsafe { table.node_mut(index).data.assume_init_mut() }
    }

    /// Returns `true` if the slot is a tombstone that will be reused.
    pub fn reuses_tombstone(&self) -> bool {
        self.table.node(self.index).hash == DELETED
    }
}

/// An occupied slot holding the matching value.
pub struct OccupiedEntry<'a, V, A: Allocator = Heap> {
    table: &'a mut HashTable<V, A>,
    index: usize,
}

impl<'a, V, A: Allocator> OccupiedEntry<'a, V, A> {
    /// Handle to this slot.
    pub fn bucket(&self) -> Bucket {
        self.table.bucket_at(self.index)
    }

    /// Returns a reference to the value.
    pub fn get(&self) -> &V {
        // SAFETY: Occupied entries only exist for occupied slots.
        unsafe { self.table.node(self.index).data.assume_init_ref() }
    }

    /// Returns a mutable reference to the value.
    pub fn get_mut(&mut self) -> &mut V {
        // SAFETY: Occupied entries only exist for occupied slots.
        unsafe { self.table.node_mut(self.index).data.assume_init_mut() }
    }

    /// Converts the entry into a mutable reference tied to the table.
    pub fn into_mut(self) -> &'a mut V {
        // SAFETY: Occupied entries only exist for occupied slots.
        unsafe { self.table.node_mut(self.index).data.assume_init_mut() }
    }

    /// Removes the value, leaving a tombstone.
    pub fn remove(self) -> V {
        // SAFETY: Occupied entries only exist for occupied slots.
        unsafe { self.table.take(self.index) }
    }
}

/// A forward cursor over the occupied slots of a [`HashTable`], in slot
/// order.
///
/// This is the positional interface used by the search algorithms in
/// [`crate::algorithm`]; use [`HashTable::iter`] for ordinary iteration.
pub struct RawCursor<'a, V, A: Allocator = Heap> {
    table: &'a HashTable<V, A>,
    index: usize,
}

impl<V, A: Allocator> RawCursor<'_, V, A> {
    fn skip_vacant(&mut self) {
        while self.index < self.table.capacity && !is_occupied(self.table.node(self.index).hash)
        {
            self.index += 1;
        }
    }

    /// Handle to the current slot, or `None` at the end.
    pub fn bucket(&self) -> Option<Bucket> {
        (self.index < self.table.capacity).then(|| self.table.bucket_at(self.index))
    }

    /// Returns `true` if the cursor is past the last slot.
    pub fn is_end(&self) -> bool {
        self.index >= self.table.capacity
    }
}

impl<V, A: Allocator> Clone for RawCursor<'_, V, A> {
    fn clone(&self) -> Self {
        Self {
            table: self.table,
            index: self.index,
        }
    }
}

impl<V, A: Allocator> PartialEq for RawCursor<'_, V, A> {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.table, other.table) && self.index == other.index
    }
}

impl<V, A: Allocator> Cursor for RawCursor<'_, V, A> {
    type Item = V;

    fn get(&self) -> &V {
        assert!(!self.is_end(), "dereferenced a past-the-end cursor");
        let node = self.table.node(self.index);
        debug_assert!(is_occupied(node.hash));
        // SAFETY: The cursor only rests on occupied slots or the end.
        unsafe { node.data.assume_init_ref() }
    }

    fn step(&mut self) {
        debug_assert!(!self.is_end());
        self.index += 1;
        self.skip_vacant();
    }
}

/// An iterator over the values in a [`HashTable`].
///
/// This struct is created by the [`iter`] method on [`HashTable`].
///
/// [`iter`]: HashTable::iter
pub struct Iter<'a, V, A: Allocator = Heap> {
    table: &'a HashTable<V, A>,
    index: usize,
    remaining: usize,
}

impl<V, A: Allocator> Clone for Iter<'_, V, A> {
    fn clone(&self) -> Self {
        Self {
            table: self.table,
            index: self.index,
            remaining: self.remaining,
        }
    }
}

impl<'a, V, A: Allocator> Iterator for Iter<'a, V, A> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let table: &'a HashTable<V, A> = self.table;
        while self.index < table.capacity {
            let node = table.node(self.index);
            self.index += 1;
            if is_occupied(node.hash) {
                self.remaining -= 1;
                // SAFETY: Occupied.
                return Some(unsafe { node.data.assume_init_ref() });
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V, A: Allocator> ExactSizeIterator for Iter<'_, V, A> {}

impl<'a, V, A: Allocator> IntoIterator for &'a HashTable<V, A> {
    type Item = &'a V;
    type IntoIter = Iter<'a, V, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A mutable iterator over the values in a [`HashTable`].
///
/// This struct is created by the [`iter_mut`] method on [`HashTable`].
///
/// [`iter_mut`]: HashTable::iter_mut
pub struct IterMut<'a, V> {
    nodes: NonNull<Node<V>>,
    capacity: usize,
    index: usize,
    remaining: usize,
    _marker: PhantomData<&'a mut V>,
}

impl<'a, V> Iterator for IterMut<'a, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        while self.index < self.capacity {
            // SAFETY: `index < capacity`; each slot is yielded at most once, so
            // the returned references never alias.
            let node = unsafe { &mut *self.nodes.as_ptr().add(self.index) };
            self.index += 1;
            if is_occupied(node.hash) {
                self.remaining -= 1;
                // SAFETY: Occupied.
                return Some(unsafe { node.data.assume_init_mut() });
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for IterMut<'_, V> {}

impl<'a, V, A: Allocator> IntoIterator for &'a mut HashTable<V, A> {
    type Item = &'a mut V;
    type IntoIter = IterMut<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

/// A draining iterator over the values in a [`HashTable`].
///
/// This struct is created by the [`drain`] method on [`HashTable`].
///
/// [`drain`]: HashTable::drain
pub struct Drain<'a, V, A: Allocator = Heap> {
    table: &'a mut HashTable<V, A>,
    index: usize,
}

impl<V, A: Allocator> Drop for Drain<'_, V, A> {
    fn drop(&mut self) {
        for _ in &mut *self {}
        self.table.clear();
    }
}

impl<V, A: Allocator> Iterator for Drain<'_, V, A> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        while self.table.size > 0 && self.index < self.table.capacity {
            let index = self.index;
            self.index += 1;
            if is_occupied(self.table.node(index).hash) {
                // SAFETY: Occupied.
                return Some(unsafe { self.table.take(index) });
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.table.size, Some(self.table.size))
    }
}

impl<V, A: Allocator> ExactSizeIterator for Drain<'_, V, A> {}

/// An owning iterator over the values of a [`HashTable`].
pub struct IntoIter<V, A: Allocator = Heap> {
    table: HashTable<V, A>,
    index: usize,
}

impl<V, A: Allocator> Iterator for IntoIter<V, A> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        while self.table.size > 0 && self.index < self.table.capacity {
            let index = self.index;
            self.index += 1;
            if is_occupied(self.table.node(index).hash) {
                // SAFETY: Occupied.
                return Some(unsafe { self.table.take(index) });
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.table.size, Some(self.table.size))
    }
}

impl<V, A: Allocator> ExactSizeIterator for IntoIter<V, A> {}

impl<V, A: Allocator> IntoIterator for HashTable<V, A> {
    type Item = V;
    type IntoIter = IntoIter<V, A>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            table: self,
            index: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::cell::Cell;
    use core::hash::Hasher;

    use rand::Rng;
    use rand::SeedableRng;
    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use rand::rngs::SmallRng;
    use siphasher::sip::SipHasher;

    use super::*;
    use crate::algorithm;
    use crate::allocator::FailingAlloc;
    use crate::allocator::TrackingAlloc;

    struct HashState {
        k0: u64,
        k1: u64,
    }

    impl HashState {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k0: rng.try_next_u64().unwrap(),
                k1: rng.try_next_u64().unwrap(),
            }
        }

        fn build_hasher(&self) -> SipHasher {
            SipHasher::new_with_keys(self.k0, self.k1)
        }
    }

    #[derive(Debug, PartialEq, Eq, Clone)]
    struct Item {
        key: u64,
        value: i32,
    }

    fn hash_key(state: &HashState, key: u64) -> u32 {
        let mut h = state.build_hasher();
        h.write_u64(key);
        h.finish() as u32
    }

    fn insert(table: &mut HashTable<Item>, state: &HashState, key: u64, value: i32) -> bool {
        let hash = hash_key(state, key);
        table
            .emplace(hash, |v| v.key == key, || Item { key, value })
            .1
    }

    fn assert_invariants<V, A: Allocator>(table: &HashTable<V, A>) {
        assert!(table.bucket_count() == 0 || table.bucket_count().is_power_of_two());
        assert!(table.nonempty_bucket_count() >= table.len());
        if table.bucket_count() > 0 {
            assert!(table.nonempty_bucket_count() < table.bucket_count());
        }
        assert_eq!(table.iter().count(), table.len());
    }

    #[test]
    fn sentinel_masking() {
        assert_eq!(mask_hash(UNUSED), 0xFFFF_FFFD);
        assert_eq!(mask_hash(DELETED), 0xFFFF_FFFC);
        assert!(is_occupied(mask_hash(u32::MAX)));
        assert!(!is_occupied(UNUSED));
        assert!(!is_occupied(DELETED));
    }

    #[test]
    fn insert_and_find() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        assert_eq!(table.bucket_count(), 0);

        for k in 0..32u64 {
            assert!(insert(&mut table, &state, k, k as i32 * 2));
            assert_eq!(
                table.find(hash_key(&state, k), |v| v.key == k),
                Some(&Item {
                    key: k,
                    value: k as i32 * 2
                }),
                "{:#?}",
                table
            );
        }

        assert_eq!(table.len(), 32);
        assert_eq!(table.bucket_count(), INITIAL_CAPACITY);
        assert_invariants(&table);
    }

    #[test]
    fn duplicate_insert_does_not_overwrite() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        assert!(insert(&mut table, &state, 5, 1));
        assert!(!insert(&mut table, &state, 5, 2));
        assert_eq!(table.len(), 1);
        assert_eq!(table.find(hash_key(&state, 5), |v| v.key == 5).unwrap().value, 1);

        match table.entry(hash_key(&state, 5), |v| v.key == 5) {
            Entry::Occupied(e) => assert_eq!(e.get().value, 1),
            Entry::Vacant(_) => panic!("expected occupied"),
        }
    }

    #[test]
    fn find_mut_and_modify() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        insert(&mut table, &state, 9, 0);
        table.find_mut(hash_key(&state, 9), |v| v.key == 9).unwrap().value = 99;
        assert_eq!(table.find(hash_key(&state, 9), |v| v.key == 9).unwrap().value, 99);
        assert!(table.find_mut(hash_key(&state, 10), |v| v.key == 10).is_none());
    }

    #[test]
    fn remove_leaves_tombstone() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..10 {
            insert(&mut table, &state, k, 0);
        }
        assert_eq!(table.nonempty_bucket_count(), 10);

        let removed = table.remove(hash_key(&state, 3), |v| v.key == 3);
        assert_eq!(removed.map(|i| i.key), Some(3));
        assert_eq!(table.len(), 9);
        assert_eq!(table.nonempty_bucket_count(), 10);
        assert!(table.find(hash_key(&state, 3), |v| v.key == 3).is_none());
        assert_eq!(table.erase(hash_key(&state, 3), |v| v.key == 3), 0);
        assert_eq!(table.erase(hash_key(&state, 4), |v| v.key == 4), 1);
        assert_eq!(table.len(), 8);
        assert_invariants(&table);
    }

    #[test]
    fn tombstone_is_reused() {
        let mut table: HashTable<u32> = HashTable::new();
        // Identical hashes put all three on one probe chain.
        for k in 0..3u32 {
            table.entry(17, |v| *v == k).or_insert(k);
        }
        assert_eq!(table.erase(17, |v| *v == 0), 1);
        assert_eq!(table.nonempty_bucket_count(), 3);

        match table.entry(17, |v| *v == 10) {
            Entry::Vacant(e) => {
                assert!(e.reuses_tombstone());
                e.insert(10);
            }
            Entry::Occupied(_) => panic!("expected vacant"),
        }
        assert_eq!(table.len(), 3);
        assert_eq!(table.nonempty_bucket_count(), 3);
        for k in [1, 2, 10] {
            assert_eq!(table.find(17, |v| *v == k), Some(&k));
        }
    }

    #[test]
    fn probe_chain_survives_middle_erase() {
        let mut table: HashTable<(u32, u32)> = HashTable::new();
        for k in 0..6u32 {
            table.entry(1, |v| v.0 == k).or_insert((k, k * 10));
        }
        table.erase(1, |v| v.0 == 2);
        for k in [0, 1, 3, 4, 5] {
            assert_eq!(table.find(1, |v| v.0 == k), Some(&(k, k * 10)));
        }
        assert!(table.find(1, |v| v.0 == 2).is_none());
    }

    #[test]
    fn insert_many_grows_and_drops_tombstones() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..100 {
            insert(&mut table, &state, k, 0);
        }
        for k in 0..50 {
            assert_eq!(table.erase(hash_key(&state, k), |v| v.key == k), 1);
        }
        assert_eq!(table.nonempty_bucket_count(), 100);

        let before = table.bucket_count();
        for k in 100..2000 {
            insert(&mut table, &state, k, 0);
            assert!(table.nonempty_bucket_count() * 8 <= table.bucket_count() * 7);
            assert_invariants(&table);
        }
        assert!(table.bucket_count() > before);
        assert_eq!(table.len(), 1950);
        for k in 50..2000 {
            assert!(table.find(hash_key(&state, k), |v| v.key == k).is_some());
        }
    }

    #[test]
    fn growth_happens_at_seven_eighths() {
        let mut table: HashTable<u32> = HashTable::new();
        for k in 0..56u32 {
            table.entry(k, |v| *v == k).or_insert(k);
        }
        assert_eq!(table.bucket_count(), 64);
        assert_eq!(table.nonempty_bucket_count(), 56);
        table.entry(56, |v| *v == 56).or_insert(56);
        assert_eq!(table.bucket_count(), 128);
        assert_eq!(table.nonempty_bucket_count(), 57);
    }

    #[test]
    fn explicit_collision() {
        let mut table: HashTable<(u64, &str)> = HashTable::new();
        let words = ["a", "b", "c", "d", "e"];
        for (k, w) in words.iter().enumerate() {
            table.entry(0xAAAA, |v| v.0 == k as u64).or_insert((k as u64, *w));
        }
        let hist = table.probe_histogram();
        assert_eq!(hist.total(), 5);
        assert_eq!(hist.counts, vec![1, 1, 1, 1, 1]);
        assert_eq!(hist.max_probe(), 4);
    }

    #[test]
    fn clear_resets_everything() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..20 {
            insert(&mut table, &state, k, 0);
        }
        table.erase(hash_key(&state, 0), |v| v.key == 0);
        let buckets = table.bucket_count();

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.nonempty_bucket_count(), 0);
        assert_eq!(table.bucket_count(), buckets);
        table.clear();
        assert!(table.is_empty());

        assert!(insert(&mut table, &state, 0, 5));
        assert_eq!(table.len(), 1);
        assert_eq!(table.find(hash_key(&state, 0), |v| v.key == 0).unwrap().value, 5);
    }

    #[test]
    fn iter_and_drain() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..40 {
            insert(&mut table, &state, k, k as i32);
        }
        table.erase(hash_key(&state, 7), |v| v.key == 7);

        let mut keys: Vec<u64> = table.iter().map(|v| v.key).collect();
        keys.sort_unstable();
        let expected: Vec<u64> = (0..40).filter(|&k| k != 7).collect();
        assert_eq!(keys, expected);
        assert_eq!(table.iter().len(), 39);

        for item in table.iter_mut() {
            item.value += 1;
        }
        assert!(table.iter().all(|v| v.value == v.key as i32 + 1));

        let drained: Vec<Item> = table.drain().collect();
        assert_eq!(drained.len(), 39);
        assert!(table.is_empty());
        assert_eq!(table.nonempty_bucket_count(), 0);
    }

    #[test]
    fn partial_drain_still_empties() {
        let mut table: HashTable<String> = HashTable::new();
        for k in 0..10u32 {
            table.entry(k, |s| s == &k.to_string()).or_insert(k.to_string());
        }
        {
            let mut drain = table.drain();
            assert!(drain.next().is_some());
        }
        assert!(table.is_empty());
        table.entry(3, |s| s == "3").or_insert("3".to_string());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn into_iter_yields_everything() {
        let mut table: HashTable<String> = HashTable::new();
        for k in 0..10u32 {
            table.entry(k, |s| s == &k.to_string()).or_insert(k.to_string());
        }
        let mut values: Vec<String> = table.into_iter().collect();
        values.sort();
        assert_eq!(values.len(), 10);
        assert_eq!(values[0], "0");
    }

    #[test]
    fn retain_keeps_matching() {
        let mut table: HashTable<u32> = HashTable::new();
        for k in 0..100u32 {
            table.entry(k.wrapping_mul(2654435761), |v| *v == k).or_insert(k);
        }
        table.retain(|v| *v % 3 == 0);
        assert_eq!(table.len(), 34);
        assert!(table.iter().all(|v| v % 3 == 0));
        assert_invariants(&table);
    }

    #[test]
    fn cursor_walks_occupied_slots() {
        let mut table: HashTable<u32> = HashTable::new();
        assert!(table.begin() == table.end());

        for k in [5u32, 900, 33, 4096] {
            table.entry(k, |v| *v == k).or_insert(k);
        }
        table.erase(33, |v| *v == 33);

        let mut cursor = table.begin();
        let mut seen = Vec::new();
        while cursor != table.end() {
            seen.push(*cursor.get());
            cursor.step();
        }
        seen.sort_unstable();
        assert_eq!(seen, [5, 900, 4096]);

        let end = table.end();
        assert_eq!(table.begin().distance(&end), 3);
        let found = algorithm::find(table.begin(), &end, &900);
        assert_eq!(*found.get(), 900);
        assert_eq!(table.get(found.bucket().unwrap()), &900);
        assert!(algorithm::find(table.begin(), &end, &33) == end);
    }

    #[test]
    #[should_panic(expected = "past-the-end")]
    fn cursor_end_panics() {
        let table: HashTable<u32> = HashTable::new();
        let _ = table.end().get();
    }

    #[test]
    fn bucket_handles() {
        let mut table: HashTable<u32> = HashTable::new();
        let (bucket, inserted) = table.emplace(77, |v| *v == 77, || 77);
        assert!(inserted);
        assert_eq!(table.get(bucket), &77);
        *table.get_mut(bucket) += 1;
        assert_eq!(table.find_bucket(77, |v| *v == 78), Some(bucket));
        assert_eq!(table.remove_bucket(bucket), 78);
        assert!(table.is_empty());
    }

    #[test]
    #[should_panic(expected = "occupied slot")]
    fn stale_bucket_panics() {
        let mut table: HashTable<u32> = HashTable::new();
        let (bucket, _) = table.emplace(1, |v| *v == 1, || 1);
        table.erase(1, |v| *v == 1);
        let _ = table.get(bucket);
    }

    #[test]
    fn reserve_buckets_doubles_from_initial() {
        let mut table: HashTable<u8> = HashTable::new();
        table.reserve_buckets(0);
        assert_eq!(table.bucket_count(), 64);
        table.reserve_buckets(65);
        assert_eq!(table.bucket_count(), 128);
        table.reserve_buckets(100);
        assert_eq!(table.bucket_count(), 128);

        let hinted: HashTable<u8> = HashTable::with_bucket_count(1000);
        assert_eq!(hinted.bucket_count(), 1024);
        let lazy: HashTable<u8> = HashTable::with_bucket_count(0);
        assert_eq!(lazy.bucket_count(), 0);
    }

    #[test]
    fn reserve_holds_elements_without_growth() {
        let mut table: HashTable<u32> = HashTable::with_capacity(500);
        let buckets = table.bucket_count();
        assert!(table.capacity() >= 500);
        for k in 0..500u32 {
            table.entry(k, |v| *v == k).or_insert(k);
        }
        assert_eq!(table.bucket_count(), buckets);
    }

    #[test]
    fn try_reserve_reports_failures() {
        let mut table: HashTable<u64> = HashTable::new();
        assert_eq!(
            table.try_reserve(usize::MAX),
            Err(TryReserveError::CapacityOverflow)
        );

        let mut failing: HashTable<u64, FailingAlloc> = HashTable::new_in(FailingAlloc);
        assert!(matches!(
            failing.try_reserve(1),
            Err(TryReserveError::AllocError { .. })
        ));
        assert_eq!(failing.bucket_count(), 0);
        assert!(table.try_reserve(10).is_ok());
    }

    #[test]
    fn reserve_rehashes_populated_table() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..40 {
            insert(&mut table, &state, k, k as i32);
        }
        table.erase(hash_key(&state, 0), |v| v.key == 0);
        table.erase(hash_key(&state, 1), |v| v.key == 1);
        assert_eq!(table.len(), 38);
        assert_eq!(table.nonempty_bucket_count(), 40);

        let check = |table: &HashTable<Item>, buckets: usize| {
            assert_eq!(table.bucket_count(), buckets);
            assert_eq!(table.len(), 38);
            assert_eq!(table.nonempty_bucket_count(), 38);
            assert_eq!(table.iter().count(), 38);
            for k in 2..40 {
                let found = table.find(hash_key(&state, k), |v| v.key == k);
                assert_eq!(found.map(|v| v.value), Some(k as i32));
            }
            for k in 0..2 {
                assert!(table.find(hash_key(&state, k), |v| v.key == k).is_none());
            }
        };

        table.reserve(200);
        check(&table, 512);
        table.reserve_buckets(1024);
        check(&table, 1024);
        assert!(table.try_reserve(2000).is_ok());
        check(&table, 4096);

        for k in 40..100 {
            assert!(insert(&mut table, &state, k, k as i32));
        }
        assert_eq!(table.len(), 98);
        assert_invariants(&table);
    }

    #[test]
    fn capacity_matches_growth_point() {
        for buckets in [64, 128, 1024] {
            let mut table: HashTable<u32> = HashTable::with_bucket_count(buckets);
            let capacity = table.capacity();
            for k in 0..capacity as u32 {
                table.entry(k, |v| *v == k).or_insert(k);
            }
            assert_eq!(table.bucket_count(), buckets);
            let next = capacity as u32;
            table.entry(next, |v| *v == next).or_insert(next);
            assert_eq!(table.bucket_count(), buckets * 2);
            assert_eq!(table.len(), capacity + 1);
        }
    }

    #[test]
    fn shrink_empty_table_forgets_tombstones() {
        let mut table: HashTable<u32> = HashTable::new();
        for k in 0..20u32 {
            table.entry(k, |v| *v == k).or_insert(k);
        }
        for k in 0..20u32 {
            table.erase(k, |v| *v == k);
        }
        assert_eq!(table.nonempty_bucket_count(), 20);
        table.shrink_to_fit();
        assert_eq!(table.bucket_count(), 0);
        assert_eq!(table.nonempty_bucket_count(), 0);

        table.entry(3, |v| *v == 3).or_insert(3);
        assert_eq!(table.len(), 1);
        assert_eq!(table.nonempty_bucket_count(), 1);
    }

    #[test]
    fn shrink_to_fit() {
        let mut table: HashTable<u32> = HashTable::new();
        for k in 0..1000u32 {
            table.entry(k, |v| *v == k).or_insert(k);
        }
        table.retain(|v| *v < 10);
        assert!(table.bucket_count() >= 1024);
        table.shrink_to_fit();
        assert_eq!(table.bucket_count(), 64);
        assert_eq!(table.nonempty_bucket_count(), 10);
        for k in 0..10u32 {
            assert_eq!(table.find(k, |v| *v == k), Some(&k));
        }

        table.clear();
        table.shrink_to_fit();
        assert_eq!(table.bucket_count(), 0);
        assert_eq!(table.used_memory(), 0);
    }

    #[test]
    fn clone_copies_entries_not_tombstones() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..30 {
            insert(&mut table, &state, k, k as i32);
        }
        table.erase(hash_key(&state, 4), |v| v.key == 4);

        let cloned = table.clone();
        assert_eq!(cloned.len(), 29);
        assert_eq!(cloned.bucket_count(), table.bucket_count());
        assert_eq!(cloned.nonempty_bucket_count(), 29);
        for k in (0..30).filter(|&k| k != 4) {
            assert_eq!(
                cloned.find(hash_key(&state, k), |v| v.key == k),
                table.find(hash_key(&state, k), |v| v.key == k)
            );
        }

        let empty: HashTable<Item> = HashTable::new();
        assert_eq!(empty.clone().bucket_count(), 0);
    }

    #[test]
    fn clone_from_keeps_destination_allocator() {
        let source_alloc = TrackingAlloc::with_id(1);
        let dest_alloc = TrackingAlloc::with_id(2);

        let mut source = HashTable::new_in(source_alloc.clone());
        for k in 0..100u32 {
            source.entry(k, |v: &u32| *v == k).or_insert(k);
        }
        let mut dest: HashTable<u32, TrackingAlloc> = HashTable::new_in(dest_alloc.clone());
        dest.clone_from(&source);

        assert_eq!(dest.allocator().id, 2);
        assert_eq!(dest.len(), 100);
        assert_eq!(dest.bucket_count(), source.bucket_count());
        assert_eq!(dest_alloc.live_bytes(), dest.used_memory());

        let copied = source.clone();
        assert_eq!(copied.allocator().id, 0);
        assert_eq!(copied.len(), 100);

        let explicit = source.clone_in(TrackingAlloc::with_id(9));
        assert_eq!(explicit.allocator().id, 9);
        assert_eq!(explicit.find(50, |v| *v == 50), Some(&50));
    }

    #[test]
    fn clone_from_reuses_larger_storage() {
        let mut big: HashTable<u32> = HashTable::with_bucket_count(1024);
        let mut small: HashTable<u32> = HashTable::new();
        small.entry(1, |v| *v == 1).or_insert(1);
        big.clone_from(&small);
        assert_eq!(big.bucket_count(), 1024);
        assert_eq!(big.len(), 1);
        assert_eq!(big.find(1, |v| *v == 1), Some(&1));
    }

    #[test]
    fn swap_exchanges_contents() {
        let mut a: HashTable<u32> = HashTable::new();
        let mut b: HashTable<u32> = HashTable::with_bucket_count(256);
        a.entry(1, |v| *v == 1).or_insert(1);
        a.swap(&mut b);
        assert!(a.is_empty());
        assert_eq!(a.bucket_count(), 256);
        assert_eq!(b.find(1, |v| *v == 1), Some(&1));
    }

    #[test]
    #[should_panic(expected = "equal allocators")]
    fn swap_rejects_foreign_allocator() {
        let mut a: HashTable<u32, TrackingAlloc> = HashTable::new_in(TrackingAlloc::with_id(1));
        let mut b: HashTable<u32, TrackingAlloc> = HashTable::new_in(TrackingAlloc::with_id(2));
        a.swap(&mut b);
    }

    #[test]
    fn every_value_dropped_exactly_once() {
        struct Counted(Rc<Cell<usize>>);
        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let drops = Rc::new(Cell::new(0));
        let alloc = TrackingAlloc::with_id(3);
        {
            let mut table = HashTable::new_in(alloc.clone());
            for k in 0..200u32 {
                table
                    .entry(k, |v: &(u32, Counted)| v.0 == k)
                    .or_insert_with(|| (k, Counted(drops.clone())));
            }
            assert_eq!(table.erase(5, |v| v.0 == 5), 1);
            assert_eq!(drops.get(), 1);
            let removed = table.remove(6, |v| v.0 == 6);
            assert_eq!(drops.get(), 1);
            drop(removed);
            assert_eq!(drops.get(), 2);
            table.retain(|v| v.0 >= 10);
            assert_eq!(drops.get(), 10);
        }
        assert_eq!(drops.get(), 200);
        assert_eq!(alloc.live_bytes(), 0);
    }

    #[test]
    fn values_dropped_after_rehash() {
        let marker = Rc::new(());
        let alloc = TrackingAlloc::with_id(4);
        {
            let mut table = HashTable::new_in(alloc.clone());
            for k in 0..57u32 {
                table
                    .entry(k, |v: &(u32, Rc<()>)| v.0 == k)
                    .or_insert_with(|| (k, marker.clone()));
            }
            assert_eq!(table.bucket_count(), 128);
            assert_eq!(table.len(), 57);
            assert_eq!(Rc::strong_count(&marker), 58);

            table.reserve_buckets(512);
            assert_eq!(table.len(), 57);
            assert_eq!(Rc::strong_count(&marker), 58);

            table.erase(0, |v| v.0 == 0);
            table.shrink_to_fit();
            assert_eq!(table.bucket_count(), 128);
            assert_eq!(table.len(), 56);
            assert_eq!(Rc::strong_count(&marker), 57);
        }
        assert_eq!(Rc::strong_count(&marker), 1);
        assert_eq!(alloc.live_bytes(), 0);
    }

    #[test]
    fn randomized_against_std() {
        let mut rng = SmallRng::seed_from_u64(0xfeed_f00d);
        let mut table: HashTable<(u32, u32)> = HashTable::new();
        let mut model = hashbrown::HashMap::new();

        for _ in 0..20_000 {
            let key = rng.random_range(0..2_000u32);
            let hash = key.wrapping_mul(0x9E37_79B9) >> 7;
            if rng.random_bool(0.6) {
                let value = rng.random::<u32>();
                let inserted = table.emplace(hash, |v| v.0 == key, || (key, value)).1;
                assert_eq!(inserted, !model.contains_key(&key));
                model.entry(key).or_insert(value);
            } else {
                assert_eq!(
                    table.remove(hash, |v| v.0 == key).map(|v| v.1),
                    model.remove(&key)
                );
            }
        }

        assert_eq!(table.len(), model.len());
        for (k, v) in &model {
            let hash = k.wrapping_mul(0x9E37_79B9) >> 7;
            assert_eq!(table.find(hash, |e| e.0 == *k), Some(&(*k, *v)));
        }
        assert_invariants(&table);
    }

    #[test]
    fn debug_stats_output() {
        let mut table: HashTable<u64> = HashTable::new();
        for k in 0..40u64 {
            table.entry(k as u32, |v| *v == k).or_insert(k);
        }
        table.erase(3, |v| *v == 3);
        let stats = table.debug_stats();
        assert_eq!(stats.populated, 39);
        assert_eq!(stats.tombstones, 1);
        assert_eq!(stats.bucket_count, 64);
        assert_eq!(stats.capacity, 56);
        assert_eq!(stats.total_bytes, table.used_memory());

        #[cfg(feature = "std")]
        {
            stats.print();
            table.probe_histogram().print();
        }
    }

    #[test]
    fn debug_format_marks_slot_states() {
        let mut table: HashTable<u8> = HashTable::new();
        table.entry(0, |v| *v == 0).or_insert(0);
        table.entry(1, |v| *v == 1).or_insert(1);
        table.erase(1, |v| *v == 1);
        let text = alloc::format!("{table:?}");
        assert!(text.contains("00000000: 0"));
        assert!(text.contains("xx"));
        assert!(text.contains(".."));
    }
}
