//! Packed Freelist
//!
//! A fixed-capacity generational container that keeps its elements densely
//! packed in one contiguous array while handing out stable ids.
//!
//! # Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ lookup:   [slot 0][slot 1][slot 2] ...   (indexed by id.slot) │
//! │             │ generation, element index, next free slot      │
//! │             ▼                                                │
//! │ elements: [ e0 ][ e1 ][ e2 ] ...         (len == live count) │
//! │ reverse:  [id0 ][id1 ][id2 ] ...         (parallel to above) │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Free slots form a FIFO queue threaded through `lookup[..].next`, so a freed
//! slot is reused as late as possible and generations age evenly.
//!
//! Erasing swaps the last live element into the hole. Insertion order is
//! therefore **not** preserved across erases; only the set of live ids is.

use std::fmt;
use std::ops::{Index, IndexMut};

/// Slot value reserved as the "deleted" marker. It also bounds the capacity.
const DELETED: u16 = 0xFFFF;

/// Largest capacity a [`PackedFreelist`] accepts (`0xFFFF` is reserved).
pub const MAX_ELEMENTS: usize = DELETED as usize - 1;

/// Generational id of an element stored in a [`PackedFreelist`].
///
/// The 16 least significant bits hold the slot index, the 16 most
/// significant bits hold the generation of that slot. Ids of erased elements
/// stay invalid forever because the slot's generation is bumped on reuse.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FreelistId(u32);

impl FreelistId {
    /// An id that never refers to a live element (slot 0, generation 0).
    /// Generation 0 is skipped when a slot's generation wraps.
    pub const NULL: Self = Self(0);

    const SLOT_MASK: u32 = 0xFFFF;
    const GENERATION_ONE: u32 = 0x1_0000;

    #[inline]
    fn new(slot: u16, generation: u16) -> Self {
        Self((u32::from(generation) << 16) | u32::from(slot))
    }

    /// Slot index in the lookup array.
    #[inline]
    #[must_use]
    pub fn slot(self) -> u16 {
        (self.0 & Self::SLOT_MASK) as u16
    }

    /// Generation of the slot at the time this id was issued.
    #[inline]
    #[must_use]
    pub fn generation(self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// Raw packed representation.
    #[inline]
    #[must_use]
    pub fn to_bits(self) -> u32 {
        self.0
    }

    /// Rebuilds an id from [`FreelistId::to_bits`].
    #[inline]
    #[must_use]
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns `true` for [`FreelistId::NULL`].
    #[inline]
    #[must_use]
    pub fn is_null(self) -> bool {
        self == Self::NULL
    }

    /// Same slot, next generation. Wraps after 65535 reuses.
    #[inline]
    fn next_generation(self) -> Self {
        Self(self.0.wrapping_add(Self::GENERATION_ONE))
    }
}

impl fmt::Debug for FreelistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FreelistId({}v{})", self.slot(), self.generation())
    }
}

#[derive(Clone, Copy)]
struct Lookup {
    id: FreelistId,
    element_index: u16,
    next: u16,
}

/// Contiguous storage with O(1) insert, lookup and erase by [`FreelistId`].
pub struct PackedFreelist<T> {
    elements: Vec<T>,
    reverse: Vec<FreelistId>,
    lookup: Box<[Lookup]>,
    free_dequeue: u16,
    free_enqueue: u16,
    free_count: usize,
}

impl<T> PackedFreelist<T> {
    /// Creates a freelist that can hold up to `capacity` live elements.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or larger than [`MAX_ELEMENTS`].
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "PackedFreelist does not support a capacity of 0");
        assert!(
            capacity <= MAX_ELEMENTS,
            "PackedFreelist supports at most {MAX_ELEMENTS} elements, requested {capacity}"
        );

        let lookup = (0..capacity)
            .map(|i| Lookup {
                id: FreelistId::new(i as u16, 0),
                element_index: DELETED,
                next: if i + 1 == capacity { 0 } else { (i + 1) as u16 },
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            elements: Vec::with_capacity(capacity),
            reverse: Vec::with_capacity(capacity),
            lookup,
            free_dequeue: 0,
            free_enqueue: (capacity - 1) as u16,
            free_count: capacity,
        }
    }

    /// Inserts `value` at the end of the packed array and returns its id.
    ///
    /// # Panics
    ///
    /// Panics when the freelist is full. Capacity is a configuration choice,
    /// running out of it is a bug in the caller.
    pub fn insert(&mut self, value: T) -> FreelistId {
        assert!(
            self.free_count > 0,
            "PackedFreelist out of slots (capacity {})",
            self.capacity()
        );

        let slot = self.free_dequeue;
        let look = &mut self.lookup[slot as usize];
        self.free_dequeue = look.next;
        self.free_count -= 1;

        look.id = look.id.next_generation();
        if look.id.generation() == 0 {
            // generation 0 is never issued, so `FreelistId::NULL` stays dangling
            look.id = look.id.next_generation();
        }
        look.element_index = self.elements.len() as u16;
        let id = look.id;

        self.elements.push(value);
        self.reverse.push(id);
        id
    }

    /// Inserts the value produced by `f`.
    pub fn emplace(&mut self, f: impl FnOnce() -> T) -> FreelistId {
        self.insert(f())
    }

    /// Returns `true` if `id` refers to a live element. Never panics.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: FreelistId) -> bool {
        self.lookup
            .get(id.slot() as usize)
            .is_some_and(|look| look.id == id && look.element_index != DELETED)
    }

    #[must_use]
    pub fn get(&self, id: FreelistId) -> Option<&T> {
        if self.contains(id) {
            Some(&self.elements[self.lookup[id.slot() as usize].element_index as usize])
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, id: FreelistId) -> Option<&mut T> {
        if self.contains(id) {
            let index = self.lookup[id.slot() as usize].element_index as usize;
            Some(&mut self.elements[index])
        } else {
            None
        }
    }

    /// Packed position of `id`, or `None` for stale ids.
    #[must_use]
    pub fn packed_index(&self, id: FreelistId) -> Option<usize> {
        self.contains(id)
            .then(|| self.lookup[id.slot() as usize].element_index as usize)
    }

    /// Removes the element for `id` and returns it.
    ///
    /// The last live element is moved into the freed packed position, unless
    /// the erased element already was the last one.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not contained. Erasing a dangling id is a bug.
    pub fn erase(&mut self, id: FreelistId) -> T {
        assert!(self.contains(id), "Trying to erase non contained value {id:?}");

        let slot = id.slot();
        let index = self.lookup[slot as usize].element_index as usize;

        // swap_remove moves the last element into `index` when it is not the last
        let value = self.elements.swap_remove(index);
        self.reverse.swap_remove(index);
        if index < self.elements.len() {
            let moved = self.reverse[index];
            self.lookup[moved.slot() as usize].element_index = index as u16;
        }

        self.lookup[slot as usize].element_index = DELETED;
        self.enqueue_free(slot);
        value
    }

    /// Removes every element. Issued ids all become stale.
    pub fn clear(&mut self) {
        while let Some(&id) = self.reverse.last() {
            self.erase(id);
        }
    }

    fn enqueue_free(&mut self, slot: u16) {
        if self.free_count == 0 {
            self.free_dequeue = slot;
        } else {
            self.lookup[self.free_enqueue as usize].next = slot;
        }
        self.free_enqueue = slot;
        self.free_count += 1;
    }

    /// The element in the last packed position.
    #[must_use]
    pub fn back(&self) -> Option<&T> {
        self.elements.last()
    }

    /// Live ids in packed order.
    pub fn ids(&self) -> impl ExactSizeIterator<Item = FreelistId> + '_ {
        self.reverse.iter().copied()
    }

    /// `(id, element)` pairs in packed order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (FreelistId, &T)> + '_ {
        self.reverse.iter().copied().zip(self.elements.iter())
    }

    pub fn iter_mut(&mut self) -> impl ExactSizeIterator<Item = (FreelistId, &mut T)> + '_ {
        self.reverse.iter().copied().zip(self.elements.iter_mut())
    }

    /// The packed element array, `len()` entries without gaps.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.elements
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Maximum number of simultaneously live elements.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.lookup.len()
    }
}

impl<T> Index<FreelistId> for PackedFreelist<T> {
    type Output = T;

    fn index(&self, id: FreelistId) -> &T {
        match self.get(id) {
            Some(value) => value,
            None => panic!("Trying to access non contained value {id:?}"),
        }
    }
}

impl<T> IndexMut<FreelistId> for PackedFreelist<T> {
    fn index_mut(&mut self, id: FreelistId) -> &mut T {
        match self.get_mut(id) {
            Some(value) => value,
            None => panic!("Trying to access non contained value {id:?}"),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for PackedFreelist<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
