//! Object space: vector storage, encoding and distance computation.
//!
//! Objects are stored densely by [`ObjectId`]; id `n` lives in slot `n - 1`.
//! Storage is append-only: removing an object sets its tombstone flag but
//! keeps the components, so graph edges that still reference the id stay
//! resolvable until they are pruned.
//!
//! # Locking
//!
//! The slot vector sits behind one `RwLock`. Appends take the write lock for
//! the duration of a push; everything else, including tombstoning (an atomic
//! flag on the slot), runs under the read lock. Long readers such as a
//! search acquire a [`ObjectsReader`] once and reuse it.

use crate::error::{Error, Result};
use crate::property::{DistanceType, ObjectType, Property};
use crate::vector::{Vector, VectorView};
use crate::ObjectId;
use parking_lot::{RwLock, RwLockReadGuard};
use roaring::RoaringBitmap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// One stored object.
#[derive(Debug)]
pub(crate) struct ObjectSlot {
    vector: Vector,
    removed: AtomicBool,
}

impl ObjectSlot {
    fn new(vector: Vector, removed: bool) -> Self {
        Self {
            vector,
            removed: AtomicBool::new(removed),
        }
    }

    #[inline]
    pub(crate) fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn view(&self) -> VectorView<'_> {
        self.vector.view()
    }
}

/// Vector storage for one index.
#[derive(Debug)]
pub struct ObjectSpace {
    dimension: usize,
    object_type: ObjectType,
    distance_type: DistanceType,
    slots: RwLock<Vec<ObjectSlot>>,
    live: AtomicUsize,
}

impl ObjectSpace {
    /// Creates an empty object space configured from `property`.
    #[must_use]
    pub fn new(property: &Property) -> Self {
        Self {
            dimension: property.dimension(),
            object_type: property.object_type(),
            distance_type: property.distance_type(),
            slots: RwLock::new(Vec::new()),
            live: AtomicUsize::new(0),
        }
    }

    /// Rebuilds an object space from persisted parts.
    pub(crate) fn from_parts(
        property: &Property,
        vectors: Vec<Vector>,
        removed: &RoaringBitmap,
    ) -> Self {
        let mut live = 0;
        let slots: Vec<ObjectSlot> = vectors
            .into_iter()
            .enumerate()
            .map(|(slot, vector)| {
                let is_removed = removed.contains(slot as u32 + 1);
                if !is_removed {
                    live += 1;
                }
                ObjectSlot::new(vector, is_removed)
            })
            .collect();

        Self {
            dimension: property.dimension(),
            object_type: property.object_type(),
            distance_type: property.distance_type(),
            slots: RwLock::new(slots),
            live: AtomicUsize::new(live),
        }
    }

    /// Vector dimension.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Element encoding.
    #[must_use]
    pub const fn object_type(&self) -> ObjectType {
        self.object_type
    }

    /// Distance metric.
    #[must_use]
    pub const fn distance_type(&self) -> DistanceType {
        self.distance_type
    }

    /// Number of ids ever assigned, removed ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Returns true if no object was ever stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of objects that are not tombstoned.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Encodes host values after checking the dimension.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` or `InvalidArgument` (see [`Vector::encode`]).
    pub fn encode(&self, values: &[f64]) -> Result<Vector> {
        if values.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: values.len(),
            });
        }
        Vector::encode(values, self.object_type)
    }

    /// Checks a vector against this space's dimension and encoding.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` or `InvalidArgument`.
    pub fn check(&self, vector: VectorView<'_>) -> Result<()> {
        vector.check(self.dimension, self.object_type)
    }

    /// Stores a vector and returns its fresh id.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch`/`InvalidArgument` if the vector does not match the
    /// space, `ResourceExhausted` if storage or the id space is exhausted.
    /// Nothing is recorded on failure.
    pub fn allocate(&self, vector: Vector) -> Result<ObjectId> {
        self.check(vector.view())?;
        let mut slots = self.slots.write();
        let id = Self::next_id(slots.len(), 1)?;
        slots.try_reserve(1)?;
        slots.push(ObjectSlot::new(vector, false));
        self.live.fetch_add(1, Ordering::AcqRel);
        Ok(id)
    }

    /// Stores a batch of vectors with consecutive ids, all or nothing.
    ///
    /// Returns the id of the first vector.
    pub(crate) fn allocate_all(&self, vectors: Vec<Vector>) -> Result<ObjectId> {
        for vector in &vectors {
            self.check(vector.view())?;
        }
        let mut slots = self.slots.write();
        let first = Self::next_id(slots.len(), vectors.len())?;
        slots.try_reserve(vectors.len())?;
        let added = vectors.len();
        slots.extend(vectors.into_iter().map(|v| ObjectSlot::new(v, false)));
        self.live.fetch_add(added, Ordering::AcqRel);
        Ok(first)
    }

    fn next_id(len: usize, additional: usize) -> Result<ObjectId> {
        let last = len
            .checked_add(additional)
            .and_then(|n| ObjectId::try_from(n).ok())
            .filter(|&n| n < ObjectId::MAX);
        match last {
            Some(_) => Ok(len as ObjectId + 1),
            None => Err(Error::ResourceExhausted(format!(
                "object id space exhausted ({len} ids assigned)"
            ))),
        }
    }

    /// Returns a copy of a live object.
    ///
    /// # Errors
    ///
    /// `ObjectNotFound` if the id was never assigned or is removed.
    pub fn get(&self, id: ObjectId) -> Result<Vector> {
        let reader = self.read();
        reader
            .live_view(id)
            .map(|v| v.to_owned_vector())
            .ok_or(Error::ObjectNotFound(id))
    }

    /// Distance between two stored objects, removed ones included.
    ///
    /// # Errors
    ///
    /// `ObjectNotFound` if either id was never assigned.
    pub fn distance(&self, a: ObjectId, b: ObjectId) -> Result<f32> {
        let reader = self.read();
        let va = reader.view(a).ok_or(Error::ObjectNotFound(a))?;
        let vb = reader.view(b).ok_or(Error::ObjectNotFound(b))?;
        self.distance_type.calculate(va, vb)
    }

    /// Tombstones an object. Its storage and id are kept.
    ///
    /// # Errors
    ///
    /// `ObjectNotFound` if the id was never assigned or is already removed.
    pub fn remove(&self, id: ObjectId) -> Result<()> {
        let slots = self.slots.read();
        let slot = slot_of(&slots, id).ok_or(Error::ObjectNotFound(id))?;
        if slot.removed.swap(true, Ordering::AcqRel) {
            return Err(Error::ObjectNotFound(id));
        }
        self.live.fetch_sub(1, Ordering::AcqRel);
        Ok(())
    }

    /// Returns true if `id` was ever assigned, removed or not.
    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        slot_of(&self.slots.read(), id).is_some()
    }

    /// Returns true if `id` was assigned and is not removed.
    #[must_use]
    pub fn is_live(&self, id: ObjectId) -> bool {
        self.read().is_live(id)
    }

    /// Returns true if `id` was assigned and then removed.
    #[must_use]
    pub fn is_removed(&self, id: ObjectId) -> bool {
        slot_of(&self.slots.read(), id).is_some_and(ObjectSlot::is_removed)
    }

    /// Acquires a read view over all slots.
    pub(crate) fn read(&self) -> ObjectsReader<'_> {
        ObjectsReader {
            distance_type: self.distance_type,
            slots: self.slots.read(),
        }
    }
}

#[inline]
fn slot_of(slots: &[ObjectSlot], id: ObjectId) -> Option<&ObjectSlot> {
    let index = (id as usize).checked_sub(1)?;
    slots.get(index)
}

/// Read guard over the object slots with distance helpers.
///
/// Never hold two readers on the same thread: a queued writer would block
/// the second acquisition.
pub(crate) struct ObjectsReader<'a> {
    distance_type: DistanceType,
    slots: RwLockReadGuard<'a, Vec<ObjectSlot>>,
}

impl ObjectsReader<'_> {
    /// Number of assigned ids.
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Components of an assigned object, removed or not.
    #[inline]
    pub(crate) fn view(&self, id: ObjectId) -> Option<VectorView<'_>> {
        slot_of(&self.slots, id).map(ObjectSlot::view)
    }

    /// Components of a live object.
    #[inline]
    pub(crate) fn live_view(&self, id: ObjectId) -> Option<VectorView<'_>> {
        slot_of(&self.slots, id)
            .filter(|slot| !slot.is_removed())
            .map(ObjectSlot::view)
    }

    #[inline]
    pub(crate) fn is_live(&self, id: ObjectId) -> bool {
        slot_of(&self.slots, id).is_some_and(|slot| !slot.is_removed())
    }

    /// Distance from an external query to a stored object.
    #[inline]
    pub(crate) fn distance_to(&self, query: VectorView<'_>, id: ObjectId) -> Result<f32> {
        let target = self.view(id).ok_or(Error::ObjectNotFound(id))?;
        self.distance_type.calculate(query, target)
    }

    /// Iterates over `(id, vector)` of every slot in id order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (ObjectId, &ObjectSlot)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .map(|(slot, object)| (slot as ObjectId + 1, object))
    }
}
