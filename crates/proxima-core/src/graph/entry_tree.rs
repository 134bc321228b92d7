//! Entry tree: a vantage-point tree over sampled graph nodes.
//!
//! The tree only seeds searches. Each internal node keeps a pivot object
//! and a radius; objects within the radius of the pivot live in the inside
//! subtree, the others outside. Leaves hold object ids. A query descends
//! by the same rule and the members of the leaf it reaches, closest first,
//! become the entry points of the graph traversal.
//!
//! Nodes live in an arena (`Vec<TreeNode>`) addressed by `u32`; the root
//! is always slot 0.

use crate::error::{Error, Result};
use crate::object_space::ObjectsReader;
use crate::result::ObjectDistance;
use crate::vector::VectorView;
use crate::ObjectId;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Leaf members beyond which a leaf is split.
pub(crate) const LEAF_CAPACITY: usize = 16;

/// Arena node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Pivot split.
    Internal {
        /// Object whose vector is the vantage point.
        pivot: ObjectId,
        /// Objects at distance `<= radius` from the pivot go inside.
        radius: f32,
        /// Arena slot of the inside subtree.
        inside: u32,
        /// Arena slot of the outside subtree.
        outside: u32,
    },
    /// Bucket of entry candidates.
    Leaf {
        /// Member object ids.
        members: Vec<ObjectId>,
    },
}

/// Persisted form of the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct TreeImage {
    pub(crate) nodes: Vec<TreeNode>,
    pub(crate) sampled: u64,
}

/// Vantage-point tree used to pick search entry points.
#[derive(Debug, Clone)]
pub struct EntryTree {
    nodes: Vec<TreeNode>,
    /// Linked nodes offered to the sampling policy so far.
    sampled: u64,
    /// Non-owning back-reference from member id to its leaf slot.
    leaf_of: FxHashMap<ObjectId, u32>,
}

impl Default for EntryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryTree {
    /// Creates a tree with an empty root leaf.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![TreeNode::Leaf {
                members: Vec::new(),
            }],
            sampled: 0,
            leaf_of: FxHashMap::default(),
        }
    }

    /// Number of member ids in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.leaf_of.len()
    }

    /// Returns true if the tree has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaf_of.is_empty()
    }

    /// Returns true if `id` is a member.
    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.leaf_of.contains_key(&id)
    }

    /// Arena nodes, root first.
    #[must_use]
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Sampling policy: selects every `interval`th linked node, starting
    /// with the first one ever offered.
    pub(crate) fn offer(&mut self, interval: usize) -> bool {
        let ordinal = self.sampled;
        self.sampled += 1;
        ordinal % interval.max(1) as u64 == 0
    }

    /// Adds `id` to the leaf its vector descends to, splitting full leaves.
    pub(crate) fn insert(&mut self, id: ObjectId, objects: &ObjectsReader<'_>) -> Result<()> {
        if self.contains(id) {
            return Ok(());
        }
        let vector = objects.view(id).ok_or(Error::ObjectNotFound(id))?;
        let slot = self.descend(vector, objects)?;
        let TreeNode::Leaf { members } = self.node_mut(slot)? else {
            return Err(Error::Internal("entry tree descent ended on a split".into()));
        };
        members.push(id);
        let overfull = members.len() > LEAF_CAPACITY;
        self.leaf_of.insert(id, slot);
        if overfull {
            self.split(slot, objects)?;
        }
        Ok(())
    }

    /// Drops `id` from its leaf. Pivots keep referencing removed objects,
    /// whose vectors stay in storage.
    pub(crate) fn remove(&mut self, id: ObjectId) -> bool {
        let Some(slot) = self.leaf_of.remove(&id) else {
            return false;
        };
        if let Some(TreeNode::Leaf { members }) = self.nodes.get_mut(slot as usize) {
            members.retain(|&m| m != id);
        }
        true
    }

    /// Entry points for `query`: up to `count` members accepted by
    /// `usable`, closest first.
    ///
    /// Members of the leaf the query descends to are preferred. When none
    /// of them is usable, the remaining leaves are scanned in arena order.
    pub(crate) fn seeds(
        &self,
        query: VectorView<'_>,
        objects: &ObjectsReader<'_>,
        count: usize,
        usable: impl Fn(ObjectId) -> bool,
    ) -> Result<Vec<ObjectDistance>> {
        let home = self.descend(query, objects)?;
        let mut seeds = self.leaf_seeds(home, query, objects, &usable)?;
        if seeds.is_empty() {
            for slot in 0..self.nodes.len() as u32 {
                if slot == home {
                    continue;
                }
                seeds = self.leaf_seeds(slot, query, objects, &usable)?;
                if !seeds.is_empty() {
                    break;
                }
            }
        }
        seeds.sort_unstable();
        seeds.truncate(count);
        Ok(seeds)
    }

    fn leaf_seeds(
        &self,
        slot: u32,
        query: VectorView<'_>,
        objects: &ObjectsReader<'_>,
        usable: &impl Fn(ObjectId) -> bool,
    ) -> Result<Vec<ObjectDistance>> {
        let TreeNode::Leaf { members } = self.node(slot)? else {
            return Ok(Vec::new());
        };
        members
            .iter()
            .filter(|&&id| usable(id))
            .map(|&id| Ok(ObjectDistance::new(id, objects.distance_to(query, id)?)))
            .collect()
    }

    fn descend(&self, vector: VectorView<'_>, objects: &ObjectsReader<'_>) -> Result<u32> {
        let mut slot = 0u32;
        loop {
            match self.node(slot)? {
                TreeNode::Leaf { .. } => return Ok(slot),
                TreeNode::Internal {
                    pivot,
                    radius,
                    inside,
                    outside,
                } => {
                    let d = objects.distance_to(vector, *pivot)?;
                    slot = if d <= *radius { *inside } else { *outside };
                }
            }
        }
    }

    /// Splits leaf `slot` around its first member, at the median distance.
    pub(super) fn split(&mut self, slot: u32, objects: &ObjectsReader<'_>) -> Result<()> {
        let TreeNode::Leaf { members } = self.node(slot)? else {
            return Ok(());
        };
        let pivot = *members
            .first()
            .ok_or_else(|| Error::Internal(format!("entry tree leaf {slot} is empty")))?;
        let pivot_vector = objects.view(pivot).ok_or(Error::ObjectNotFound(pivot))?;

        let mut ranked = members
            .iter()
            .map(|&id| Ok(ObjectDistance::new(id, objects.distance_to(pivot_vector, id)?)))
            .collect::<Result<Vec<_>>>()?;
        ranked.sort_unstable();
        let radius = ranked
            .get(ranked.len().saturating_sub(1) / 2)
            .map(|median| median.distance)
            .ok_or_else(|| Error::Internal(format!("entry tree leaf {slot} is empty")))?;

        let mut inside = Vec::with_capacity(ranked.len());
        let mut outside = Vec::with_capacity(ranked.len());
        for r in &ranked {
            if r.distance <= radius {
                inside.push(r.id);
            } else {
                outside.push(r.id);
            }
        }
        if outside.is_empty() {
            // All members are equidistant from the pivot.
            return Ok(());
        }

        let inside_slot = self.nodes.len() as u32;
        let outside_slot = inside_slot + 1;
        for &id in &inside {
            self.leaf_of.insert(id, inside_slot);
        }
        for &id in &outside {
            self.leaf_of.insert(id, outside_slot);
        }
        self.nodes.push(TreeNode::Leaf { members: inside });
        self.nodes.push(TreeNode::Leaf { members: outside });
        *self.node_mut(slot)? = TreeNode::Internal {
            pivot,
            radius,
            inside: inside_slot,
            outside: outside_slot,
        };
        Ok(())
    }

    fn node(&self, slot: u32) -> Result<&TreeNode> {
        self.nodes
            .get(slot as usize)
            .ok_or_else(|| Error::Internal(format!("entry tree slot {slot} out of range")))
    }

    fn node_mut(&mut self, slot: u32) -> Result<&mut TreeNode> {
        self.nodes
            .get_mut(slot as usize)
            .ok_or_else(|| Error::Internal(format!("entry tree slot {slot} out of range")))
    }

    pub(crate) fn to_image(&self) -> TreeImage {
        TreeImage {
            nodes: self.nodes.clone(),
            sampled: self.sampled,
        }
    }

    /// Rebuilds a tree from its image, checking every reference.
    ///
    /// `object_count` is the number of assigned object ids.
    pub(crate) fn from_image(image: TreeImage, object_count: usize) -> Result<Self> {
        let TreeImage { nodes, sampled } = image;
        if nodes.is_empty() {
            return Err(Error::CorruptIndex("entry tree has no root".into()));
        }
        let valid_id = |id: ObjectId| id >= 1 && (id as usize) <= object_count;
        let mut leaf_of = FxHashMap::default();
        let mut referenced = vec![false; nodes.len()];
        referenced[0] = true;

        for (slot, node) in nodes.iter().enumerate() {
            match node {
                TreeNode::Leaf { members } => {
                    for &id in members {
                        if !valid_id(id) || leaf_of.insert(id, slot as u32).is_some() {
                            return Err(Error::CorruptIndex(format!(
                                "entry tree leaf {slot} holds invalid or duplicate id {id}"
                            )));
                        }
                    }
                }
                TreeNode::Internal {
                    pivot,
                    radius,
                    inside,
                    outside,
                } => {
                    let children_ok = [*inside, *outside].iter().all(|&child| {
                        (child as usize) < nodes.len() && child as usize > slot
                    });
                    if !valid_id(*pivot) || !radius.is_finite() || !children_ok {
                        return Err(Error::CorruptIndex(format!(
                            "entry tree node {slot} is malformed"
                        )));
                    }
                    for child in [*inside, *outside] {
                        if std::mem::replace(&mut referenced[child as usize], true) {
                            return Err(Error::CorruptIndex(format!(
                                "entry tree node {child} has two parents"
                            )));
                        }
                    }
                }
            }
        }
        if referenced.iter().any(|r| !r) {
            return Err(Error::CorruptIndex("entry tree has orphan nodes".into()));
        }

        Ok(Self {
            nodes,
            sampled,
            leaf_of,
        })
    }
}
