//! Index persistence.
//!
//! An index directory holds four component files:
//!
//! | File       | Body                                                      |
//! |------------|-----------------------------------------------------------|
//! | `property` | `bincode` [`Property`]                                    |
//! | `objects`  | type tag, dimension, count, tombstone bitmap, components  |
//! | `graph`    | per node: linked flag, degree, `(id u32, distance f32)*`  |
//! | `tree`     | `bincode` entry tree arena                                |
//!
//! Each file is written to a `.tmp` sibling and renamed into place; the
//! `property` file goes last, so a directory only looks like an index once
//! every other component is complete. Encoding is deterministic: saving an
//! index that was just loaded reproduces the same bytes.

mod format;

use self::format::{
    decode_bincode, encode_bincode, Decoder, Encoder, GRAPH_MAGIC, OBJECTS_MAGIC, PROPERTY_MAGIC,
    TREE_MAGIC,
};
use crate::error::{Error, Result};
use crate::graph::{Adjacency, EntryTree, GraphReader, ProximityGraph, TreeImage, TreeNode};
use crate::object_space::{ObjectSpace, ObjectsReader};
use crate::property::{ObjectType, Property};
use crate::result::ObjectDistance;
use crate::vector::{Vector, VectorView};
use crate::ObjectId;
use parking_lot::RwLock;
use roaring::RoaringBitmap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub(crate) const PROPERTY_FILE: &str = "property";
pub(crate) const OBJECTS_FILE: &str = "objects";
pub(crate) const GRAPH_FILE: &str = "graph";
pub(crate) const TREE_FILE: &str = "tree";

/// In-memory state reconstructed by [`load`].
pub(crate) struct LoadedIndex {
    pub(crate) property: Property,
    pub(crate) objects: ObjectSpace,
    pub(crate) graph: ProximityGraph,
    pub(crate) tree: EntryTree,
}

/// Returns true if `dir` contains a saved index.
pub(crate) fn index_exists(dir: &Path) -> bool {
    dir.join(PROPERTY_FILE).is_file()
}

/// Serializes every component and writes them into `dir`.
///
/// The caller must exclude builds for the duration of the call so that
/// no node is caught between publishing its edges and being marked linked.
pub(crate) fn save(
    dir: &Path,
    property: &Property,
    objects: &ObjectSpace,
    graph: &ProximityGraph,
    tree: &RwLock<EntryTree>,
) -> Result<()> {
    // Encode under one consistent set of read guards, write without them.
    let files = {
        let objects_reader = objects.read();
        let graph_reader = graph.read();
        let tree_reader = tree.read();

        let object_bytes = encode_objects(property, &objects_reader)?;
        let graph_bytes = encode_graph(&graph_reader)?;
        let mut tree_encoder = Encoder::new(TREE_MAGIC);
        encode_bincode(&mut tree_encoder, &tree_reader.to_image())?;
        let mut property_encoder = Encoder::new(PROPERTY_MAGIC);
        encode_bincode(&mut property_encoder, property)?;

        [
            (OBJECTS_FILE, object_bytes),
            (GRAPH_FILE, graph_bytes),
            (TREE_FILE, tree_encoder.finish()),
            (PROPERTY_FILE, property_encoder.finish()),
        ]
    };

    fs::create_dir_all(dir)?;
    for (name, bytes) in &files {
        write_atomic(&dir.join(name), bytes)?;
    }
    tracing::debug!(path = %dir.display(), "index files written");
    Ok(())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = PathBuf::from(path);
    tmp.set_extension("tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        writer.write_all(bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn encode_objects(property: &Property, reader: &ObjectsReader<'_>) -> Result<Vec<u8>> {
    let count = reader.len();
    let mut removed = RoaringBitmap::new();
    for (id, slot) in reader.iter() {
        if slot.is_removed() {
            removed.insert(id);
        }
    }

    let mut encoder = Encoder::new(OBJECTS_MAGIC);
    encoder.put_u8(property.object_type().to_tag());
    encoder.put_u32(property.dimension() as u32);
    encoder.put_u64(count as u64);
    encoder.put_u32(removed.serialized_size() as u32);
    removed
        .serialize_into(encoder.buffer_mut())
        .map_err(|e| Error::Internal(format!("tombstone bitmap encoding failed: {e}")))?;

    let component_size = property.object_type().component_size();
    encoder.reserve(count * property.dimension() * component_size)?;
    for (_, slot) in reader.iter() {
        match slot.view() {
            VectorView::Float(values) => values.iter().for_each(|&v| encoder.put_f32(v)),
            VectorView::Uint8(values) => encoder.put_bytes(values),
        }
    }
    Ok(encoder.finish())
}

fn encode_graph(reader: &GraphReader<'_>) -> Result<Vec<u8>> {
    let mut encoder = Encoder::new(GRAPH_MAGIC);
    encoder.put_u64(reader.len() as u64);
    for (_, node) in reader.iter() {
        let neighbors = node.neighbors();
        encoder.reserve(5 + neighbors.len() * 8)?;
        encoder.put_u8(u8::from(node.is_linked()));
        encoder.put_u32(neighbors.len() as u32);
        for edge in neighbors.iter() {
            encoder.put_u32(edge.id);
            encoder.put_f32(edge.distance);
        }
    }
    Ok(encoder.finish())
}

fn read_file(dir: &Path, name: &'static str) -> Result<Vec<u8>> {
    fs::read(dir.join(name)).map_err(|e| Error::from_load_io(name, &e))
}

/// Reads and cross-validates every component in `dir`.
///
/// # Errors
///
/// `CorruptIndex` for missing, truncated, inconsistent or foreign files.
pub(crate) fn load(dir: &Path) -> Result<LoadedIndex> {
    let property = decode_property(&read_file(dir, PROPERTY_FILE)?)?;
    let (vectors, removed) = decode_objects(&property, &read_file(dir, OBJECTS_FILE)?)?;
    let count = vectors.len();
    let nodes = decode_graph(&property, count, &read_file(dir, GRAPH_FILE)?)?;
    let tree = decode_tree(count, &nodes, &read_file(dir, TREE_FILE)?)?;

    let objects = ObjectSpace::from_parts(&property, vectors, &removed);
    let graph = ProximityGraph::from_parts(nodes);
    tracing::debug!(
        path = %dir.display(),
        objects = count,
        linked = graph.linked_count(),
        "index files loaded"
    );
    Ok(LoadedIndex {
        property,
        objects,
        graph,
        tree,
    })
}

fn decode_property(bytes: &[u8]) -> Result<Property> {
    let mut decoder = Decoder::open(bytes, PROPERTY_MAGIC, PROPERTY_FILE)?;
    let property: Property = decode_bincode(&mut decoder)?;
    property
        .validate()
        .map_err(|e| decoder.corrupt(&format!("invalid property: {e}")))?;
    decoder.finish()?;
    Ok(property)
}

fn decode_objects(property: &Property, bytes: &[u8]) -> Result<(Vec<Vector>, RoaringBitmap)> {
    let mut decoder = Decoder::open(bytes, OBJECTS_MAGIC, OBJECTS_FILE)?;

    let object_type = ObjectType::from_tag(decoder.u8()?)
        .ok_or_else(|| decoder.corrupt("unknown object type"))?;
    if object_type != property.object_type() {
        return Err(decoder.corrupt("object type disagrees with property"));
    }
    let dimension = decoder.u32()? as usize;
    if dimension != property.dimension() {
        return Err(decoder.corrupt("dimension disagrees with property"));
    }
    let count = usize::try_from(decoder.u64()?)
        .ok()
        .filter(|&n| n < ObjectId::MAX as usize)
        .ok_or_else(|| decoder.corrupt("object count out of range"))?;

    let bitmap_len = decoder.u32()? as usize;
    let removed = RoaringBitmap::deserialize_from(decoder.take(bitmap_len)?)
        .map_err(|e| decoder.corrupt(&format!("malformed tombstone bitmap: {e}")))?;
    if removed.min() == Some(0) || removed.max().is_some_and(|max| max as usize > count) {
        return Err(decoder.corrupt("tombstone references an unknown id"));
    }

    let component_size = object_type.component_size();
    let expected = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(component_size))
        .ok_or_else(|| decoder.corrupt("object section size overflows"))?;
    if decoder.remaining() != expected {
        return Err(decoder.corrupt(&format!(
            "object section holds {} bytes, expected {expected}",
            decoder.remaining()
        )));
    }

    let mut vectors = Vec::new();
    vectors.try_reserve_exact(count)?;
    for _ in 0..count {
        let vector = match object_type {
            ObjectType::Float => {
                let mut values = Vec::with_capacity(dimension);
                for _ in 0..dimension {
                    let value = decoder.f32()?;
                    if !value.is_finite() {
                        return Err(decoder.corrupt("non-finite component"));
                    }
                    values.push(value);
                }
                Vector::Float(values)
            }
            ObjectType::Uint8 => Vector::Uint8(decoder.take(dimension)?.to_vec()),
        };
        vectors.push(vector);
    }
    decoder.finish()?;
    Ok((vectors, removed))
}

fn decode_graph(property: &Property, count: usize, bytes: &[u8]) -> Result<Vec<(bool, Adjacency)>> {
    let mut decoder = Decoder::open(bytes, GRAPH_MAGIC, GRAPH_FILE)?;
    let node_count = decoder.u64()?;
    if node_count != count as u64 {
        return Err(decoder.corrupt(&format!(
            "graph has {node_count} nodes for {count} objects"
        )));
    }

    let max_degree = property.edge_size_for_creation();
    let mut nodes = Vec::new();
    nodes.try_reserve_exact(count)?;
    for slot in 0..count {
        let id = slot as ObjectId + 1;
        let linked = match decoder.u8()? {
            0 => false,
            1 => true,
            _ => return Err(decoder.corrupt("invalid linked flag")),
        };
        let degree = decoder.u32()? as usize;
        if degree > max_degree {
            return Err(decoder.corrupt(&format!(
                "node {id} has {degree} edges, limit is {max_degree}"
            )));
        }
        if !linked && degree > 0 {
            return Err(decoder.corrupt(&format!("unlinked node {id} has edges")));
        }
        if degree.saturating_mul(8) > decoder.remaining() {
            return Err(decoder.corrupt(&format!("node {id} edge list is truncated")));
        }
        let mut adjacency: Vec<ObjectDistance> = Vec::with_capacity(degree);
        for _ in 0..degree {
            let target = decoder.u32()?;
            let distance = decoder.f32()?;
            if target == 0 || target as usize > count || target == id {
                return Err(decoder.corrupt(&format!(
                    "node {id} references invalid neighbor {target}"
                )));
            }
            if !distance.is_finite() || distance < 0.0 {
                return Err(decoder.corrupt(&format!("node {id} has an invalid edge distance")));
            }
            let edge = ObjectDistance::new(target, distance);
            if adjacency.iter().any(|e| e.id == target) {
                return Err(decoder.corrupt(&format!("node {id} lists neighbor {target} twice")));
            }
            if adjacency.last().is_some_and(|last| *last >= edge) {
                return Err(decoder.corrupt(&format!("node {id} edges are not sorted")));
            }
            adjacency.push(edge);
        }
        nodes.push((linked, adjacency));
    }
    decoder.finish()?;
    Ok(nodes)
}

fn decode_tree(count: usize, nodes: &[(bool, Adjacency)], bytes: &[u8]) -> Result<EntryTree> {
    let mut decoder = Decoder::open(bytes, TREE_MAGIC, TREE_FILE)?;
    let image: TreeImage = decode_bincode(&mut decoder)?;
    decoder.finish()?;
    let tree = EntryTree::from_image(image, count)?;

    let unlinked_member = tree
        .nodes()
        .iter()
        .filter_map(|node| match node {
            TreeNode::Leaf { members } => Some(members),
            TreeNode::Internal { .. } => None,
        })
        .flatten()
        .find(|&&id| !nodes[id as usize - 1].0);
    if let Some(id) = unlinked_member {
        return Err(Error::CorruptIndex(format!(
            "{TREE_FILE}: entry tree member {id} is not linked"
        )));
    }
    Ok(tree)
}
