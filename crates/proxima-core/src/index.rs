//! Index façade: owns the object space, graph and entry tree of one index
//! directory and exposes insert, build, search, remove and persistence.
//!
//! # Lifecycle
//!
//! ```text
//! create / open ──► Open ──► close ──► Closed (every call: ClosedIndex)
//!                    │ ▲
//!                    └─┘ insert, build_pending, search, remove, save
//! ```
//!
//! # Locking
//!
//! Operations clone the shared core out of the handle, so `close` never
//! waits for them. Inside the core, locks are always taken in the order
//! objects → graph → entry tree. Inserts serialize on `insert_lock` and
//! builds (and saves) on `build_lock`; searches take read locks only.

use crate::builder::{BuildReport, GraphBuilder};
use crate::config::ProximaConfig;
use crate::error::{Error, Result};
use crate::graph::{EntryTree, ProximityGraph};
use crate::object_space::ObjectSpace;
use crate::persistence::{self, LoadedIndex};
use crate::property::{DistanceType, ObjectType, Property};
use crate::result::{ObjectDistance, ResultSet};
use crate::search::{SearchContext, SearchParams, SearchScope};
use crate::vector::Vector;
use crate::ObjectId;
use parking_lot::{Mutex, RwLock};
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Point-in-time counters of an open index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Vector dimension.
    pub dimension: usize,
    /// Element encoding.
    pub object_type: ObjectType,
    /// Distance metric.
    pub distance_type: DistanceType,
    /// Ids ever assigned.
    pub objects: usize,
    /// Objects not removed.
    pub live: usize,
    /// Objects removed.
    pub removed: usize,
    /// Nodes linked into the graph.
    pub linked: usize,
    /// Live objects waiting for a build.
    pub pending: usize,
    /// Directed edges stored in the graph, stale ones included.
    pub edges: usize,
    /// Entry tree members.
    pub entry_points: usize,
}

/// State shared by every operation on an open index.
struct IndexCore {
    property: Property,
    config: ProximaConfig,
    objects: ObjectSpace,
    graph: ProximityGraph,
    tree: RwLock<EntryTree>,
    /// Live ids that are not linked yet, ascending.
    pending: Mutex<BTreeSet<ObjectId>>,
    insert_lock: Mutex<()>,
    build_lock: Mutex<()>,
    pool: ThreadPool,
}

impl IndexCore {
    fn new(property: Property, config: ProximaConfig, loaded: Option<LoadedIndex>) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.build.threads)
            .thread_name(|i| format!("proxima-build-{i}"))
            .build()
            .map_err(|e| Error::ResourceExhausted(format!("build thread pool: {e}")))?;

        let (objects, graph, tree) = match loaded {
            Some(loaded) => (loaded.objects, loaded.graph, loaded.tree),
            None => (
                ObjectSpace::new(&property),
                ProximityGraph::new(),
                EntryTree::new(),
            ),
        };

        let pending: BTreeSet<ObjectId> = {
            let objects_reader = objects.read();
            let graph_reader = graph.read();
            graph_reader
                .iter()
                .filter(|(id, node)| !node.is_linked() && objects_reader.is_live(*id))
                .map(|(id, _)| id)
                .collect()
        };

        Ok(Self {
            property,
            config,
            objects,
            graph,
            tree: RwLock::new(tree),
            pending: Mutex::new(pending),
            insert_lock: Mutex::new(()),
            build_lock: Mutex::new(()),
            pool,
        })
    }

    /// Records already-validated vectors with consecutive ids.
    fn insert_vectors(&self, vectors: Vec<Vector>) -> Result<Vec<ObjectId>> {
        let count = vectors.len();
        if count == 0 {
            return Ok(Vec::new());
        }
        let _insert = self.insert_lock.lock();
        self.graph.reserve(count)?;
        let first = self.objects.allocate_all(vectors)?;
        self.graph.push_unlinked(count);

        let ids: Vec<ObjectId> = (first..first + count as ObjectId).collect();
        self.pending.lock().extend(ids.iter().copied());
        Ok(ids)
    }

    fn search(&self, query: &Vector, params: &SearchParams) -> Result<ResultSet> {
        self.objects.check(query.view())?;
        let objects = self.objects.read();
        let graph = self.graph.read();
        let tree = self.tree.read();
        let ctx = SearchContext {
            property: &self.property,
            objects: &objects,
            graph: &graph,
            tree: &tree,
        };
        let found = ctx.search(query.view(), params, SearchScope::Live)?;
        Ok(ResultSet::from_unsorted(found))
    }

    fn build(&self, pool_size: usize) -> BuildReport {
        let _build = self.build_lock.lock();
        let selected: Vec<ObjectId> = {
            let mut pending = self.pending.lock();
            let limit = if pool_size == 0 { pending.len() } else { pool_size };
            let selected: Vec<ObjectId> = pending.iter().take(limit).copied().collect();
            for id in &selected {
                pending.remove(id);
            }
            selected
        };
        if selected.is_empty() {
            return BuildReport::default();
        }

        let builder = GraphBuilder {
            property: &self.property,
            objects: &self.objects,
            graph: &self.graph,
            tree: &self.tree,
            pool: &self.pool,
            batch_size: self.config.build.batch_size,
        };
        let report = builder.build(&selected);

        if !report.skipped().is_empty() {
            let mut pending = self.pending.lock();
            pending.extend(report.skipped().iter().map(|(id, _)| *id));
        }
        report
    }

    fn stats(&self) -> IndexStats {
        let objects = self.objects.read();
        let graph = self.graph.read();
        let tree = self.tree.read();
        let count = objects.len();
        let live = objects.iter().filter(|(_, slot)| !slot.is_removed()).count();
        IndexStats {
            dimension: self.property.dimension(),
            object_type: self.property.object_type(),
            distance_type: self.property.distance_type(),
            objects: count,
            live,
            removed: count - live,
            linked: graph.iter().filter(|(_, node)| node.is_linked()).count(),
            pending: self.pending.lock().len(),
            edges: graph.iter().map(|(_, node)| node.degree()).sum(),
            entry_points: tree.len(),
        }
    }
}

/// A proximity-graph index bound to a directory.
///
/// All methods take `&self`; the index can be shared across threads with
/// an `Arc`.
///
/// # Example
///
/// ```rust
/// use proxima_core::{DistanceType, Index, Property};
///
/// let dir = tempfile::tempdir().unwrap();
/// let mut property = Property::new();
/// property.set_dimension(2).set_distance_type(DistanceType::L2);
///
/// let index = Index::create(dir.path().join("points"), &property).unwrap();
/// for point in [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [5.0, 5.0], [5.0, 6.0]] {
///     index.insert(&point).unwrap();
/// }
/// index.build_pending(0).unwrap();
///
/// let results = index.search(&[0.0, 0.0], 2, 0.1, None).unwrap();
/// assert_eq!(results.first().map(|r| r.id), Some(1));
/// ```
pub struct Index {
    path: PathBuf,
    core: RwLock<Option<Arc<IndexCore>>>,
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Index {
    /// Creates a new, empty index in `path` with default configuration.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `property` is invalid or `path` already holds an
    /// index, `Io` if the directory cannot be written.
    pub fn create(path: impl AsRef<Path>, property: &Property) -> Result<Self> {
        Self::create_with_config(path, property, ProximaConfig::default())
    }

    /// Creates a new, empty index in `path`.
    ///
    /// The empty index is saved immediately, so `open` succeeds on `path`
    /// even if the caller never calls [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// See [`create`](Self::create); also `InvalidArgument` for an invalid
    /// `config`.
    pub fn create_with_config(
        path: impl AsRef<Path>,
        property: &Property,
        config: ProximaConfig,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        property.validate()?;
        validate_config(&config)?;
        if persistence::index_exists(&path) {
            return Err(Error::InvalidArgument(format!(
                "an index already exists at {}",
                path.display()
            )));
        }

        let core = IndexCore::new(property.clone(), config, None)?;
        persistence::save(&path, &core.property, &core.objects, &core.graph, &core.tree)?;
        tracing::info!(
            path = %path.display(),
            dimension = property.dimension(),
            distance = ?property.distance_type(),
            "index created"
        );
        Ok(Self {
            path,
            core: RwLock::new(Some(Arc::new(core))),
        })
    }

    /// Opens an index saved in `path` with default configuration.
    ///
    /// # Errors
    ///
    /// `CorruptIndex` if `path` does not hold a complete, consistent index.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, ProximaConfig::default())
    }

    /// Opens an index saved in `path`.
    ///
    /// # Errors
    ///
    /// `CorruptIndex` if `path` does not hold a complete, consistent index,
    /// `InvalidArgument` for an invalid `config`.
    pub fn open_with_config(path: impl AsRef<Path>, config: ProximaConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        validate_config(&config)?;
        let loaded = persistence::load(&path).inspect_err(|err| {
            tracing::warn!(path = %path.display(), error = %err, "index failed to load");
        })?;
        let core = IndexCore::new(loaded.property.clone(), config, Some(loaded))?;
        tracing::info!(
            path = %path.display(),
            objects = core.objects.len(),
            pending = core.pending.lock().len(),
            "index opened"
        );
        Ok(Self {
            path,
            core: RwLock::new(Some(Arc::new(core))),
        })
    }

    fn core(&self) -> Result<Arc<IndexCore>> {
        self.core.read().clone().ok_or(Error::ClosedIndex)
    }

    /// Directory the index was created in or opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true after [`close`](Self::close).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.core.read().is_none()
    }

    /// Saves the index into its own directory.
    ///
    /// # Errors
    ///
    /// `ClosedIndex`, or `Io` if writing fails.
    pub fn save(&self) -> Result<()> {
        self.save_to(&self.path)
    }

    /// Saves the index into `path`, waiting for a running build to finish.
    ///
    /// # Errors
    ///
    /// `ClosedIndex`, or `Io` if writing fails.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let core = self.core()?;
        let path = path.as_ref();
        let _build = core.build_lock.lock();
        persistence::save(path, &core.property, &core.objects, &core.graph, &core.tree)?;
        tracing::info!(path = %path.display(), objects = core.objects.len(), "index saved");
        Ok(())
    }

    /// Closes the index and releases its memory once in-flight operations
    /// finish. Unsaved changes are lost.
    ///
    /// # Errors
    ///
    /// `ClosedIndex` if the index is already closed.
    pub fn close(&self) -> Result<()> {
        let core = self.core.write().take().ok_or(Error::ClosedIndex)?;
        tracing::info!(path = %self.path.display(), objects = core.objects.len(), "index closed");
        Ok(())
    }

    /// Copy of the index property.
    ///
    /// # Errors
    ///
    /// `ClosedIndex`.
    pub fn property(&self) -> Result<Property> {
        Ok(self.core()?.property.clone())
    }

    /// Configuration the index was opened with.
    ///
    /// # Errors
    ///
    /// `ClosedIndex`.
    pub fn config(&self) -> Result<ProximaConfig> {
        Ok(self.core()?.config.clone())
    }

    /// Inserts a vector given as host values and returns its id. The object
    /// stays pending until the next build.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` or `InvalidArgument` if the values do not fit
    /// the property (nothing is recorded), `ResourceExhausted` on
    /// allocation failure, `ClosedIndex`.
    pub fn insert(&self, values: &[f64]) -> Result<ObjectId> {
        let core = self.core()?;
        let vector = core.objects.encode(values)?;
        let ids = core.insert_vectors(vec![vector])?;
        ids.first()
            .copied()
            .ok_or_else(|| Error::Internal("insert assigned no id".into()))
    }

    /// Inserts an already encoded vector.
    ///
    /// # Errors
    ///
    /// As [`insert`](Self::insert).
    pub fn insert_vector(&self, vector: Vector) -> Result<ObjectId> {
        let core = self.core()?;
        core.objects.check(vector.view())?;
        let ids = core.insert_vectors(vec![vector])?;
        ids.first()
            .copied()
            .ok_or_else(|| Error::Internal("insert assigned no id".into()))
    }

    /// Inserts several vectors with consecutive ids. Every vector is
    /// validated first; on error nothing is recorded.
    ///
    /// # Errors
    ///
    /// As [`insert`](Self::insert).
    pub fn insert_batch<V: AsRef<[f64]>>(&self, batch: &[V]) -> Result<Vec<ObjectId>> {
        let core = self.core()?;
        let mut vectors = Vec::new();
        vectors.try_reserve_exact(batch.len())?;
        for values in batch {
            vectors.push(core.objects.encode(values.as_ref())?);
        }
        let ids = core.insert_vectors(vectors)?;
        tracing::debug!(count = ids.len(), "batch inserted");
        Ok(ids)
    }

    /// Links up to `pool_size` pending objects (0 = all) into the graph.
    ///
    /// Objects that fail are reported in the [`BuildReport`] and stay
    /// pending; objects removed before being linked are dropped.
    ///
    /// # Errors
    ///
    /// `ClosedIndex`.
    pub fn build_pending(&self, pool_size: usize) -> Result<BuildReport> {
        let core = self.core()?;
        let report = core.build(pool_size);
        if report.linked_count() > 0 || !report.is_complete() {
            tracing::info!(
                linked = report.linked_count(),
                skipped = report.skipped().len(),
                dropped = report.dropped(),
                "graph build finished"
            );
        }
        Ok(report)
    }

    /// Links pending objects using the configured default pool size.
    ///
    /// # Errors
    ///
    /// `ClosedIndex`.
    pub fn build(&self) -> Result<BuildReport> {
        let pool_size = self.core()?.config.build.default_pool_size;
        self.build_pending(pool_size)
    }

    /// Approximate nearest neighbors of `query`.
    ///
    /// `radius = None` means unbounded.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch`/`InvalidArgument` for a malformed query or
    /// parameters, `NotReady` if nothing was ever linked, `ClosedIndex`.
    pub fn search(
        &self,
        query: &[f64],
        size: usize,
        epsilon: f32,
        radius: Option<f32>,
    ) -> Result<ResultSet> {
        let mut params = SearchParams::new(size).with_epsilon(epsilon);
        if let Some(radius) = radius {
            params = params.with_radius(radius);
        }
        let core = self.core()?;
        let query = core.objects.encode(query)?;
        core.search(&query, &params)
    }

    /// Searches with the configured default size and epsilon.
    ///
    /// # Errors
    ///
    /// As [`search`](Self::search).
    pub fn search_default(&self, query: &[f64]) -> Result<ResultSet> {
        let core = self.core()?;
        let params = core.config.search_params();
        let query = core.objects.encode(query)?;
        core.search(&query, &params)
    }

    /// Searches with an encoded query and explicit parameters.
    ///
    /// # Errors
    ///
    /// As [`search`](Self::search).
    pub fn search_with(&self, query: &Vector, params: &SearchParams) -> Result<ResultSet> {
        self.core()?.search(query, params)
    }

    /// Tombstones an object. It disappears from results immediately; its
    /// edges are pruned lazily by later builds.
    ///
    /// # Errors
    ///
    /// `ObjectNotFound` if the id was never assigned or is already
    /// removed, `ClosedIndex`.
    pub fn remove(&self, id: ObjectId) -> Result<()> {
        let core = self.core()?;
        core.objects.remove(id)?;
        core.tree.write().remove(id);
        core.pending.lock().remove(&id);
        tracing::debug!(id, "object removed");
        Ok(())
    }

    /// Copy of a live object's vector.
    ///
    /// # Errors
    ///
    /// `ObjectNotFound`, `ClosedIndex`.
    pub fn get_vector(&self, id: ObjectId) -> Result<Vector> {
        self.core()?.objects.get(id)
    }

    /// Distance between two stored objects under the index metric.
    ///
    /// # Errors
    ///
    /// `ObjectNotFound`, `ClosedIndex`.
    pub fn distance(&self, a: ObjectId, b: ObjectId) -> Result<f32> {
        self.core()?.objects.distance(a, b)
    }

    /// Snapshot of a node's adjacency list, ascending by distance.
    ///
    /// # Errors
    ///
    /// `ObjectNotFound` if the id was never assigned, `ClosedIndex`.
    pub fn neighbors(&self, id: ObjectId) -> Result<Vec<ObjectDistance>> {
        self.core()?
            .graph
            .neighbors(id)
            .ok_or(Error::ObjectNotFound(id))
    }

    /// Number of ids ever assigned, removed ones included.
    ///
    /// # Errors
    ///
    /// `ClosedIndex`.
    pub fn len(&self) -> Result<usize> {
        Ok(self.core()?.objects.len())
    }

    /// Returns true if no object was ever inserted.
    ///
    /// # Errors
    ///
    /// `ClosedIndex`.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of objects not removed.
    ///
    /// # Errors
    ///
    /// `ClosedIndex`.
    pub fn live_count(&self) -> Result<usize> {
        Ok(self.core()?.objects.live_count())
    }

    /// Number of live objects waiting for a build.
    ///
    /// # Errors
    ///
    /// `ClosedIndex`.
    pub fn pending_count(&self) -> Result<usize> {
        Ok(self.core()?.pending.lock().len())
    }

    /// Number of nodes linked into the graph.
    ///
    /// # Errors
    ///
    /// `ClosedIndex`.
    pub fn linked_count(&self) -> Result<usize> {
        Ok(self.core()?.graph.linked_count())
    }

    /// Point-in-time counters.
    ///
    /// # Errors
    ///
    /// `ClosedIndex`.
    pub fn stats(&self) -> Result<IndexStats> {
        Ok(self.core()?.stats())
    }
}

fn validate_config(config: &ProximaConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| Error::InvalidArgument(e.to_string()))
}
