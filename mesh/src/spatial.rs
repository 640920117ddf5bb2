//! Lazily built spatial index for ray queries.
//!
//! The first query spawns a background BVH build and returns `None`; later
//! queries answer from the finished tree. The state transition and the spawn
//! happen under one lock, so concurrent first queries start exactly one
//! build.
//!
//! ```text
//! NotBuilt --query--> Building --finished--> Ready
//!                        ^                     |
//!                        +------rebuild()------+
//! ```
//!
//! During a rebuild the previous tree keeps answering queries.
//! [`rebuild_with`](SpatialIndex::rebuild_with) swaps in new geometry before
//! building, so edits to the mesh reach the next tree.

use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::bvh::{Bvh, RayHit};
use crate::task::BuildHandle;

/// Observable lifecycle of a [`SpatialIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialIndexState {
    /// No build has been requested.
    NotBuilt,
    /// A build is running.
    Building,
    /// A tree is available.
    Ready,
}

enum Slot {
    NotBuilt,
    Building {
        handle: BuildHandle<Bvh>,
        previous: Option<Arc<Bvh>>,
    },
    Ready(Arc<Bvh>),
}

struct Source {
    positions: Vec<[f32; 3]>,
    triangles: Vec<[u32; 3]>,
}

/// Asynchronously built BVH over a triangle stream.
pub struct SpatialIndex {
    // Locked after `slot` when both are held.
    source: Mutex<Arc<Source>>,
    leaf_size: usize,
    slot: Mutex<Slot>,
    finished: Arc<Condvar>,
}

impl SpatialIndex {
    /// Create an index; nothing is built until the first query.
    pub fn new(positions: Vec<[f32; 3]>, triangles: Vec<[u32; 3]>, leaf_size: usize) -> Self {
        Self {
            source: Mutex::new(Arc::new(Source {
                positions,
                triangles,
            })),
            leaf_size: leaf_size.max(1),
            slot: Mutex::new(Slot::NotBuilt),
            finished: Arc::new(Condvar::new()),
        }
    }

    /// Current state. Collects a finished build if one is pending.
    pub fn state(&self) -> SpatialIndexState {
        let mut slot = self.slot.lock();
        Self::collect(&mut slot);
        match &*slot {
            Slot::NotBuilt => SpatialIndexState::NotBuilt,
            Slot::Building { .. } => SpatialIndexState::Building,
            Slot::Ready(_) => SpatialIndexState::Ready,
        }
    }

    /// The current tree, starting a build if none exists.
    ///
    /// Never blocks on the build.
    pub fn get(&self) -> Option<Arc<Bvh>> {
        let mut slot = self.slot.lock();
        Self::collect(&mut slot);
        if matches!(*slot, Slot::NotBuilt) {
            *slot = self.spawn(None);
        }
        match &*slot {
            Slot::NotBuilt => None,
            Slot::Building { previous, .. } => previous.clone(),
            Slot::Ready(bvh) => Some(bvh.clone()),
        }
    }

    /// Closest hit of the segment `start → end`, or `None` if the index is
    /// not ready yet or nothing is hit.
    pub fn intersect_segment(&self, start: [f32; 3], end: [f32; 3]) -> Option<RayHit> {
        self.get()?.intersect_segment(start, end)
    }

    /// Start a fresh build over the current geometry.
    ///
    /// Ignored while a build is running; returns whether a build started.
    pub fn rebuild(&self) -> bool {
        self.restart(None)
    }

    /// Replace the indexed geometry and start a build over it.
    ///
    /// Ignored while a build is running, in which case the geometry is left
    /// unchanged and `false` is returned.
    pub fn rebuild_with(&self, positions: Vec<[f32; 3]>, triangles: Vec<[u32; 3]>) -> bool {
        self.restart(Some(Source {
            positions,
            triangles,
        }))
    }

    fn restart(&self, source: Option<Source>) -> bool {
        let mut slot = self.slot.lock();
        Self::collect(&mut slot);
        let previous = match &*slot {
            Slot::Building { .. } => {
                log::debug!("BVH rebuild ignored; a build is already running");
                return false;
            }
            Slot::NotBuilt => None,
            Slot::Ready(bvh) => Some(bvh.clone()),
        };
        if let Some(source) = source {
            *self.source.lock() = Arc::new(source);
        }
        *slot = self.spawn(previous);
        matches!(*slot, Slot::Building { .. })
    }

    /// Block until a tree is available, starting a build if needed.
    ///
    /// Returns `None` only if the build thread could not deliver a tree.
    pub fn wait_until_ready(&self) -> Option<Arc<Bvh>> {
        let mut slot = self.slot.lock();
        Self::collect(&mut slot);
        if matches!(*slot, Slot::NotBuilt) {
            *slot = self.spawn(None);
        }
        loop {
            Self::collect(&mut slot);
            match &*slot {
                Slot::Ready(bvh) => return Some(bvh.clone()),
                Slot::NotBuilt => return None,
                Slot::Building { .. } => {}
            }
            // The lock is released while waiting. The build thread notifies
            // after sending without taking the lock, so a notification can
            // land between collect and wait; the timeout covers that.
            self.finished.wait_for(&mut slot, Duration::from_millis(5));
        }
    }

    fn spawn(&self, previous: Option<Arc<Bvh>>) -> Slot {
        let source = self.source.lock().clone();
        let triangle_count = source.triangles.len();
        let leaf_size = self.leaf_size;
        let finished = self.finished.clone();
        let result = BuildHandle::spawn_notify(
            "redlilium-bvh",
            move || {
                crate::profile_scope!("bvh_build");
                Bvh::build(source.positions.clone(), source.triangles.clone(), leaf_size)
            },
            move || {
                finished.notify_all();
            },
        );
        match result {
            Ok(handle) => {
                log::debug!("Spawned BVH build over {triangle_count} triangles");
                Slot::Building { handle, previous }
            }
            Err(err) => {
                log::error!("Failed to spawn BVH build thread: {err}");
                previous.map_or(Slot::NotBuilt, Slot::Ready)
            }
        }
    }

    /// Move a finished build into `Ready`.
    fn collect(slot: &mut Slot) {
        let Slot::Building { handle, previous } = slot else {
            return;
        };
        let next = match handle.poll_result() {
            Poll::Pending => return,
            Poll::Ready(Some(bvh)) => Slot::Ready(Arc::new(bvh)),
            Poll::Ready(None) => {
                log::error!("BVH build thread exited without a result");
                previous.take().map_or(Slot::NotBuilt, Slot::Ready)
            }
        };
        *slot = next;
    }
}

impl std::fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let triangles = self.source.lock().triangles.len();
        f.debug_struct("SpatialIndex")
            .field("triangles", &triangles)
            .field("state", &self.state())
            .finish()
    }
}
