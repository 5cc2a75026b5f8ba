//! Trait-based API for batched rooted-forest implementations.

use crate::error::Result;
use crate::policy::Monoid;

/// A rooted forest with staged (batched) edits.
///
/// Edits are recorded by the `scheduled_*` family and take effect
/// atomically at [`scheduled_apply`](RootedForest::scheduled_apply); the
/// plain query methods always observe the last applied state. Every edge
/// carries an upward and a downward label from the (possibly
/// non-commutative) edge monoid `E`; every vertex carries a label from
/// the commutative vertex monoid `V`.
pub trait RootedForest {
    type EdgePolicy: Monoid;
    type VertexPolicy: Monoid;

    fn n_vertices(&self) -> usize;
    fn n_edges(&self) -> usize;
    fn n_roots(&self) -> usize {
        self.n_vertices() - self.n_edges()
    }

    fn n_children(&self, vertex: usize) -> Result<usize>;

    /// The parent of `vertex`; a root reports itself.
    fn get_parent(&self, vertex: usize) -> Result<usize>;

    fn is_root(&self, vertex: usize) -> Result<bool> {
        Ok(self.get_parent(vertex)? == vertex)
    }

    fn get_vertex_info(&self, vertex: usize) -> Result<<Self::VertexPolicy as Monoid>::Value>;

    /// The label of the edge from `vertex` towards its parent.
    fn get_edge_info_upwards(&self, vertex: usize) -> Result<<Self::EdgePolicy as Monoid>::Value>;

    /// The label of the edge from the parent down to `vertex`.
    fn get_edge_info_downwards(&self, vertex: usize)
    -> Result<<Self::EdgePolicy as Monoid>::Value>;

    /// The root of the tree containing `vertex`.
    fn get_root(&self, vertex: usize) -> Result<usize>;

    /// Monoid sum of edge labels along the path `first -> last`, taking
    /// upward labels while climbing and downward labels while descending.
    fn get_path(&self, first: usize, last: usize)
    -> Result<<Self::EdgePolicy as Monoid>::Value>;

    /// Commutative monoid sum of vertex labels over the subtree of
    /// `vertex`, inclusive.
    fn get_subtree(&self, vertex: usize) -> Result<<Self::VertexPolicy as Monoid>::Value>;

    /// Creates an isolated root vertex; returns its index.
    fn create_vertex(&mut self, info: <Self::VertexPolicy as Monoid>::Value) -> usize;

    fn scheduled_is_changed(&self, vertex: usize) -> Result<bool>;
    fn scheduled_get_parent(&self, vertex: usize) -> Result<usize>;
    fn scheduled_is_root(&self, vertex: usize) -> Result<bool> {
        Ok(self.scheduled_get_parent(vertex)? == vertex)
    }
    fn scheduled_n_edges(&self) -> usize;
    fn scheduled_n_roots(&self) -> usize {
        self.n_vertices() - self.scheduled_n_edges()
    }
    fn scheduled_n_children(&self, vertex: usize) -> Result<usize>;
    fn scheduled_has_changes(&self) -> bool;

    fn scheduled_set_vertex_info(
        &mut self,
        vertex: usize,
        info: <Self::VertexPolicy as Monoid>::Value,
    ) -> Result<()>;

    /// Relabels the edge towards the parent. Fails on a (scheduled) root.
    fn scheduled_set_edge_info(
        &mut self,
        vertex: usize,
        upwards: <Self::EdgePolicy as Monoid>::Value,
        downwards: <Self::EdgePolicy as Monoid>::Value,
    ) -> Result<()>;

    /// Detaches `vertex` from its scheduled parent. Fails on a root.
    fn scheduled_detach(&mut self, vertex: usize) -> Result<()>;

    /// Attaches `child` (which must be a scheduled root) below `parent`.
    /// Fails if the two vertices are already in the same scheduled tree.
    fn scheduled_attach(
        &mut self,
        parent: usize,
        child: usize,
        upwards: <Self::EdgePolicy as Monoid>::Value,
        downwards: <Self::EdgePolicy as Monoid>::Value,
    ) -> Result<()>;

    /// Commits the batch atomically.
    fn scheduled_apply(&mut self);

    /// Drops the batch, restoring the last applied state.
    fn scheduled_cancel(&mut self);
}
