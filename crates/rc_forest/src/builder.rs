//! Builder variant: ingest a static forest, then query it.
//!
//! `ForestBuilder` accepts vertices and undirected labelled edges,
//! rejecting any edge that would close a cycle via union-find. `build`
//! freezes it into a [`StaticForest`] that answers path queries by DFS.

use crate::dsu::UnionFind;
use crate::error::{ForestError, Result};
use crate::policy::Monoid;

pub struct ForestBuilder<EP: Monoid, VP: Monoid> {
    vertices: Vec<VP::Value>,
    adjacency: Vec<Vec<(usize, EP::Value)>>,
    connectivity: UnionFind,
}

impl<EP: Monoid, VP: Monoid> Default for ForestBuilder<EP, VP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<EP: Monoid, VP: Monoid> ForestBuilder<EP, VP> {
    pub fn new() -> Self {
        Self { vertices: Vec::new(), adjacency: Vec::new(), connectivity: UnionFind::new() }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn add_vertex(&mut self, info: VP::Value) -> usize {
        self.vertices.push(info);
        self.adjacency.push(Vec::new());
        self.connectivity.add_vertex()
    }

    fn check(&self, op: &'static str, vertex: usize) -> Result<()> {
        if vertex >= self.vertices.len() {
            return Err(ForestError::VertexOutOfRange { op, vertex, len: self.vertices.len() });
        }
        Ok(())
    }

    pub fn add_edge(&mut self, first: usize, second: usize, info: EP::Value) -> Result<()> {
        self.check("add_edge", first)?;
        self.check("add_edge", second)?;
        if self.connectivity.same_set(first, second) {
            return Err(ForestError::WouldCreateCycle { parent: first, child: second });
        }
        self.adjacency[first].push((second, info));
        self.adjacency[second].push((first, info));
        self.connectivity.unite(first, second);
        Ok(())
    }

    pub fn has_path(&mut self, first: usize, second: usize) -> Result<bool> {
        self.check("has_path", first)?;
        self.check("has_path", second)?;
        Ok(self.connectivity.same_set(first, second))
    }

    pub fn build(self) -> StaticForest<EP, VP> {
        StaticForest {
            vertices: self.vertices,
            adjacency: self.adjacency,
            connectivity: self.connectivity,
        }
    }
}

/// Query-only forest produced by [`ForestBuilder`].
pub struct StaticForest<EP: Monoid, VP: Monoid> {
    vertices: Vec<VP::Value>,
    adjacency: Vec<Vec<(usize, EP::Value)>>,
    connectivity: UnionFind,
}

impl<EP: Monoid, VP: Monoid> StaticForest<EP, VP> {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    fn check(&self, op: &'static str, vertex: usize) -> Result<()> {
        if vertex >= self.vertices.len() {
            return Err(ForestError::VertexOutOfRange { op, vertex, len: self.vertices.len() });
        }
        Ok(())
    }

    pub fn vertex_info(&self, vertex: usize) -> Result<VP::Value> {
        self.check("vertex_info", vertex)?;
        Ok(self.vertices[vertex])
    }

    pub fn has_edge(&self, first: usize, second: usize) -> Result<bool> {
        self.check("has_edge", first)?;
        self.check("has_edge", second)?;
        Ok(self.adjacency[first].iter().any(|&(to, _)| to == second))
    }

    pub fn edge_info(&self, first: usize, second: usize) -> Result<EP::Value> {
        self.check("edge_info", first)?;
        self.check("edge_info", second)?;
        self.adjacency[first]
            .iter()
            .find(|&&(to, _)| to == second)
            .map(|&(_, info)| info)
            .ok_or(ForestError::Disconnected { first, second })
    }

    pub fn has_path(&mut self, first: usize, second: usize) -> Result<bool> {
        self.check("has_path", first)?;
        self.check("has_path", second)?;
        Ok(self.connectivity.same_set(first, second))
    }

    /// The tree path from `first` to `second`, as a vertex sequence.
    /// Iterative DFS; the forest is acyclic so the first route found is
    /// the only one.
    fn path_between(&self, first: usize, second: usize) -> Result<Vec<usize>> {
        let mut came_from = vec![usize::MAX; self.vertices.len()];
        came_from[first] = first;
        let mut stack = vec![first];
        while let Some(v) = stack.pop() {
            if v == second {
                break;
            }
            for &(to, _) in &self.adjacency[v] {
                if came_from[to] == usize::MAX {
                    came_from[to] = v;
                    stack.push(to);
                }
            }
        }
        if came_from[second] == usize::MAX {
            return Err(ForestError::Disconnected { first, second });
        }
        let mut path = vec![second];
        let mut cur = second;
        while cur != first {
            cur = came_from[cur];
            path.push(cur);
        }
        path.reverse();
        Ok(path)
    }

    /// Edge-monoid sum along the path `first -> second`, in path order.
    /// Fails on disconnected endpoints and on the empty path (a single
    /// vertex carries no edge data).
    pub fn path_edge_info(&self, first: usize, second: usize) -> Result<EP::Value> {
        self.check("path_edge_info", first)?;
        self.check("path_edge_info", second)?;
        if first == second {
            return Err(ForestError::Disconnected { first, second });
        }
        let path = self.path_between(first, second)?;
        let mut sum = EP::neutral();
        for pair in path.windows(2) {
            sum = EP::combine(&sum, &self.edge_info(pair[0], pair[1])?);
        }
        Ok(sum)
    }

    /// Vertex-monoid sum over the path `first -> second`, inclusive.
    pub fn path_vertex_info(&self, first: usize, second: usize) -> Result<VP::Value> {
        self.check("path_vertex_info", first)?;
        self.check("path_vertex_info", second)?;
        let path = self.path_between(first, second)?;
        let mut sum = VP::neutral();
        for v in path {
            sum = VP::combine(&sum, &self.vertices[v]);
        }
        Ok(sum)
    }
}
