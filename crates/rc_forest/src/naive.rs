//! Naive reference forest: explicit parent/children vectors, O(depth)
//! queries. The correctness oracle for the contracted implementation.

use crate::error::{ForestError, Result};
use crate::policy::Monoid;
use crate::traits::RootedForest;

struct NaiveVertex<E: Copy, V: Copy> {
    parent: usize,
    children: Vec<usize>,
    v_info: V,
    e_up: E,
    e_down: E,

    scheduled_parent: usize,
    scheduled_children: Vec<usize>,
    scheduled_v_info: V,
    scheduled_e_up: E,
    scheduled_e_down: E,

    // A vertex is part of the current batch iff its stamp matches the
    // forest's; bumping the forest stamp invalidates every shadow at once.
    mod_count: u64,
}

pub struct NaiveForest<EP: Monoid, VP: Monoid> {
    vertices: Vec<NaiveVertex<EP::Value, VP::Value>>,
    edge_count: usize,
    scheduled_edge_count: usize,
    mod_count: u64,
    has_scheduled: bool,
}

impl<EP: Monoid, VP: Monoid> Default for NaiveForest<EP, VP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<EP: Monoid, VP: Monoid> NaiveForest<EP, VP> {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            edge_count: 0,
            scheduled_edge_count: 0,
            // Start at 1 so freshly created vertices are unchanged.
            mod_count: 1,
            has_scheduled: false,
        }
    }

    fn check(&self, op: &'static str, vertex: usize) -> Result<()> {
        if vertex >= self.vertices.len() {
            return Err(ForestError::VertexOutOfRange { op, vertex, len: self.vertices.len() });
        }
        Ok(())
    }

    fn ensure_has_scheduled(&mut self) {
        if !self.has_scheduled {
            self.has_scheduled = true;
            self.scheduled_edge_count = self.edge_count;
        }
    }

    fn ensure_changed(&mut self, vertex: usize) {
        self.ensure_has_scheduled();
        let mod_count = self.mod_count;
        let vx = &mut self.vertices[vertex];
        if vx.mod_count != mod_count {
            vx.mod_count = mod_count;
            vx.scheduled_parent = vx.parent;
            vx.scheduled_children = vx.children.clone();
            vx.scheduled_v_info = vx.v_info;
            vx.scheduled_e_up = vx.e_up;
            vx.scheduled_e_down = vx.e_down;
        }
    }

    fn is_changed(&self, vertex: usize) -> bool {
        self.vertices[vertex].mod_count == self.mod_count
    }

    fn scheduled_parent_of(&self, vertex: usize) -> usize {
        if self.is_changed(vertex) {
            self.vertices[vertex].scheduled_parent
        } else {
            self.vertices[vertex].parent
        }
    }

    fn depth(&self, mut vertex: usize) -> usize {
        let mut depth = 0;
        while self.vertices[vertex].parent != vertex {
            vertex = self.vertices[vertex].parent;
            depth += 1;
        }
        depth
    }
}

impl<EP: Monoid, VP: Monoid> RootedForest for NaiveForest<EP, VP> {
    type EdgePolicy = EP;
    type VertexPolicy = VP;

    fn n_vertices(&self) -> usize {
        self.vertices.len()
    }

    fn n_edges(&self) -> usize {
        self.edge_count
    }

    fn n_children(&self, vertex: usize) -> Result<usize> {
        self.check("n_children", vertex)?;
        Ok(self.vertices[vertex].children.len())
    }

    fn get_parent(&self, vertex: usize) -> Result<usize> {
        self.check("get_parent", vertex)?;
        Ok(self.vertices[vertex].parent)
    }

    fn get_vertex_info(&self, vertex: usize) -> Result<VP::Value> {
        self.check("get_vertex_info", vertex)?;
        Ok(self.vertices[vertex].v_info)
    }

    fn get_edge_info_upwards(&self, vertex: usize) -> Result<EP::Value> {
        self.check("get_edge_info_upwards", vertex)?;
        if self.vertices[vertex].parent == vertex {
            return Err(ForestError::EdgeInfoOfRoot { op: "get_edge_info_upwards", vertex });
        }
        Ok(self.vertices[vertex].e_up)
    }

    fn get_edge_info_downwards(&self, vertex: usize) -> Result<EP::Value> {
        self.check("get_edge_info_downwards", vertex)?;
        if self.vertices[vertex].parent == vertex {
            return Err(ForestError::EdgeInfoOfRoot { op: "get_edge_info_downwards", vertex });
        }
        Ok(self.vertices[vertex].e_down)
    }

    fn get_root(&self, vertex: usize) -> Result<usize> {
        self.check("get_root", vertex)?;
        let mut vertex = vertex;
        while self.vertices[vertex].parent != vertex {
            vertex = self.vertices[vertex].parent;
        }
        Ok(vertex)
    }

    fn get_path(&self, first: usize, last: usize) -> Result<EP::Value> {
        self.check("get_path", first)?;
        self.check("get_path", last)?;
        if self.get_root(first)? != self.get_root(last)? {
            return Err(ForestError::Disconnected { first, second: last });
        }

        let mut upwards = EP::neutral();
        let mut downwards = EP::neutral();
        let mut first = first;
        let mut last = last;
        let mut r_first = self.depth(first);
        let mut r_last = self.depth(last);

        while r_first > r_last {
            upwards = EP::combine(&upwards, &self.vertices[first].e_up);
            first = self.vertices[first].parent;
            r_first -= 1;
        }
        while r_last > r_first {
            downwards = EP::combine(&self.vertices[last].e_down, &downwards);
            last = self.vertices[last].parent;
            r_last -= 1;
        }
        while first != last {
            upwards = EP::combine(&upwards, &self.vertices[first].e_up);
            first = self.vertices[first].parent;
            downwards = EP::combine(&self.vertices[last].e_down, &downwards);
            last = self.vertices[last].parent;
        }

        Ok(EP::combine(&upwards, &downwards))
    }

    fn get_subtree(&self, vertex: usize) -> Result<VP::Value> {
        self.check("get_subtree", vertex)?;
        let mut sum = VP::neutral();
        let mut stack = vec![vertex];
        while let Some(v) = stack.pop() {
            sum = VP::combine(&sum, &self.vertices[v].v_info);
            stack.extend_from_slice(&self.vertices[v].children);
        }
        Ok(sum)
    }

    fn create_vertex(&mut self, info: VP::Value) -> usize {
        let index = self.vertices.len();
        self.vertices.push(NaiveVertex {
            parent: index,
            children: Vec::new(),
            v_info: info,
            e_up: EP::neutral(),
            e_down: EP::neutral(),
            scheduled_parent: index,
            scheduled_children: Vec::new(),
            scheduled_v_info: info,
            scheduled_e_up: EP::neutral(),
            scheduled_e_down: EP::neutral(),
            mod_count: 0,
        });
        index
    }

    fn scheduled_is_changed(&self, vertex: usize) -> Result<bool> {
        self.check("scheduled_is_changed", vertex)?;
        Ok(self.is_changed(vertex))
    }

    fn scheduled_get_parent(&self, vertex: usize) -> Result<usize> {
        self.check("scheduled_get_parent", vertex)?;
        Ok(self.scheduled_parent_of(vertex))
    }

    fn scheduled_n_edges(&self) -> usize {
        if self.has_scheduled { self.scheduled_edge_count } else { self.edge_count }
    }

    fn scheduled_n_children(&self, vertex: usize) -> Result<usize> {
        self.check("scheduled_n_children", vertex)?;
        if self.is_changed(vertex) {
            Ok(self.vertices[vertex].scheduled_children.len())
        } else {
            Ok(self.vertices[vertex].children.len())
        }
    }

    fn scheduled_has_changes(&self) -> bool {
        self.has_scheduled
    }

    fn scheduled_set_vertex_info(&mut self, vertex: usize, info: VP::Value) -> Result<()> {
        self.check("scheduled_set_vertex_info", vertex)?;
        self.ensure_changed(vertex);
        self.vertices[vertex].scheduled_v_info = info;
        Ok(())
    }

    fn scheduled_set_edge_info(
        &mut self,
        vertex: usize,
        upwards: EP::Value,
        downwards: EP::Value,
    ) -> Result<()> {
        self.check("scheduled_set_edge_info", vertex)?;
        if self.scheduled_parent_of(vertex) == vertex {
            return Err(ForestError::EdgeInfoOfRoot { op: "scheduled_set_edge_info", vertex });
        }
        self.ensure_changed(vertex);
        let vx = &mut self.vertices[vertex];
        vx.scheduled_e_up = upwards;
        vx.scheduled_e_down = downwards;
        Ok(())
    }

    fn scheduled_detach(&mut self, vertex: usize) -> Result<()> {
        self.check("scheduled_detach", vertex)?;
        if self.scheduled_parent_of(vertex) == vertex {
            return Err(ForestError::AlreadyRoot { vertex });
        }
        self.ensure_changed(vertex);
        let parent = self.vertices[vertex].scheduled_parent;
        self.ensure_changed(parent);

        let child_list = &mut self.vertices[parent].scheduled_children;
        let pos = child_list.iter().position(|&c| c == vertex).expect("child list out of sync");
        child_list.remove(pos);
        self.vertices[vertex].scheduled_parent = vertex;
        self.scheduled_edge_count -= 1;
        Ok(())
    }

    fn scheduled_attach(
        &mut self,
        parent: usize,
        child: usize,
        upwards: EP::Value,
        downwards: EP::Value,
    ) -> Result<()> {
        self.check("scheduled_attach", parent)?;
        self.check("scheduled_attach", child)?;
        if self.scheduled_parent_of(child) != child {
            return Err(ForestError::ChildNotRoot { child });
        }
        // Walk up from the parent; hitting the child anywhere on the way
        // to (and including) the root means the attach closes a cycle.
        let mut vp = parent;
        loop {
            if vp == child {
                return Err(ForestError::WouldCreateCycle { parent, child });
            }
            let up = self.scheduled_parent_of(vp);
            if up == vp {
                break;
            }
            vp = up;
        }

        self.ensure_changed(parent);
        self.ensure_changed(child);
        let chv = &mut self.vertices[child];
        chv.scheduled_parent = parent;
        chv.scheduled_e_up = upwards;
        chv.scheduled_e_down = downwards;
        self.vertices[parent].scheduled_children.push(child);
        self.scheduled_edge_count += 1;
        Ok(())
    }

    fn scheduled_apply(&mut self) {
        let mod_count = self.mod_count;
        for vx in &mut self.vertices {
            if vx.mod_count == mod_count {
                vx.parent = vx.scheduled_parent;
                vx.children = vx.scheduled_children.clone();
                vx.v_info = vx.scheduled_v_info;
                vx.e_up = vx.scheduled_e_up;
                vx.e_down = vx.scheduled_e_down;
            }
        }
        self.edge_count = self.scheduled_edge_count;
        self.has_scheduled = false;
        self.mod_count += 1;
    }

    fn scheduled_cancel(&mut self) {
        self.scheduled_edge_count = self.edge_count;
        self.has_scheduled = false;
        self.mod_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::I64Sum;

    #[test]
    fn chain_paths_and_subtrees() {
        let mut forest = NaiveForest::<I64Sum, I64Sum>::new();
        for _ in 0..5 {
            forest.create_vertex(1);
        }
        for i in 1..5 {
            forest.scheduled_attach(i - 1, i, 1, 1).unwrap();
        }
        forest.scheduled_apply();

        assert_eq!(forest.n_edges(), 4);
        assert_eq!(forest.get_path(4, 0).unwrap(), 4);
        assert_eq!(forest.get_path(0, 4).unwrap(), 4);
        assert_eq!(forest.get_subtree(2).unwrap(), 3);
        assert_eq!(forest.get_root(4).unwrap(), 0);
    }

    #[test]
    fn attach_rejects_cycles_including_the_root() {
        let mut forest = NaiveForest::<I64Sum, I64Sum>::new();
        for _ in 0..3 {
            forest.create_vertex(0);
        }
        forest.scheduled_attach(0, 1, 0, 0).unwrap();
        forest.scheduled_attach(1, 2, 0, 0).unwrap();
        assert_eq!(
            forest.scheduled_attach(2, 0, 0, 0),
            Err(ForestError::WouldCreateCycle { parent: 2, child: 0 })
        );
        assert_eq!(
            forest.scheduled_attach(1, 1, 0, 0),
            Err(ForestError::ChildNotRoot { child: 1 })
        );
        forest.scheduled_apply();
        assert_eq!(forest.n_edges(), 2);
    }
}
