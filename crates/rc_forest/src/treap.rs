//! Children-treap plumbing (ternarization) and the change tracker.
//!
//! Each vertex's unbounded child list in the represented tree is held as
//! a treap of link columns: BST by column index, heap by `heap_key`, with
//! the vertex's data column pinned at the treap root by its minimal key.
//! Treap links double as internal-tree edges, so every node the
//! contraction sees has at most three children (two treap children plus
//! the owned data column).
//!
//! All routines here operate on the scheduled image (level 0 and the
//! `scheduled_*` shadows) and mark every touched column changed first,
//! which lazily snapshots its committed state and seeds the affected set.

use crate::column::NONE;
use crate::conn::ConnectivityOracle;
use crate::driver::LoopDriver;
use crate::forest::RcForest;
use crate::policy::Monoid;

impl<EP, VP, C, D> RcForest<EP, VP, C, D>
where
    EP: Monoid,
    VP: Monoid,
    C: ConnectivityOracle,
    D: LoopDriver,
{
    fn ensure_has_scheduled(&mut self) {
        if !self.has_scheduled {
            self.has_scheduled = true;
            self.scheduled_edge_count = self.edge_count;
            self.n_modified = 0;
        }
    }

    /// Marks an internal column changed: snapshots its committed image
    /// (level 1, treap links, child count) into the scheduled one and
    /// records it in the affected seed set. Idempotent within a batch.
    pub(crate) fn ensure_changed(&mut self, vertex: i32) {
        assert!(vertex != NONE, "change of a nonexistent column");
        self.ensure_has_scheduled();
        if self.col(vertex).is_changed {
            return;
        }
        {
            let col = self.col_mut(vertex);
            col.is_changed = true;
            let committed = *col.at(1);
            *col.at_mut(0) = committed;
            col.scheduled_left = col.treap_left;
            col.scheduled_right = col.treap_right;
            col.scheduled_children_count = col.children_count;
        }
        let slot = self.n_modified;
        self.curr_modified[slot] = vertex as u32;
        self.n_modified = slot + 1;
    }

    /// Connects `child` (a scheduled root) below `parent` in the internal
    /// tree. Contraction verdicts depend on grandparents and siblings, so
    /// the whole affected neighborhood is marked as well.
    fn internal_attach(&mut self, parent: i32, child: i32) {
        assert!(self.col(child).at(0).parent == NONE, "internal_attach: child is not a root");

        self.ensure_changed(child);
        self.ensure_changed(parent);

        let (p_count, p_child0, p_parent) = {
            let vp = self.col(parent).at(0);
            (vp.child_count, vp.children[0], vp.parent)
        };
        if p_count == 1 {
            self.ensure_changed(p_child0);
        }
        if p_parent != NONE {
            self.ensure_changed(p_parent);
            let (gp_parent, gp_count) = {
                let vgp = self.col(p_parent).at(0);
                (vgp.parent, vgp.child_count)
            };
            if gp_parent != NONE && gp_count == 1 {
                self.ensure_changed(gp_parent);
            }
        }
        let (c_count, c_child0) = {
            let vch = self.col(child).at(0);
            (vch.child_count, vch.children[0])
        };
        if c_count == 1 {
            self.ensure_changed(c_child0);
        }

        self.col_mut(child).at_mut(0).parent = parent;
        self.col_mut(parent).at_mut(0).insert_child(child);
    }

    fn internal_detach(&mut self, child: i32) {
        self.ensure_changed(child);
        let parent = self.col(child).at(0).parent;
        self.ensure_changed(parent);

        self.col_mut(child).at_mut(0).parent = NONE;
        self.col_mut(parent).at_mut(0).remove_child(child);

        let (p_count, p_child0, p_parent) = {
            let vp = self.col(parent).at(0);
            (vp.child_count, vp.children[0], vp.parent)
        };
        if p_parent != NONE {
            self.ensure_changed(p_parent);
            let (gp_parent, gp_count) = {
                let vgp = self.col(p_parent).at(0);
                (vgp.parent, vgp.child_count)
            };
            if gp_parent != NONE && gp_count == 1 {
                self.ensure_changed(gp_parent);
            }
        }
        let (c_count, c_child0) = {
            let vch = self.col(child).at(0);
            (vch.child_count, vch.children[0])
        };
        if c_count == 1 {
            self.ensure_changed(c_child0);
        }
        if p_count == 1 {
            self.ensure_changed(p_child0);
        }
    }

    pub(crate) fn internal_set_einfo(&mut self, vertex: i32, up: EP::Value, down: EP::Value) {
        self.ensure_changed(vertex);
        {
            let node = self.col_mut(vertex).at_mut(0);
            node.e_up = up;
            node.e_down = down;
        }
        let (parent, count, child0) = {
            let node = self.col(vertex).at(0);
            (node.parent, node.child_count, node.children[0])
        };
        // A unary interior node may be compressing; both neighbors see its
        // edge labels at the next level.
        if parent != NONE && count == 1 {
            self.ensure_changed(child0);
            self.ensure_changed(parent);
        }
    }

    pub(crate) fn internal_set_vinfo(&mut self, vertex: i32, info: VP::Value) {
        self.ensure_changed(vertex);
        self.col_mut(vertex).at_mut(0).v_info = info;
        let (parent, count) = {
            let node = self.col(vertex).at(0);
            (node.parent, node.child_count)
        };
        if count <= 1 && parent != NONE {
            self.ensure_changed(parent);
        }
    }

    fn cartesian_detach(&mut self, vertex: i32) {
        if vertex == NONE {
            return;
        }
        self.ensure_changed(vertex);
        let parent = self.col(vertex).at(0).parent;
        assert!(parent != NONE, "cartesian_detach: vertex has no parent");
        self.internal_detach(vertex);
        self.ensure_changed(parent);
        let vp = self.col_mut(parent);
        if vp.scheduled_left == vertex {
            vp.scheduled_left = NONE;
        } else if vp.scheduled_right == vertex {
            vp.scheduled_right = NONE;
        } else {
            panic!("cartesian_detach: vertex is not a treap child of its parent");
        }
    }

    fn cartesian_attach_left(&mut self, parent: i32, child: i32) {
        self.ensure_changed(parent);
        assert!(self.col(parent).scheduled_left == NONE, "cartesian_attach_left: slot is busy");
        if child != NONE {
            self.internal_attach(parent, child);
            self.col_mut(parent).scheduled_left = child;
        }
    }

    fn cartesian_attach_right(&mut self, parent: i32, child: i32) {
        self.ensure_changed(parent);
        assert!(self.col(parent).scheduled_right == NONE, "cartesian_attach_right: slot is busy");
        if child != NONE {
            self.internal_attach(parent, child);
            self.col_mut(parent).scheduled_right = child;
        }
    }

    fn cartesian_merge(&mut self, left: i32, right: i32) -> i32 {
        if left == NONE {
            return right;
        }
        if right == NONE {
            return left;
        }
        self.ensure_changed(left);
        self.ensure_changed(right);

        if self.col(left).heap_key < self.col(right).heap_key {
            let lr = self.col(left).scheduled_right;
            self.cartesian_detach(lr);
            let merged = self.cartesian_merge(lr, right);
            self.cartesian_attach_right(left, merged);
            left
        } else {
            let rl = self.col(right).scheduled_left;
            self.cartesian_detach(rl);
            let merged = self.cartesian_merge(left, rl);
            self.cartesian_attach_left(right, merged);
            right
        }
    }

    fn cartesian_split(&mut self, tree: i32, index: i32) -> (i32, i32) {
        if tree == NONE {
            return (NONE, NONE);
        }
        self.ensure_changed(tree);

        if tree == index {
            let l = self.col(tree).scheduled_left;
            let r = self.col(tree).scheduled_right;
            self.cartesian_detach(l);
            self.cartesian_detach(r);
            (l, r)
        } else if tree < index {
            let r = self.col(tree).scheduled_right;
            self.cartesian_detach(r);
            let (mid, right) = self.cartesian_split(r, index);
            self.cartesian_attach_right(tree, mid);
            (tree, right)
        } else {
            let l = self.col(tree).scheduled_left;
            self.cartesian_detach(l);
            let (left, mid) = self.cartesian_split(l, index);
            self.cartesian_attach_left(tree, mid);
            (left, tree)
        }
    }

    /// Inserts a link column into the treap rooted at `tree`; returns the
    /// (possibly new) treap root.
    pub(crate) fn cartesian_insert(&mut self, tree: i32, vertex: i32) -> i32 {
        if tree == NONE {
            return vertex;
        }
        self.ensure_changed(tree);
        self.ensure_changed(vertex);

        if self.col(vertex).heap_key < self.col(tree).heap_key {
            let (left, right) = self.cartesian_split(tree, vertex);
            self.cartesian_attach_left(vertex, left);
            self.cartesian_attach_right(vertex, right);
            vertex
        } else {
            if vertex < tree {
                let l = self.col(tree).scheduled_left;
                self.cartesian_detach(l);
                let sub = self.cartesian_insert(l, vertex);
                self.cartesian_attach_left(tree, sub);
            } else {
                let r = self.col(tree).scheduled_right;
                self.cartesian_detach(r);
                let sub = self.cartesian_insert(r, vertex);
                self.cartesian_attach_right(tree, sub);
            }
            tree
        }
    }

    /// Removes a link column from the treap rooted at `tree`; returns the
    /// new treap root.
    pub(crate) fn cartesian_delete(&mut self, tree: i32, vertex: i32) -> i32 {
        assert!(tree != NONE, "cartesian_delete: empty treap");
        self.ensure_changed(tree);
        self.ensure_changed(vertex);

        if tree == vertex {
            let l = self.col(vertex).scheduled_left;
            let r = self.col(vertex).scheduled_right;
            self.cartesian_detach(l);
            self.cartesian_detach(r);
            self.cartesian_merge(l, r)
        } else {
            if vertex < tree {
                let l = self.col(tree).scheduled_left;
                self.cartesian_detach(l);
                let sub = self.cartesian_delete(l, vertex);
                self.cartesian_attach_left(tree, sub);
            } else {
                let r = self.col(tree).scheduled_right;
                self.cartesian_detach(r);
                let sub = self.cartesian_delete(r, vertex);
                self.cartesian_attach_right(tree, sub);
            }
            tree
        }
    }
}
