//! Loop-prevention oracles.
//!
//! The forest asks an oracle whether an attach would close a cycle. Edits
//! are mirrored into the oracle as they are scheduled, so the oracle must
//! support undoing everything since the last commit: `unroll` reverts the
//! mirrored edits of a cancelled batch, `flush` forgets them on apply.

#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Id(u32);

impl Id {
    const NIL: Self = Self(u32::MAX);

    #[inline(always)]
    fn is_nil(self) -> bool {
        self.0 == u32::MAX
    }

    #[inline(always)]
    fn idx(self) -> usize {
        self.0 as usize
    }
}

#[inline(always)]
fn id(v: usize) -> Id {
    debug_assert!(v < u32::MAX as usize);
    Id(v as u32)
}

pub trait ConnectivityOracle: Default {
    fn create_vertex(&mut self);

    /// Records the edge `(a, b)`. The caller guarantees `a` and `b` are in
    /// different components.
    fn link(&mut self, a: usize, b: usize);

    /// Removes the edge `(a, b)`. The caller guarantees it exists.
    fn cut(&mut self, a: usize, b: usize);

    fn connected(&mut self, a: usize, b: usize) -> bool;

    /// Reverts every link/cut since the last `flush`.
    fn unroll(&mut self);

    /// Commits: drops the undo log.
    fn flush(&mut self);
}

/// Oracle for clients that guarantee acyclic edits: every connectivity
/// probe answers "not connected" and nothing is recorded.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLoopOracle;

impl ConnectivityOracle for NoLoopOracle {
    fn create_vertex(&mut self) {}
    fn link(&mut self, _a: usize, _b: usize) {}
    fn cut(&mut self, _a: usize, _b: usize) {}
    fn connected(&mut self, _a: usize, _b: usize) -> bool {
        false
    }
    fn unroll(&mut self) {}
    fn flush(&mut self) {}
}

#[derive(Clone, Copy, Debug)]
struct Node {
    ch: [Id; 2],
    p: Id,
    rev: bool,
}

#[derive(Clone, Copy, Debug)]
struct UndoRecord {
    a: u32,
    b: u32,
    undo_is_link: bool,
}

/// Splay-based link-cut forest tracking connectivity only, with an undo
/// log so a batch of mirrored edits can be rolled back.
#[derive(Clone, Debug, Default)]
pub struct LinkCutOracle {
    nodes: Vec<Node>,
    undo: Vec<UndoRecord>,
    stack: Vec<Id>,
}

impl LinkCutOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline(always)]
    fn node(&self, x: Id) -> &Node {
        debug_assert!(!x.is_nil());
        debug_assert!(x.idx() < self.nodes.len());
        if cfg!(debug_assertions) {
            &self.nodes[x.idx()]
        } else {
            // SAFETY: `Id` values are only created from valid indices and `NIL` is checked.
            unsafe { self.nodes.get_unchecked(x.idx()) }
        }
    }

    #[inline(always)]
    fn node_mut(&mut self, x: Id) -> &mut Node {
        debug_assert!(!x.is_nil());
        debug_assert!(x.idx() < self.nodes.len());
        if cfg!(debug_assertions) {
            &mut self.nodes[x.idx()]
        } else {
            // SAFETY: `Id` values are only created from valid indices and `NIL` is checked.
            unsafe { self.nodes.get_unchecked_mut(x.idx()) }
        }
    }

    fn is_aux_root(&self, x: Id) -> bool {
        let p = self.node(x).p;
        if p.is_nil() {
            return true;
        }
        self.node(p).ch[0] != x && self.node(p).ch[1] != x
    }

    fn apply_rev(&mut self, x: Id) {
        if x.is_nil() {
            return;
        }
        let nx = self.node_mut(x);
        nx.ch.swap(0, 1);
        nx.rev ^= true;
    }

    fn push(&mut self, x: Id) {
        if self.node(x).rev {
            let (l, r) = {
                let nx = self.node(x);
                (nx.ch[0], nx.ch[1])
            };
            self.apply_rev(l);
            self.apply_rev(r);
            self.node_mut(x).rev = false;
        }
    }

    fn rotate(&mut self, x: Id) {
        let p = self.node(x).p;
        let g = self.node(p).p;

        let dir = usize::from(self.node(p).ch[1] == x);
        let b = self.node(x).ch[dir ^ 1];

        if !self.is_aux_root(p) {
            if self.node(g).ch[0] == p {
                self.node_mut(g).ch[0] = x;
            } else if self.node(g).ch[1] == p {
                self.node_mut(g).ch[1] = x;
            }
        }
        self.node_mut(x).p = g;

        self.node_mut(x).ch[dir ^ 1] = p;
        self.node_mut(p).p = x;

        self.node_mut(p).ch[dir] = b;
        if !b.is_nil() {
            self.node_mut(b).p = p;
        }
    }

    fn push_path(&mut self, x: Id) {
        self.stack.clear();
        let mut y = x;
        self.stack.push(y);
        while !self.is_aux_root(y) {
            y = self.node(y).p;
            self.stack.push(y);
        }
        for i in (0..self.stack.len()).rev() {
            let v = self.stack[i];
            self.push(v);
        }
    }

    fn splay(&mut self, x: Id) {
        self.push_path(x);

        while !self.is_aux_root(x) {
            let p = self.node(x).p;
            let g = self.node(p).p;
            if !self.is_aux_root(p) {
                let zigzig = (self.node(g).ch[0] == p) == (self.node(p).ch[0] == x);
                if zigzig {
                    self.rotate(p);
                } else {
                    self.rotate(x);
                }
            }
            self.rotate(x);
        }
    }

    fn access(&mut self, x: Id) {
        // The right child on the preferred path must be dropped before the
        // next path segment is absorbed; `splay` re-establishes the
        // aux-root invariant between segments.
        let mut last = Id::NIL;
        let mut y = x;
        while !y.is_nil() {
            self.splay(y);
            self.node_mut(y).ch[1] = last;
            last = y;
            y = self.node(y).p;
        }
        self.splay(x);
    }

    fn make_root(&mut self, x: Id) {
        self.access(x);
        self.apply_rev(x);
    }

    fn link_impl(&mut self, a: usize, b: usize, record: bool) {
        debug_assert!(!self.connected_impl(a, b), "link of connected vertices");
        let a_id = id(a);
        self.make_root(a_id);
        self.node_mut(a_id).p = id(b);
        if record {
            self.undo.push(UndoRecord { a: a as u32, b: b as u32, undo_is_link: false });
        }
    }

    fn cut_impl(&mut self, a: usize, b: usize, record: bool) {
        let a_id = id(a);
        let b_id = id(b);
        self.make_root(a_id);
        self.access(b_id);
        let is_edge = self.node(b_id).ch[0] == a_id && self.node(a_id).ch[1].is_nil();
        assert!(is_edge, "cut of a non-existent edge ({a}, {b})");
        self.node_mut(b_id).ch[0] = Id::NIL;
        self.node_mut(a_id).p = Id::NIL;
        if record {
            self.undo.push(UndoRecord { a: a as u32, b: b as u32, undo_is_link: true });
        }
    }

    fn connected_impl(&mut self, a: usize, b: usize) -> bool {
        if a == b {
            return true;
        }
        let a_id = id(a);
        let b_id = id(b);
        self.make_root(a_id);
        self.access(b_id);
        !self.node(a_id).p.is_nil()
    }
}

impl ConnectivityOracle for LinkCutOracle {
    fn create_vertex(&mut self) {
        debug_assert!(self.nodes.len() < u32::MAX as usize);
        self.nodes.push(Node { ch: [Id::NIL, Id::NIL], p: Id::NIL, rev: false });
    }

    fn link(&mut self, a: usize, b: usize) {
        self.link_impl(a, b, true);
    }

    fn cut(&mut self, a: usize, b: usize) {
        self.cut_impl(a, b, true);
    }

    fn connected(&mut self, a: usize, b: usize) -> bool {
        self.connected_impl(a, b)
    }

    fn unroll(&mut self) {
        while let Some(r) = self.undo.pop() {
            if r.undo_is_link {
                self.link_impl(r.a as usize, r.b as usize, false);
            } else {
                self.cut_impl(r.a as usize, r.b as usize, false);
            }
        }
    }

    fn flush(&mut self) {
        self.undo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::VecDeque;

    fn bfs_connected(g: &[Vec<usize>], s: usize, t: usize) -> bool {
        if s == t {
            return true;
        }
        let mut q = VecDeque::new();
        let mut vis = vec![false; g.len()];
        vis[s] = true;
        q.push_back(s);
        while let Some(v) = q.pop_front() {
            for &to in &g[v] {
                if vis[to] {
                    continue;
                }
                if to == t {
                    return true;
                }
                vis[to] = true;
                q.push_back(to);
            }
        }
        false
    }

    fn add_edge(g: &mut [Vec<usize>], u: usize, v: usize) {
        g[u].push(v);
        g[v].push(u);
    }

    fn remove_edge(g: &mut [Vec<usize>], u: usize, v: usize) {
        let pu = g[u].iter().position(|&x| x == v).expect("edge not found");
        g[u].swap_remove(pu);
        let pv = g[v].iter().position(|&x| x == u).expect("edge not found");
        g[v].swap_remove(pv);
    }

    #[test]
    fn random_links_and_cuts_match_bfs() {
        let mut rng = StdRng::seed_from_u64(0x0DAC_1E11);
        let n = 40_usize;
        let steps = 6_000_usize;

        let mut oracle = LinkCutOracle::new();
        for _ in 0..n {
            oracle.create_vertex();
        }
        let mut g = vec![Vec::<usize>::new(); n];
        let mut edges = Vec::<(usize, usize)>::new();

        for it in 0..steps {
            match rng.random_range(0..3) {
                0 => {
                    let u = rng.random_range(0..n);
                    let v = rng.random_range(0..n);
                    if u == v || bfs_connected(&g, u, v) {
                        continue;
                    }
                    oracle.link(u, v);
                    add_edge(&mut g, u, v);
                    edges.push((u, v));
                }
                1 => {
                    if edges.is_empty() {
                        continue;
                    }
                    let idx = rng.random_range(0..edges.len());
                    let (u, v) = edges.swap_remove(idx);
                    oracle.cut(u, v);
                    remove_edge(&mut g, u, v);
                }
                _ => {
                    let u = rng.random_range(0..n);
                    let v = rng.random_range(0..n);
                    let expected = bfs_connected(&g, u, v);
                    assert_eq!(oracle.connected(u, v), expected, "it={it} connected({u},{v})");
                }
            }
        }
    }

    #[test]
    fn unroll_reverts_to_the_last_flush() {
        let mut rng = StdRng::seed_from_u64(0x0DAC_2026);
        let n = 24_usize;
        let mut oracle = LinkCutOracle::new();
        for _ in 0..n {
            oracle.create_vertex();
        }
        let mut g = vec![Vec::<usize>::new(); n];
        let mut edges = Vec::<(usize, usize)>::new();

        for _round in 0..50 {
            // Committed baseline.
            let baseline = edges.clone();

            for _ in 0..30 {
                if rng.random_bool(0.6) {
                    let u = rng.random_range(0..n);
                    let v = rng.random_range(0..n);
                    if u == v || bfs_connected(&g, u, v) {
                        continue;
                    }
                    oracle.link(u, v);
                    add_edge(&mut g, u, v);
                    edges.push((u, v));
                } else if !edges.is_empty() {
                    let idx = rng.random_range(0..edges.len());
                    let (u, v) = edges.swap_remove(idx);
                    oracle.cut(u, v);
                    remove_edge(&mut g, u, v);
                }
            }

            if rng.random_bool(0.5) {
                oracle.unroll();
                g = vec![Vec::new(); n];
                for &(u, v) in &baseline {
                    add_edge(&mut g, u, v);
                }
                edges = baseline;
            } else {
                oracle.flush();
            }

            for u in 0..n {
                for v in 0..n {
                    assert_eq!(oracle.connected(u, v), bfs_connected(&g, u, v));
                }
            }
        }
    }
}
