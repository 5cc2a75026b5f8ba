//! The RC-forest facade: a rooted dynamic forest contracted into a
//! logarithmic stack of levels, with batched edits.

use std::sync::atomic::AtomicBool;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::column::{CoinFlips, Column, LevelNode, NONE, Verdict};
use crate::conn::{ConnectivityOracle, NoLoopOracle};
use crate::driver::{LoopDriver, SeqDriver};
use crate::error::{ForestError, Result};
use crate::policy::Monoid;
use crate::traits::RootedForest;

const DEFAULT_SEED: u64 = 0x5EED_2C00;

/// Rooted dynamic forest over a rake-and-compress contraction.
///
/// Each user vertex `u` owns two internal columns: a data column `2u`
/// (vertex label, treap root of `u`'s children) and a link column `2u+1`
/// (the edge towards the parent; a node of the parent's children-treap).
/// `C` is the loop-prevention oracle consulted by `scheduled_attach`; the
/// default answers "not connected" and is only safe when the client never
/// schedules a cycle. `D` drives the loops of `scheduled_apply`.
pub struct RcForest<EP, VP, C = NoLoopOracle, D = SeqDriver>
where
    EP: Monoid,
    VP: Monoid,
    C: ConnectivityOracle,
    D: LoopDriver,
{
    pub(crate) columns: Vec<Column<EP::Value, VP::Value>>,
    pub(crate) edge_count: usize,
    pub(crate) scheduled_edge_count: usize,
    pub(crate) has_scheduled: bool,

    pub(crate) oracle: C,
    pub(crate) driver: D,
    pub(crate) coins: CoinFlips,
    rng: StdRng,

    // Affected-set machinery of the apply loop. `curr_modified[..n_modified]`
    // holds the columns whose verdict must be recomputed at the current
    // level; `claimed` carries the per-column test-and-set dedup flags.
    pub(crate) curr_modified: Vec<u32>,
    pub(crate) next_modified: Vec<u32>,
    pub(crate) n_modified: usize,
    pub(crate) claimed: Vec<AtomicBool>,
}

impl<EP, VP, C, D> Default for RcForest<EP, VP, C, D>
where
    EP: Monoid,
    VP: Monoid,
    C: ConnectivityOracle,
    D: LoopDriver + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<EP, VP, C, D> RcForest<EP, VP, C, D>
where
    EP: Monoid,
    VP: Monoid,
    C: ConnectivityOracle,
    D: LoopDriver + Default,
{
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_driver_and_seed(D::default(), seed)
    }
}

impl<EP, VP, C, D> RcForest<EP, VP, C, D>
where
    EP: Monoid,
    VP: Monoid,
    C: ConnectivityOracle,
    D: LoopDriver,
{
    pub fn with_driver(driver: D) -> Self {
        Self::with_driver_and_seed(driver, DEFAULT_SEED)
    }

    pub fn with_driver_and_seed(driver: D, seed: u64) -> Self {
        Self {
            columns: Vec::new(),
            edge_count: 0,
            scheduled_edge_count: 0,
            has_scheduled: false,
            oracle: C::default(),
            driver,
            coins: CoinFlips::new(seed),
            rng: StdRng::seed_from_u64(seed ^ 0x9E37_79B9_7F4A_7C15),
            curr_modified: Vec::new(),
            next_modified: Vec::new(),
            n_modified: 0,
            claimed: Vec::new(),
        }
    }

    /// Number of contraction levels currently materialized. Expected
    /// O(log n) for n vertices.
    pub fn height(&self) -> usize {
        self.columns.iter().map(|col| col.last_live).max().unwrap_or(0) as usize
    }

    fn check(&self, op: &'static str, vertex: usize) -> Result<()> {
        if vertex >= self.n_vertices() {
            return Err(ForestError::VertexOutOfRange { op, vertex, len: self.n_vertices() });
        }
        Ok(())
    }

    #[inline(always)]
    pub(crate) fn col(&self, vertex: i32) -> &Column<EP::Value, VP::Value> {
        debug_assert!(vertex != NONE);
        &self.columns[vertex as usize]
    }

    #[inline(always)]
    pub(crate) fn col_mut(&mut self, vertex: i32) -> &mut Column<EP::Value, VP::Value> {
        debug_assert!(vertex != NONE);
        &mut self.columns[vertex as usize]
    }

    fn create_vertex_impl(&mut self, info: VP::Value) -> usize {
        let data_index = self.columns.len() as i32;
        let link_index = data_index + 1;

        let data_node = LevelNode::new(info, EP::neutral(), EP::neutral());
        let link_node = LevelNode::new(VP::neutral(), EP::neutral(), EP::neutral());
        let raked_node = LevelNode::new(info, EP::neutral(), EP::neutral());

        // Two internal nodes per vertex. The data node always rakes into
        // its link node at level 1; absorbing it here keeps a fresh vertex
        // out of every future affected set.
        let mut data_col = Column::new(-1);
        data_col.push_level(data_node);
        data_col.push_level(data_node);
        data_col.verdict = Verdict::Rake;

        let mut link_col = Column::new(self.rng.random_range(0..i64::MAX));
        link_col.push_level(link_node);
        link_col.push_level(link_node);
        link_col.push_level(raked_node);
        link_col.verdict = Verdict::Root;

        link_col.at_mut(0).insert_child(data_index);
        link_col.at_mut(1).insert_child(data_index);
        data_col.at_mut(0).parent = link_index;
        data_col.at_mut(1).parent = link_index;

        self.columns.push(data_col);
        self.columns.push(link_col);

        self.oracle.create_vertex();

        self.curr_modified.extend([0, 0]);
        self.next_modified.extend([0, 0]);
        self.claimed.push(AtomicBool::new(false));
        self.claimed.push(AtomicBool::new(false));

        (data_index / 2) as usize
    }

    fn get_parent_impl(&self, vertex: usize) -> usize {
        let mut vx = 2 * vertex as i32 + 1;
        while vx != NONE && vx & 1 == 1 {
            vx = self.col(vx).at(1).parent;
        }
        if vx == NONE { vertex } else { (vx / 2) as usize }
    }

    fn scheduled_get_parent_impl(&self, vertex: usize) -> usize {
        let mut vx = 2 * vertex as i32 + 1;
        while vx != NONE && vx & 1 == 1 {
            let col = self.col(vx);
            let level = if col.is_changed { 0 } else { 1 };
            vx = col.at(level).parent;
        }
        if vx == NONE { vertex } else { (vx / 2) as usize }
    }

    fn get_root_impl(&self, vertex: usize) -> usize {
        let mut vx = 2 * vertex as i32;
        while self.col(vx).verdict != Verdict::Root {
            let col = self.col(vx);
            // Rake and compress both leave through the parent.
            vx = col.at(col.last_live).parent;
        }
        (vx / 2) as usize
    }

    fn relax_probe(&self, probe: &mut PathProbe<EP::Value>) {
        let col = self.col(probe.vertex);
        let level = col.last_live;
        let node = col.at(level);
        match col.verdict {
            Verdict::Rake => self.climb_probe(probe, node),
            Verdict::Compress if probe.compress_up => self.climb_probe(probe, node),
            Verdict::Compress => {
                let child = node.children[0];
                let child_node = self.col(child).at(level);
                probe.vertex = child;
                probe.sum = if probe.is_first_half {
                    EP::combine(&probe.sum, &child_node.e_down)
                } else {
                    EP::combine(&child_node.e_up, &probe.sum)
                };
            }
            Verdict::Root => {}
        }
    }

    fn climb_probe(&self, probe: &mut PathProbe<EP::Value>, node: &LevelNode<EP::Value, VP::Value>) {
        probe.vertex = node.parent;
        probe.sum = if probe.is_first_half {
            EP::combine(&probe.sum, &node.e_up)
        } else {
            EP::combine(&node.e_down, &probe.sum)
        };
    }

    fn get_path_impl(&self, first: usize, last: usize) -> EP::Value {
        // A compressed column's surviving neighborhood may sit above or
        // below it, so each endpoint walks both orientations; until the two
        // endpoints meet, the represented difference is always one edge, so
        // tracking the two candidates per side is enough.
        let mut probes = [
            PathProbe::new(2 * first as i32, true, true, EP::neutral()),
            PathProbe::new(2 * first as i32, true, false, EP::neutral()),
            PathProbe::new(2 * last as i32, false, true, EP::neutral()),
            PathProbe::new(2 * last as i32, false, false, EP::neutral()),
        ];

        loop {
            if probes[0].vertex == probes[1].vertex {
                probes[1].sum = probes[0].sum;
            }
            if probes[2].vertex == probes[3].vertex {
                probes[3].sum = probes[2].sum;
            }
            for i in 0..2 {
                for j in 2..4 {
                    if probes[i].vertex == probes[j].vertex {
                        return EP::combine(&probes[i].sum, &probes[j].sum);
                    }
                }
            }
            let mut relax = 0;
            let mut level = self.col(probes[0].vertex).last_live;
            for (i, probe) in probes.iter().enumerate().skip(1) {
                let probe_level = self.col(probe.vertex).last_live;
                if probe_level < level {
                    level = probe_level;
                    relax = i;
                }
            }
            self.relax_probe(&mut probes[relax]);
        }
    }

    fn get_subtree_impl(&self, vertex: usize) -> VP::Value {
        let mut vx = 2 * vertex as i32;
        let mut sum = VP::neutral();
        loop {
            let col = self.col(vx);
            let node = col.at(col.last_live);
            sum = VP::combine(&sum, &node.v_info);
            match col.verdict {
                Verdict::Root | Verdict::Rake => return sum,
                // The sole child of a compressed column still holds the
                // whole represented subtree below it.
                Verdict::Compress => vx = node.children[0],
            }
        }
    }
}

struct PathProbe<E> {
    vertex: i32,
    is_first_half: bool,
    compress_up: bool,
    sum: E,
}

impl<E> PathProbe<E> {
    fn new(vertex: i32, is_first_half: bool, compress_up: bool, sum: E) -> Self {
        Self { vertex, is_first_half, compress_up, sum }
    }
}

impl<EP, VP, C, D> RootedForest for RcForest<EP, VP, C, D>
where
    EP: Monoid,
    VP: Monoid,
    C: ConnectivityOracle,
    D: LoopDriver,
{
    type EdgePolicy = EP;
    type VertexPolicy = VP;

    fn n_vertices(&self) -> usize {
        self.columns.len() / 2
    }

    fn n_edges(&self) -> usize {
        self.edge_count
    }

    fn n_children(&self, vertex: usize) -> Result<usize> {
        self.check("n_children", vertex)?;
        Ok(self.col(2 * vertex as i32).children_count as usize)
    }

    fn get_parent(&self, vertex: usize) -> Result<usize> {
        self.check("get_parent", vertex)?;
        Ok(self.get_parent_impl(vertex))
    }

    fn get_vertex_info(&self, vertex: usize) -> Result<VP::Value> {
        self.check("get_vertex_info", vertex)?;
        Ok(self.col(2 * vertex as i32).at(1).v_info)
    }

    fn get_edge_info_upwards(&self, vertex: usize) -> Result<EP::Value> {
        self.check("get_edge_info_upwards", vertex)?;
        if self.get_parent_impl(vertex) == vertex {
            return Err(ForestError::EdgeInfoOfRoot { op: "get_edge_info_upwards", vertex });
        }
        Ok(self.col(2 * vertex as i32).at(1).e_up)
    }

    fn get_edge_info_downwards(&self, vertex: usize) -> Result<EP::Value> {
        self.check("get_edge_info_downwards", vertex)?;
        if self.get_parent_impl(vertex) == vertex {
            return Err(ForestError::EdgeInfoOfRoot { op: "get_edge_info_downwards", vertex });
        }
        Ok(self.col(2 * vertex as i32).at(1).e_down)
    }

    fn get_root(&self, vertex: usize) -> Result<usize> {
        self.check("get_root", vertex)?;
        Ok(self.get_root_impl(vertex))
    }

    fn get_path(&self, first: usize, last: usize) -> Result<EP::Value> {
        self.check("get_path", first)?;
        self.check("get_path", last)?;
        if self.get_root_impl(first) != self.get_root_impl(last) {
            return Err(ForestError::Disconnected { first, second: last });
        }
        Ok(self.get_path_impl(first, last))
    }

    fn get_subtree(&self, vertex: usize) -> Result<VP::Value> {
        self.check("get_subtree", vertex)?;
        Ok(self.get_subtree_impl(vertex))
    }

    fn create_vertex(&mut self, info: VP::Value) -> usize {
        self.create_vertex_impl(info)
    }

    fn scheduled_is_changed(&self, vertex: usize) -> Result<bool> {
        self.check("scheduled_is_changed", vertex)?;
        Ok(self.col(2 * vertex as i32).is_changed)
    }

    fn scheduled_get_parent(&self, vertex: usize) -> Result<usize> {
        self.check("scheduled_get_parent", vertex)?;
        Ok(self.scheduled_get_parent_impl(vertex))
    }

    fn scheduled_n_edges(&self) -> usize {
        if self.has_scheduled { self.scheduled_edge_count } else { self.edge_count }
    }

    fn scheduled_n_children(&self, vertex: usize) -> Result<usize> {
        self.check("scheduled_n_children", vertex)?;
        let col = self.col(2 * vertex as i32);
        let count = if col.is_changed { col.scheduled_children_count } else { col.children_count };
        Ok(count as usize)
    }

    fn scheduled_has_changes(&self) -> bool {
        self.has_scheduled
    }

    fn scheduled_set_vertex_info(&mut self, vertex: usize, info: VP::Value) -> Result<()> {
        self.check("scheduled_set_vertex_info", vertex)?;
        self.internal_set_vinfo(2 * vertex as i32, info);
        Ok(())
    }

    fn scheduled_set_edge_info(
        &mut self,
        vertex: usize,
        upwards: EP::Value,
        downwards: EP::Value,
    ) -> Result<()> {
        self.check("scheduled_set_edge_info", vertex)?;
        if self.scheduled_get_parent_impl(vertex) == vertex {
            return Err(ForestError::EdgeInfoOfRoot { op: "scheduled_set_edge_info", vertex });
        }
        self.internal_set_einfo(2 * vertex as i32, upwards, downwards);
        Ok(())
    }

    fn scheduled_detach(&mut self, vertex: usize) -> Result<()> {
        self.check("scheduled_detach", vertex)?;
        if self.scheduled_get_parent_impl(vertex) == vertex {
            return Err(ForestError::AlreadyRoot { vertex });
        }

        let parent = self.scheduled_get_parent_impl(vertex);
        self.cartesian_delete(2 * parent as i32, 2 * vertex as i32 + 1);
        self.oracle.cut(parent, vertex);

        self.col_mut(2 * parent as i32).scheduled_children_count -= 1;
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
        if self.scheduled_get_parent_impl(child) != child {
            return Err(ForestError::ChildNotRoot { child });
        }
        if self.oracle.connected(parent, child) {
            return Err(ForestError::WouldCreateCycle { parent, child });
        }

        self.internal_set_einfo(2 * child as i32, upwards, downwards);
        self.cartesian_insert(2 * parent as i32, 2 * child as i32 + 1);
        self.oracle.link(parent, child);

        self.col_mut(2 * parent as i32).scheduled_children_count += 1;
        self.scheduled_edge_count += 1;
        Ok(())
    }

    fn scheduled_apply(&mut self) {
        self.apply_impl();
    }

    fn scheduled_cancel(&mut self) {
        self.scheduled_edge_count = self.edge_count;
        self.oracle.unroll();
        self.has_scheduled = false;
        for i in 0..self.n_modified {
            let v = self.curr_modified[i] as i32;
            let col = self.col_mut(v);
            col.is_changed = false;
            let committed = *col.at(1);
            *col.at_mut(0) = committed;
            col.scheduled_left = col.treap_left;
            col.scheduled_right = col.treap_right;
            col.scheduled_children_count = col.children_count;
        }
        self.n_modified = 0;
    }
}
