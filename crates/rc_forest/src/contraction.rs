//! The re-contraction engine behind `scheduled_apply`.
//!
//! The batch leaves an affected seed set in `curr_modified`. Level by
//! level, every affected column recomputes its verdict against the
//! barrier-stabilized previous level, writes its own next-level snapshot,
//! and nominates the columns its change may touch one level up. The
//! nominations are deduplicated through per-column atomic claims and
//! compacted into the next level's worklist with a prefix sum. The loop
//! ends when a level changes nothing.
//!
//! Sharing discipline (the looping driver must uphold the barriers):
//! within one driver call, column `v` is written only by the worker that
//! owns the worklist slot carrying `v` (the worklist is duplicate-free),
//! and cross-column access is read-only against state stabilized by the
//! previous barrier. Coin flips are pure, so workers consult any column's
//! coins without synchronization.

use std::marker::PhantomData;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::column::{CoinFlips, Column, LevelNode, NONE, Verdict};
use crate::conn::ConnectivityOracle;
use crate::driver::LoopDriver;
use crate::forest::RcForest;
use crate::policy::Monoid;

/// Raw view of the column arena handed to driver bodies.
///
/// `col` yields shared references and is only used for reads the current
/// phase's barrier discipline has stabilized; `col_mut` is the per-owner
/// write path.
struct SharedColumns<'a, E: Copy + PartialEq, V: Copy + PartialEq> {
    ptr: *mut Column<E, V>,
    len: usize,
    _marker: PhantomData<&'a mut [Column<E, V>]>,
}

// SAFETY: the apply loop guarantees a single writer per column per phase
// and read-only cross-column access; see the module docs.
unsafe impl<E, V> Send for SharedColumns<'_, E, V>
where
    E: Copy + PartialEq + Send + Sync,
    V: Copy + PartialEq + Send + Sync,
{
}
unsafe impl<E, V> Sync for SharedColumns<'_, E, V>
where
    E: Copy + PartialEq + Send + Sync,
    V: Copy + PartialEq + Send + Sync,
{
}

impl<'a, E: Copy + PartialEq, V: Copy + PartialEq> SharedColumns<'a, E, V> {
    fn new(columns: &'a mut [Column<E, V>]) -> Self {
        Self { ptr: columns.as_mut_ptr(), len: columns.len(), _marker: PhantomData }
    }

    #[inline(always)]
    fn col(&self, v: i32) -> &Column<E, V> {
        debug_assert!(v >= 0 && (v as usize) < self.len);
        // SAFETY: in bounds; no worker writes the fields this read phase
        // observes (module docs).
        unsafe { &*self.ptr.add(v as usize) }
    }

    /// SAFETY: the caller must be the unique owner of column `v` for the
    /// current phase, i.e. hold the only worklist slot naming `v`.
    #[inline(always)]
    #[allow(clippy::mut_from_ref)]
    unsafe fn col_mut(&self, v: i32) -> &mut Column<E, V> {
        debug_assert!(v >= 0 && (v as usize) < self.len);
        unsafe { &mut *self.ptr.add(v as usize) }
    }
}

/// Raw view of the next worklist; prefix sums make the scattered ranges
/// disjoint.
struct SharedSlice<'a> {
    ptr: *mut u32,
    len: usize,
    _marker: PhantomData<&'a mut [u32]>,
}

// SAFETY: writes go to disjoint index ranges (one per worklist slot).
unsafe impl Send for SharedSlice<'_> {}
unsafe impl Sync for SharedSlice<'_> {}

impl<'a> SharedSlice<'a> {
    fn new(slice: &'a mut [u32]) -> Self {
        Self { ptr: slice.as_mut_ptr(), len: slice.len(), _marker: PhantomData }
    }

    /// SAFETY: the caller must own index `i` for the current phase.
    #[inline(always)]
    unsafe fn set(&self, i: usize, value: u32) {
        debug_assert!(i < self.len);
        unsafe { *self.ptr.add(i) = value };
    }
}

fn will_become_root<E, V>(s: &SharedColumns<'_, E, V>, level: i32, v: i32) -> bool
where
    E: Copy + PartialEq,
    V: Copy + PartialEq,
{
    let node = s.col(v).at(level);
    node.child_count == 0 && node.parent == NONE
}

fn will_rake<E, V>(s: &SharedColumns<'_, E, V>, level: i32, v: i32) -> bool
where
    E: Copy + PartialEq,
    V: Copy + PartialEq,
{
    let node = s.col(v).at(level);
    node.child_count == 0 && node.parent != NONE
}

/// The three-coin rule: a unary interior node compresses when its own
/// coin is tails while both neighbors' coins are heads, unless its only
/// child rakes this level. Independent coins keep compressing chains
/// contracting with constant probability per level.
fn will_compress<E, V>(s: &SharedColumns<'_, E, V>, coins: &CoinFlips, level: i32, v: i32) -> bool
where
    E: Copy + PartialEq,
    V: Copy + PartialEq,
{
    let node = s.col(v).at(level);
    node.child_count == 1
        && node.parent != NONE
        && !coins.flip(v, level)
        && coins.flip(node.parent, level)
        && coins.flip(node.children[0], level)
        && !will_rake(s, level, node.children[0])
}

fn will_accept_change<E, V>(
    s: &SharedColumns<'_, E, V>,
    coins: &CoinFlips,
    level: i32,
    v: i32,
) -> bool
where
    E: Copy + PartialEq,
    V: Copy + PartialEq,
{
    let node = s.col(v).at(level);
    for i in (0..node.child_count as usize).rev() {
        if will_rake(s, level, node.children[i]) {
            return true;
        }
        if will_compress(s, coins, level, node.children[i]) {
            return true;
        }
    }
    node.parent != NONE && will_compress(s, coins, level, node.parent)
}

/// Builds the next-level snapshot of a surviving node: absorbs raked
/// children into the vertex label, splices compressed neighbors by
/// concatenating edge labels on the matching side.
fn compute_accept<EP, VP>(
    s: &SharedColumns<'_, EP::Value, VP::Value>,
    coins: &CoinFlips,
    level: i32,
    v: i32,
) -> LevelNode<EP::Value, VP::Value>
where
    EP: Monoid,
    VP: Monoid,
{
    let prev = *s.col(v).at(level);
    let mut node = prev;

    if prev.parent != NONE && will_compress(s, coins, level, prev.parent) {
        let parent = s.col(prev.parent).at(level);
        node.e_up = EP::combine(&node.e_up, &parent.e_up);
        node.e_down = EP::combine(&parent.e_down, &node.e_down);
        node.parent = parent.parent;
    }
    for i in (0..prev.child_count as usize).rev() {
        let child_idx = prev.children[i];
        let child = s.col(child_idx).at(level);
        if will_rake(s, level, child_idx) {
            node.remove_child(child_idx);
            node.v_info = VP::combine(&node.v_info, &child.v_info);
        }
        if will_compress(s, coins, level, child_idx) {
            node.remove_child(child_idx);
            node.v_info = VP::combine(&node.v_info, &child.v_info);
            node.insert_child(child.children[0]);
        }
    }
    node
}

enum Decision<E: Copy + PartialEq, V: Copy + PartialEq> {
    Root,
    Rake { parent: i32 },
    Compress { parent: i32, child: i32 },
    Survive { node: LevelNode<E, V> },
}

/// Re-classifies one affected column at `level` and writes its next-level
/// state. Nominations for the next affected set are left in the column's
/// scratch slots.
fn process_vertex<EP, VP>(
    s: &SharedColumns<'_, EP::Value, VP::Value>,
    coins: &CoinFlips,
    level: i32,
    v: i32,
) where
    EP: Monoid,
    VP: Monoid,
{
    let decision = if will_become_root(s, level, v) {
        Decision::Root
    } else if will_rake(s, level, v) {
        Decision::Rake { parent: s.col(v).at(level).parent }
    } else if will_compress(s, coins, level, v) {
        let node = s.col(v).at(level);
        Decision::Compress { parent: node.parent, child: node.children[0] }
    } else if will_accept_change(s, coins, level, v) {
        Decision::Survive { node: compute_accept::<EP, VP>(s, coins, level, v) }
    } else {
        Decision::Survive { node: *s.col(v).at(level) }
    };

    // SAFETY: `v` occupies exactly one slot of the deduplicated worklist.
    let col = unsafe { s.col_mut(v) };
    col.next_affected_count = 0;
    col.next_affected_prefix_sum = 0;
    col.next_affected_check_parent = NONE;

    match decision {
        Decision::Root => {
            col.last_live = level;
            col.verdict = Verdict::Root;
        }
        Decision::Rake { parent } => {
            let changed = col.last_live != level || col.verdict != Verdict::Rake;
            col.last_live = level;
            col.verdict = Verdict::Rake;
            if changed {
                col.next_affected[0] = parent;
                col.next_affected_count = 1;
            }
        }
        Decision::Compress { parent, child } => {
            let changed = col.last_live != level || col.verdict != Verdict::Compress;
            col.last_live = level;
            col.verdict = Verdict::Compress;
            if changed {
                col.next_affected[0] = parent;
                col.next_affected[1] = child;
                col.next_affected_count = 2;
            }
        }
        Decision::Survive { node } => {
            let changed = if col.last_live == level {
                col.push_level(node);
                true
            } else if *col.at(level + 1) != node {
                *col.at_mut(level + 1) = node;
                true
            } else {
                false
            };
            if changed {
                // Nominate the level-(L+1) neighborhood: the node itself,
                // its parent (the grandparent is fetched after the
                // barrier, once the parent's snapshot is final), and every
                // child.
                let mut count = 0;
                col.next_affected[count] = v;
                count += 1;
                if node.parent != NONE {
                    col.next_affected_check_parent = count as i32;
                    col.next_affected[count] = node.parent;
                    count += 1;
                }
                for i in 0..node.child_count as usize {
                    col.next_affected[count] = node.children[i];
                    count += 1;
                }
                col.next_affected_count = count as i32;
            }
        }
    }
}

/// Completes a column's nominations with its level-`level` grandparent
/// and drops every candidate some other column already claimed.
fn fetch_parent_uniquify<E, V>(
    s: &SharedColumns<'_, E, V>,
    claimed: &[AtomicBool],
    level: i32,
    v: i32,
) where
    E: Copy + PartialEq,
    V: Copy + PartialEq,
{
    let grandparent = {
        let col = s.col(v);
        if col.next_affected_check_parent != NONE {
            let parent = col.next_affected[col.next_affected_check_parent as usize];
            s.col(parent).at(level).parent
        } else {
            NONE
        }
    };

    // SAFETY: `v` occupies exactly one slot of the deduplicated worklist.
    let col = unsafe { s.col_mut(v) };
    if grandparent != NONE {
        col.next_affected[col.next_affected_count as usize] = grandparent;
        col.next_affected_count += 1;
    }

    let total = col.next_affected_count as usize;
    col.next_affected_count = 0;
    for i in 0..total {
        let cand = col.next_affected[i];
        if !claimed[cand as usize].swap(true, Ordering::Relaxed) {
            col.next_affected[col.next_affected_count as usize] = cand;
            col.next_affected_count += 1;
        }
    }
}

impl<EP, VP, C, D> RcForest<EP, VP, C, D>
where
    EP: Monoid,
    VP: Monoid,
    C: ConnectivityOracle,
    D: LoopDriver,
{
    pub(crate) fn apply_impl(&mut self) {
        let driver = self.driver.clone();
        let coins = self.coins;

        if self.n_modified > 0 {
            // Commit the staged level-0 image and treap shadows.
            let shared = SharedColumns::new(&mut self.columns);
            let curr = &self.curr_modified;
            driver.for_each(0, self.n_modified, |i| {
                // SAFETY: the seed set is duplicate-free by construction.
                let col = unsafe { shared.col_mut(curr[i] as i32) };
                col.is_changed = false;
                let pending = *col.at(0);
                *col.at_mut(1) = pending;
                col.treap_left = col.scheduled_left;
                col.treap_right = col.scheduled_right;
                col.children_count = col.scheduled_children_count;
            });
        }

        let mut level = 1;
        while self.n_modified > 0 {
            let n = self.n_modified;
            {
                let shared = SharedColumns::new(&mut self.columns);
                let curr = &self.curr_modified;
                let claimed = &self.claimed;
                let next = SharedSlice::new(&mut self.next_modified);

                driver.for_each(0, n, |i| {
                    process_vertex::<EP, VP>(&shared, &coins, level, curr[i] as i32);
                });

                driver.for_each(0, n, |i| {
                    fetch_parent_uniquify(&shared, claimed, level + 1, curr[i] as i32);
                });

                driver.prefix_sum(
                    0,
                    n,
                    |i| shared.col(curr[i] as i32).next_affected_count as usize,
                    |i, sum| {
                        // SAFETY: one write per worklist slot.
                        unsafe { shared.col_mut(curr[i] as i32) }.next_affected_prefix_sum = sum;
                    },
                );

                let new_n = shared.col(curr[n - 1] as i32).next_affected_prefix_sum;

                driver.for_each(0, n, |i| {
                    let col = shared.col(curr[i] as i32);
                    let count = col.next_affected_count as usize;
                    let offset = col.next_affected_prefix_sum - count;
                    for j in 0..count {
                        let cand = col.next_affected[j];
                        // SAFETY: prefix sums make [offset, offset+count)
                        // disjoint across worklist slots.
                        unsafe { next.set(offset + j, cand as u32) };
                        claimed[cand as usize].store(false, Ordering::Relaxed);
                    }
                });

                self.n_modified = new_n;
            }
            mem::swap(&mut self.curr_modified, &mut self.next_modified);
            level += 1;
        }

        self.edge_count = self.scheduled_edge_count;
        self.oracle.flush();
        self.has_scheduled = false;
    }
}
