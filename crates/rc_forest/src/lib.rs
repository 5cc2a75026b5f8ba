//! Dynamic rooted forests with batched edits and polylogarithmic
//! path/subtree aggregates, built on randomized rake-and-compress
//! contraction.
//!
//! [`RcForest`] is the contracted implementation; [`NaiveForest`] is the
//! O(depth) reference with the same interface; [`ForestBuilder`] covers
//! the static build-then-query case.

pub mod builder;
pub mod conn;
pub mod driver;
pub mod error;
pub mod policy;
pub mod traits;

mod column;
mod contraction;
mod dsu;
mod forest;
mod naive;
mod treap;

pub use builder::{ForestBuilder, StaticForest};
pub use conn::{ConnectivityOracle, LinkCutOracle, NoLoopOracle};
pub use driver::{ForkJoinDriver, LoopDriver, SeqDriver};
pub use dsu::UnionFind;
pub use error::{ForestError, Result};
pub use forest::RcForest;
pub use naive::NaiveForest;
pub use traits::RootedForest;
