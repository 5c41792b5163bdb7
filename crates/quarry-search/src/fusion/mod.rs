//! Query planning and score fusion.
//!
//! The planner decides which indexes a mode consults, pulls candidates from
//! the store, and hands the raw hits to the scorer, which combines them into
//! one ranked list with a fixed-weight linear fusion.

pub mod planner;
pub mod scoring;

pub use planner::{DEFAULT_LIMIT, MAX_LIMIT, QueryPlanner, candidate_pool, clamp_limit};
pub use scoring::{FusedScore, KEYWORD_WEIGHT, SEMANTIC_WEIGHT, fuse, hybrid_score};
