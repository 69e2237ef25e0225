//! Folding of flat join rows into report trees.
//!
//! Everything here is synchronous and free of I/O: callers pull rows from a
//! `ReportSource` and push them in one at a time.

pub mod indicator_tree;
pub mod quarter;
pub mod staff_plan;

pub use indicator_tree::IndicatorTreeBuilder;
pub use quarter::{bucket_quarters, quarter_of};
pub use staff_plan::{StaffNameConflict, StaffPlanAggregator};
