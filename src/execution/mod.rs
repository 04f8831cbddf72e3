//! Iterator-model query executors.
//!
//! Every executor implements `init()` / `next()` / `output_schema()`.
//! Composition is by exclusive ownership: a parent executor owns its
//! children as `Box<dyn Executor>` and drives them by repeatedly calling
//! `next()` until it returns `None`.

pub mod aggregation;
pub mod context;
pub mod delete;
pub mod error;
pub mod expressions;
pub mod index_scan;
pub mod insert;
pub mod limit;
pub mod nested_index_join;
pub mod nested_loop_join;
pub mod seq_scan;
pub mod update;

pub use aggregation::{AggregateCall, AggregateFunction, AggregationExecutor};
pub use context::ExecutorContext;
pub use delete::DeleteExecutor;
pub use error::ExecutionError;
pub use expressions::{BinaryOperator, Expr};
pub use index_scan::IndexScanExecutor;
pub use insert::{InsertExecutor, InsertSource};
pub use limit::LimitExecutor;
pub use nested_index_join::NestedIndexJoinExecutor;
pub use nested_loop_join::NestedLoopJoinExecutor;
pub use seq_scan::SeqScanExecutor;
pub use update::UpdateExecutor;

use crate::catalog::Schema;
use crate::common::Rid;
use crate::storage::Tuple;
use crate::Result;

/// Pull-based query executor.
pub trait Executor {
    /// One-shot preparation. Blocking/combining executors (aggregation,
    /// the two joins) eagerly drain their children here.
    fn init(&mut self) -> Result<()>;

    /// Pulls one result row. `None` signals end of stream.
    fn next(&mut self) -> Result<Option<(Tuple, Rid)>>;

    fn output_schema(&self) -> &Schema;
}
