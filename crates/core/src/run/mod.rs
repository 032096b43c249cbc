//! Run orchestration: planning, lane scheduling, execution and status
//! aggregation.

mod engine;
mod planner;
mod status;
mod types;

pub use engine::RunEngine;
pub use planner::plan_tasks;
pub use status::{aggregate_group, aggregate_run, aggregate_script};
pub use types::{
    ExportMode, GroupSelection, Run, RunSelection, ScriptSelection, Status, UserContext,
    VariantTask,
};
