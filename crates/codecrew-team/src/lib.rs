//! Supervisor/worker orchestration for the Codecrew dev team.
//!
//! A run threads one shared `TeamState` through a fixed hub-and-spoke graph:
//! the Manager (supervisor) decides who acts next, exactly one worker (BA,
//! Dev or Tester) takes a turn and always hands control back, and the loop
//! ends when the Manager routes to FINISH or the iteration cap is hit.

pub mod driver;
pub mod graph;
pub mod specialists;
pub mod supervisor;
pub mod testing;
pub mod workers;

pub use driver::{graph_from_config, run_workflow, run_workflow_stream, WorkflowRequest};
pub use graph::{topology, GraphTopology, TeamGraph, TeamGraphBuilder};
pub use supervisor::Supervisor;
pub use workers::{BaWorker, DevWorker, TesterWorker, WorkerNode};
