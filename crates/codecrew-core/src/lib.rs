pub mod config;
pub mod error;
pub mod event;
pub mod state;
pub mod traits;
pub mod types;

pub use config::CrewConfig;
pub use error::{CrewError, Result};
pub use event::WorkflowEvent;
pub use state::{StateUpdate, TeamState};
pub use types::*;
