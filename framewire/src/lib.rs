pub mod commands;

// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

pub use handlers::{
    RunOptions, SessionReport, StatusReport, database_path, init_state, read_status,
    render_results, resolve_state_dir, run_session,
};
