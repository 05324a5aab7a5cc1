pub mod rest;
pub mod state;

// Re-export the handlers the binary needs to build the router.
pub use rest::{
    auth_url_handler, child_view_handler, diagnostics_handler, list_children_handler,
    refresh_handler, snapshot_handler, statistics_handler,
};
