mod middleware;
mod public;

pub use middleware::{
    RequestTrace, VIEWER_HEADER, assign_csp_nonce, identify_viewer, log_responses,
    set_request_context,
};
pub use public::{HttpState, build_router, render_page};
