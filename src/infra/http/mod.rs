mod certificates;
mod middleware;

pub use certificates::{HttpState, build_router};
pub use middleware::RequestContext;
