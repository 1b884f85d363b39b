//! Service layer: validation and orchestration over the storage seam.

pub mod post_service;
pub mod recommend_service;

pub use post_service::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PostService};
pub use recommend_service::RecommendService;
