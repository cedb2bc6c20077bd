//! Resolution-aware range queries over raw, rollup and imputed data

pub mod router;

pub use router::{
    select_resolution, QueryMode, QueryPage, QueryRequest, QueryRouter, Resolution,
    DEFAULT_POINT_BUDGET, MAX_PAGE_LIMIT,
};
