//! Application layer: orchestrates `domain` and `infrastructure` into the
//! two public surfaces the specification names — the Search API and the
//! Index Maintenance API — without owning any I/O itself.

pub mod api;
pub mod maintenance;
pub mod search;

pub use api::{IndexMaintenanceApi, SearchApi};
pub use maintenance::IndexMaintenance;
pub use search::SearchService;
