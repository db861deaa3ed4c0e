pub mod dashboard;
pub mod ingest;
pub mod model;
pub mod process;
pub mod schema;
pub mod store;
