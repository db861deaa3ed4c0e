pub mod columns;
pub mod corrections;

pub use columns::{canonical_headers, normalize_header, COLUMN_ALIASES};
pub use corrections::{dropped_columns, fix_route_type, fix_route_type_number};
