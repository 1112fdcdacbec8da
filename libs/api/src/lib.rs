pub mod error;
pub mod types;
pub mod util;

pub use error::{ErrorKind, FeedError};
pub use types::{CrashRecord, FeedEntry, GeoPoint, Marker, OverflowPolicy};
pub use util::{date_from_ms, now_ms};
