use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::data::DataError;

/// Failure of one unit of background work; the next tick still runs
#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("aggregation of window {bucket_start} failed: {source}")]
    Window {
        bucket_start: DateTime<Utc>,
        #[source]
        source: DataError,
    },

    #[error("retention sweep failed: {0}")]
    Sweep(#[source] DataError),
}
