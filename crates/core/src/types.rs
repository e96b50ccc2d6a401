/// Jobs are identified by opaque, backend-assigned string ids.
pub type JobId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
