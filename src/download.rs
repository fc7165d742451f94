//! Sampled download-progress records.
//!
//! A host-side poller watches the platform's download facility and
//! periodically produces a [`DownloadStatus`]. The record rides the store's
//! ordinary surface: [`DownloadStatus::stage`] writes its fields under a key
//! prefix through a normal editor batch, so registered listeners observe
//! progress exactly like any other preference change, and
//! [`DownloadStatus::load`] re-assembles the record from those keys.

use crate::editor::Editor;
use crate::store::PrefStore;
use serde::{Deserialize, Serialize};

/// A point-in-time snapshot of one tracked download.
///
/// The record for an unknown download has `id == -1` and is "empty"; every
/// other field then holds its zero value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadStatus {
    /// Download identifier, or -1 when the download was not found
    pub id: i64,
    /// Platform action that produced this sample, if any
    pub action: String,
    /// Display title
    pub title: String,
    /// Display description
    pub description: String,
    /// Remote locator the download was requested from
    pub locator: String,
    /// Media type reported by the remote side
    pub media_type: String,
    /// Total size in bytes, 0 when unknown
    pub total_size: i64,
    /// Local locator of the (partially) downloaded data
    pub local_locator: String,
    /// Status code, one of the `STATUS_*` constants
    pub status: i32,
    /// Reason code qualifying a paused or failed status
    pub reason: i32,
    /// Bytes transferred so far
    pub bytes_so_far: i64,
    /// Last status change, in milliseconds since the epoch
    pub last_modified: i64,
}

impl DownloadStatus {
    /// Download is waiting to start.
    pub const STATUS_PENDING: i32 = 1 << 0;
    /// Download is in progress.
    pub const STATUS_RUNNING: i32 = 1 << 1;
    /// Download is paused and will resume.
    pub const STATUS_PAUSED: i32 = 1 << 2;
    /// Download completed successfully.
    pub const STATUS_SUCCESSFUL: i32 = 1 << 3;
    /// Download failed and will not be retried.
    pub const STATUS_FAILED: i32 = 1 << 4;

    /// The empty record: `id == -1`, meaning "not found".
    pub fn not_found() -> Self {
        Self {
            id: -1,
            action: String::new(),
            title: String::new(),
            description: String::new(),
            locator: String::new(),
            media_type: String::new(),
            total_size: 0,
            local_locator: String::new(),
            status: 0,
            reason: 0,
            bytes_so_far: 0,
            last_modified: 0,
        }
    }

    /// True exactly when the download was not found (`id == -1`).
    pub fn is_empty(&self) -> bool {
        self.id == -1
    }

    /// Stage this record's fields under `prefix` in an editor batch.
    ///
    /// Commit the editor to publish the sample; unchanged fields are
    /// suppressed by the commit's equal-value check, so a poller re-staging
    /// an identical sample produces no notifications.
    pub fn stage(&self, editor: &Editor, prefix: &str) {
        editor
            .put(format!("{prefix}.id"), self.id)
            .put(format!("{prefix}.action"), self.action.clone())
            .put(format!("{prefix}.title"), self.title.clone())
            .put(format!("{prefix}.description"), self.description.clone())
            .put(format!("{prefix}.locator"), self.locator.clone())
            .put(format!("{prefix}.media_type"), self.media_type.clone())
            .put(format!("{prefix}.total_size"), self.total_size)
            .put(format!("{prefix}.local_locator"), self.local_locator.clone())
            .put(format!("{prefix}.status"), self.status)
            .put(format!("{prefix}.reason"), self.reason)
            .put(format!("{prefix}.bytes_so_far"), self.bytes_so_far)
            .put(format!("{prefix}.last_modified"), self.last_modified);
    }

    /// Re-assemble the record stored under `prefix`.
    ///
    /// A prefix that was never staged yields the empty record.
    pub fn load(store: &PrefStore, prefix: &str) -> Self {
        if !store.contains(&format!("{prefix}.id")) {
            return Self::not_found();
        }
        Self {
            id: store.get_i64(&format!("{prefix}.id"), -1),
            action: store.get_string(&format!("{prefix}.action"), ""),
            title: store.get_string(&format!("{prefix}.title"), ""),
            description: store.get_string(&format!("{prefix}.description"), ""),
            locator: store.get_string(&format!("{prefix}.locator"), ""),
            media_type: store.get_string(&format!("{prefix}.media_type"), ""),
            total_size: store.get_i64(&format!("{prefix}.total_size"), 0),
            local_locator: store.get_string(&format!("{prefix}.local_locator"), ""),
            status: store.get_i32(&format!("{prefix}.status"), 0),
            reason: store.get_i32(&format!("{prefix}.reason"), 0),
            bytes_so_far: store.get_i64(&format!("{prefix}.bytes_so_far"), 0),
            last_modified: store.get_i64(&format!("{prefix}.last_modified"), 0),
        }
    }
}

impl Default for DownloadStatus {
    /// Defaults to the empty record, matching "not found".
    fn default() -> Self {
        Self::not_found()
    }
}
