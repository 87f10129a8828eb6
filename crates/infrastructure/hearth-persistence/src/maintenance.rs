use std::sync::atomic::{AtomicU64, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;

static QUARANTINED: AtomicU64 = AtomicU64::new(0);

/// Moves an unreadable store file aside as `<name>.corrupt.<stamp>.<n>` so a
/// fresh one can be created in its place. Returns the new path, or `None`
/// when there was nothing to move.
pub fn quarantine_corrupt_file(path: &Utf8Path) -> std::io::Result<Option<Utf8PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    let name = path.file_name().unwrap_or(crate::HEARTH_REDB_FILENAME);
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.f");
    let n = QUARANTINED.fetch_add(1, Ordering::Relaxed);
    let target = path.with_file_name(format!("{name}.corrupt.{stamp}.{n}"));
    std::fs::rename(path, &target)?;
    tracing::warn!(from = %path, to = %target, "quarantined corrupt household store");
    Ok(Some(target))
}
