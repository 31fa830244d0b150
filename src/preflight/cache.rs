//! Cache file preflight check.

use super::CheckResult;
use crate::core::cache::{CsvCache, MetadataCache};
use std::path::Path;

/// Check that the cache file, if present, can be loaded.
pub fn check(path: &Path) -> CheckResult {
    if !path.exists() {
        return CheckResult::ok("Cache", &format!("{} (new)", path.display()));
    }

    match CsvCache::open(path) {
        Ok(cache) => CheckResult::ok(
            "Cache",
            &format!("{} ({} entries)", path.display(), cache.len()),
        ),
        Err(e) => CheckResult::fail(
            "Cache",
            &e.to_string(),
            "Fix the file permissions or move the cache file aside",
        ),
    }
}
