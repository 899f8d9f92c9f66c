// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The reproducible bundle fingerprint (§3 `Fingerprint`, §8 property 5).
//!
//! `fingerprint()` is the SHA-256 of the JSON of `[(rel_path, signature)]`
//! sorted by `rel_path`, where `signature = "sha256:<hex>"` when known, else
//! `"sz:<n>|mt_ms:<m>"`. Sorting first makes the result independent of the
//! order a source happens to list files in (§8 property 5 "Reordering has
//! no effect").

use aetherflow_core::RemoteFileMeta;
use sha2::{Digest, Sha256};

/// Normalize a possibly-missing mtime into a stable integer signature.
/// Mirrors the original's millisecond normalization (§9 Open Question on
/// mtime precision): coarse enough to be stable across filesystems, fine
/// enough to catch same-second edits when the source reports sub-second
/// precision.
pub fn mtime_sig(mtime_ms: Option<i64>) -> i64 {
    mtime_ms.unwrap_or(0)
}

fn signature(meta: &RemoteFileMeta) -> String {
    match &meta.sha256 {
        Some(sha) => format!("sha256:{sha}"),
        None => format!("sz:{}|mt_ms:{}", meta.size.unwrap_or(0), mtime_sig(meta.mtime_ms)),
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Compute the stable fingerprint for a file list (§8 property 5).
pub fn fingerprint(metas: &[RemoteFileMeta]) -> String {
    let mut pairs: Vec<(&str, String)> = metas
        .iter()
        .map(|m| (m.rel_path.as_deref().unwrap_or_default(), signature(m)))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    let json = serde_json::to_vec(&pairs).unwrap_or_default();
    sha256_hex(&json)
}

#[cfg(test)]
#[path = "fingerprint_tests.rs"]
mod tests;
