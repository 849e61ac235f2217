//! ListObjectVersions merge

use super::container::{EntryContainer, ListEntry};
use super::s3types::{
    to_xml, CommonPrefix, DeleteMarkerEntry, ListVersionsResult, VersionEntry, S3_XMLNS,
};
use super::{parse_listing, ListingBody};
use chrono::{DateTime, FixedOffset};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tessera_core::{CoreError, Result};

/// Kind of a versions listing row
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VersionKind {
    Version,
    DeleteMarker,
}

/// A version or delete marker
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VersionRow {
    Version(VersionEntry),
    DeleteMarker(DeleteMarkerEntry),
}

impl VersionRow {
    pub fn kind(&self) -> VersionKind {
        match self {
            Self::Version(_) => VersionKind::Version,
            Self::DeleteMarker(_) => VersionKind::DeleteMarker,
        }
    }

    pub fn version_id(&self) -> &str {
        match self {
            Self::Version(v) => &v.version_id,
            Self::DeleteMarker(m) => &m.version_id,
        }
    }

    pub fn last_modified(&self) -> &str {
        match self {
            Self::Version(v) => &v.last_modified,
            Self::DeleteMarker(m) => &m.last_modified,
        }
    }

    pub fn is_latest(&self) -> bool {
        match self {
            Self::Version(v) => v.is_latest,
            Self::DeleteMarker(m) => m.is_latest,
        }
    }

    fn set_latest(&mut self, latest: bool) {
        match self {
            Self::Version(v) => v.is_latest = latest,
            Self::DeleteMarker(m) => m.is_latest = latest,
        }
    }
}

fn parse_time(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value).ok()
}

/// Newest first; among equal times a row claiming latest wins, then version id
fn newest_first(a: &VersionRow, b: &VersionRow) -> Ordering {
    let by_time = match (parse_time(a.last_modified()), parse_time(b.last_modified())) {
        (Some(a), Some(b)) => b.cmp(&a),
        _ => b.last_modified().cmp(a.last_modified()),
    };
    by_time
        .then_with(|| b.is_latest().cmp(&a.is_latest()))
        .then_with(|| a.version_id().cmp(b.version_id()))
        .then_with(|| (a.kind() as u8).cmp(&(b.kind() as u8)))
}

/// Order one key's history newest first and leave a single latest row
///
/// Replicas that lag behind still flag an older version as latest. The
/// newest row takes the flag when any replica flagged one.
fn reconcile_history(rows: &mut [VersionRow]) {
    rows.sort_by(newest_first);
    let flagged = rows.iter().any(VersionRow::is_latest);
    for (i, row) in rows.iter_mut().enumerate() {
        row.set_latest(flagged && i == 0);
    }
}

impl ListEntry for VersionRow {
    type Id = (VersionKind, String, String);

    fn key(&self) -> &str {
        match self {
            Self::Version(v) => &v.key,
            Self::DeleteMarker(m) => &m.key,
        }
    }

    fn id(&self) -> Self::Id {
        (self.kind(), self.key().to_string(), self.version_id().to_string())
    }
}

/// Merge versions listings into one page of at most `max_keys` rows
pub fn merge_versions(bodies: &[ListingBody], max_keys: usize) -> Result<String> {
    let mut template: Option<ListVersionsResult> = None;
    let mut container = EntryContainer::new();
    let mut prefixes = BTreeSet::new();

    for body in bodies {
        let Some(listing) = parse_listing::<ListVersionsResult>(body) else {
            continue;
        };
        container.extend(listing.versions.iter().cloned().map(VersionRow::Version));
        container.extend(
            listing
                .delete_markers
                .iter()
                .cloned()
                .map(VersionRow::DeleteMarker),
        );
        prefixes.extend(listing.common_prefixes.iter().map(|p| p.prefix.clone()));
        template.get_or_insert(listing);
    }

    for rows in container.groups_mut() {
        reconcile_history(rows);
    }

    let mut result = template.unwrap_or_default();
    result.common_prefixes = prefixes
        .into_iter()
        .map(|prefix| CommonPrefix { prefix })
        .collect();
    let page = container.paginate(max_keys);

    if let Some(last) = page.last() {
        result.key_marker = last.key().to_string();
        result.version_id_marker = last.version_id().to_string();
    }
    result.is_truncated = page.is_truncated();
    result.next_key_marker = page.next.as_ref().map(|next| next.key().to_string());
    result.next_version_id_marker = page.next.as_ref().map(|next| next.version_id().to_string());
    result.max_keys = max_keys;
    result.xmlns.get_or_insert_with(|| S3_XMLNS.to_string());

    result.versions.clear();
    result.delete_markers.clear();
    for row in page.entries {
        match row {
            VersionRow::Version(v) => result.versions.push(v),
            VersionRow::DeleteMarker(m) => result.delete_markers.push(m),
        }
    }

    to_xml(&result).map_err(CoreError::Serialization)
}
