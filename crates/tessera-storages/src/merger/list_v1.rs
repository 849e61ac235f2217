//! ListObjects (v1) merge, plus the object rows shared with v2

use super::container::{EntryContainer, ListEntry, Page};
use super::s3types::{to_xml, CommonPrefix, ListBucketResult, ObjectEntry, S3_XMLNS};
use super::{parse_listing, ListingBody};
use tessera_core::{CoreError, Result};

/// An object or a common prefix; both count against `max-keys`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObjectRow {
    Object(ObjectEntry),
    Prefix(CommonPrefix),
}

impl ListEntry for ObjectRow {
    type Id = (bool, String);

    fn key(&self) -> &str {
        match self {
            Self::Object(o) => &o.key,
            Self::Prefix(p) => &p.prefix,
        }
    }

    fn id(&self) -> Self::Id {
        (matches!(self, Self::Prefix(_)), self.key().to_string())
    }
}

/// Add one backend's objects and prefixes
pub(crate) fn collect_rows(
    container: &mut EntryContainer<ObjectRow>,
    contents: &[ObjectEntry],
    common_prefixes: &[CommonPrefix],
) {
    container.extend(contents.iter().cloned().map(ObjectRow::Object));
    container.extend(common_prefixes.iter().cloned().map(ObjectRow::Prefix));
}

/// Split emitted rows back into objects and prefixes
pub(crate) fn split_rows(page_entries: Vec<ObjectRow>) -> (Vec<ObjectEntry>, Vec<CommonPrefix>) {
    let mut contents = Vec::new();
    let mut prefixes = Vec::new();
    for row in page_entries {
        match row {
            ObjectRow::Object(o) => contents.push(o),
            ObjectRow::Prefix(p) => prefixes.push(p),
        }
    }
    (contents, prefixes)
}

/// Key of the last emitted row, when the page is truncated
pub(crate) fn resume_key(page: &Page<ObjectRow>) -> Option<String> {
    if page.is_truncated() {
        page.last().map(|row| row.key().to_string())
    } else {
        None
    }
}

/// Merge v1 listings into one page of at most `max_keys` rows
pub fn merge_list_v1(bodies: &[ListingBody], max_keys: usize) -> Result<String> {
    let mut template: Option<ListBucketResult> = None;
    let mut container = EntryContainer::new();

    for body in bodies {
        let Some(listing) = parse_listing::<ListBucketResult>(body) else {
            continue;
        };
        collect_rows(&mut container, &listing.contents, &listing.common_prefixes);
        template.get_or_insert(listing);
    }

    let mut result = template.unwrap_or_default();
    let page = container.paginate(max_keys);

    result.is_truncated = page.is_truncated();
    result.next_marker = resume_key(&page);
    result.max_keys = max_keys;
    result.xmlns.get_or_insert_with(|| S3_XMLNS.to_string());
    (result.contents, result.common_prefixes) = split_rows(page.entries);

    to_xml(&result).map_err(CoreError::Serialization)
}
