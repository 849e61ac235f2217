//! ListObjectsV2 merge

use super::container::EntryContainer;
use super::list_v1::{collect_rows, resume_key, split_rows};
use super::s3types::{to_xml, ListBucketResultV2, S3_XMLNS};
use super::{parse_listing, ListingBody};
use tessera_core::{CoreError, Result};

/// Merge v2 listings into one page of at most `max_keys` rows
///
/// The continuation token handed to the client is the last emitted key.
pub fn merge_list_v2(bodies: &[ListingBody], max_keys: usize) -> Result<String> {
    let mut template: Option<ListBucketResultV2> = None;
    let mut container = EntryContainer::new();

    for body in bodies {
        let Some(listing) = parse_listing::<ListBucketResultV2>(body) else {
            continue;
        };
        collect_rows(&mut container, &listing.contents, &listing.common_prefixes);
        template.get_or_insert(listing);
    }

    let mut result = template.unwrap_or_default();
    let page = container.paginate(max_keys);

    result.is_truncated = page.is_truncated();
    result.next_continuation_token = resume_key(&page);
    result.key_count = page.entries.len();
    result.max_keys = max_keys;
    result.xmlns.get_or_insert_with(|| S3_XMLNS.to_string());
    (result.contents, result.common_prefixes) = split_rows(page.entries);

    to_xml(&result).map_err(CoreError::Serialization)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merger::s3types::from_xml;
    use bytes::Bytes;

    fn listing(backend: &str, keys: &[&str]) -> ListingBody {
        let contents: String = keys
            .iter()
            .map(|k| format!("<Contents><Key>{k}</Key><LastModified>2024-01-01T00:00:00.000Z</LastModified><Size>4</Size></Contents>"))
            .collect();
        let body = format!(
            "<ListBucketResult xmlns=\"{S3_XMLNS}\"><Name>logs</Name><Prefix>2024/</Prefix>\
             <KeyCount>{}</KeyCount><MaxKeys>1000</MaxKeys><IsTruncated>false</IsTruncated>{contents}</ListBucketResult>",
            keys.len()
        );
        ListingBody::new(backend, Bytes::from(body))
    }

    #[test]
    fn test_merge_v2_counts_keys() {
        let bodies = [
            listing("a", &["2024/01", "2024/02"]),
            listing("b", &["2024/02", "2024/03"]),
        ];
        let xml = merge_list_v2(&bodies, 1000).unwrap();
        let result: ListBucketResultV2 = from_xml(xml.as_bytes()).unwrap();

        assert_eq!(result.key_count, 3);
        assert_eq!(result.contents.len(), 3);
        assert_eq!(result.prefix, "2024/");
        assert!(!result.is_truncated);
        assert_eq!(result.next_continuation_token, None);
    }

    #[test]
    fn test_merge_v2_truncates() {
        let bodies = [
            listing("a", &["2024/01", "2024/03"]),
            listing("b", &["2024/02", "2024/04"]),
        ];
        let xml = merge_list_v2(&bodies, 2).unwrap();
        let result: ListBucketResultV2 = from_xml(xml.as_bytes()).unwrap();

        assert_eq!(result.key_count, 2);
        assert!(result.is_truncated);
        assert_eq!(result.next_continuation_token.as_deref(), Some("2024/02"));
    }
}
