//! Field redaction: a dataset minus a set of tags.

use std::collections::BTreeSet;

use crate::dictionary;
use crate::error::Result;
use crate::model::{Dataset, TagId};

/// Patient identifiers removed when no tag list is configured.
pub const DEFAULT_REDACTED: [TagId; 6] = [
    TagId::new(0x0010, 0x0010), // PatientName
    TagId::new(0x0010, 0x0020), // PatientID
    TagId::new(0x0010, 0x1010), // PatientAge
    TagId::new(0x0010, 0x1040), // PatientAddress
    TagId::new(0x0010, 0x2154), // PatientTelephoneNumbers
    TagId::new(0x0010, 0x0050), // PatientInsurancePlanCodeSequence
];

pub fn default_tags() -> BTreeSet<TagId> {
    DEFAULT_REDACTED.into_iter().collect()
}

/// Resolves keywords or `(GGGG,EEEE)` renderings. Fails on the first entry
/// that is neither.
pub fn resolve_tags<S: AsRef<str>>(entries: &[S]) -> Result<BTreeSet<TagId>> {
    entries
        .iter()
        .map(|entry| dictionary::resolve_tag(entry.as_ref()))
        .collect()
}

/// Every element whose tag is not in `tags`, in the original order.
pub fn redact(dataset: &Dataset, tags: &BTreeSet<TagId>) -> Dataset {
    let mut redacted = Dataset::with_transfer_syntax(dataset.transfer_syntax());

    for element in dataset {
        if tags.contains(&element.tag) {
            tracing::debug!(tag = %element.tag, "redacted element");
            continue;
        }
        redacted.insert(element.clone());
    }

    redacted
}
