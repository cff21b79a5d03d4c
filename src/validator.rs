//! Post-decode check for the tags an image dataset needs. Advisory only.

use crate::error::Warning;
use crate::model::{Dataset, TagId};

pub const ROWS: TagId = TagId::new(0x0028, 0x0010);
pub const COLUMNS: TagId = TagId::new(0x0028, 0x0011);
pub const PIXEL_DATA: TagId = TagId::new(0x7FE0, 0x0010);
pub const BITS_ALLOCATED: TagId = TagId::new(0x0028, 0x0100);
pub const BITS_STORED: TagId = TagId::new(0x0028, 0x0101);
pub const HIGH_BIT: TagId = TagId::new(0x0028, 0x0102);
pub const PIXEL_REPRESENTATION: TagId = TagId::new(0x0028, 0x0103);

pub const REQUIRED_TAGS: [(TagId, &str); 7] = [
    (ROWS, "Rows"),
    (COLUMNS, "Columns"),
    (PIXEL_DATA, "Pixel Data"),
    (BITS_ALLOCATED, "Bits Allocated"),
    (BITS_STORED, "Bits Stored"),
    (HIGH_BIT, "High Bit"),
    (PIXEL_REPRESENTATION, "Pixel Representation"),
];

/// One `MissingRequiredTag` warning per absent tag, in table order.
pub fn validate(dataset: &Dataset) -> Vec<Warning> {
    REQUIRED_TAGS
        .iter()
        .filter(|(tag, _)| !dataset.contains(*tag))
        .map(|&(tag, name)| Warning::MissingRequiredTag { tag, name })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataElement, DicomValue, Vr};

    #[test]
    fn test_empty_dataset_misses_everything() {
        let warnings = validate(&Dataset::new());
        assert_eq!(warnings.len(), REQUIRED_TAGS.len());
        assert_eq!(
            warnings[0],
            Warning::MissingRequiredTag {
                tag: ROWS,
                name: "Rows"
            }
        );
    }

    #[test]
    fn test_complete_dataset_has_no_warnings() {
        let dataset: Dataset = REQUIRED_TAGS
            .iter()
            .map(|&(tag, _)| DataElement::new(tag, Vr::US, DicomValue::U16(vec![8])))
            .collect();
        assert!(validate(&dataset).is_empty());
    }

    #[test]
    fn test_only_missing_pixel_data_is_reported() {
        let dataset: Dataset = REQUIRED_TAGS
            .iter()
            .filter(|(tag, _)| *tag != PIXEL_DATA)
            .map(|&(tag, _)| DataElement::new(tag, Vr::US, DicomValue::U16(vec![8])))
            .collect();
        assert_eq!(
            validate(&dataset),
            vec![Warning::MissingRequiredTag {
                tag: PIXEL_DATA,
                name: "Pixel Data"
            }]
        );
    }
}
