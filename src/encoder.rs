//! Dataset -> document.

use rayon::prelude::*;

use crate::codec;
use crate::dictionary;
use crate::document::{Document, ElementRecord};
use crate::model::{DataElement, Dataset};

#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeOptions {
    /// Encode element values on the rayon pool. Record order is unchanged.
    pub parallel: bool,
}

/// One record per element, in dataset order.
pub fn encode(dataset: &Dataset) -> Document {
    encode_with(dataset, &EncodeOptions::default())
}

pub fn encode_with(dataset: &Dataset, options: &EncodeOptions) -> Document {
    let elements: Vec<&DataElement> = dataset.iter().collect();

    let records: Vec<ElementRecord> = if options.parallel {
        elements.par_iter().map(|e| encode_element(e)).collect()
    } else {
        elements.iter().map(|e| encode_element(e)).collect()
    };

    tracing::debug!(elements = elements.len(), "encoded dataset");

    Document::new(records)
}

pub fn encode_element(element: &DataElement) -> ElementRecord {
    ElementRecord {
        tag: element.tag.to_string(),
        tag_name: dictionary::name_for(element.tag).to_string(),
        vr: element.vr.to_string(),
        vm: element.value.multiplicity(),
        value_text: codec::encode_value(element.vr, &element.value),
        value_length: codec::value_length(&element.value),
    }
}

/// Encodes and renders in one step.
pub fn encode_to_xml(dataset: &Dataset, indent: usize) -> String {
    encode(dataset).to_xml_with_indent(indent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DicomValue, Vr};

    fn sample() -> Dataset {
        [
            DataElement::new((0x0010, 0x0010), Vr::PN, DicomValue::Text("DOE^JANE".into())),
            DataElement::new((0x0028, 0x0010), Vr::US, DicomValue::U16(vec![512])),
            DataElement::new((0x0009, 0x1001), Vr::UN, DicomValue::Bytes(vec![1, 2, 3])),
            DataElement::new(
                (0x0028, 0x0030),
                Vr::DS,
                DicomValue::Strings(vec!["0.5".into(), "0.5".into()]),
            ),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_rows_record() {
        let dataset: Dataset = [DataElement::new(
            (0x0028, 0x0010),
            Vr::US,
            DicomValue::U16(vec![512]),
        )]
        .into_iter()
        .collect();

        let document = encode(&dataset);
        assert_eq!(
            document.records,
            vec![ElementRecord {
                tag: "(0028,0010)".into(),
                tag_name: "Rows".into(),
                vr: "US".into(),
                vm: 1,
                value_text: "[512]".into(),
                value_length: 1,
            }]
        );
    }

    #[test]
    fn test_records_follow_dataset_order() {
        let document = encode(&sample());
        let tags: Vec<_> = document.records.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, ["(0010,0010)", "(0028,0010)", "(0009,1001)", "(0028,0030)"]);
        assert_eq!(document.records[2].tag_name, "Unknown Tag");
        assert_eq!(document.records[2].value_length, 3);
        assert_eq!(document.records[3].vm, 2);
    }

    #[test]
    fn test_parallel_encoding_matches_sequential() {
        let dataset = sample();
        assert_eq!(
            encode_with(&dataset, &EncodeOptions { parallel: true }),
            encode(&dataset)
        );
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let dataset = sample();
        assert_eq!(encode_to_xml(&dataset, 2), encode_to_xml(&dataset, 2));
    }
}
