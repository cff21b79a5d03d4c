//! Document -> dataset.
//!
//! Only unparseable markup fails a decode. Every record is attempted; a record
//! with a bad tag or VR is skipped, a record with a bad value is kept with an
//! empty value, and both leave a [`Warning`] behind.

use rayon::prelude::*;

use crate::codec;
use crate::document::{Document, ElementRecord};
use crate::error::{Result, Warning};
use crate::model::{DataElement, Dataset, TransferSyntax, Vr};
use crate::validator;

/// Encoding every reconstructed dataset is tagged with for persistence.
pub const OUTPUT_TRANSFER_SYNTAX: TransferSyntax = TransferSyntax::ExplicitVrLittleEndian;

#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    /// Decode values on the rayon pool; insertion stays in document order.
    pub parallel: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub dataset: Dataset,
    pub warnings: Vec<Warning>,
}

enum Outcome {
    Element(DataElement, Option<Warning>),
    Skipped(Warning),
}

pub fn decode(xml: &str) -> Result<Decoded> {
    decode_with(xml, &DecodeOptions::default())
}

pub fn decode_with(xml: &str, options: &DecodeOptions) -> Result<Decoded> {
    let document = Document::from_xml(xml)?;
    Ok(decode_document(&document, options))
}

/// Rebuilds a dataset from parsed records, then runs the structural check.
pub fn decode_document(document: &Document, options: &DecodeOptions) -> Decoded {
    let outcomes: Vec<Outcome> = if options.parallel {
        document
            .records
            .par_iter()
            .enumerate()
            .map(|(i, record)| decode_record(i, record))
            .collect()
    } else {
        document
            .records
            .iter()
            .enumerate()
            .map(|(i, record)| decode_record(i, record))
            .collect()
    };

    let mut dataset = Dataset::with_transfer_syntax(OUTPUT_TRANSFER_SYNTAX);
    let mut warnings = Vec::new();

    for outcome in outcomes {
        match outcome {
            Outcome::Element(element, warning) => {
                let tag = element.tag;
                warnings.extend(warning);
                if dataset.insert(element).is_some() {
                    warnings.push(Warning::DuplicateTag { tag });
                }
            }
            Outcome::Skipped(warning) => warnings.push(warning),
        }
    }

    warnings.extend(validator::validate(&dataset));

    for warning in &warnings {
        tracing::debug!(%warning, "document decode warning");
    }
    tracing::debug!(
        records = document.len(),
        elements = dataset.len(),
        warnings = warnings.len(),
        "decoded document"
    );

    Decoded { dataset, warnings }
}

fn decode_record(position: usize, record: &ElementRecord) -> Outcome {
    let Ok(tag) = record.tag_id() else {
        return Outcome::Skipped(Warning::MalformedTagId {
            position,
            text: record.tag.clone(),
        });
    };

    let Ok(vr) = record.vr.parse::<Vr>() else {
        return Outcome::Skipped(Warning::UnknownVr {
            tag,
            vr: record.vr.trim().to_string(),
        });
    };

    let (value, error) = codec::decode_value(vr, &record.value_text);
    let warning = error.map(|source| Warning::ValueDecode { tag, source });

    Outcome::Element(DataElement { tag, vr, value }, warning)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;
    use crate::model::{DicomValue, TagId};

    fn element(tag: &str, vr: &str, value: &str) -> String {
        format!(
            "<Element><TagGroup>{tag}</TagGroup><TagName>x</TagName><VR>{vr}</VR>\
             <VM>1</VM><Length>1</Length><Value>{value}</Value></Element>"
        )
    }

    fn document(elements: &[String]) -> String {
        format!("<DicomData>{}</DicomData>", elements.concat())
    }

    fn non_validator_warnings(decoded: &Decoded) -> Vec<&Warning> {
        decoded
            .warnings
            .iter()
            .filter(|w| !matches!(w, Warning::MissingRequiredTag { .. }))
            .collect()
    }

    #[test]
    fn test_decode_keeps_document_order() {
        let xml = document(&[
            element("(0028,0011)", "US", "[256]"),
            element("(0008,0060)", "CS", "MR"),
            element("(0010,0010)", "PN", "DOE^JOHN"),
        ]);

        let decoded = decode(&xml).unwrap();
        let tags: Vec<_> = decoded.dataset.tags().collect();
        assert_eq!(
            tags,
            vec![
                TagId::new(0x0028, 0x0011),
                TagId::new(0x0008, 0x0060),
                TagId::new(0x0010, 0x0010)
            ]
        );
        assert_eq!(decoded.dataset.transfer_syntax(), OUTPUT_TRANSFER_SYNTAX);
    }

    #[test]
    fn test_malformed_tag_skips_element() {
        let xml = document(&[
            element("0028,0010", "US", "[1]"),
            element("(0028,0011)", "US", "[2]"),
        ]);

        let decoded = decode(&xml).unwrap();
        assert_eq!(decoded.dataset.len(), 1);
        assert_eq!(
            non_validator_warnings(&decoded),
            vec![&Warning::MalformedTagId {
                position: 0,
                text: "0028,0010".into()
            }]
        );
    }

    #[test]
    fn test_unknown_vr_skips_element() {
        let xml = document(&[element("(0028,0010)", "ZZ", "[1]")]);
        let decoded = decode(&xml).unwrap();
        assert!(decoded.dataset.is_empty());
        assert!(matches!(
            non_validator_warnings(&decoded)[..],
            [Warning::UnknownVr { .. }]
        ));
    }

    #[test]
    fn test_bad_value_keeps_element_empty() {
        let xml = document(&[
            element("(0028,0010)", "US", "[abc]"),
            element("(0010,0010)", "PN", "A^B"),
            element("(0028,0011)", "US", "[4]"),
        ]);

        let decoded = decode(&xml).unwrap();
        assert_eq!(decoded.dataset.len(), 3);
        assert_eq!(
            decoded.dataset.value(TagId::new(0x0028, 0x0010)),
            Some(&DicomValue::U16(vec![]))
        );
        assert!(matches!(
            non_validator_warnings(&decoded)[..],
            [Warning::ValueDecode { .. }]
        ));
    }

    #[test]
    fn test_bad_attribute_tag_warns_and_still_writes() {
        let xml = document(&[
            element("(0028,0009)", "AT", "not-a-tag"),
            element("(0020,5000)", "AT", "(0028,0010)"),
        ]);

        let decoded = decode(&xml).unwrap();
        assert_eq!(
            decoded.dataset.value(TagId::new(0x0028, 0x0009)),
            Some(&DicomValue::Text(String::new()))
        );
        assert_eq!(
            decoded.dataset.value(TagId::new(0x0020, 0x5000)),
            Some(&DicomValue::Text("(0028,0010)".into()))
        );
        assert!(matches!(
            non_validator_warnings(&decoded)[..],
            [Warning::ValueDecode { tag, .. }] if *tag == TagId::new(0x0028, 0x0009)
        ));
        assert!(crate::writer::write_bytes(&decoded.dataset).is_ok());
    }

    #[test]
    fn test_duplicate_tag_last_value_wins() {
        let xml = document(&[
            element("(0010,0010)", "PN", "FIRST"),
            element("(0008,0060)", "CS", "OT"),
            element("(0010,0010)", "PN", "SECOND"),
        ]);

        let decoded = decode(&xml).unwrap();
        assert_eq!(decoded.dataset.len(), 2);
        assert_eq!(decoded.dataset.tags().next(), Some(TagId::new(0x0010, 0x0010)));
        assert_eq!(
            decoded.dataset.value(TagId::new(0x0010, 0x0010)),
            Some(&DicomValue::Text("SECOND".into()))
        );
        assert_eq!(
            non_validator_warnings(&decoded),
            vec![&Warning::DuplicateTag {
                tag: TagId::new(0x0010, 0x0010)
            }]
        );
    }

    #[test]
    fn test_validator_runs_after_all_elements() {
        let xml = document(&[element("(0028,0010)", "US", "[1]")]);
        let decoded = decode(&xml).unwrap();
        let missing = decoded
            .warnings
            .iter()
            .filter(|w| matches!(w, Warning::MissingRequiredTag { .. }))
            .count();
        assert_eq!(missing, 6);
    }

    #[test]
    fn test_parallel_decode_matches_sequential() {
        let elements: Vec<String> = (0..64u16)
            .map(|i| element(&format!("(0009,{i:04X})"), "US", &format!("[{i}]")))
            .collect();
        let xml = document(&elements);

        let sequential = decode(&xml).unwrap();
        let parallel = decode_with(&xml, &DecodeOptions { parallel: true }).unwrap();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_malformed_document_is_fatal() {
        assert!(matches!(
            decode("<DicomData><Element>"),
            Err(CodecError::MalformedDocument(_))
        ));
    }
}
