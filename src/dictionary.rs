//! Tag directory backed by the standard data dictionary of `dicom-dictionary-std`.
//!
//! Repeating groups (`60xx,3000`) resolve through the dictionary's own tag
//! ranges. Odd groups are private and never resolve.

use dicom_core::dictionary::{DataDictionary, DataDictionaryEntry, VirtualVr};
use dicom_core::Tag;
use dicom_dictionary_std::StandardDataDictionary;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{CodecError, Result};
use crate::model::{TagId, Vr};

/// Placeholder name for tags that are not in the dictionary.
pub const UNKNOWN_TAG: &str = "Unknown Tag";

static DICTIONARY: StandardDataDictionary = StandardDataDictionary;

lazy_static! {
    static ref TAG_ID_PATTERN: Regex =
        Regex::new(r"^\(([0-9A-Fa-f]{4}),([0-9A-Fa-f]{4})\)$").expect("tag id pattern is valid");
}

fn lookup(tag: TagId) -> Option<&'static <StandardDataDictionary as DataDictionary>::Entry> {
    if tag.group % 2 == 1 {
        return None;
    }
    DICTIONARY.by_tag(Tag(tag.group, tag.element))
}

/// Context dependent VRs (`US or SS`, `OB or OW`) take the unsigned or word form.
fn vr_from(vr: VirtualVr) -> Option<Vr> {
    match vr {
        VirtualVr::Exact(vr) => vr.to_string().parse().ok(),
        VirtualVr::Xs => Some(Vr::US),
        _ => Some(Vr::OW),
    }
}

/// Standard keyword of a tag, or `"Unknown Tag"`.
pub fn name_for(tag: TagId) -> &'static str {
    keyword_for(tag).unwrap_or(UNKNOWN_TAG)
}

pub fn keyword_for(tag: TagId) -> Option<&'static str> {
    lookup(tag).map(|entry| entry.alias())
}

/// VR the dictionary declares for a tag, used when the stream does not carry it.
pub fn vr_for(tag: TagId) -> Option<Vr> {
    lookup(tag).and_then(|entry| vr_from(entry.vr()))
}

pub fn tag_for_keyword(keyword: &str) -> Option<TagId> {
    DICTIONARY.by_name(keyword).map(|entry| {
        let tag = entry.tag();
        TagId::new(tag.group(), tag.element())
    })
}

/// Parses the canonical `(GGGG,EEEE)` rendering. Hex digits may be either case.
pub fn parse_tag_id(text: &str) -> Result<TagId> {
    let captures = TAG_ID_PATTERN
        .captures(text)
        .ok_or_else(|| CodecError::MalformedTagId(text.to_string()))?;

    let part = |i: usize| {
        u16::from_str_radix(&captures[i], 16)
            .map_err(|_| CodecError::MalformedTagId(text.to_string()))
    };

    Ok(TagId::new(part(1)?, part(2)?))
}

/// Accepts either a keyword (`PatientName`) or a canonical tag rendering.
pub fn resolve_tag(text: &str) -> Result<TagId> {
    let text = text.trim();
    if text.starts_with('(') {
        return parse_tag_id(text);
    }
    tag_for_keyword(text).ok_or_else(|| CodecError::UnknownKeyword(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_for_known_tags() {
        assert_eq!(name_for(TagId::new(0x0028, 0x0010)), "Rows");
        assert_eq!(name_for(TagId::new(0x7FE0, 0x0010)), "PixelData");
        assert_eq!(name_for(TagId::new(0x0010, 0x0010)), "PatientName");
    }

    #[test]
    fn test_name_for_unknown_and_private_tags() {
        assert_eq!(name_for(TagId::new(0x0009, 0x0010)), UNKNOWN_TAG);
        assert_eq!(name_for(TagId::new(0x6001, 0x3000)), UNKNOWN_TAG);
        assert_eq!(name_for(TagId::new(0x1234, 0x5678)), UNKNOWN_TAG);
    }

    #[test]
    fn test_repeating_group_matches_by_pattern() {
        assert_eq!(name_for(TagId::new(0x6002, 0x3000)), "OverlayData");
        assert_eq!(name_for(TagId::new(0x601E, 0x0010)), "OverlayRows");
        assert_eq!(vr_for(TagId::new(0x6000, 0x3000)), Some(Vr::OW));
    }

    #[test]
    fn test_vr_and_keyword_lookups() {
        assert_eq!(vr_for(TagId::new(0x0028, 0x0010)), Some(Vr::US));
        assert_eq!(vr_for(TagId::new(0x0028, 0x1050)), Some(Vr::DS));
        assert_eq!(tag_for_keyword("PatientID"), Some(TagId::new(0x0010, 0x0020)));
        assert_eq!(tag_for_keyword("NotAKeyword"), None);
    }

    #[test]
    fn test_full_standard_dictionary() {
        assert_eq!(name_for(TagId::new(0x0054, 0x0081)), "NumberOfSlices");
        assert_eq!(vr_for(TagId::new(0x0054, 0x0081)), Some(Vr::US));
        assert_eq!(name_for(TagId::new(0x0018, 0x9087)), "DiffusionBValue");
        assert_eq!(vr_for(TagId::new(0x0018, 0x9087)), Some(Vr::FD));
        assert_eq!(name_for(TagId::new(0x0040, 0xA730)), "ContentSequence");
        assert_eq!(vr_for(TagId::new(0x0040, 0xA730)), Some(Vr::SQ));
        assert_eq!(tag_for_keyword("Units"), Some(TagId::new(0x0054, 0x1001)));
    }

    #[test]
    fn test_context_dependent_vr_takes_unsigned_form() {
        // SmallestImagePixelValue is US or SS
        assert_eq!(vr_for(TagId::new(0x0028, 0x0106)), Some(Vr::US));
        assert_eq!(vr_for(TagId::new(0x7FE0, 0x0010)), Some(Vr::OW));
    }

    #[test]
    fn test_parse_tag_id() {
        assert_eq!(parse_tag_id("(0028,0010)").unwrap(), TagId::new(0x0028, 0x0010));
        assert_eq!(parse_tag_id("(7fe0,0010)").unwrap(), TagId::new(0x7FE0, 0x0010));
        assert_eq!(parse_tag_id("(FFFF,FFFF)").unwrap(), TagId::new(0xFFFF, 0xFFFF));
    }

    #[test]
    fn test_parse_tag_id_rejects_other_shapes() {
        for text in [
            "0028,0010",
            "(0028,0010",
            "(28,10)",
            "(0028;0010)",
            "(0028,00100)",
            "(002G,0010)",
            " (0028,0010)",
            "",
        ] {
            assert!(
                matches!(parse_tag_id(text), Err(CodecError::MalformedTagId(_))),
                "{text:?} should not parse"
            );
        }
    }

    #[test]
    fn test_resolve_tag() {
        assert_eq!(resolve_tag("PatientAge").unwrap(), TagId::new(0x0010, 0x1010));
        assert_eq!(resolve_tag("(0010,2154)").unwrap(), TagId::new(0x0010, 0x2154));
        assert!(matches!(resolve_tag("Nope"), Err(CodecError::UnknownKeyword(_))));
    }
}
