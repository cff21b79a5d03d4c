//! Conversion between native element values and their document text.
//!
//! | family      | text form                         |
//! |-------------|-----------------------------------|
//! | binary      | base64                            |
//! | integer     | `[1,2,3]`                         |
//! | float       | `[0.5,1e-7]`                      |
//! | string list | `[1.5,20]` (tokens kept as text)  |
//! | text        | the trimmed literal               |

use std::fmt::Display;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::ValueDecodeError;
use crate::model::{DicomValue, Vr, VrFamily};

/// Renders a value as document text. Never fails: a value whose shape does
/// not fit the declared VR is rendered through its textual fallback.
pub fn encode_value(vr: Vr, value: &DicomValue) -> String {
    match (vr.family(), value) {
        (VrFamily::Binary, DicomValue::Bytes(bytes)) => STANDARD.encode(bytes),
        (
            VrFamily::IntegerList,
            DicomValue::I16(_)
            | DicomValue::U16(_)
            | DicomValue::I32(_)
            | DicomValue::U32(_)
            | DicomValue::I64(_)
            | DicomValue::U64(_),
        ) => value.to_string(),
        (VrFamily::FloatList, DicomValue::F32(_) | DicomValue::F64(_)) => value.to_string(),
        (VrFamily::StringList, DicomValue::Strings(tokens)) => format!("[{}]", tokens.join(",")),
        (VrFamily::Text, DicomValue::Text(text)) => text.trim().to_string(),
        (_, other) => {
            tracing::debug!(%vr, "value shape does not match VR, using text fallback");
            other.to_string().trim().to_string()
        }
    }
}

/// Informational length recorded next to an encoded value: bytes for binary
/// blobs, entries for lists, characters for text.
pub fn value_length(value: &DicomValue) -> usize {
    match value {
        DicomValue::Bytes(bytes) => bytes.len(),
        DicomValue::Text(text) => text.trim().chars().count(),
        DicomValue::Sequence(items) => items.len(),
        DicomValue::Empty => 0,
        other => other.list_len().unwrap_or(0),
    }
}

/// Parses document text for the given VR, failing on the first bad token.
pub fn try_decode_value(vr: Vr, text: &str) -> Result<DicomValue, ValueDecodeError> {
    let fail = |reason: String| ValueDecodeError {
        vr,
        text: text.to_string(),
        reason,
    };

    let value = match vr.family() {
        VrFamily::Binary => {
            let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            let bytes = STANDARD
                .decode(compact.as_bytes())
                .map_err(|e| fail(format!("invalid base64: {e}")))?;
            DicomValue::Bytes(bytes)
        }
        VrFamily::IntegerList | VrFamily::FloatList => {
            let tokens = split_list(text);
            match vr {
                Vr::SS => DicomValue::I16(parse_list(&tokens).map_err(fail)?),
                Vr::US => DicomValue::U16(parse_list(&tokens).map_err(fail)?),
                Vr::SL => DicomValue::I32(parse_list(&tokens).map_err(fail)?),
                Vr::UL => DicomValue::U32(parse_list(&tokens).map_err(fail)?),
                Vr::SV => DicomValue::I64(parse_list(&tokens).map_err(fail)?),
                Vr::UV => DicomValue::U64(parse_list(&tokens).map_err(fail)?),
                Vr::FL => DicomValue::F32(parse_list(&tokens).map_err(fail)?),
                _ => DicomValue::F64(parse_list(&tokens).map_err(fail)?),
            }
        }
        VrFamily::StringList => DicomValue::Strings(
            split_list(text)
                .into_iter()
                .map(str::to_string)
                .collect(),
        ),
        VrFamily::Text => {
            if vr == Vr::AT {
                validate_tag_list(text).map_err(fail)?;
            }
            DicomValue::Text(text.trim().to_string())
        }
    };

    Ok(value)
}

/// Parses document text, degrading to the empty value of the VR on failure.
pub fn decode_value(vr: Vr, text: &str) -> (DicomValue, Option<ValueDecodeError>) {
    match try_decode_value(vr, text) {
        Ok(value) => (value, None),
        Err(e) => (DicomValue::empty_for(vr), Some(e)),
    }
}

/// AT text is a backslash separated list of `(GGGG,EEEE)` renderings.
fn validate_tag_list(text: &str) -> Result<(), String> {
    for part in text.split('\\').map(str::trim).filter(|s| !s.is_empty()) {
        crate::dictionary::parse_tag_id(part).map_err(|_| format!("bad tag {part:?}"))?;
    }
    Ok(())
}

/// Strips one pair of surrounding brackets and splits on commas. Blank input
/// is an empty list.
fn split_list(text: &str) -> Vec<&str> {
    let text = text.trim();
    let text = text.strip_prefix('[').unwrap_or(text);
    let text = text.strip_suffix(']').unwrap_or(text);

    if text.trim().is_empty() {
        return Vec::new();
    }

    text.split(',').map(str::trim).collect()
}

fn parse_list<T>(tokens: &[&str]) -> Result<Vec<T>, String>
where
    T: FromStr,
    T::Err: Display,
{
    tokens
        .iter()
        .map(|token| {
            token
                .parse::<T>()
                .map_err(|e| format!("token {token:?}: {e}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_binary_as_base64() {
        let value = DicomValue::Bytes(vec![0, 1, 2, 253, 254, 255]);
        assert_eq!(encode_value(Vr::OB, &value), "AAEC/f7/");
        assert_eq!(value_length(&value), 6);
    }

    #[test]
    fn test_encode_lists() {
        assert_eq!(encode_value(Vr::US, &DicomValue::U16(vec![512])), "[512]");
        assert_eq!(encode_value(Vr::SL, &DicomValue::I32(vec![-1, 0, 7])), "[-1,0,7]");
        assert_eq!(encode_value(Vr::FD, &DicomValue::F64(vec![0.5, -2.25])), "[0.5,-2.25]");
        assert_eq!(
            encode_value(Vr::DS, &DicomValue::Strings(vec!["1.0".into(), "2".into()])),
            "[1.0,2]"
        );
        assert_eq!(encode_value(Vr::US, &DicomValue::U16(vec![])), "[]");
    }

    #[test]
    fn test_encode_text_is_trimmed() {
        let value = DicomValue::Text("  DOE^JOHN ".into());
        assert_eq!(encode_value(Vr::PN, &value), "DOE^JOHN");
        assert_eq!(value_length(&value), 8);
    }

    #[test]
    fn test_encode_mismatched_shape_falls_back_to_text() {
        assert_eq!(encode_value(Vr::US, &DicomValue::Text("12".into())), "12");
        assert_eq!(encode_value(Vr::LO, &DicomValue::U16(vec![1, 2])), "[1,2]");
        assert_eq!(encode_value(Vr::OB, &DicomValue::Empty), "");
    }

    #[test]
    fn test_decode_integer_lists_tolerate_whitespace() {
        assert_eq!(
            try_decode_value(Vr::US, "[ 1, 2 ,3 ]").unwrap(),
            DicomValue::U16(vec![1, 2, 3])
        );
        assert_eq!(try_decode_value(Vr::SS, "-5").unwrap(), DicomValue::I16(vec![-5]));
        assert_eq!(try_decode_value(Vr::UL, "[]").unwrap(), DicomValue::U32(vec![]));
        assert_eq!(try_decode_value(Vr::UL, "").unwrap(), DicomValue::U32(vec![]));
    }

    #[test]
    fn test_decode_bad_integer_degrades_to_empty_list() {
        let (value, error) = decode_value(Vr::US, "[1,two,3]");
        assert_eq!(value, DicomValue::U16(vec![]));
        let error = error.unwrap();
        assert_eq!(error.vr, Vr::US);
        assert!(error.reason.contains("two"));
    }

    #[test]
    fn test_decode_out_of_range_integer_fails() {
        let (value, error) = decode_value(Vr::US, "[70000]");
        assert_eq!(value, DicomValue::U16(vec![]));
        assert!(error.is_some());
    }

    #[test]
    fn test_decode_floats() {
        assert_eq!(
            try_decode_value(Vr::FL, "[1.5, -0.25]").unwrap(),
            DicomValue::F32(vec![1.5, -0.25])
        );
        let (value, error) = decode_value(Vr::FD, "[1.0,abc]");
        assert_eq!(value, DicomValue::F64(vec![]));
        assert!(error.is_some());
    }

    #[test]
    fn test_decode_string_lists_never_fail() {
        assert_eq!(
            try_decode_value(Vr::DS, "[ 1.0 , abc ]").unwrap(),
            DicomValue::Strings(vec!["1.0".into(), "abc".into()])
        );
        assert_eq!(
            try_decode_value(Vr::IS, "[]").unwrap(),
            DicomValue::Strings(vec![])
        );
    }

    #[test]
    fn test_decode_binary() {
        assert_eq!(
            try_decode_value(Vr::OW, "AAEC\n  /f7/").unwrap(),
            DicomValue::Bytes(vec![0, 1, 2, 253, 254, 255])
        );
        let (value, error) = decode_value(Vr::OB, "not base64!");
        assert_eq!(value, DicomValue::Bytes(vec![]));
        assert!(error.is_some());
    }

    #[test]
    fn test_decode_text() {
        assert_eq!(
            try_decode_value(Vr::LO, "  hello  ").unwrap(),
            DicomValue::Text("hello".into())
        );
        assert_eq!(
            try_decode_value(Vr::SQ, "<Sequence of 2 item(s)>").unwrap(),
            DicomValue::Text("<Sequence of 2 item(s)>".into())
        );
    }

    #[test]
    fn test_decode_attribute_tags() {
        assert_eq!(
            try_decode_value(Vr::AT, "(0028,0010)\\(7FE0,0010)").unwrap(),
            DicomValue::Text("(0028,0010)\\(7FE0,0010)".into())
        );
        assert_eq!(try_decode_value(Vr::AT, "").unwrap(), DicomValue::Text(String::new()));

        let (value, error) = decode_value(Vr::AT, "not-a-tag");
        assert_eq!(value, DicomValue::Text(String::new()));
        assert_eq!(error.unwrap().reason, "bad tag \"not-a-tag\"");
    }
}
