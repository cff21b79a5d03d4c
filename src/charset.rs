//! Specific Character Set (0008,0005) to `encoding_rs` mapping.

use encoding_rs::{
    Encoding, EUC_KR, GB18030, GBK, ISO_8859_2, ISO_8859_3, ISO_8859_4, ISO_8859_5, ISO_8859_6,
    ISO_8859_7, ISO_8859_8, SHIFT_JIS, UTF_8, WINDOWS_1252, WINDOWS_1254, WINDOWS_874,
};

use crate::model::TagId;

pub const SPECIFIC_CHARACTER_SET: TagId = TagId::new(0x0008, 0x0005);

/// Default repertoire. Windows-1252 is a superset of both ASCII and Latin-1
/// for every printable character.
pub static DEFAULT_ENCODING: &Encoding = WINDOWS_1252;

/// Only the last defined term counts; code extensions are not switched mid-value.
pub fn encoding_for(specific_character_set: &str) -> &'static Encoding {
    let term = specific_character_set
        .split('\\')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .last()
        .unwrap_or_default();

    match term {
        "ISO_IR 192" => UTF_8,
        "GB18030" => GB18030,
        "GBK" => GBK,
        "ISO_IR 101" | "ISO 2022 IR 101" => ISO_8859_2,
        "ISO_IR 109" | "ISO 2022 IR 109" => ISO_8859_3,
        "ISO_IR 110" | "ISO 2022 IR 110" => ISO_8859_4,
        "ISO_IR 144" | "ISO 2022 IR 144" => ISO_8859_5,
        "ISO_IR 127" | "ISO 2022 IR 127" => ISO_8859_6,
        "ISO_IR 126" | "ISO 2022 IR 126" => ISO_8859_7,
        "ISO_IR 138" | "ISO 2022 IR 138" => ISO_8859_8,
        "ISO_IR 148" | "ISO 2022 IR 148" => WINDOWS_1254,
        "ISO_IR 166" | "ISO 2022 IR 166" => WINDOWS_874,
        "ISO_IR 13" | "ISO 2022 IR 13" => SHIFT_JIS,
        "ISO 2022 IR 149" => EUC_KR,
        _ => DEFAULT_ENCODING,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_terms() {
        assert_eq!(encoding_for("ISO_IR 192"), UTF_8);
        assert_eq!(encoding_for("GB18030"), GB18030);
        assert_eq!(encoding_for("\\ISO 2022 IR 149"), EUC_KR);
    }

    #[test]
    fn test_default_for_blank_and_unknown() {
        assert_eq!(encoding_for(""), DEFAULT_ENCODING);
        assert_eq!(encoding_for("ISO_IR 100"), DEFAULT_ENCODING);
        assert_eq!(encoding_for("SOMETHING ELSE"), DEFAULT_ENCODING);
    }
}
