use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use indexmap::IndexMap;

/// Two-part element identifier, rendered as `(GGGG,EEEE)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagId {
    pub group: u16,
    pub element: u16,
}

impl TagId {
    pub const fn new(group: u16, element: u16) -> Self {
        Self { group, element }
    }

    /// Item, item delimitation and sequence delimitation tags.
    pub fn is_delimiter(&self) -> bool {
        self.group == 0xFFFE
    }

    pub fn is_file_meta(&self) -> bool {
        self.group == 0x0002
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.group, self.element)
    }
}

impl FromStr for TagId {
    type Err = crate::error::CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::dictionary::parse_tag_id(s)
    }
}

impl From<(u16, u16)> for TagId {
    fn from((group, element): (u16, u16)) -> Self {
        Self::new(group, element)
    }
}

/// Codec family a VR belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VrFamily {
    Binary,
    IntegerList,
    FloatList,
    StringList,
    Text,
}

macro_rules! value_representations {
    ($($vr:ident => $family:ident;)*) => {
        /// Value representation codes of the DICOM standard.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Vr {
            $($vr,)*
        }

        impl Vr {
            pub const ALL: &'static [Vr] = &[$(Vr::$vr,)*];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Vr::$vr => stringify!($vr),)*
                }
            }

            pub fn family(&self) -> VrFamily {
                match self {
                    $(Vr::$vr => VrFamily::$family,)*
                }
            }
        }

        impl FromStr for Vr {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $(stringify!($vr) => Ok(Vr::$vr),)*
                    other => Err(other.to_string()),
                }
            }
        }
    };
}

value_representations! {
    AE => Text;
    AS => Text;
    AT => Text;
    CS => Text;
    DA => Text;
    DS => StringList;
    DT => Text;
    FD => FloatList;
    FL => FloatList;
    IS => StringList;
    LO => Text;
    LT => Text;
    OB => Binary;
    OD => Binary;
    OF => Binary;
    OL => Binary;
    OV => Binary;
    OW => Binary;
    PN => Text;
    SH => Text;
    SL => IntegerList;
    SQ => Text;
    SS => IntegerList;
    ST => Text;
    SV => IntegerList;
    TM => Text;
    UC => Text;
    UI => Text;
    UL => IntegerList;
    UN => Binary;
    UR => Text;
    US => IntegerList;
    UT => Text;
    UV => IntegerList;
}

impl Vr {
    /// Explicit VR encodings with 2 reserved bytes and a 32-bit length.
    pub fn has_long_length(&self) -> bool {
        matches!(
            self,
            Vr::OB
                | Vr::OD
                | Vr::OF
                | Vr::OL
                | Vr::OV
                | Vr::OW
                | Vr::SQ
                | Vr::SV
                | Vr::UC
                | Vr::UN
                | Vr::UR
                | Vr::UT
                | Vr::UV
        )
    }
}

impl fmt::Display for Vr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Native value of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum DicomValue {
    Empty,
    /// Raw text; multiple values stay joined by backslashes.
    Text(String),
    /// Numeric-as-text tokens (DS, IS), not numerically parsed.
    Strings(Vec<String>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Bytes(Vec<u8>),
    Sequence(Vec<Dataset>),
}

impl DicomValue {
    /// The degraded value of an element whose text failed to decode.
    pub fn empty_for(vr: Vr) -> Self {
        match vr {
            Vr::SS => DicomValue::I16(Vec::new()),
            Vr::US => DicomValue::U16(Vec::new()),
            Vr::SL => DicomValue::I32(Vec::new()),
            Vr::UL => DicomValue::U32(Vec::new()),
            Vr::SV => DicomValue::I64(Vec::new()),
            Vr::UV => DicomValue::U64(Vec::new()),
            Vr::FL => DicomValue::F32(Vec::new()),
            Vr::FD => DicomValue::F64(Vec::new()),
            Vr::DS | Vr::IS => DicomValue::Strings(Vec::new()),
            _ => match vr.family() {
                VrFamily::Binary => DicomValue::Bytes(Vec::new()),
                _ => DicomValue::Text(String::new()),
            },
        }
    }

    /// Number of values held.
    pub fn multiplicity(&self) -> usize {
        match self {
            DicomValue::Empty => 0,
            DicomValue::Text(s) if s.trim().is_empty() => 0,
            DicomValue::Text(s) => s.split('\\').count(),
            DicomValue::Bytes(_) => 1,
            DicomValue::Sequence(items) => items.len(),
            other => other.list_len().unwrap_or(0),
        }
    }

    /// Entry count for list-shaped values.
    pub fn list_len(&self) -> Option<usize> {
        match self {
            DicomValue::Strings(v) => Some(v.len()),
            DicomValue::I16(v) => Some(v.len()),
            DicomValue::U16(v) => Some(v.len()),
            DicomValue::I32(v) => Some(v.len()),
            DicomValue::U32(v) => Some(v.len()),
            DicomValue::I64(v) => Some(v.len()),
            DicomValue::U64(v) => Some(v.len()),
            DicomValue::F32(v) => Some(v.len()),
            DicomValue::F64(v) => Some(v.len()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            DicomValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            DicomValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// First integer of an integer list, widened.
    pub fn first_integer(&self) -> Option<i64> {
        match self {
            DicomValue::I16(v) => v.first().map(|&x| x.into()),
            DicomValue::U16(v) => v.first().map(|&x| x.into()),
            DicomValue::I32(v) => v.first().map(|&x| x.into()),
            DicomValue::U32(v) => v.first().map(|&x| x.into()),
            DicomValue::I64(v) => v.first().copied(),
            DicomValue::U64(v) => v.first().and_then(|&x| i64::try_from(x).ok()),
            DicomValue::Strings(v) => v.first().and_then(|s| s.trim().parse().ok()),
            _ => None,
        }
    }

    /// First number of a numeric or numeric-as-text value.
    pub fn first_float(&self) -> Option<f64> {
        match self {
            DicomValue::F32(v) => v.first().map(|&x| x.into()),
            DicomValue::F64(v) => v.first().copied(),
            DicomValue::Strings(v) => v.first().and_then(|s| s.trim().parse().ok()),
            DicomValue::Text(s) => s.split('\\').next().and_then(|s| s.trim().parse().ok()),
            other => other.first_integer().map(|x| x as f64),
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str("]")
}

/// Textual fallback rendering, used when a value does not have the shape its
/// VR family expects.
impl fmt::Display for DicomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DicomValue::Empty => Ok(()),
            DicomValue::Text(s) => f.write_str(s),
            DicomValue::Strings(v) => write_list(f, v),
            DicomValue::I16(v) => write_list(f, v),
            DicomValue::U16(v) => write_list(f, v),
            DicomValue::I32(v) => write_list(f, v),
            DicomValue::U32(v) => write_list(f, v),
            DicomValue::I64(v) => write_list(f, v),
            DicomValue::U64(v) => write_list(f, v),
            DicomValue::F32(v) => write_list(f, v),
            DicomValue::F64(v) => write_list(f, v),
            DicomValue::Bytes(b) => f.write_str(&STANDARD.encode(b)),
            DicomValue::Sequence(items) => {
                write!(f, "<Sequence of {} item(s)>", items.len())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataElement {
    pub tag: TagId,
    pub vr: Vr,
    pub value: DicomValue,
}

impl DataElement {
    pub fn new(tag: impl Into<TagId>, vr: Vr, value: DicomValue) -> Self {
        Self {
            tag: tag.into(),
            vr,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferSyntax {
    ImplicitVrLittleEndian,
    #[default]
    ExplicitVrLittleEndian,
}

impl TransferSyntax {
    pub fn uid(&self) -> &'static str {
        match self {
            TransferSyntax::ImplicitVrLittleEndian => "1.2.840.10008.1.2",
            TransferSyntax::ExplicitVrLittleEndian => "1.2.840.10008.1.2.1",
        }
    }

    pub fn from_uid(uid: &str) -> Option<Self> {
        match uid.trim_end_matches(['\0', ' ']) {
            "1.2.840.10008.1.2" => Some(TransferSyntax::ImplicitVrLittleEndian),
            "1.2.840.10008.1.2.1" => Some(TransferSyntax::ExplicitVrLittleEndian),
            _ => None,
        }
    }

    pub fn is_explicit_vr(&self) -> bool {
        matches!(self, TransferSyntax::ExplicitVrLittleEndian)
    }
}

/// Ordered collection of elements, unique by tag, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    elements: IndexMap<TagId, DataElement>,
    transfer_syntax: TransferSyntax,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transfer_syntax(transfer_syntax: TransferSyntax) -> Self {
        Self {
            elements: IndexMap::new(),
            transfer_syntax,
        }
    }

    pub fn transfer_syntax(&self) -> TransferSyntax {
        self.transfer_syntax
    }

    pub fn set_transfer_syntax(&mut self, transfer_syntax: TransferSyntax) {
        self.transfer_syntax = transfer_syntax;
    }

    /// Inserts an element, returning the one it replaced. A replaced element
    /// keeps its original position.
    pub fn insert(&mut self, element: DataElement) -> Option<DataElement> {
        self.elements.insert(element.tag, element)
    }

    pub fn get(&self, tag: TagId) -> Option<&DataElement> {
        self.elements.get(&tag)
    }

    pub fn value(&self, tag: TagId) -> Option<&DicomValue> {
        self.get(tag).map(|e| &e.value)
    }

    pub fn contains(&self, tag: TagId) -> bool {
        self.elements.contains_key(&tag)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn tags(&self) -> impl Iterator<Item = TagId> + '_ {
        self.elements.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataElement> {
        self.elements.values()
    }
}

/// Equality respects element order.
impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        self.transfer_syntax == other.transfer_syntax
            && self.elements.len() == other.elements.len()
            && self.iter().eq(other.iter())
    }
}

impl FromIterator<DataElement> for Dataset {
    fn from_iter<I: IntoIterator<Item = DataElement>>(iter: I) -> Self {
        let mut dataset = Dataset::new();
        for element in iter {
            dataset.insert(element);
        }
        dataset
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a DataElement;
    type IntoIter = indexmap::map::Values<'a, TagId, DataElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_rendering_is_uppercase_hex() {
        assert_eq!(TagId::new(0x7FE0, 0x0010).to_string(), "(7FE0,0010)");
        assert_eq!(TagId::new(0x0008, 0x103e).to_string(), "(0008,103E)");
    }

    #[test]
    fn test_vr_parse_and_family() {
        assert_eq!("us".parse::<Vr>(), Ok(Vr::US));
        assert_eq!(Vr::US.family(), VrFamily::IntegerList);
        assert_eq!(Vr::OW.family(), VrFamily::Binary);
        assert_eq!(Vr::DS.family(), VrFamily::StringList);
        assert_eq!(Vr::PN.family(), VrFamily::Text);
        assert!("ZZ".parse::<Vr>().is_err());
        assert_eq!(Vr::ALL.len(), 34);
    }

    #[test]
    fn test_dataset_keeps_insertion_order() {
        let dataset: Dataset = [
            DataElement::new((0x0028, 0x0011), Vr::US, DicomValue::U16(vec![2])),
            DataElement::new((0x0008, 0x0060), Vr::CS, DicomValue::Text("OT".into())),
            DataElement::new((0x0010, 0x0010), Vr::PN, DicomValue::Text("A^B".into())),
        ]
        .into_iter()
        .collect();

        let tags: Vec<_> = dataset.tags().collect();
        assert_eq!(
            tags,
            vec![
                TagId::new(0x0028, 0x0011),
                TagId::new(0x0008, 0x0060),
                TagId::new(0x0010, 0x0010)
            ]
        );
    }

    #[test]
    fn test_dataset_equality_is_order_sensitive() {
        let a = DataElement::new((0x0008, 0x0060), Vr::CS, DicomValue::Text("OT".into()));
        let b = DataElement::new((0x0010, 0x0010), Vr::PN, DicomValue::Text("X".into()));
        let first: Dataset = [a.clone(), b.clone()].into_iter().collect();
        let second: Dataset = [b, a].into_iter().collect();
        assert_ne!(first, second);
    }

    #[test]
    fn test_replaced_element_keeps_position() {
        let mut dataset = Dataset::new();
        dataset.insert(DataElement::new((0x0008, 0x0060), Vr::CS, DicomValue::Text("OT".into())));
        dataset.insert(DataElement::new((0x0010, 0x0010), Vr::PN, DicomValue::Text("X".into())));
        let old = dataset.insert(DataElement::new(
            (0x0008, 0x0060),
            Vr::CS,
            DicomValue::Text("MR".into()),
        ));

        assert!(old.is_some());
        assert_eq!(dataset.tags().next(), Some(TagId::new(0x0008, 0x0060)));
        assert_eq!(
            dataset.value(TagId::new(0x0008, 0x0060)),
            Some(&DicomValue::Text("MR".into()))
        );
    }

    #[test]
    fn test_multiplicity() {
        assert_eq!(DicomValue::Text("A\\B\\C".into()).multiplicity(), 3);
        assert_eq!(DicomValue::Text(String::new()).multiplicity(), 0);
        assert_eq!(DicomValue::U16(vec![1, 2]).multiplicity(), 2);
        assert_eq!(DicomValue::Bytes(vec![0; 10]).multiplicity(), 1);
    }

    #[test]
    fn test_first_float_reads_decimal_strings() {
        let value = DicomValue::Strings(vec!["40.5".into(), "400".into()]);
        assert_eq!(value.first_float(), Some(40.5));
        assert_eq!(DicomValue::U16(vec![12]).first_float(), Some(12.0));
    }
}
