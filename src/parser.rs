//! DICOM Part 10 reader: preamble, `DICM` prefix, file meta group, then the
//! dataset in Implicit or Explicit VR Little Endian.
//!
//! Element layout, see PS3.5 section 7.1:
//!
//! ```text
//! explicit, short: group(2) element(2) VR(2) length(2)          value
//! explicit, long:  group(2) element(2) VR(2) reserved(2) length(4) value
//! implicit:        group(2) element(2) length(4)                value
//! ```

use std::fs;
use std::path::Path;

use encoding_rs::Encoding;

use crate::charset::{self, SPECIFIC_CHARACTER_SET};
use crate::dictionary;
use crate::error::{CodecError, Result};
use crate::model::{DataElement, Dataset, DicomValue, TagId, TransferSyntax, Vr, VrFamily};

pub const PREAMBLE_LENGTH: usize = 128;
pub const PREFIX: &[u8; 4] = b"DICM";

pub(crate) const UNDEFINED_LENGTH: u32 = 0xFFFF_FFFF;
pub(crate) const ITEM: TagId = TagId::new(0xFFFE, 0xE000);
pub(crate) const ITEM_DELIMITATION: TagId = TagId::new(0xFFFE, 0xE00D);
pub(crate) const SEQUENCE_DELIMITATION: TagId = TagId::new(0xFFFE, 0xE0DD);

pub const TRANSFER_SYNTAX_UID: TagId = TagId::new(0x0002, 0x0010);
pub const MEDIA_STORAGE_SOP_CLASS_UID: TagId = TagId::new(0x0002, 0x0002);
pub const MEDIA_STORAGE_SOP_INSTANCE_UID: TagId = TagId::new(0x0002, 0x0003);
pub const IMPLEMENTATION_CLASS_UID: TagId = TagId::new(0x0002, 0x0012);
pub const IMPLEMENTATION_VERSION_NAME: TagId = TagId::new(0x0002, 0x0013);

/// File meta information (group 0002), kept apart from the dataset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileMeta {
    pub transfer_syntax_uid: String,
    pub media_storage_sop_class_uid: Option<String>,
    pub media_storage_sop_instance_uid: Option<String>,
    pub implementation_class_uid: Option<String>,
    pub implementation_version_name: Option<String>,
}

impl FileMeta {
    fn from_group(group: &Dataset) -> Result<Self> {
        let text = |tag| {
            group
                .value(tag)
                .and_then(DicomValue::as_text)
                .map(str::to_string)
        };

        Ok(Self {
            transfer_syntax_uid: text(TRANSFER_SYNTAX_UID).ok_or(CodecError::MissingElement {
                tag: TRANSFER_SYNTAX_UID,
                name: "TransferSyntaxUID",
            })?,
            media_storage_sop_class_uid: text(MEDIA_STORAGE_SOP_CLASS_UID),
            media_storage_sop_instance_uid: text(MEDIA_STORAGE_SOP_INSTANCE_UID),
            implementation_class_uid: text(IMPLEMENTATION_CLASS_UID),
            implementation_version_name: text(IMPLEMENTATION_VERSION_NAME),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DicomFile {
    pub meta: FileMeta,
    pub dataset: Dataset,
}

pub fn read_file(path: impl AsRef<Path>) -> Result<DicomFile> {
    let path = path.as_ref();
    let buffer = fs::read(path)?;
    let file = read_bytes(&buffer)?;

    tracing::info!(
        path = %path.display(),
        transfer_syntax = %file.meta.transfer_syntax_uid,
        elements = file.dataset.len(),
        "read DICOM file"
    );

    Ok(file)
}

pub fn read_bytes(buffer: &[u8]) -> Result<DicomFile> {
    let mut reader = ElementReader::new(buffer, TransferSyntax::ExplicitVrLittleEndian);

    reader.take(PREAMBLE_LENGTH)?;
    if reader.take(PREFIX.len())? != PREFIX {
        return Err(CodecError::malformed_binary("missing DICM prefix"));
    }

    // the meta group is always explicit VR little endian
    let mut group = Dataset::new();
    while reader.peek_tag().is_some_and(|tag| tag.is_file_meta()) {
        group.insert(reader.read_element()?);
    }
    let meta = FileMeta::from_group(&group)?;

    let transfer_syntax = TransferSyntax::from_uid(&meta.transfer_syntax_uid)
        .ok_or_else(|| CodecError::UnsupportedTransferSyntax(meta.transfer_syntax_uid.clone()))?;
    reader.transfer_syntax = transfer_syntax;

    let dataset = reader.read_dataset(Some(buffer.len()))?;

    Ok(DicomFile { meta, dataset })
}

struct ElementReader<'a> {
    buffer: &'a [u8],
    offset: usize,
    transfer_syntax: TransferSyntax,
    encoding: &'static Encoding,
}

impl<'a> ElementReader<'a> {
    fn new(buffer: &'a [u8], transfer_syntax: TransferSyntax) -> Self {
        Self {
            buffer,
            offset: 0,
            transfer_syntax,
            encoding: charset::DEFAULT_ENCODING,
        }
    }

    fn remaining(&self) -> usize {
        self.buffer.len() - self.offset
    }

    fn take(&mut self, length: usize) -> Result<&'a [u8]> {
        if length > self.remaining() {
            return Err(CodecError::malformed_binary(format!(
                "need {length} bytes at offset {}, only {} left",
                self.offset,
                self.remaining()
            )));
        }
        let bytes = &self.buffer[self.offset..self.offset + length];
        self.offset += length;
        Ok(bytes)
    }

    fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_tag(&mut self) -> Result<TagId> {
        let group = self.read_u16()?;
        let element = self.read_u16()?;
        Ok(TagId::new(group, element))
    }

    fn peek_tag(&self) -> Option<TagId> {
        let bytes = self.buffer.get(self.offset..self.offset + 4)?;
        Some(TagId::new(
            u16::from_le_bytes([bytes[0], bytes[1]]),
            u16::from_le_bytes([bytes[2], bytes[3]]),
        ))
    }

    fn end_of(&self, length: u32) -> Result<usize> {
        let end = self.offset + length as usize;
        if end > self.buffer.len() {
            return Err(CodecError::malformed_binary(format!(
                "length {length} at offset {} runs past the end of the stream",
                self.offset
            )));
        }
        Ok(end)
    }

    /// Reads elements up to `end`, or up to an item delimitation tag when the
    /// enclosing item has undefined length.
    fn read_dataset(&mut self, end: Option<usize>) -> Result<Dataset> {
        let mut dataset = Dataset::with_transfer_syntax(self.transfer_syntax);

        loop {
            match end {
                Some(end) => {
                    if self.offset >= end {
                        break;
                    }
                    // shorter than any element header
                    if end - self.offset < 8 {
                        tracing::debug!(bytes = end - self.offset, "ignoring trailing padding");
                        self.offset = end;
                        break;
                    }
                }
                None => {
                    if self.peek_tag() == Some(ITEM_DELIMITATION) {
                        self.read_tag()?;
                        self.read_u32()?;
                        break;
                    }
                    if self.remaining() == 0 {
                        return Err(CodecError::malformed_binary(
                            "item delimitation tag not found",
                        ));
                    }
                }
            }

            let element = self.read_element()?;
            if element.tag == SPECIFIC_CHARACTER_SET {
                if let Some(text) = element.value.as_text() {
                    self.encoding = charset::encoding_for(text);
                }
            }
            dataset.insert(element);
        }

        Ok(dataset)
    }

    fn read_element(&mut self) -> Result<DataElement> {
        let tag = self.read_tag()?;

        let (vr, length) = if self.transfer_syntax.is_explicit_vr() || tag.is_file_meta() {
            let code = self.take(2)?;
            let vr = std::str::from_utf8(code)
                .ok()
                .and_then(|code| code.parse::<Vr>().ok())
                .ok_or_else(|| {
                    CodecError::malformed_binary(format!("invalid VR bytes {code:02X?} for {tag}"))
                })?;

            if vr.has_long_length() {
                self.take(2)?;
                (vr, self.read_u32()?)
            } else {
                (vr, u32::from(self.read_u16()?))
            }
        } else {
            let length = self.read_u32()?;
            let vr = dictionary::vr_for(tag).unwrap_or(if length == UNDEFINED_LENGTH {
                Vr::SQ
            } else {
                Vr::UN
            });
            (vr, length)
        };

        let value = if vr == Vr::SQ {
            self.read_sequence(length)?
        } else if length == UNDEFINED_LENGTH {
            return Err(CodecError::malformed_binary(format!(
                "undefined length {vr} value for {tag} (encapsulated data is not supported)"
            )));
        } else {
            let bytes = self.take(length as usize)?;
            parse_value(tag, vr, bytes, self.encoding)?
        };

        Ok(DataElement { tag, vr, value })
    }

    // PS3.5 section 7.5, tables 7.5-1 to 7.5-3
    fn read_sequence(&mut self, length: u32) -> Result<DicomValue> {
        let end = if length == UNDEFINED_LENGTH {
            None
        } else {
            Some(self.end_of(length)?)
        };

        let mut items = Vec::new();
        loop {
            if end.is_some_and(|end| self.offset >= end) {
                break;
            }

            let tag = self.read_tag()?;
            let item_length = self.read_u32()?;

            match tag {
                SEQUENCE_DELIMITATION => break,
                ITEM => {
                    let item_end = if item_length == UNDEFINED_LENGTH {
                        None
                    } else {
                        Some(self.end_of(item_length)?)
                    };

                    // a character set inside an item only applies to that item
                    let encoding = self.encoding;
                    let item = self.read_dataset(item_end);
                    self.encoding = encoding;
                    items.push(item?);
                }
                other => {
                    return Err(CodecError::malformed_binary(format!(
                        "unexpected {other} inside a sequence"
                    )))
                }
            }
        }

        Ok(DicomValue::Sequence(items))
    }
}

fn numbers<T, const N: usize>(
    tag: TagId,
    vr: Vr,
    bytes: &[u8],
    from_le: fn([u8; N]) -> T,
) -> Result<Vec<T>> {
    if bytes.len() % N != 0 {
        return Err(CodecError::malformed_binary(format!(
            "{tag} {vr} value of {} bytes is not a multiple of {N}",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(N)
        .map(|chunk| {
            let mut word = [0u8; N];
            word.copy_from_slice(chunk);
            from_le(word)
        })
        .collect())
}

fn decode_text(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        tracing::debug!(encoding = encoding.name(), "replaced undecodable characters");
    }
    text.trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}

fn parse_value(tag: TagId, vr: Vr, bytes: &[u8], encoding: &'static Encoding) -> Result<DicomValue> {
    let value = match vr {
        Vr::US => DicomValue::U16(numbers(tag, vr, bytes, u16::from_le_bytes)?),
        Vr::SS => DicomValue::I16(numbers(tag, vr, bytes, i16::from_le_bytes)?),
        Vr::UL => DicomValue::U32(numbers(tag, vr, bytes, u32::from_le_bytes)?),
        Vr::SL => DicomValue::I32(numbers(tag, vr, bytes, i32::from_le_bytes)?),
        Vr::UV => DicomValue::U64(numbers(tag, vr, bytes, u64::from_le_bytes)?),
        Vr::SV => DicomValue::I64(numbers(tag, vr, bytes, i64::from_le_bytes)?),
        Vr::FL => DicomValue::F32(numbers(tag, vr, bytes, f32::from_le_bytes)?),
        Vr::FD => DicomValue::F64(numbers(tag, vr, bytes, f64::from_le_bytes)?),
        Vr::DS | Vr::IS => {
            let text = decode_text(bytes, encoding);
            if text.is_empty() {
                DicomValue::Strings(Vec::new())
            } else {
                DicomValue::Strings(text.split('\\').map(|s| s.trim().to_string()).collect())
            }
        }
        Vr::AT => {
            let tags: Vec<String> = numbers(tag, vr, bytes, u16::from_le_bytes)?
                .chunks(2)
                .map(|pair| match pair {
                    [group, element] => TagId::new(*group, *element).to_string(),
                    _ => String::new(),
                })
                .collect();
            DicomValue::Text(tags.join("\\"))
        }
        _ if vr.family() == VrFamily::Binary => DicomValue::Bytes(bytes.to_vec()),
        _ => DicomValue::Text(decode_text(bytes, encoding)),
    };

    Ok(value)
}
