//! DICOM Part 10 writer. Every dataset is persisted as Explicit VR Little
//! Endian, whatever encoding it was read from; the file meta group is
//! regenerated.

use std::fs;
use std::path::Path;

use encoding_rs::Encoding;
use uuid::Uuid;

use crate::charset::{self, SPECIFIC_CHARACTER_SET};
use crate::decoder::OUTPUT_TRANSFER_SYNTAX;
use crate::dictionary;
use crate::error::{CodecError, Result};
use crate::model::{DataElement, Dataset, DicomValue, TagId, Vr, VrFamily};
use crate::parser::{
    IMPLEMENTATION_CLASS_UID, IMPLEMENTATION_VERSION_NAME, ITEM, MEDIA_STORAGE_SOP_CLASS_UID,
    MEDIA_STORAGE_SOP_INSTANCE_UID, PREAMBLE_LENGTH, PREFIX, TRANSFER_SYNTAX_UID,
};

pub const SOP_CLASS_UID: TagId = TagId::new(0x0008, 0x0016);
pub const SOP_INSTANCE_UID: TagId = TagId::new(0x0008, 0x0018);

pub const SECONDARY_CAPTURE_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.7";
pub const IMPLEMENTATION_UID: &str = "2.25.302113837195143165937408386305283726617";
pub const IMPLEMENTATION_VERSION: &str = "DICOM_XML_010";

const FILE_META_GROUP_LENGTH: TagId = TagId::new(0x0002, 0x0000);
const FILE_META_VERSION: TagId = TagId::new(0x0002, 0x0001);

/// New UID under the `2.25` root, derived from a random UUID.
pub fn generate_uid() -> String {
    format!("2.25.{}", Uuid::new_v4().as_u128())
}

pub fn write_file(path: impl AsRef<Path>, dataset: &Dataset) -> Result<()> {
    let path = path.as_ref();
    let bytes = write_bytes(dataset)?;
    fs::write(path, &bytes)?;

    tracing::info!(
        path = %path.display(),
        bytes = bytes.len(),
        elements = dataset.len(),
        "wrote DICOM file"
    );

    Ok(())
}

pub fn write_bytes(dataset: &Dataset) -> Result<Vec<u8>> {
    if dataset.transfer_syntax() != OUTPUT_TRANSFER_SYNTAX {
        tracing::debug!(
            from = dataset.transfer_syntax().uid(),
            to = OUTPUT_TRANSFER_SYNTAX.uid(),
            "normalising transfer syntax"
        );
    }

    let encoding = dataset
        .value(SPECIFIC_CHARACTER_SET)
        .and_then(DicomValue::as_text)
        .map(charset::encoding_for)
        .unwrap_or(charset::DEFAULT_ENCODING);

    let mut meta = Vec::new();
    for element in file_meta_elements(dataset) {
        write_element(&mut meta, &element, charset::DEFAULT_ENCODING)?;
    }
    let meta_length = u32::try_from(meta.len())
        .map_err(|_| CodecError::malformed_binary("file meta group too long"))?;

    let mut out = vec![0u8; PREAMBLE_LENGTH];
    out.extend_from_slice(PREFIX);
    write_element(
        &mut out,
        &DataElement::new(FILE_META_GROUP_LENGTH, Vr::UL, DicomValue::U32(vec![meta_length])),
        charset::DEFAULT_ENCODING,
    )?;
    out.extend(meta);

    for element in dataset {
        if element.tag.is_file_meta() || element.tag.is_delimiter() {
            tracing::debug!(tag = %element.tag, "skipping element that belongs to the file header");
            continue;
        }
        write_element(&mut out, element, encoding)?;
    }

    Ok(out)
}

fn file_meta_elements(dataset: &Dataset) -> Vec<DataElement> {
    let text = |tag| {
        dataset
            .value(tag)
            .and_then(DicomValue::as_text)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let uid = |value: String| DicomValue::Text(value);

    let sop_class = text(SOP_CLASS_UID).unwrap_or_else(|| SECONDARY_CAPTURE_IMAGE_STORAGE.into());
    let sop_instance = text(SOP_INSTANCE_UID).unwrap_or_else(generate_uid);

    vec![
        DataElement::new(FILE_META_VERSION, Vr::OB, DicomValue::Bytes(vec![0, 1])),
        DataElement::new(MEDIA_STORAGE_SOP_CLASS_UID, Vr::UI, uid(sop_class)),
        DataElement::new(MEDIA_STORAGE_SOP_INSTANCE_UID, Vr::UI, uid(sop_instance)),
        DataElement::new(
            TRANSFER_SYNTAX_UID,
            Vr::UI,
            uid(OUTPUT_TRANSFER_SYNTAX.uid().into()),
        ),
        DataElement::new(IMPLEMENTATION_CLASS_UID, Vr::UI, uid(IMPLEMENTATION_UID.into())),
        DataElement::new(
            IMPLEMENTATION_VERSION_NAME,
            Vr::SH,
            DicomValue::Text(IMPLEMENTATION_VERSION.into()),
        ),
    ]
}

fn write_header(out: &mut Vec<u8>, tag: TagId) {
    out.extend_from_slice(&tag.group.to_le_bytes());
    out.extend_from_slice(&tag.element.to_le_bytes());
}

fn write_element(out: &mut Vec<u8>, element: &DataElement, encoding: &'static Encoding) -> Result<()> {
    let (tag, vr) = (element.tag, element.vr);
    let value = value_bytes(element, encoding)?;

    write_header(out, tag);
    out.extend_from_slice(vr.as_str().as_bytes());

    if vr.has_long_length() {
        let length = u32::try_from(value.len())
            .map_err(|_| CodecError::invalid_value(tag, vr, "value longer than 4 GiB"))?;
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&length.to_le_bytes());
    } else {
        let length = u16::try_from(value.len())
            .map_err(|_| CodecError::invalid_value(tag, vr, "value longer than 65534 bytes"))?;
        out.extend_from_slice(&length.to_le_bytes());
    }

    out.extend(value);
    Ok(())
}

/// Items are written with defined lengths.
fn sequence_bytes(items: &[Dataset], encoding: &'static Encoding) -> Result<Vec<u8>> {
    let mut out = Vec::new();

    for item in items {
        let mut body = Vec::new();
        for element in item {
            write_element(&mut body, element, encoding)?;
        }
        let length = u32::try_from(body.len())
            .map_err(|_| CodecError::malformed_binary("sequence item longer than 4 GiB"))?;

        write_header(&mut out, ITEM);
        out.extend_from_slice(&length.to_le_bytes());
        out.extend(body);
    }

    Ok(out)
}

fn integers(value: &DicomValue) -> Option<Vec<i128>> {
    Some(match value {
        DicomValue::I16(v) => v.iter().map(|&x| x.into()).collect(),
        DicomValue::U16(v) => v.iter().map(|&x| x.into()).collect(),
        DicomValue::I32(v) => v.iter().map(|&x| x.into()).collect(),
        DicomValue::U32(v) => v.iter().map(|&x| x.into()).collect(),
        DicomValue::I64(v) => v.iter().map(|&x| x.into()).collect(),
        DicomValue::U64(v) => v.iter().map(|&x| x.into()).collect(),
        _ => return None,
    })
}

fn floats(value: &DicomValue) -> Option<Vec<f64>> {
    match value {
        DicomValue::F32(v) => Some(v.iter().map(|&x| x.into()).collect()),
        DicomValue::F64(v) => Some(v.clone()),
        _ => None,
    }
}

fn integer_bytes<T, const N: usize>(element: &DataElement, to_le: fn(T) -> [u8; N]) -> Result<Vec<u8>>
where
    T: TryFrom<i128>,
{
    let values = integers(&element.value).ok_or_else(|| shape_error(element))?;

    let mut out = Vec::with_capacity(values.len() * N);
    for value in values {
        let value = T::try_from(value).map_err(|_| {
            CodecError::invalid_value(element.tag, element.vr, format!("{value} is out of range"))
        })?;
        out.extend_from_slice(&to_le(value));
    }
    Ok(out)
}

fn encode_text(element: &DataElement, text: &str, encoding: &'static Encoding) -> Vec<u8> {
    let (bytes, _, had_errors) = encoding.encode(text);
    if had_errors {
        tracing::warn!(
            tag = %element.tag,
            encoding = encoding.name(),
            "characters not representable in the dataset character set were replaced"
        );
    }
    bytes.into_owned()
}

fn shape_error(element: &DataElement) -> CodecError {
    CodecError::invalid_value(
        element.tag,
        element.vr,
        format!("cannot write value {:?}", element.value.to_string()),
    )
}

fn value_bytes(element: &DataElement, encoding: &'static Encoding) -> Result<Vec<u8>> {
    let (tag, vr) = (element.tag, element.vr);

    let mut bytes = match (vr, &element.value) {
        (_, DicomValue::Empty) => Vec::new(),
        (Vr::SQ, DicomValue::Sequence(items)) => sequence_bytes(items, encoding)?,
        (Vr::SQ, other) => {
            if !other.to_string().is_empty() {
                tracing::warn!(%tag, "sequence items are not available, writing an empty sequence");
            }
            Vec::new()
        }
        (Vr::US, _) => integer_bytes::<u16, 2>(element, u16::to_le_bytes)?,
        (Vr::SS, _) => integer_bytes::<i16, 2>(element, i16::to_le_bytes)?,
        (Vr::UL, _) => integer_bytes::<u32, 4>(element, u32::to_le_bytes)?,
        (Vr::SL, _) => integer_bytes::<i32, 4>(element, i32::to_le_bytes)?,
        (Vr::UV, _) => integer_bytes::<u64, 8>(element, u64::to_le_bytes)?,
        (Vr::SV, _) => integer_bytes::<i64, 8>(element, i64::to_le_bytes)?,
        (Vr::FL, value) => floats(value)
            .ok_or_else(|| shape_error(element))?
            .into_iter()
            .flat_map(|x| (x as f32).to_le_bytes())
            .collect(),
        (Vr::FD, value) => floats(value)
            .ok_or_else(|| shape_error(element))?
            .into_iter()
            .flat_map(f64::to_le_bytes)
            .collect(),
        (Vr::AT, DicomValue::Text(text)) => {
            let mut out = Vec::new();
            for part in text.split('\\').map(str::trim).filter(|s| !s.is_empty()) {
                let at = dictionary::parse_tag_id(part)
                    .map_err(|_| CodecError::invalid_value(tag, vr, format!("bad tag {part:?}")))?;
                write_header(&mut out, at);
            }
            out
        }
        (Vr::DS | Vr::IS, DicomValue::Strings(tokens)) => {
            encode_text(element, &tokens.join("\\"), encoding)
        }
        (_, DicomValue::Bytes(bytes)) if vr.family() == VrFamily::Binary => bytes.clone(),
        (_, DicomValue::Text(text))
            if matches!(vr.family(), VrFamily::Text | VrFamily::StringList) =>
        {
            encode_text(element, text, encoding)
        }
        _ => return Err(shape_error(element)),
    };

    // values always occupy an even number of bytes
    if bytes.len() % 2 == 1 {
        match vr {
            Vr::UI => bytes.push(0),
            _ if vr.family() == VrFamily::Binary => bytes.push(0),
            _ => bytes.push(b' '),
        }
    }

    Ok(bytes)
}
