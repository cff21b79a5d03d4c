//! Textual document: an ordered list of element records wrapped in XML.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <DicomData>
//!   <Element>
//!     <TagGroup>(0028,0010)</TagGroup>
//!     <TagName>Rows</TagName>
//!     <VR>US</VR>
//!     <VM>1</VM>
//!     <Length>1</Length>
//!     <Value>[512]</Value>
//!   </Element>
//! </DicomData>
//! ```

use std::borrow::Cow;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{CodecError, Result};
use crate::model::TagId;

pub const ROOT_ELEMENT: &str = "DicomData";
pub const RECORD_ELEMENT: &str = "Element";

const DEFAULT_INDENT: usize = 2;

/// One element as it appears in a document. Fields hold unescaped text; tag
/// and VR are kept textual so a bad record can be reported without failing
/// the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementRecord {
    pub tag: String,
    pub tag_name: String,
    pub vr: String,
    pub vm: usize,
    pub value_text: String,
    pub value_length: usize,
}

impl ElementRecord {
    pub fn tag_id(&self) -> Result<TagId> {
        self.tag.trim().parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    pub records: Vec<ElementRecord>,
}

impl Document {
    pub fn new(records: Vec<ElementRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_xml(&self) -> String {
        self.to_xml_with_indent(DEFAULT_INDENT)
    }

    /// Renders the document with `indent` spaces per nesting level.
    pub fn to_xml_with_indent(&self, indent: usize) -> String {
        let pad = |level: usize| " ".repeat(indent * level);
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");

        out.push_str(&format!("<{ROOT_ELEMENT}>\n"));
        for record in &self.records {
            out.push_str(&format!("{}<{RECORD_ELEMENT}>\n", pad(1)));
            let fields = [
                ("TagGroup", Cow::Borrowed(record.tag.as_str())),
                ("TagName", Cow::Borrowed(record.tag_name.as_str())),
                ("VR", Cow::Borrowed(record.vr.as_str())),
                ("VM", Cow::Owned(record.vm.to_string())),
                ("Length", Cow::Owned(record.value_length.to_string())),
                ("Value", Cow::Borrowed(record.value_text.as_str())),
            ];
            for (name, text) in fields {
                out.push_str(&format!("{}<{name}>{}</{name}>\n", pad(2), escape(&text)));
            }
            out.push_str(&format!("{}</{RECORD_ELEMENT}>\n", pad(1)));
        }
        out.push_str(&format!("</{ROOT_ELEMENT}>\n"));

        out
    }

    /// Parses document markup. Any markup error is fatal; record contents
    /// are not validated here.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut stack: Vec<String> = Vec::new();
        let mut seen_root = false;
        let mut records = Vec::new();
        let mut current: Option<ElementRecord> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                CodecError::malformed_document(format!(
                    "at byte {}: {e}",
                    reader.buffer_position()
                ))
            })?;

            match event {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    open_element(&name, &stack, &mut seen_root, &mut current)?;
                    stack.push(name);
                }
                Event::Empty(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    open_element(&name, &stack, &mut seen_root, &mut current)?;
                    if stack.len() == 1 && name == RECORD_ELEMENT {
                        records.extend(current.take());
                    }
                }
                Event::End(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    match stack.pop() {
                        Some(open) if open == name => {}
                        Some(open) => {
                            return Err(CodecError::malformed_document(format!(
                                "expected </{open}>, found </{name}>"
                            )))
                        }
                        None => {
                            return Err(CodecError::malformed_document(format!(
                                "unexpected </{name}>"
                            )))
                        }
                    }
                    if stack.len() == 1 && name == RECORD_ELEMENT {
                        records.extend(current.take());
                    }
                }
                Event::Text(e) => {
                    let text = e
                        .unescape()
                        .map_err(|e| CodecError::malformed_document(e.to_string()))?;
                    append_text(&text, &stack, current.as_mut())?;
                }
                Event::CData(e) => {
                    let bytes = e.into_inner();
                    let text = std::str::from_utf8(&bytes)
                        .map_err(|e| CodecError::malformed_document(e.to_string()))?;
                    append_text(text, &stack, current.as_mut())?;
                }
                Event::Eof => break,
                // declaration, comments, processing instructions, doctype
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(CodecError::malformed_document(format!(
                "unexpected end of document inside <{open}>"
            )));
        }
        if !seen_root {
            return Err(CodecError::malformed_document("no root element"));
        }

        Ok(Self { records })
    }
}

fn open_element(
    name: &str,
    stack: &[String],
    seen_root: &mut bool,
    current: &mut Option<ElementRecord>,
) -> Result<()> {
    match stack.len() {
        0 if *seen_root => Err(CodecError::malformed_document(format!(
            "second root element <{name}>"
        ))),
        0 if name != ROOT_ELEMENT => Err(CodecError::malformed_document(format!(
            "root element must be <{ROOT_ELEMENT}>, found <{name}>"
        ))),
        0 => {
            *seen_root = true;
            Ok(())
        }
        1 if name == RECORD_ELEMENT => {
            *current = Some(ElementRecord::default());
            Ok(())
        }
        _ => Ok(()),
    }
}

fn append_text(text: &str, stack: &[String], current: Option<&mut ElementRecord>) -> Result<()> {
    if stack.is_empty() {
        if text.trim().is_empty() {
            return Ok(());
        }
        return Err(CodecError::malformed_document("text outside the root element"));
    }

    let (Some(record), [_, _, field]) = (current, stack) else {
        return Ok(());
    };
    let text = restore_controls(text);
    let text = text.as_ref();

    match field.as_str() {
        "TagGroup" => record.tag.push_str(text),
        "TagName" => record.tag_name.push_str(text),
        "VR" => record.vr.push_str(text),
        "VM" => record.vm = text.trim().parse().unwrap_or(0),
        "Length" => record.value_length = text.trim().parse().unwrap_or(0),
        "Value" => record.value_text.push_str(text),
        _ => {}
    }

    Ok(())
}

/// C0 controls XML 1.0 cannot carry. Tab, line feed and carriage return are
/// allowed.
fn is_restricted(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}')
}

/// Control Pictures block: U+0000..=U+001F map to U+2400..=U+241F.
const CONTROL_PICTURES: u32 = 0x2400;

/// Escapes the five XML metacharacters. Restricted controls (ESC of an
/// ISO 2022 value, say) are written as their Control Pictures counterpart
/// and turned back by [`Document::from_xml`].
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.chars().any(is_restricted) {
        return quick_xml::escape::escape(text);
    }

    let visible: String = text
        .chars()
        .map(|c| {
            if is_restricted(c) {
                char::from_u32(CONTROL_PICTURES + c as u32).unwrap_or(char::REPLACEMENT_CHARACTER)
            } else {
                c
            }
        })
        .collect();
    Cow::Owned(quick_xml::escape::escape(&visible).into_owned())
}

fn restore_controls(text: &str) -> Cow<'_, str> {
    let control = |c: char| {
        (c as u32)
            .checked_sub(CONTROL_PICTURES)
            .and_then(char::from_u32)
            .filter(|&control| is_restricted(control))
    };

    if !text.chars().any(|c| control(c).is_some()) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.chars().map(|c| control(c).unwrap_or(c)).collect())
}

pub fn unescape(text: &str) -> Result<Cow<'_, str>> {
    quick_xml::escape::unescape(text).map_err(|e| CodecError::malformed_document(e.to_string()))
}
