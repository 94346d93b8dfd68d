//! Streaming decoder for `207 Multi-Status` PROPFIND bodies.
//!
//! Elements are matched by local name, so any namespace prefix for `DAV:` works. The decoder
//! keeps every response in document order and never filters.

use std::io::{BufRead, Cursor};

use hyper::Uri;
use quick_xml::Reader;
use quick_xml::events::Event;
use tokio::io::AsyncBufRead;

use crate::webdav::error::DecodeError;
use crate::webdav::types::{DavResource, MultistatusEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ElementName {
    Multistatus,
    Response,
    Propstat,
    Prop,
    Href,
    Status,
    Resourcetype,
    Collection,
    Creationdate,
    Getlastmodified,
    Getcontenttype,
    Getcontentlength,
    Other,
}

fn local_name(raw: &[u8]) -> &[u8] {
    match raw.iter().position(|b| *b == b':') {
        Some(idx) => &raw[idx + 1..],
        None => raw,
    }
}

pub(crate) fn element_from_bytes(raw: &[u8]) -> ElementName {
    let local = local_name(raw);

    if local.eq_ignore_ascii_case(b"multistatus") {
        ElementName::Multistatus
    } else if local.eq_ignore_ascii_case(b"response") {
        ElementName::Response
    } else if local.eq_ignore_ascii_case(b"propstat") {
        ElementName::Propstat
    } else if local.eq_ignore_ascii_case(b"prop") {
        ElementName::Prop
    } else if local.eq_ignore_ascii_case(b"href") {
        ElementName::Href
    } else if local.eq_ignore_ascii_case(b"status") {
        ElementName::Status
    } else if local.eq_ignore_ascii_case(b"resourcetype") {
        ElementName::Resourcetype
    } else if local.eq_ignore_ascii_case(b"collection") {
        ElementName::Collection
    } else if local.eq_ignore_ascii_case(b"creationdate") {
        ElementName::Creationdate
    } else if local.eq_ignore_ascii_case(b"getlastmodified") {
        ElementName::Getlastmodified
    } else if local.eq_ignore_ascii_case(b"getcontenttype") {
        ElementName::Getcontenttype
    } else if local.eq_ignore_ascii_case(b"getcontentlength") {
        ElementName::Getcontentlength
    } else {
        ElementName::Other
    }
}

/// Properties of one `<propstat>`, merged into the entry only when its status is 2xx.
#[derive(Debug, Default)]
struct PropstatState {
    status_ok: bool,
    is_collection: bool,
    creation_date: Option<String>,
    last_modified: Option<String>,
    content_type: Option<String>,
    content_length: Option<String>,
}

impl PropstatState {
    fn new() -> Self {
        // a propstat without <status> is accepted
        Self {
            status_ok: true,
            ..Self::default()
        }
    }

    fn merge_into(self, entry: &mut MultistatusEntry) {
        if !self.status_ok {
            return;
        }
        entry.is_collection |= self.is_collection;
        entry.creation_date = entry.creation_date.take().or(self.creation_date);
        entry.last_modified = entry.last_modified.take().or(self.last_modified);
        entry.content_type = entry.content_type.take().or(self.content_type);
        entry.content_length = entry.content_length.take().or(self.content_length);
    }
}

#[derive(Debug, Default)]
struct ResponseState {
    entry: MultistatusEntry,
    has_propstat: bool,
    propstat: Option<PropstatState>,
}

pub(crate) struct MultistatusParser {
    stack: Vec<ElementName>,
    text: String,
    seen_root: bool,
    current: Option<ResponseState>,
    entries: Vec<MultistatusEntry>,
}

impl MultistatusParser {
    pub(crate) fn new() -> Self {
        Self {
            stack: Vec::with_capacity(16),
            text: String::new(),
            seen_root: false,
            current: None,
            entries: Vec::new(),
        }
    }

    fn path_ends_with(&self, needle: &[ElementName]) -> bool {
        self.stack.len() >= needle.len()
            && self.stack[self.stack.len() - needle.len()..] == needle[..]
    }

    /// Feed one reader event. Returns `true` once the document is complete.
    fn handle(&mut self, event: Event<'_>) -> Result<bool, DecodeError> {
        match event {
            Event::Start(e) => self.on_start(e.name().as_ref())?,
            Event::Empty(e) => {
                self.on_start(e.name().as_ref())?;
                self.on_end()?;
            }
            Event::End(_) => self.on_end()?,
            Event::Text(e) => {
                if !self.stack.is_empty() {
                    self.text.push_str(std::str::from_utf8(e.as_ref())?);
                }
            }
            Event::CData(e) => {
                if !self.stack.is_empty() {
                    self.text.push_str(std::str::from_utf8(e.as_ref())?);
                }
            }
            Event::GeneralRef(e) => {
                if !self.stack.is_empty() {
                    self.text.push(resolve_entity(e.as_ref())?);
                }
            }
            Event::Eof => return Ok(true),
            _ => {}
        }
        Ok(false)
    }

    fn on_start(&mut self, raw: &[u8]) -> Result<(), DecodeError> {
        let element = element_from_bytes(raw);

        if self.stack.is_empty() {
            if self.seen_root || element != ElementName::Multistatus {
                return Err(DecodeError::UnexpectedRoot(
                    String::from_utf8_lossy(local_name(raw)).into_owned(),
                ));
            }
            self.seen_root = true;
        }

        self.stack.push(element);
        self.text.clear();

        match element {
            ElementName::Response
                if self.path_ends_with(&[ElementName::Multistatus, ElementName::Response]) =>
            {
                self.current = Some(ResponseState::default());
            }
            ElementName::Propstat
                if self.path_ends_with(&[ElementName::Response, ElementName::Propstat]) =>
            {
                if let Some(current) = self.current.as_mut() {
                    current.has_propstat = true;
                    current.propstat = Some(PropstatState::new());
                }
            }
            ElementName::Collection
                if self.path_ends_with(&[
                    ElementName::Response,
                    ElementName::Propstat,
                    ElementName::Prop,
                    ElementName::Resourcetype,
                    ElementName::Collection,
                ]) =>
            {
                if let Some(propstat) = self.propstat_mut() {
                    propstat.is_collection = true;
                }
            }
            _ => {}
        }

        Ok(())
    }

    fn on_end(&mut self) -> Result<(), DecodeError> {
        let text = std::mem::take(&mut self.text);
        let value = text.trim();

        if self.path_ends_with(&[
            ElementName::Multistatus,
            ElementName::Response,
            ElementName::Href,
        ]) {
            if let Some(current) = self.current.as_mut() {
                current.entry.href = value.to_string();
            }
        } else if self.path_ends_with(&[
            ElementName::Response,
            ElementName::Propstat,
            ElementName::Status,
        ]) {
            let ok = status_is_success(value);
            if let Some(propstat) = self.propstat_mut() {
                propstat.status_ok = ok;
            }
        } else if self.path_ends_with(&[ElementName::Response, ElementName::Propstat]) {
            if let Some(current) = self.current.as_mut()
                && let Some(propstat) = current.propstat.take()
            {
                propstat.merge_into(&mut current.entry);
            }
        } else if self.path_ends_with(&[ElementName::Multistatus, ElementName::Response]) {
            self.finish_response()?;
        } else if self.stack.len() < 4
            || self.path_ends_with(&[
                ElementName::Response,
                ElementName::Propstat,
                ElementName::Prop,
            ])
        {
            // structural elements carry no text of interest
        } else {
            self.on_property(value);
        }

        self.stack.pop();
        Ok(())
    }

    fn on_property(&mut self, value: &str) {
        let len = self.stack.len();
        if !self.stack[..len - 1].ends_with(&[
            ElementName::Response,
            ElementName::Propstat,
            ElementName::Prop,
        ]) {
            return;
        }
        let element = self.stack[len - 1];
        let value = (!value.is_empty()).then(|| value.to_string());
        let Some(propstat) = self.propstat_mut() else {
            return;
        };
        match element {
            ElementName::Creationdate => propstat.creation_date = value,
            ElementName::Getlastmodified => propstat.last_modified = value,
            ElementName::Getcontenttype => propstat.content_type = value,
            ElementName::Getcontentlength => propstat.content_length = value,
            _ => {}
        }
    }

    fn finish_response(&mut self) -> Result<(), DecodeError> {
        let Some(state) = self.current.take() else {
            return Ok(());
        };
        if state.entry.href.is_empty() {
            return Err(DecodeError::MissingHref);
        }
        if !state.has_propstat {
            return Err(DecodeError::MissingPropstat {
                href: state.entry.href,
            });
        }
        self.entries.push(state.entry);
        Ok(())
    }

    fn propstat_mut(&mut self) -> Option<&mut PropstatState> {
        self.current.as_mut()?.propstat.as_mut()
    }

    fn finish(self) -> Result<Vec<MultistatusEntry>, DecodeError> {
        if let Some(open) = self.stack.last() {
            return Err(DecodeError::Truncated(format!("{open:?}").to_ascii_lowercase()));
        }
        if !self.seen_root {
            return Err(DecodeError::EmptyDocument);
        }
        Ok(self.entries)
    }
}

/// `HTTP/1.1 200 OK` → true for any 2xx code.
fn status_is_success(status_line: &str) -> bool {
    status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .is_some_and(|code| (200..300).contains(&code))
}

fn resolve_entity(raw: &[u8]) -> Result<char, DecodeError> {
    let name = std::str::from_utf8(raw)?;
    let unknown = || DecodeError::UnknownEntity(name.to_string());

    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => number.parse::<u32>().ok(),
        };
        return code.and_then(char::from_u32).ok_or_else(unknown);
    }

    match name {
        "lt" => Ok('<'),
        "gt" => Ok('>'),
        "amp" => Ok('&'),
        "apos" => Ok('\''),
        "quot" => Ok('"'),
        _ => Err(unknown()),
    }
}

fn parse_multistatus_reader<R: BufRead>(reader: R) -> Result<Vec<MultistatusEntry>, DecodeError> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(false);

    let mut buf = Vec::with_capacity(8 * 1024);
    let mut parser = MultistatusParser::new();

    loop {
        let event = xml.read_event_into(&mut buf)?;
        if parser.handle(event)? {
            break;
        }
        buf.clear();
    }

    parser.finish()
}

/// Parse a `207 Multi-Status` body from an already aggregated buffer.
pub fn parse_multistatus_bytes(body: &[u8]) -> Result<Vec<MultistatusEntry>, DecodeError> {
    parse_multistatus_reader(Cursor::new(body))
}

/// Parse a `207 Multi-Status` body while it is being read, without buffering it whole.
///
/// A failure of the underlying reader surfaces as [`DecodeError::Xml`] wrapping
/// [`quick_xml::Error::Io`].
pub async fn parse_multistatus_stream<R>(reader: R) -> Result<Vec<MultistatusEntry>, DecodeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(false);

    let mut buf = Vec::with_capacity(8 * 1024);
    let mut parser = MultistatusParser::new();

    loop {
        let event = xml.read_event_into_async(&mut buf).await?;
        if parser.handle(event)? {
            break;
        }
        buf.clear();
    }

    parser.finish()
}

/// Turn decoded entries into resources, resolving hrefs against `base`.
pub fn decode_resources(
    base: &Uri,
    entries: Vec<MultistatusEntry>,
) -> Result<Vec<DavResource>, DecodeError> {
    entries
        .into_iter()
        .map(|entry| DavResource::from_entry(base, entry))
        .collect()
}
