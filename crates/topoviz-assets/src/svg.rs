//! SVG clean-up before handing icons to external converters
//!
//! SVGs exported from Visio stencils often repeat attributes inside a single
//! opening tag (`<path fill="none" fill="#000">`), which XML parsers reject.
//! [`sanitize_svg`] removes the repeats at the text level, keeping the first
//! occurrence, and [`validate_svg`] confirms the result parses.

use quick_xml::events::attributes::AttrError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SanitizeError {
    #[error("Malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Malformed attribute: {0}")]
    Attribute(#[from] AttrError),
    #[error("Root element is <{0}>, expected <svg>")]
    NotSvg(String),
    #[error("Document has no root element")]
    Empty,
}

/// Sanitized SVG text and the number of attributes removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub svg: String,
    pub removed: usize,
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if pred(b)) {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    /// Position just past `needle`, searching from the current position
    fn find_after(&self, needle: &str) -> Option<usize> {
        self.src[self.pos..]
            .find(needle)
            .map(|i| self.pos + i + needle.len())
    }
}

fn is_name_byte(b: u8) -> bool {
    !b.is_ascii_whitespace() && !matches!(b, b'=' | b'>' | b'/' | b'<' | b'"' | b'\'')
}

/// Parse one opening tag starting at `<`. Returns the rebuilt tag and the
/// number of dropped attributes, or `None` if the tag is unterminated.
fn rebuild_tag(scanner: &mut Scanner<'_>) -> Option<(String, usize)> {
    scanner.pos += 1;
    let name = scanner.take_while(is_name_byte);

    let mut seen = HashSet::new();
    let mut tag = format!("<{}", name);
    let mut removed = 0;

    loop {
        scanner.skip_ws();
        match scanner.peek()? {
            b'>' => {
                scanner.pos += 1;
                tag.push('>');
                return Some((tag, removed));
            }
            b'/' if scanner.src.as_bytes().get(scanner.pos + 1) == Some(&b'>') => {
                scanner.pos += 2;
                tag.push_str("/>");
                return Some((tag, removed));
            }
            _ => {}
        }

        let attr = scanner.take_while(is_name_byte);
        if attr.is_empty() {
            // Stray byte inside the tag; keep it so the validator reports it
            let stray = scanner.peek()? as char;
            scanner.pos += 1;
            tag.push(' ');
            tag.push(stray);
            continue;
        }

        scanner.skip_ws();
        let value = if scanner.peek() == Some(b'=') {
            scanner.pos += 1;
            scanner.skip_ws();
            match scanner.peek()? {
                quote @ (b'"' | b'\'') => {
                    let start = scanner.pos;
                    scanner.pos += 1;
                    let end = scanner.src[scanner.pos..].find(quote as char)?;
                    scanner.pos += end + 1;
                    Some(&scanner.src[start..scanner.pos])
                }
                _ => Some(scanner.take_while(|b| !b.is_ascii_whitespace() && b != b'>')),
            }
        } else {
            None
        };

        if !seen.insert(attr) {
            removed += 1;
            continue;
        }
        tag.push(' ');
        tag.push_str(attr);
        if let Some(value) = value {
            tag.push('=');
            tag.push_str(value);
        }
    }
}

/// Remove duplicate attributes from every opening tag, keeping the first.
///
/// Text, comments, CDATA, processing instructions and closing tags are copied
/// through unchanged. An unterminated tag stops rewriting and the rest of the
/// input is copied verbatim.
pub fn sanitize_svg(input: &str) -> Sanitized {
    let mut scanner = Scanner { src: input, pos: 0 };
    let mut out = String::with_capacity(input.len());
    let mut removed = 0;

    while let Some(offset) = input[scanner.pos..].find('<') {
        let start = scanner.pos + offset;
        out.push_str(&input[scanner.pos..start]);
        scanner.pos = start;

        let rest = &input[start..];
        let passthrough_end = if rest.starts_with("<!--") {
            Some(scanner.find_after("-->"))
        } else if rest.starts_with("<![CDATA[") {
            Some(scanner.find_after("]]>"))
        } else if rest.starts_with("<?") {
            Some(scanner.find_after("?>"))
        } else if rest.starts_with("<!") || rest.starts_with("</") {
            Some(scanner.find_after(">"))
        } else {
            None
        };

        match passthrough_end {
            Some(Some(end)) => {
                out.push_str(&input[start..end]);
                scanner.pos = end;
            }
            Some(None) => break,
            None => match rebuild_tag(&mut scanner) {
                Some((tag, dropped)) => {
                    out.push_str(&tag);
                    removed += dropped;
                }
                None => {
                    scanner.pos = start;
                    break;
                }
            },
        }
    }

    out.push_str(&input[scanner.pos..]);
    Sanitized { svg: out, removed }
}

/// Check that the text is well-formed XML with an `<svg>` root and no
/// duplicate attributes
pub fn validate_svg(svg: &str) -> Result<(), SanitizeError> {
    let mut reader = Reader::from_str(svg);
    let mut saw_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                if !saw_root {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    if name != "svg" {
                        return Err(SanitizeError::NotSvg(name));
                    }
                    saw_root = true;
                }
                for attr in e.attributes() {
                    attr?;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if saw_root {
        Ok(())
    } else {
        Err(SanitizeError::Empty)
    }
}
