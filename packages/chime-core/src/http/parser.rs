//! Incremental HTTP/1.x response-head parser.
//!
//! The parser is stateless: every call scans the whole buffer from the start
//! and reports header positions as byte ranges into it, so the caller can
//! bounds-check them before copying anything out. `prev_len` (the number of
//! bytes seen on the previous call) is only used to bail out early when no
//! end-of-head marker can have arrived since then, which makes re-invoking
//! on a growing buffer cheap and free of accumulated state.

use std::ops::Range;

/// Location of one header inside the parsed buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSpan {
    pub name: Range<usize>,
    pub value: Range<usize>,
}

/// Status line summary of a complete response head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHead {
    pub minor_version: u8,
    pub status: u16,
    /// Bytes up to and including the blank line ending the head.
    pub head_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// Head is complete; header spans were written to the output list.
    Complete(ResponseHead),
    /// More bytes are needed.
    Partial,
    /// The bytes cannot be a valid response head.
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Halt {
    Partial,
    Invalid,
}

type Step<T> = Result<T, Halt>;

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Step<u8> {
        self.buf.get(self.pos).copied().ok_or(Halt::Partial)
    }

    fn next(&mut self) -> Step<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Ok(byte)
    }

    fn expect(&mut self, literal: &[u8]) -> Step<()> {
        for &want in literal {
            if self.next()? != want {
                return Err(Halt::Invalid);
            }
        }
        Ok(())
    }

    fn skip_whitespace(&mut self) -> Step<()> {
        while matches!(self.peek()?, b' ' | b'\t') {
            self.pos += 1;
        }
        Ok(())
    }

    /// Consumes `\r\n` or a bare `\n`.
    fn line_end(&mut self) -> Step<()> {
        match self.next()? {
            b'\n' => Ok(()),
            b'\r' => match self.next()? {
                b'\n' => Ok(()),
                _ => Err(Halt::Invalid),
            },
            _ => Err(Halt::Invalid),
        }
    }

    fn digit(&mut self) -> Step<u8> {
        let byte = self.next()?;
        if byte.is_ascii_digit() {
            Ok(byte - b'0')
        } else {
            Err(Halt::Invalid)
        }
    }
}

fn is_token(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&byte)
}

fn is_value_byte(byte: u8) -> bool {
    byte == b'\t' || (byte >= 0x20 && byte != 0x7f)
}

/// Finds an end-of-head marker at or after `from`.
fn find_head_end(buf: &[u8], from: usize) -> Option<usize> {
    let tail = buf.get(from..)?;
    tail.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .or_else(|| tail.windows(2).position(|w| w == b"\n\n"))
        .map(|pos| from + pos)
}

fn parse_status_line(cursor: &mut Cursor<'_>) -> Step<(u8, u16)> {
    cursor.expect(b"HTTP/1.")?;
    let minor_version = cursor.digit()?;

    if cursor.next()? != b' ' {
        return Err(Halt::Invalid);
    }
    cursor.skip_whitespace()?;

    let status = u16::from(cursor.digit()?) * 100
        + u16::from(cursor.digit()?) * 10
        + u16::from(cursor.digit()?);

    match cursor.peek()? {
        b'\r' | b'\n' => {}
        b' ' => {
            while !matches!(cursor.peek()?, b'\r' | b'\n') {
                if !is_value_byte(cursor.next()?) {
                    return Err(Halt::Invalid);
                }
            }
        }
        _ => return Err(Halt::Invalid),
    }
    cursor.line_end()?;

    Ok((minor_version, status))
}

fn parse_header(cursor: &mut Cursor<'_>) -> Step<HeaderSpan> {
    let name_start = cursor.pos;
    loop {
        let byte = cursor.peek()?;
        if byte == b':' {
            break;
        }
        if !is_token(byte) {
            return Err(Halt::Invalid);
        }
        cursor.pos += 1;
    }
    let name = name_start..cursor.pos;
    if name.is_empty() {
        return Err(Halt::Invalid);
    }
    cursor.pos += 1;
    cursor.skip_whitespace()?;

    let value_start = cursor.pos;
    while !matches!(cursor.peek()?, b'\r' | b'\n') {
        if !is_value_byte(cursor.next()?) {
            return Err(Halt::Invalid);
        }
    }
    let mut value_end = cursor.pos;
    while value_end > value_start && matches!(cursor.buf[value_end - 1], b' ' | b'\t') {
        value_end -= 1;
    }
    cursor.line_end()?;

    Ok(HeaderSpan {
        name,
        value: value_start..value_end,
    })
}

fn parse_head(cursor: &mut Cursor<'_>, max_headers: usize, spans: &mut Vec<HeaderSpan>) -> Step<ResponseHead> {
    let (minor_version, status) = parse_status_line(cursor)?;

    loop {
        match cursor.peek()? {
            b'\r' | b'\n' => {
                cursor.line_end()?;
                break;
            }
            // Obsolete line folding is not supported.
            b' ' | b'\t' => return Err(Halt::Invalid),
            _ => {}
        }
        if spans.len() == max_headers {
            return Err(Halt::Invalid);
        }
        let span = parse_header(cursor)?;
        spans.push(span);
    }

    Ok(ResponseHead {
        minor_version,
        status,
        head_len: cursor.pos,
    })
}

/// Parses a response head from the start of `buf`.
///
/// `spans` is cleared and refilled on every call. At most `max_headers`
/// headers are accepted; more is reported as [`ParseStatus::Invalid`].
pub fn parse_response(
    buf: &[u8],
    prev_len: usize,
    max_headers: usize,
    spans: &mut Vec<HeaderSpan>,
) -> ParseStatus {
    spans.clear();

    if prev_len != 0 && find_head_end(buf, prev_len.saturating_sub(3)).is_none() {
        return ParseStatus::Partial;
    }

    let mut cursor = Cursor { buf, pos: 0 };
    match parse_head(&mut cursor, max_headers, spans) {
        Ok(head) => ParseStatus::Complete(head),
        Err(Halt::Partial) => {
            spans.clear();
            ParseStatus::Partial
        }
        Err(Halt::Invalid) => {
            spans.clear();
            ParseStatus::Invalid
        }
    }
}
