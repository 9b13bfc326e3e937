//! RESP wire codec for redlite
//!
//! Requests arrive as multi-bulk arrays (`*<N>\r\n` followed by `N` bulk
//! strings `$<len>\r\n<data>\r\n`). Frames are decoded incrementally with
//! nom's streaming combinators: every bulk string is read by its declared
//! length, so payloads may contain spaces, CRLF or arbitrary bytes.

use crate::error::{RedliteError, Result};
use nom::{
    bytes::streaming::{take, take_until},
    character::streaming::{char, crlf},
    combinator::{map, map_opt},
    error::{Error, ErrorKind},
    multi::count,
    number::streaming::u8 as prefix_byte,
    sequence::terminated,
    IResult,
};
use std::str;

/// Largest bulk string accepted from a peer (512 MiB)
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Most elements accepted in a single request
pub const MAX_REQUEST_ITEMS: i64 = 1024 * 1024;

/// Deepest array nesting accepted by [`parse_frame`]
pub const MAX_NESTING_DEPTH: usize = 32;

/// A single RESP2 value, used for both requests and replies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Vec<u8>),
    Null,
    Array(Vec<Frame>),
}

impl Frame {
    /// `+OK`
    pub fn ok() -> Self {
        Frame::Simple("OK".to_string())
    }

    /// Bulk string reply
    pub fn bulk(data: impl Into<Vec<u8>>) -> Self {
        Frame::Bulk(data.into())
    }

    /// `-ERR <message>` reply built from a command-level error
    pub fn error(err: &RedliteError) -> Self {
        Frame::Error(format!("ERR {}", err))
    }

    /// Build a request frame: an array of bulk strings
    pub fn command<I, T>(parts: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        Frame::Array(
            parts
                .into_iter()
                .map(|p| Frame::Bulk(p.as_ref().to_vec()))
                .collect(),
        )
    }

    /// Serialize the frame to bytes for network transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Frame::Simple(s) => {
                out.push(b'+');
                out.extend_from_slice(s.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Frame::Error(e) => {
                out.push(b'-');
                out.extend_from_slice(e.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Frame::Integer(n) => {
                out.extend_from_slice(format!(":{}\r\n", n).as_bytes());
            }
            Frame::Bulk(data) => {
                out.extend_from_slice(format!("${}\r\n", data.len()).as_bytes());
                out.extend_from_slice(data);
                out.extend_from_slice(b"\r\n");
            }
            Frame::Null => out.extend_from_slice(b"$-1\r\n"),
            Frame::Array(items) => {
                out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
                for item in items {
                    item.encode_into(out);
                }
            }
        }
    }
}

/// Try to decode one frame of any type from the front of `input`.
///
/// Returns `Ok(None)` when more bytes are needed, and the frame together with
/// the number of bytes it occupied otherwise. Arrays nested deeper than
/// [`MAX_NESTING_DEPTH`] are rejected.
pub fn parse_frame(input: &[u8]) -> Result<Option<(Frame, usize)>> {
    match frame_at(input, 0) {
        Ok((rest, frame)) => Ok(Some((frame, input.len() - rest.len()))),
        Err(nom::Err::Incomplete(_)) => Ok(None),
        Err(e) => Err(RedliteError::from(e)),
    }
}

/// Incremental decoder for client requests.
///
/// A request is exactly `*<N>\r\n` followed by `N` bulk strings; any other
/// frame type, at the top level or as an element, is a protocol error. The
/// decoder remembers how far the buffered request has been validated, so
/// bytes arriving in small pieces are only walked once. The caller must not
/// consume from the buffer except by the amount a completed decode reports.
#[derive(Debug, Default)]
pub struct RequestDecoder {
    /// Element count from the array header, once it has been read
    expected: Option<usize>,
    /// Elements whose bodies are fully buffered
    complete: usize,
    /// Offset just past the header and the complete elements
    offset: usize,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the request at the front of `buf`, if it is all there.
    /// Returns it as an array of bulk frames plus the bytes it occupied.
    pub fn decode(&mut self, buf: &[u8]) -> Result<Option<(Frame, usize)>> {
        match self.advance(buf) {
            Ok(true) => {}
            Ok(false) => return Ok(None),
            Err(e) => {
                *self = Self::default();
                return Err(e);
            }
        }

        let end = self.offset;
        let expected = self.expected.unwrap_or(0);
        *self = Self::default();

        // Everything up to `end` was validated above, so this cannot fail
        let (mut rest, _) = array_header(&buf[..end])?;
        let mut items = Vec::with_capacity(expected);
        for _ in 0..expected {
            let (next, data) = bulk_item(rest)?;
            items.push(Frame::Bulk(data.to_vec()));
            rest = next;
        }
        Ok(Some((Frame::Array(items), end)))
    }

    /// Validate as much of the request as is buffered; `true` once complete
    fn advance(&mut self, buf: &[u8]) -> Result<bool> {
        let expected = match self.expected {
            Some(n) => n,
            None => match array_header(buf) {
                Ok((rest, n)) => {
                    self.offset = buf.len() - rest.len();
                    self.expected = Some(n);
                    n
                }
                Err(nom::Err::Incomplete(_)) => return Ok(false),
                Err(e) => return Err(e.into()),
            },
        };

        while self.complete < expected {
            match bulk_item(&buf[self.offset..]) {
                Ok((rest, _)) => {
                    self.offset = buf.len() - rest.len();
                    self.complete += 1;
                }
                Err(nom::Err::Incomplete(_)) => return Ok(false),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }
}

/// `*<N>\r\n` with `0 <= N <= MAX_REQUEST_ITEMS`
fn array_header(input: &[u8]) -> IResult<&[u8], usize> {
    let (rest, _) = char::<_, Error<&[u8]>>('*')(input)?;
    let (rest, n) = integer(rest)?;
    if (0..=MAX_REQUEST_ITEMS).contains(&n) {
        Ok((rest, n as usize))
    } else {
        Err(nom::Err::Failure(Error::new(input, ErrorKind::Count)))
    }
}

/// `$<len>\r\n<data>\r\n`, borrowing the payload
fn bulk_item(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (rest, _) = char::<_, Error<&[u8]>>('$')(input)?;
    let (rest, n) = integer(rest)?;
    if !(0..=MAX_BULK_LEN).contains(&n) {
        return Err(nom::Err::Failure(Error::new(input, ErrorKind::TooLarge)));
    }
    terminated(take(n as usize), crlf)(rest)
}

fn frame_at(input: &[u8], depth: usize) -> IResult<&[u8], Frame> {
    let (input, prefix) = prefix_byte::<_, Error<&[u8]>>(input)?;
    match prefix {
        b'+' => map(text_line, Frame::Simple)(input),
        b'-' => map(text_line, Frame::Error)(input),
        b':' => map(integer, Frame::Integer)(input),
        b'$' => bulk(input),
        b'*' if depth < MAX_NESTING_DEPTH => array(input, depth),
        b'*' => Err(nom::Err::Failure(Error::new(input, ErrorKind::TooLarge))),
        _ => Err(nom::Err::Failure(Error::new(input, ErrorKind::Char))),
    }
}

fn line(input: &[u8]) -> IResult<&[u8], &[u8]> {
    terminated(take_until("\r\n"), crlf)(input)
}

fn text_line(input: &[u8]) -> IResult<&[u8], String> {
    map(line, |b| String::from_utf8_lossy(b).into_owned())(input)
}

fn integer(input: &[u8]) -> IResult<&[u8], i64> {
    map_opt(line, |b| str::from_utf8(b).ok()?.parse::<i64>().ok())(input)
}

fn bulk(input: &[u8]) -> IResult<&[u8], Frame> {
    let (rest, len) = integer(input)?;
    match len {
        -1 => Ok((rest, Frame::Null)),
        n if (0..=MAX_BULK_LEN).contains(&n) => {
            let (rest, data) = terminated(take(n as usize), crlf::<_, Error<&[u8]>>)(rest)?;
            Ok((rest, Frame::Bulk(data.to_vec())))
        }
        _ => Err(nom::Err::Failure(Error::new(input, ErrorKind::TooLarge))),
    }
}

fn array(input: &[u8], depth: usize) -> IResult<&[u8], Frame> {
    let (rest, len) = integer(input)?;
    match len {
        -1 => Ok((rest, Frame::Null)),
        n if n >= 0 => map(count(|i| frame_at(i, depth + 1), n as usize), Frame::Array)(rest),
        _ => Err(nom::Err::Failure(Error::new(input, ErrorKind::Count))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_array() {
        let input = b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n";
        let (frame, consumed) = parse_frame(input).unwrap().unwrap();
        assert_eq!(consumed, input.len());
        assert_eq!(frame, Frame::command(["SET", "foo", "bar"]));
    }

    #[test]
    fn test_bulk_is_length_delimited() {
        // Spaces and CRLF inside the payload are part of the value
        let input = b"*2\r\n$4\r\nECHO\r\n$11\r\nhello\r\nw rl\r\n";
        let (frame, _) = parse_frame(input).unwrap().unwrap();
        assert_eq!(frame, Frame::command(["ECHO", "hello\r\nw rl"]));
    }

    #[test]
    fn test_partial_input_needs_more() {
        let full = b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n";
        for cut in 0..full.len() {
            assert_eq!(parse_frame(&full[..cut]).unwrap(), None, "cut at {}", cut);
        }
        assert!(parse_frame(full).unwrap().is_some());
    }

    #[test]
    fn test_pipelined_frames_report_consumed_bytes() {
        let input = b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPING\r\n";
        let (_, consumed) = parse_frame(input).unwrap().unwrap();
        assert_eq!(consumed, input.len() / 2);
    }

    #[test]
    fn test_malformed_frames() {
        assert!(parse_frame(b"?what\r\n").is_err());
        assert!(parse_frame(b"*x\r\n").is_err());
        assert!(parse_frame(b"$3\r\nfoobar\r\n").is_err());
        assert!(parse_frame(b"$-7\r\n").is_err());
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let nested = b"*1\r\n".repeat(200_000);
        assert!(parse_frame(&nested).is_err());

        let mut ok = b"*1\r\n".repeat(MAX_NESTING_DEPTH - 1);
        ok.extend_from_slice(b"*0\r\n");
        assert!(parse_frame(&ok).unwrap().is_some());
    }

    #[test]
    fn test_request_decoder_accepts_only_bulk_arrays() {
        let mut decoder = RequestDecoder::new();
        let input = b"*2\r\n$4\r\nECHO\r\n$3\r\na b\r\n*1\r\n$4\r\nPING\r\n";
        let (frame, consumed) = decoder.decode(input).unwrap().unwrap();
        assert_eq!(frame, Frame::command(["ECHO", "a b"]));
        assert_eq!(consumed, 23);
        let (frame, _) = decoder.decode(&input[consumed..]).unwrap().unwrap();
        assert_eq!(frame, Frame::command(["PING"]));

        let rejected: [&[u8]; 6] = [
            b"+PING\r\n",
            b"*1\r\n*1\r\n$1\r\na\r\n",
            b"*1\r\n$-1\r\n",
            b"*-5\r\n",
            b"*1\r\n$999999999999\r\n",
            b"*99999999999\r\n",
        ];
        for input in rejected {
            assert!(RequestDecoder::new().decode(input).is_err());
        }
        assert!(RequestDecoder::new().decode(&b"*1\r\n".repeat(200_000)).is_err());
    }

    #[test]
    fn test_request_decoder_resumes_partial_input() {
        let full = b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n";
        let mut decoder = RequestDecoder::new();
        for cut in 0..full.len() {
            assert_eq!(decoder.decode(&full[..cut]).unwrap(), None, "cut at {}", cut);
        }
        let (frame, consumed) = decoder.decode(full).unwrap().unwrap();
        assert_eq!(frame, Frame::command(["SET", "foo", "bar"]));
        assert_eq!(consumed, full.len());

        // State resets once a request is returned
        assert_eq!(decoder.decode(b"").unwrap(), None);
        assert!(decoder.decode(b"*1\r\n$4\r\nPING\r\n").unwrap().is_some());
    }

    #[test]
    fn test_parse_replies() {
        assert_eq!(
            parse_frame(b"+PONG\r\n").unwrap(),
            Some((Frame::Simple("PONG".into()), 7))
        );
        assert_eq!(
            parse_frame(b"-ERR boom\r\n").unwrap(),
            Some((Frame::Error("ERR boom".into()), 11))
        );
        assert_eq!(parse_frame(b"$-1\r\n").unwrap(), Some((Frame::Null, 5)));
        assert_eq!(parse_frame(b":42\r\n").unwrap(), Some((Frame::Integer(42), 5)));
    }

    #[test]
    fn test_frame_serialization() {
        assert_eq!(Frame::Simple("PONG".into()).to_bytes(), b"+PONG\r\n");
        assert_eq!(Frame::bulk("bar").to_bytes(), b"$3\r\nbar\r\n");
        assert_eq!(Frame::Null.to_bytes(), b"$-1\r\n");
        assert_eq!(Frame::Array(vec![]).to_bytes(), b"*0\r\n");
        assert_eq!(
            Frame::Array(vec![Frame::bulk("a"), Frame::bulk("b")]).to_bytes(),
            b"*2\r\n$1\r\na\r\n$1\r\nb\r\n"
        );
        assert_eq!(
            Frame::error(&RedliteError::UnknownCommand("FOO".into())).to_bytes(),
            b"-ERR invalid command\r\n"
        );
    }
}
