//! Neutralizes terminal control sequences in JSON response bodies.
//!
//! Forge servers return non-printable characters as unicode code point
//! escapes: C0 controls as the literal six bytes `\u0000`..`\u001f`, C1
//! controls as a two-byte sequence (0xC2 then 0x80..0x9F). Left alone,
//! a terminal will interpret them; `\u001b` (ESC) in particular is an
//! attack vector. The sanitizer rewrites both forms to caret notation
//! (`^[` for ESC) as the body streams through.

use std::io::{self, Read};
use std::mem;
use std::sync::OnceLock;

use regex::Regex;
use reqwest::header::CONTENT_TYPE;

use super::{BoxTransport, Interceptor, Request};

/// Prefix shared by every C0 escape sequence. The prefix itself is matched
/// case-sensitively; the two hex digits that follow are not.
const ESCAPE_PREFIX: &[u8] = br"\u00";

/// Full width of a C0 escape sequence.
const WINDOW: usize = 6;

static JSON_TYPE: OnceLock<Regex> = OnceLock::new();

fn json_type_re() -> &'static Regex {
    JSON_TYPE.get_or_init(|| Regex::new(r"[/+]json($|;)").expect("static pattern"))
}

/// True for `application/json`, `application/vnd.forge+json`, with or
/// without media type parameters.
pub fn is_json_content(content_type: &str) -> bool {
    json_type_re().is_match(content_type)
}

/// Wrap JSON response bodies in an [`AsciiSanitizer`]. Non-JSON bodies
/// pass through untouched, as do transport errors.
pub fn sanitize_controls() -> Interceptor {
    Box::new(move |inner: BoxTransport| -> BoxTransport {
        Box::new(move |request: Request| {
            let mut response = inner.execute(request)?;
            if is_json_content(response.header_str(CONTENT_TYPE)) {
                let body = mem::replace(&mut response.body, Box::new(io::empty()));
                response.body = Box::new(AsciiSanitizer::new(body));
            }
            Ok(response)
        })
    })
}

/// Streaming reader that rewrites C0/C1 control sequences to caret
/// notation. Bytes that cannot be classified yet (a sequence split across
/// reads) are carried to the next read, so output is identical no matter
/// how the input is chunked. At end of stream the carry is flushed through
/// the classifier once more and anything still incomplete passes through
/// verbatim; sanitization is advisory hardening, not validation.
pub struct AsciiSanitizer<R> {
    inner: R,
    /// Unclassified tail from the previous read.
    carry: Vec<u8>,
    /// Sanitized output not yet handed to the caller.
    out: Vec<u8>,
    out_pos: usize,
    /// An unconsumed literal backslash immediately precedes the cursor.
    escape_pending: bool,
    done: bool,
}

impl<R: Read> AsciiSanitizer<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            carry: Vec::new(),
            out: Vec::new(),
            out_pos: 0,
            escape_pending: false,
            done: false,
        }
    }

    /// Classify `data` left to right, appending sanitized bytes to
    /// `self.out`. Returns how many input bytes were consumed; the caller
    /// keeps the rest for the next round. With `at_eof` set, sequences
    /// that can never complete are emitted verbatim instead of kept.
    fn scan(&mut self, data: &[u8], at_eof: bool) -> usize {
        let mut i = 0;
        while i < data.len() {
            let rest = &data[i..];

            // C1: lead byte 0xC2, continuation 0x80..=0x9F.
            if rest[0] == 0xC2 {
                if rest.len() < 2 {
                    if at_eof {
                        self.out.extend_from_slice(rest);
                        i = data.len();
                    }
                    break;
                }
                match c1_control(rest[1]) {
                    Some(value) => push_caret(&mut self.out, value),
                    None => self.out.extend_from_slice(&rest[..2]),
                }
                i += 2;
                continue;
            }

            if rest[0] == b'\\' {
                let cmp = rest.len().min(ESCAPE_PREFIX.len());
                if rest[..cmp] == ESCAPE_PREFIX[..cmp] {
                    // Possible C0 sequence; classification needs the full
                    // six-byte window.
                    if rest.len() < WINDOW {
                        if at_eof {
                            self.out.extend_from_slice(rest);
                            i = data.len();
                        }
                        break;
                    }
                    match c0_control(&rest[..WINDOW]) {
                        Some(value) => {
                            if self.escape_pending {
                                // `\\u001b` came in escaped; keep it
                                // distinguishable from the raw form.
                                self.out.push(b'\\');
                            }
                            push_caret(&mut self.out, value);
                        }
                        // `\u0041` and friends are not controls; the whole
                        // window passes through as a unit.
                        None => self.out.extend_from_slice(&rest[..WINDOW]),
                    }
                    self.escape_pending = false;
                    i += WINDOW;
                    continue;
                }
                self.escape_pending = !self.escape_pending;
                self.out.push(b'\\');
                i += 1;
                continue;
            }

            self.escape_pending = false;
            self.out.push(rest[0]);
            i += 1;
        }
        i
    }
}

impl<R: Read> Read for AsciiSanitizer<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.out_pos >= self.out.len() && !self.done {
            self.out.clear();
            self.out_pos = 0;

            let mut chunk = [0u8; 4096];
            let n = self.inner.read(&mut chunk)?;
            if n == 0 {
                let tail = mem::take(&mut self.carry);
                self.scan(&tail, true);
                self.done = true;
            } else {
                let mut data = mem::take(&mut self.carry);
                data.extend_from_slice(&chunk[..n]);
                let consumed = self.scan(&data, false);
                self.carry = data.split_off(consumed);
            }
        }

        let available = &self.out[self.out_pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.out_pos += n;
        Ok(n)
    }
}

/// Append the caret form of a control value in `0x00..=0x1F`. FS (0x1C)
/// doubles the backslash so the substitution stays inert inside a JSON
/// string.
fn push_caret(out: &mut Vec<u8>, value: u8) {
    out.push(b'^');
    if value == 0x1C {
        out.extend_from_slice(br"\\");
    } else {
        out.push(b'@' + value);
    }
}

/// Control value of a full `\u00XX` window, when XX lands in C0.
fn c0_control(window: &[u8]) -> Option<u8> {
    let hi = hex_digit(window[4])?;
    let lo = hex_digit(window[5])?;
    let value = hi * 16 + lo;
    (value <= 0x1F).then_some(value)
}

/// Control value of a C1 continuation byte.
fn c1_control(byte: u8) -> Option<u8> {
    (0x80..=0x9F).contains(&byte).then(|| byte - 0x80)
}

fn hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Delivers one byte per read call, the worst chunking a transport
    /// can produce.
    struct OneByteReader<R>(R);

    impl<R: Read> Read for OneByteReader<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if buf.is_empty() {
                return Ok(0);
            }
            self.0.read(&mut buf[..1])
        }
    }

    fn sanitize(input: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        AsciiSanitizer::new(Cursor::new(input.to_vec()))
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    fn sanitize_byte_at_a_time(input: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        AsciiSanitizer::new(OneByteReader(Cursor::new(input.to_vec())))
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn test_escape_sequence_becomes_caret() {
        assert_eq!(sanitize(br#"{"msg":"\u001b[31mred"}"#), br#"{"msg":"^[[31mred"}"#);
    }

    #[test]
    fn test_hex_digits_case_insensitive() {
        assert_eq!(sanitize(br"\u001B"), b"^[");
        assert_eq!(sanitize(br"\u001b"), b"^[");
    }

    #[test]
    fn test_escaped_backslash_stays_distinguishable() {
        // `\\u001b` is an already-escaped backslash followed by the
        // sequence; the backslash survives in front of the caret form.
        assert_eq!(sanitize(br"\\u001b"), br"\^[");
        assert_eq!(sanitize(br"\u001b"), b"^[");
    }

    #[test]
    fn test_non_control_escape_passes_through() {
        assert_eq!(sanitize(br"\u0041"), br"\u0041");
        assert_eq!(sanitize(br"\u0020"), br"\u0020");
    }

    #[test]
    fn test_file_separator_keeps_json_valid() {
        assert_eq!(sanitize(br"\u001c"), br"^\\");
    }

    #[test]
    fn test_c1_sequence_becomes_caret() {
        assert_eq!(sanitize(&[0xC2, 0x9B]), b"^[");
        assert_eq!(sanitize(&[b'a', 0xC2, 0x80, b'b']), b"a^@b");
    }

    #[test]
    fn test_c2_outside_control_range_passes_through() {
        // 0xC2 0xA9 is the copyright sign, not a control.
        assert_eq!(sanitize(&[0xC2, 0xA9]), &[0xC2, 0xA9]);
    }

    #[test]
    fn test_incomplete_sequence_at_eof_flushes_verbatim() {
        assert_eq!(sanitize(br"\u00"), br"\u00");
        assert_eq!(sanitize(br"\u001"), br"\u001");
        assert_eq!(sanitize(&[0xC2]), &[0xC2]);
    }

    #[test]
    fn test_chunking_equivalence() {
        let inputs: &[&[u8]] = &[
            br#"{"a":"\u001b[0m","b":"\\u001b","c":"\u0041"}"#,
            br"plain text with a trailing slash \",
            &[0xC2, 0x9B, b'x', 0xC2],
            br"\u001b\u001b\\\u001b",
            br"\u00",
        ];
        for input in inputs {
            assert_eq!(
                sanitize(input),
                sanitize_byte_at_a_time(input),
                "chunking changed output for {input:?}"
            );
        }
    }

    #[test]
    fn test_sanitization_is_idempotent() {
        let input: &[u8] = br#"{"a":"\u001b","b":"\\u001b","c":"\u001c"}"#;
        let once = sanitize(input);
        let twice = sanitize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_json_content_type_gate() {
        assert!(is_json_content("application/json"));
        assert!(is_json_content("application/json; charset=utf-8"));
        assert!(is_json_content("application/vnd.forge+json"));
        assert!(!is_json_content("text/html"));
        assert!(!is_json_content("application/jsonx"));
    }
}
