// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::{Bytes, BytesMut};

pub const CRLF: &[u8] = b"\r\n";

/// Longest header line the framer keeps waiting on. A CRLF-less stream
/// beyond this is handed to the parser as-is, which classifies it as a
/// protocol violation and lets the connection resynchronize at the next
/// CRLF.
const MAX_HEADER_LINE: usize = 8 * 1024;

/// What the header line told us about the record's shape.
enum HeaderKind {
    /// Rule A: the record is the header line alone.
    Line,
    /// Rule B: a store header declaring `n` payload bytes plus a trailing
    /// CRLF.
    StorePayload(usize),
    /// A store header whose length token does not parse, is negative, or
    /// exceeds the payload ceiling. Emitted alone; the parser classifies
    /// precisely without the framer buffering an unbounded payload.
    StoreMalformed,
}

/// Incremental record extraction over an append-only byte stream.
///
/// Bytes land in the internal buffer (`buf_mut` is the read target);
/// `next_record` carves off one whole command record at a time. Payloads are
/// never scanned for terminators, so records are binary-safe.
#[derive(Debug)]
pub struct Framer {
    buf: BytesMut,
    max_payload: usize,
}

impl Framer {
    pub fn new(max_payload: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
            max_payload,
        }
    }

    /// The buffer freshly read bytes are appended to.
    pub fn buf_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Appends bytes by copy. Reads normally target `buf_mut` directly.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// True when buffered input does not yet form a whole record. Drives the
    /// read-timeout choice: a partial record waits under the read timeout,
    /// an empty buffer under the idle timeout.
    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Extracts the next whole record, or `None` when more bytes are needed.
    pub fn next_record(&mut self) -> Option<Bytes> {
        let header_end = match find_crlf(&self.buf) {
            Some(i) => i + CRLF.len(),
            None => {
                if self.buf.len() > MAX_HEADER_LINE {
                    let len = self.buf.len();
                    return Some(self.buf.split_to(len).freeze());
                }
                return None;
            },
        };

        match classify_header(&self.buf[..header_end - CRLF.len()]) {
            HeaderKind::Line | HeaderKind::StoreMalformed => {
                Some(self.buf.split_to(header_end).freeze())
            },
            HeaderKind::StorePayload(n) if n > self.max_payload => {
                Some(self.buf.split_to(header_end).freeze())
            },
            HeaderKind::StorePayload(n) => {
                let total = header_end + n + CRLF.len();
                if self.buf.len() < total {
                    return None;
                }
                Some(self.buf.split_to(total).freeze())
            },
        }
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(CRLF.len()).position(|w| w == CRLF)
}

/// Examines a header line (CRLF stripped) and decides the record shape.
/// Tokenization here skips empty tokens so that the declared length is found
/// even in sloppy spacing; the parser applies the strict shape rules.
fn classify_header(line: &[u8]) -> HeaderKind {
    let mut tokens = line.split(|b| *b == b' ').filter(|t| !t.is_empty());
    let Some(verb) = tokens.next() else {
        return HeaderKind::Line;
    };
    if !verb.eq_ignore_ascii_case(b"set") {
        return HeaderKind::Line;
    }

    // Header tokens after the verb: key, flags, expiration, length[, noreply].
    let Some(length_tok) = tokens.nth(3) else {
        return HeaderKind::StoreMalformed;
    };
    match parse_decimal(length_tok) {
        Some(n) if n >= 0 => HeaderKind::StorePayload(n as usize),
        _ => HeaderKind::StoreMalformed,
    }
}

/// Strict signed-decimal parse without going through UTF-8.
fn parse_decimal(tok: &[u8]) -> Option<i64> {
    let (negative, digits) = match tok.split_first() {
        Some((&b'-', rest)) => (true, rest),
        _ => (false, tok),
    };
    if digits.is_empty() || digits.len() > 18 {
        return None;
    }
    let mut value: i64 = 0;
    for b in digits {
        if !b.is_ascii_digit() {
            return None;
        }
        value = value * 10 + i64::from(b - b'0');
    }
    Some(if negative { -value } else { value })
}
