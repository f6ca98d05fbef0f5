// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;

use crate::protocol::{
    command::{Command, ErrorKind, ProtocolLimits, validate_key},
    framer::CRLF,
};

/// Converts one whole record (as produced by the framer) into a validated
/// command value. Never fails: malformed input becomes `Command::Invalid`
/// with a precise classification.
pub fn parse_record(record: &Bytes, limits: &ProtocolLimits) -> Command {
    let Some(header_len) = find_crlf(record) else {
        return Command::invalid(
            ErrorKind::ProtocolViolation,
            "command must end with \\r\\n",
        );
    };
    let header = &record[..header_len];
    let body_start = header_len + CRLF.len();

    let tokens: Vec<&[u8]> = header.split(|b| *b == b' ').collect();
    let verb = tokens[0];

    if verb.eq_ignore_ascii_case(b"get") {
        parse_get(&tokens[1..], limits)
    } else if verb.eq_ignore_ascii_case(b"set") {
        parse_set(&tokens[1..], record, body_start, limits)
    } else if verb.eq_ignore_ascii_case(b"delete") {
        parse_delete(&tokens[1..], limits)
    } else {
        Command::invalid(
            ErrorKind::UnknownCommand,
            format!("unknown command: {}", String::from_utf8_lossy(verb)),
        )
    }
}

fn parse_get(args: &[&[u8]], limits: &ProtocolLimits) -> Command {
    if args.is_empty() {
        return Command::invalid(ErrorKind::MissingParameter, "no keys provided");
    }
    let mut keys = Vec::with_capacity(args.len());
    for tok in args {
        if let Err(e) = validate_key(tok, limits.max_key_bytes) {
            return Command::invalid(ErrorKind::InvalidKey, e.to_string());
        }
        keys.push(Bytes::copy_from_slice(tok));
    }
    Command::Get { keys }
}

fn parse_set(
    args: &[&[u8]],
    record: &Bytes,
    body_start: usize,
    limits: &ProtocolLimits,
) -> Command {
    if args.len() < 4 {
        return Command::invalid(
            ErrorKind::MissingParameter,
            "expected: set <key> <flags> <expiration> <length> [noreply]",
        );
    }
    if args.len() > 5 {
        return Command::invalid(
            ErrorKind::InvalidParameter,
            format!("unknown parameter: {}", String::from_utf8_lossy(args[5])),
        );
    }

    if let Err(e) = validate_key(args[0], limits.max_key_bytes) {
        return Command::invalid(ErrorKind::InvalidKey, e.to_string());
    }
    let key = Bytes::copy_from_slice(args[0]);

    let Some(flags) = parse_u32(args[1]) else {
        return Command::invalid(ErrorKind::InvalidParameter, "invalid flags format");
    };
    let Some(expiration) = parse_u32(args[2]) else {
        return Command::invalid(
            ErrorKind::InvalidParameter,
            "invalid expiration format",
        );
    };

    let length = match parse_i32(args[3]) {
        Some(n) if n >= 0 => n as usize,
        _ => {
            return Command::invalid(
                ErrorKind::InvalidParameter,
                "invalid length format",
            );
        },
    };
    if length > limits.max_value_bytes {
        return Command::invalid(ErrorKind::ServerError, "value too large");
    }

    let no_reply = match args.get(4) {
        None => false,
        Some(tok) if *tok == b"noreply" => true,
        Some(tok) => {
            return Command::invalid(
                ErrorKind::InvalidParameter,
                format!("unknown parameter: {}", String::from_utf8_lossy(tok)),
            );
        },
    };

    // Payload segment: exactly `length` bytes, then the terminator.
    let body = &record[body_start..];
    if body.len() < length {
        return Command::invalid(ErrorKind::InvalidData, "insufficient data available");
    }
    if body.len() != length + CRLF.len() || &body[length..] != CRLF {
        return Command::invalid(
            ErrorKind::ProtocolViolation,
            "data block must end with \\r\\n",
        );
    }
    let data = record.slice(body_start..body_start + length);

    Command::Set {
        key,
        flags,
        expiration,
        data,
        no_reply,
    }
}

fn parse_delete(args: &[&[u8]], limits: &ProtocolLimits) -> Command {
    if args.is_empty() {
        return Command::invalid(ErrorKind::MissingParameter, "no key provided");
    }
    if args.len() > 2 {
        return Command::invalid(
            ErrorKind::InvalidParameter,
            format!("unknown parameter: {}", String::from_utf8_lossy(args[2])),
        );
    }
    if let Err(e) = validate_key(args[0], limits.max_key_bytes) {
        return Command::invalid(ErrorKind::InvalidKey, e.to_string());
    }
    let no_reply = match args.get(1) {
        None => false,
        Some(tok) if *tok == b"noreply" => true,
        Some(tok) => {
            return Command::invalid(
                ErrorKind::InvalidParameter,
                format!("unknown parameter: {}", String::from_utf8_lossy(tok)),
            );
        },
    };
    Command::Delete {
        key: Bytes::copy_from_slice(args[0]),
        no_reply,
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(CRLF.len()).position(|w| w == CRLF)
}

fn parse_u32(tok: &[u8]) -> Option<u32> {
    if tok.is_empty() || tok.len() > 10 || !tok.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let mut value: u64 = 0;
    for b in tok {
        value = value * 10 + u64::from(b - b'0');
    }
    u32::try_from(value).ok()
}

fn parse_i32(tok: &[u8]) -> Option<i32> {
    let (negative, digits) = match tok.split_first() {
        Some((&b'-', rest)) => (true, rest),
        _ => (false, tok),
    };
    if digits.is_empty() || digits.len() > 10 || !digits.iter().all(u8::is_ascii_digit)
    {
        return None;
    }
    let mut value: i64 = 0;
    for b in digits {
        value = value * 10 + i64::from(b - b'0');
    }
    if negative {
        value = -value;
    }
    i32::try_from(value).ok()
}
