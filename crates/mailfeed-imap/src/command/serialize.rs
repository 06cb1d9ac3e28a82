//! Encoding helpers for command arguments.

use super::FetchAttribute;

/// Writes an astring: a bare atom when possible, otherwise a quoted string.
pub fn write_astring(buf: &mut Vec<u8>, s: &str) {
    if !s.is_empty() && !s.bytes().any(needs_quoting) {
        buf.extend_from_slice(s.as_bytes());
        return;
    }
    buf.push(b'"');
    for b in s.bytes() {
        if matches!(b, b'"' | b'\\') {
            buf.push(b'\\');
        }
        buf.push(b);
    }
    buf.push(b'"');
}

const fn needs_quoting(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b']'
    ) || b < 0x20
        || b == 0x7F
}

/// Writes a FETCH item list, parenthesised when it has more than one entry.
pub fn write_fetch_attributes(buf: &mut Vec<u8>, items: &[FetchAttribute]) {
    let [single] = items else {
        buf.push(b'(');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                buf.push(b' ');
            }
            write_fetch_attribute(buf, item);
        }
        buf.push(b')');
        return;
    };
    write_fetch_attribute(buf, single);
}

fn write_fetch_attribute(buf: &mut Vec<u8>, item: &FetchAttribute) {
    match item {
        FetchAttribute::Uid => buf.extend_from_slice(b"UID"),
        FetchAttribute::Flags => buf.extend_from_slice(b"FLAGS"),
        FetchAttribute::InternalDate => buf.extend_from_slice(b"INTERNALDATE"),
        FetchAttribute::Rfc822Size => buf.extend_from_slice(b"RFC822.SIZE"),
        FetchAttribute::Body { section, peek } => {
            buf.extend_from_slice(if *peek { b"BODY.PEEK[" } else { b"BODY[" });
            if let Some(section) = section {
                buf.extend_from_slice(section.as_bytes());
            }
            buf.push(b']');
        }
    }
}
