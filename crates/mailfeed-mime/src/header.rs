//! Header block parsing (RFC 5322 section 2.2).

/// Parsed header fields in document order.
///
/// Names compare case-insensitively. Folded lines are unfolded into a
/// single value with the line break removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header set.
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Parses a raw header block.
    ///
    /// Parsing stops at the first empty line. Lines without a colon are
    /// skipped. Bytes that are not UTF-8 are replaced.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(raw);
        let mut headers = Self::new();
        let mut current: Option<(String, String)> = None;

        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break;
            }

            if line.starts_with([' ', '\t']) {
                // Continuation joins the previous field
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(line);
                }
                continue;
            }

            if let Some(done) = current.take() {
                headers.fields.push(done);
            }
            if let Some((name, value)) = line.split_once(':') {
                current = Some((name.trim().to_string(), value.trim_start().to_string()));
            }
        }

        if let Some(done) = current {
            headers.fields.push(done);
        }
        for (_, value) in &mut headers.fields {
            let trimmed = value.trim_end().len();
            value.truncate(trimmed);
        }
        headers
    }

    /// Appends a field.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// First value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `name`, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// True if `name` is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of fields.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when no fields were parsed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Splits an entity into its header block and body at the first empty line.
///
/// The separator itself belongs to neither half. An entity that begins with
/// an empty line has no headers; one without an empty line is all header.
#[must_use]
pub fn split_header(raw: &[u8]) -> (&[u8], &[u8]) {
    if let Some(body) = raw.strip_prefix(b"\r\n").or_else(|| raw.strip_prefix(b"\n")) {
        return (&[], body);
    }

    let mut pos = 0;
    while let Some(offset) = raw[pos..].iter().position(|&b| b == b'\n') {
        let next = pos + offset + 1;
        let rest = &raw[next..];
        if rest.starts_with(b"\r\n") {
            return (&raw[..next], &rest[2..]);
        }
        if rest.starts_with(b"\n") {
            return (&raw[..next], &rest[1..]);
        }
        pos = next;
    }
    (raw, &[])
}
