//! UID sets for UID-prefixed commands.

use super::Uid;

/// Set of UIDs as written on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UidSet {
    /// A single UID.
    Single(Uid),
    /// Inclusive range.
    Range(Uid, Uid),
    /// From a UID up to the highest one in the mailbox (`n:*`).
    RangeFrom(Uid),
    /// Comma-separated union.
    Set(Vec<Self>),
}

impl UidSet {
    /// `uid:*`, the open-ended range a cursor fetch uses.
    #[must_use]
    pub fn from_onwards(uid: Uid) -> Self {
        Self::RangeFrom(uid)
    }
}

impl std::fmt::Display for UidSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(uid) => write!(f, "{uid}"),
            Self::Range(start, end) => write!(f, "{start}:{end}"),
            Self::RangeFrom(start) => write!(f, "{start}:*"),
            Self::Set(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn uid(n: u32) -> Uid {
        Uid::new(n).unwrap()
    }

    #[test]
    fn open_range_renders_star() {
        assert_eq!(UidSet::from_onwards(uid(15)).to_string(), "15:*");
    }

    #[test]
    fn union_renders_commas() {
        let set = UidSet::Set(vec![UidSet::Single(uid(1)), UidSet::Range(uid(4), uid(6))]);
        assert_eq!(set.to_string(), "1,4:6");
    }
}
