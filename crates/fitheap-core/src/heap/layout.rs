//! Layout introspection records and the dump format.
//!
//! A dump is one record per contiguous arena segment, headers included, so
//! the record lengths of a healthy chain sum to the arena size. The text
//! form is one tab-separated line per record:
//!
//! ```text
//! 0	24	header
//! 24	30	allocated
//! 54	24	header
//! 78	122	free
//! ```

use core::fmt;

/// What a contiguous arena segment holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// A 24-byte header record.
    Header,
    /// A payload currently handed out.
    Allocated,
    /// A payload available for allocation.
    Free,
}

impl SegmentKind {
    /// Lowercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Allocated => "allocated",
            Self::Free => "free",
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One contiguous segment of the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutRecord {
    /// Byte offset where the segment starts.
    pub offset: usize,
    /// Segment length in bytes.
    pub len: usize,
    pub kind: SegmentKind,
}

impl fmt::Display for LayoutRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.offset, self.len, self.kind)
    }
}

/// Renders records one per line, each line newline-terminated.
#[must_use]
pub fn render_layout(records: &[LayoutRecord]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(&record.to_string());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_lines_are_tab_separated() {
        let record = LayoutRecord {
            offset: 24,
            len: 30,
            kind: SegmentKind::Allocated,
        };
        assert_eq!(record.to_string(), "24\t30\tallocated");
    }

    #[test]
    fn rendering_is_newline_terminated() {
        let records = [
            LayoutRecord {
                offset: 0,
                len: 24,
                kind: SegmentKind::Header,
            },
            LayoutRecord {
                offset: 24,
                len: 176,
                kind: SegmentKind::Free,
            },
        ];
        assert_eq!(render_layout(&records), "0\t24\theader\n24\t176\tfree\n");
        assert_eq!(render_layout(&[]), "");
    }

    #[test]
    fn kind_names_cover_all_variants() {
        assert_eq!(SegmentKind::Header.as_str(), "header");
        assert_eq!(SegmentKind::Allocated.as_str(), "allocated");
        assert_eq!(SegmentKind::Free.as_str(), "free");
    }
}
