use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Comparison policy for [`compare`](super::compare::compare).
    ///
    /// Scope bits (`ORIGINAL`, `REPLY`, `ALL`) select what is compared, mode
    /// bits (`MASK`, `STRICT`) decide how absent attributes are treated and
    /// the `TIMEOUT_*` bits refine the timeout comparison.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ComparisonFlags: u32 {
        /// Require the original tuple to match.
        const ORIGINAL = 1 << 0;
        /// Require the reply tuple to match.
        const REPLY = 1 << 1;
        const TIMEOUT_EQUAL = 1 << 2;
        const TIMEOUT_GREATER_THAN = 1 << 3;
        const TIMEOUT_LESS_THAN = 1 << 4;
        /// The first record is a filter pattern: its unset attributes are
        /// wildcards, its set attributes must be set on the candidate.
        const MASK = 1 << 5;
        /// Any attribute unset on either side is a mismatch.
        const STRICT = 1 << 6;
        /// Metadata scope. Only takes effect as part of `ALL`.
        const META = 1 << 7;

        /// Original tuple, reply tuple and metadata.
        const ALL = Self::ORIGINAL.bits() | Self::REPLY.bits() | Self::META.bits();
        const TIMEOUT_GREATER_EQUAL = Self::TIMEOUT_EQUAL.bits() | Self::TIMEOUT_GREATER_THAN.bits();
        const TIMEOUT_LESS_EQUAL = Self::TIMEOUT_EQUAL.bits() | Self::TIMEOUT_LESS_THAN.bits();
    }
}

impl ComparisonFlags {
    const MODE_BITS: Self = Self::MASK.union(Self::STRICT);
    const TIMEOUT_BITS: Self = Self::TIMEOUT_EQUAL
        .union(Self::TIMEOUT_GREATER_THAN)
        .union(Self::TIMEOUT_LESS_THAN);

    /// How absent attributes are treated.
    pub fn mode(self) -> CompareMode {
        if self.contains(Self::STRICT) {
            CompareMode::Strict
        } else if self.contains(Self::MASK) {
            CompareMode::Mask
        } else {
            CompareMode::Wildcard
        }
    }

    /// The scope bits alone, with mode and timeout refinement removed.
    pub fn scope(self) -> Self {
        self.difference(Self::MODE_BITS | Self::TIMEOUT_BITS)
    }

    /// Whether this requests the full original + reply + metadata comparison.
    pub fn is_full_scope(self) -> bool {
        self.scope() == Self::ALL
    }

    /// Whether an ordered (less/greater) timeout comparison was requested.
    pub fn has_timeout_ordering(self) -> bool {
        self.intersects(Self::TIMEOUT_GREATER_THAN | Self::TIMEOUT_LESS_THAN)
    }
}

/// Treatment of attributes missing from one or both records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareMode {
    /// Absence on either side is "don't care".
    Wildcard,
    /// Set on the pattern but unset on the candidate is a mismatch.
    Mask,
    /// Any absence is a mismatch.
    Strict,
}

impl CompareMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wildcard => "wildcard",
            Self::Mask => "mask",
            Self::Strict => "strict",
        }
    }

    /// The flag bit that selects this mode.
    pub fn to_flags(self) -> ComparisonFlags {
        match self {
            Self::Wildcard => ComparisonFlags::empty(),
            Self::Mask => ComparisonFlags::MASK,
            Self::Strict => ComparisonFlags::STRICT,
        }
    }
}

impl std::fmt::Display for CompareMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
