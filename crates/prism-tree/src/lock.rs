//! Hierarchical lock and selection policy.
//!
//! A lock on a top-level object forbids selection and mutation at its own
//! granularity and every finer one. Coarser operations stay allowed: a
//! volume locked at [`LockLevel::Faces`] can still be picked and moved whole.

/// Lock level stored on top-level objects, ordered from least to most
/// restrictive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockLevel {
    /// Nothing locked.
    #[default]
    None,
    /// Points locked.
    Points,
    /// Points and edges locked.
    Edges,
    /// Points, edges and faces locked.
    Faces,
    /// Everything locked.
    Volume,
}

impl LockLevel {
    /// Numeric code used by the record format.
    pub fn code(self) -> u8 {
        match self {
            LockLevel::None => 0,
            LockLevel::Points => 1,
            LockLevel::Edges => 2,
            LockLevel::Faces => 3,
            LockLevel::Volume => 4,
        }
    }

    /// Inverse of [`LockLevel::code`].
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(LockLevel::None),
            1 => Some(LockLevel::Points),
            2 => Some(LockLevel::Edges),
            3 => Some(LockLevel::Faces),
            4 => Some(LockLevel::Volume),
            _ => None,
        }
    }
}

/// Granularity of a requested selection or mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Granularity {
    /// A single point.
    Point,
    /// An edge.
    Edge,
    /// A face.
    Face,
    /// A whole volume.
    Volume,
}

impl Granularity {
    /// The least restrictive lock level that forbids this granularity.
    fn blocking_level(self) -> LockLevel {
        match self {
            Granularity::Point => LockLevel::Points,
            Granularity::Edge => LockLevel::Edges,
            Granularity::Face => LockLevel::Faces,
            Granularity::Volume => LockLevel::Volume,
        }
    }
}

/// Decide whether an operation at `granularity` is allowed under `lock`.
pub fn allows(lock: LockLevel, granularity: Granularity) -> bool {
    lock < granularity.blocking_level()
}
