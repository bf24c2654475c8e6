//! Collision results.
//!
//! | bit  | meaning |
//! |------|---------|
//! | 0x01 | left    |
//! | 0x02 | down    |
//! | 0x04 | right   |
//! | 0x08 | up      |
//! | 0x40 | hit     |

use bitflags::bitflags;

bitflags! {
    /// Side(s) the other object sticks out towards.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Direction: u8 {
        const LEFT = 1;
        const DOWN = 2;
        const RIGHT = 4;
        const UP = 8;
    }
}

impl Direction {
    /// The same relation seen from the other object.
    #[must_use]
    pub const fn mirrored(self) -> Self {
        let mut out = Self::empty();
        if self.contains(Self::LEFT) {
            out = out.union(Self::RIGHT);
        }
        if self.contains(Self::RIGHT) {
            out = out.union(Self::LEFT);
        }
        if self.contains(Self::UP) {
            out = out.union(Self::DOWN);
        }
        if self.contains(Self::DOWN) {
            out = out.union(Self::UP);
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Collision {
    #[default]
    None,
    Hit(Direction),
}

impl Collision {
    pub const HIT_BIT: u8 = 0x40;

    #[must_use]
    pub const fn is_hit(self) -> bool {
        matches!(self, Self::Hit(_))
    }

    /// Packed form: 0, or the hit bit plus direction bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Hit(dir) => Self::HIT_BIT | dir.bits(),
        }
    }

    #[must_use]
    pub const fn direction(self) -> Direction {
        match self {
            Self::None => Direction::empty(),
            Self::Hit(dir) => dir,
        }
    }

    /// Merges two results, accumulating directions.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        match (self, other) {
            (Self::None, x) | (x, Self::None) => x,
            (Self::Hit(a), Self::Hit(b)) => Self::Hit(a.union(b)),
        }
    }
}

/// Axis-aligned box with exclusive right and bottom edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    #[must_use]
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            left: x,
            top: y,
            right: x + w,
            bottom: y + h,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    /// Touching edges do not overlap.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        !(other.right <= self.left
            || other.left >= self.right
            || other.bottom <= self.top
            || other.top >= self.bottom)
    }

    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let b = Self {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        };
        (!b.is_empty()).then_some(b)
    }

    /// Where `other` sticks out relative to `self`.
    ///
    /// An axis gets a bit only when `other` exceeds `self` on one side and
    /// not on the other, so swapping the arguments mirrors the result.
    #[must_use]
    pub const fn direction_of(&self, other: &Self) -> Direction {
        let mut dir = Direction::empty();
        if other.left < self.left && other.right < self.right {
            dir = dir.union(Direction::LEFT);
        }
        if other.right > self.right && other.left > self.left {
            dir = dir.union(Direction::RIGHT);
        }
        if other.top < self.top && other.bottom < self.bottom {
            dir = dir.union(Direction::UP);
        }
        if other.bottom > self.bottom && other.top > self.top {
            dir = dir.union(Direction::DOWN);
        }
        dir
    }
}
