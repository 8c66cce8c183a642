//! Transform direction and planner flags.
//!
//! Both carry the integer values of the FFTW ABI and are handed to the raw
//! planning layer unchanged.

use core::fmt;
use core::ops::{BitOr, BitOrAssign};

/// Sign of the exponent in the transform kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Inverse,
}

impl Direction {
    pub const FORWARD_SIGN: i32 = -1;
    pub const INVERSE_SIGN: i32 = 1;

    pub fn sign(self) -> i32 {
        match self {
            Direction::Forward => Self::FORWARD_SIGN,
            Direction::Inverse => Self::INVERSE_SIGN,
        }
    }

    pub fn from_sign(sign: i32) -> Option<Self> {
        match sign {
            Self::FORWARD_SIGN => Some(Direction::Forward),
            Self::INVERSE_SIGN => Some(Direction::Inverse),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Inverse => "inverse",
        }
    }
}

/// Planner flag bitmask.
///
/// `MEASURE` is the empty set, so `Flags::default()` measures. `ESTIMATE`
/// is the only strategy guaranteed never to touch the bound arrays while
/// planning.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(u32);

impl Flags {
    pub const MEASURE: Flags = Flags(0);
    pub const DESTROY_INPUT: Flags = Flags(1);
    pub const UNALIGNED: Flags = Flags(1 << 1);
    pub const CONSERVE_MEMORY: Flags = Flags(1 << 2);
    pub const EXHAUSTIVE: Flags = Flags(1 << 3);
    pub const PRESERVE_INPUT: Flags = Flags(1 << 4);
    pub const PATIENT: Flags = Flags(1 << 5);
    pub const ESTIMATE: Flags = Flags(1 << 6);
    pub const WISDOM_ONLY: Flags = Flags(1 << 21);

    const NAMED: [(&'static str, Flags); 8] = [
        ("DESTROY_INPUT", Flags::DESTROY_INPUT),
        ("UNALIGNED", Flags::UNALIGNED),
        ("CONSERVE_MEMORY", Flags::CONSERVE_MEMORY),
        ("EXHAUSTIVE", Flags::EXHAUSTIVE),
        ("PRESERVE_INPUT", Flags::PRESERVE_INPUT),
        ("PATIENT", Flags::PATIENT),
        ("ESTIMATE", Flags::ESTIMATE),
        ("WISDOM_ONLY", Flags::WISDOM_ONLY),
    ];

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Keep every bit, including ones this crate does not interpret.
    pub const fn from_bits_retain(bits: u32) -> Self {
        Flags(bits)
    }

    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Flags {
    type Output = Flags;
    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return f.write_str("MEASURE");
        }
        let mut rest = self.0;
        let mut first = true;
        for (name, flag) in Self::NAMED {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                rest &= !flag.0;
                first = false;
            }
        }
        if rest != 0 {
            if !first {
                f.write_str(" | ")?;
            }
            write!(f, "{rest:#x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abi_values() {
        assert_eq!(Direction::Forward.sign(), -1);
        assert_eq!(Direction::Inverse.sign(), 1);
        assert_eq!(Direction::from_sign(0), None);
        assert_eq!(Flags::ESTIMATE.bits(), 64);
        assert_eq!(Flags::WISDOM_ONLY.bits(), 1 << 21);
        assert_eq!(Flags::default(), Flags::MEASURE);
    }

    #[test]
    fn flags_combine_and_print() {
        let flags = Flags::ESTIMATE | Flags::PRESERVE_INPUT;
        assert!(flags.contains(Flags::ESTIMATE));
        assert!(!flags.contains(Flags::PATIENT));
        assert_eq!(format!("{flags:?}"), "PRESERVE_INPUT | ESTIMATE");
        assert_eq!(format!("{:?}", Flags::from_bits_retain(1 << 30)), "0x40000000");
        assert_eq!(format!("{:?}", Flags::MEASURE), "MEASURE");
    }
}
