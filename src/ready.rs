use std::{fmt, ops};

/// A set of readiness flags reported for one pollable fd.
///
/// Wire values are fixed: `READABLE = 1`, `WRITABLE = 2`, `ERROR = 4`,
/// `HANGUP = 8`, `INVALID = 16`. Only `readable`/`writable` are guaranteed
/// to be meaningful on every backend; `error`/`hangup`/`invalid` are hints
/// from the kernel.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ready(usize);

const READABLE: usize = 0b0_0001;
const WRITABLE: usize = 0b0_0010;
const ERROR: usize = 0b0_0100;
const HANGUP: usize = 0b0_1000;
const INVALID: usize = 0b1_0000;

impl Ready {
    #[inline]
    pub fn empty() -> Ready {
        Ready(0)
    }

    #[inline]
    pub fn readable() -> Ready {
        Ready(READABLE)
    }

    #[inline]
    pub fn writable() -> Ready {
        Ready(WRITABLE)
    }

    #[inline]
    pub fn error() -> Ready {
        Ready(ERROR)
    }

    #[inline]
    pub fn hup() -> Ready {
        Ready(HANGUP)
    }

    #[inline]
    pub fn invalid() -> Ready {
        Ready(INVALID)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self == Ready::empty()
    }

    #[inline]
    pub fn is_readable(self) -> bool {
        self.contains(Ready::readable())
    }

    #[inline]
    pub fn is_writable(self) -> bool {
        self.contains(Ready::writable())
    }

    #[inline]
    pub fn is_error(self) -> bool {
        self.contains(Ready::error())
    }

    #[inline]
    pub fn is_hup(self) -> bool {
        self.contains(Ready::hup())
    }

    #[inline]
    pub fn is_invalid(self) -> bool {
        self.contains(Ready::invalid())
    }

    #[inline]
    pub fn contains(self, other: Ready) -> bool {
        (self & other) == other
    }

    #[inline]
    pub fn insert(&mut self, other: Ready) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: Ready) {
        self.0 &= !other.0;
    }

    #[inline]
    pub fn as_usize(self) -> usize {
        self.0
    }

    #[inline]
    pub fn from_usize(bits: usize) -> Ready {
        Ready(bits)
    }
}

impl ops::BitOr for Ready {
    type Output = Ready;

    #[inline]
    fn bitor(self, other: Ready) -> Ready {
        Ready(self.0 | other.0)
    }
}

impl ops::BitOrAssign for Ready {
    #[inline]
    fn bitor_assign(&mut self, other: Ready) {
        self.0 |= other.0;
    }
}

impl ops::BitAnd for Ready {
    type Output = Ready;

    #[inline]
    fn bitand(self, other: Ready) -> Ready {
        Ready(self.0 & other.0)
    }
}

impl ops::Sub for Ready {
    type Output = Ready;

    #[inline]
    fn sub(self, other: Ready) -> Ready {
        Ready(self.0 & !other.0)
    }
}

impl fmt::Debug for Ready {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let mut one = false;
        let flags = [
            (Ready::readable(), "Readable"),
            (Ready::writable(), "Writable"),
            (Ready::error(), "Error"),
            (Ready::hup(), "Hup"),
            (Ready::invalid(), "Invalid"),
        ];

        for &(flag, msg) in &flags {
            if self.contains(flag) {
                if one {
                    write!(fmt, " | ")?
                }
                write!(fmt, "{}", msg)?;
                one = true;
            }
        }

        if !one {
            write!(fmt, "(empty)")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Ready;

    #[test]
    fn bitwise_ops() {
        let rw = Ready::readable() | Ready::writable();
        assert!(rw.is_readable());
        assert!(rw.is_writable());
        assert!(!rw.is_error());

        let r_only = rw - Ready::writable();
        assert!(r_only.is_readable());
        assert!(!r_only.is_writable());
    }

    #[test]
    fn wire_values() {
        assert_eq!(Ready::readable().as_usize(), 1);
        assert_eq!(Ready::writable().as_usize(), 2);
        assert_eq!(Ready::error().as_usize(), 4);
        assert_eq!(Ready::hup().as_usize(), 8);
        assert_eq!(Ready::invalid().as_usize(), 16);
    }
}
