use core::fmt;

/// A cog-relative address: `0x000..0x1FF` is COG RAM, `0x200..0x3FF` is LUT
/// RAM, `0x400..` reads through to the hub in cog-exec mode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct CogAddr(u32);

/// A hub-absolute byte address, `0..HUB_MEM_BYTES`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct HubAddr(u32);

macro_rules! addr_impl {
    ($ty:ident) => {
        impl $ty {
            /// Construct from a raw value.
            pub const fn new(value: u32) -> Self {
                Self(value)
            }

            /// The raw value.
            pub const fn value(self) -> u32 {
                self.0
            }
        }

        impl From<u32> for $ty {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }

        impl From<$ty> for u32 {
            fn from(addr: $ty) -> Self {
                addr.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "${:05X}", self.0)
            }
        }
    };
}

addr_impl!(CogAddr);
addr_impl!(HubAddr);
