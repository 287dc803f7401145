use core::fmt::{self, Debug};

/// An untyped register value.
///
/// Every register of a register file stores one [`UntypedVal`]. The value does
/// not know its type: instructions decide how to interpret its bits.
///
/// # Note
///
/// 32-bit values are stored zero-extended and read back by truncation, so
/// reading an `i32` out of a register written as `u32` (or vice versa) yields
/// the same bits.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct UntypedVal {
    bits: u64,
}

impl Debug for UntypedVal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "UntypedVal({:#x})", self.bits)
    }
}

impl UntypedVal {
    /// Creates an [`UntypedVal`] from its raw bits.
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self { bits }
    }

    /// Returns the raw bits of the [`UntypedVal`].
    #[inline]
    pub const fn to_bits(self) -> u64 {
        self.bits
    }

    /// Returns `true` if the low 32 bits are non-zero.
    #[inline]
    pub fn is_nez32(self) -> bool {
        u32::from(self) != 0
    }
}

macro_rules! impl_from_untyped_for_int {
    ( $( $int:ty ),* $(,)? ) => {
        $(
            impl From<UntypedVal> for $int {
                #[inline]
                fn from(value: UntypedVal) -> Self {
                    value.to_bits() as _
                }
            }
        )*
    };
}
impl_from_untyped_for_int!(i32, u32, i64, u64);

impl From<UntypedVal> for bool {
    #[inline]
    fn from(value: UntypedVal) -> Self {
        value.to_bits() != 0
    }
}

impl From<u32> for UntypedVal {
    #[inline]
    fn from(value: u32) -> Self {
        Self::from_bits(u64::from(value))
    }
}

impl From<i32> for UntypedVal {
    #[inline]
    fn from(value: i32) -> Self {
        Self::from(value as u32)
    }
}

impl From<u64> for UntypedVal {
    #[inline]
    fn from(value: u64) -> Self {
        Self::from_bits(value)
    }
}

impl From<i64> for UntypedVal {
    #[inline]
    fn from(value: i64) -> Self {
        Self::from_bits(value as u64)
    }
}

impl From<bool> for UntypedVal {
    #[inline]
    fn from(value: bool) -> Self {
        Self::from_bits(u64::from(value))
    }
}

/// Instruction semantics shared by all dispatch strategies.
///
/// Keeping them in one place is what makes register results bit-identical
/// regardless of how instructions are dispatched.
impl UntypedVal {
    /// Executes `i32.add` with wrapping semantics.
    #[inline]
    pub fn i32_add(lhs: Self, rhs: Self) -> Self {
        u32::from(lhs).wrapping_add(u32::from(rhs)).into()
    }

    /// Executes `i32.sub` with wrapping semantics.
    #[inline]
    pub fn i32_sub(lhs: Self, rhs: Self) -> Self {
        u32::from(lhs).wrapping_sub(u32::from(rhs)).into()
    }

    /// Executes `i32.mul` with wrapping semantics.
    #[inline]
    pub fn i32_mul(lhs: Self, rhs: Self) -> Self {
        u32::from(lhs).wrapping_mul(u32::from(rhs)).into()
    }

    /// Executes `i32.eq`.
    #[inline]
    pub fn i32_eq(lhs: Self, rhs: Self) -> Self {
        (u32::from(lhs) == u32::from(rhs)).into()
    }

    /// Executes `i32.lt_u`.
    #[inline]
    pub fn i32_lt_u(lhs: Self, rhs: Self) -> Self {
        (u32::from(lhs) < u32::from(rhs)).into()
    }

    /// Computes `imm + value` modulo 2^32.
    #[inline]
    pub fn i32_add_imm(value: Self, imm: u32) -> Self {
        imm.wrapping_add(u32::from(value)).into()
    }

    /// Computes `value <u imm` as `1` or `0`.
    #[inline]
    pub fn i32_lt_u_imm(value: Self, imm: u32) -> Self {
        (u32::from(value) < imm).into()
    }
}
