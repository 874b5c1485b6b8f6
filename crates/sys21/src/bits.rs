use std::ops::{Add, BitAnd, Bound, RangeBounds, Shl, Shr, Sub};

pub trait Bits<Index = Self>
where
    Self: Copy,
{
    fn bits(self, range: impl RangeBounds<Index>) -> Self;
    fn bit(self, index: Index) -> bool;
}

impl<T, Index> Bits<Index> for T
where
    T: BitAnd<Output = T>,
    T: Copy,
    T: Eq,
    T: From<u8>,
    T: Shl<Index, Output = T>,
    T: Shr<Index, Output = T>,
    T: Sub<Output = T>,
    Index: From<u8>,
    Index: Add<Output = Index>,
    Index: Sub<Output = Index>,
    Index: Copy,
{
    fn bits(self, range: impl RangeBounds<Index>) -> Self {
        let start = match range.start_bound() {
            Bound::Included(&start) => start,
            Bound::Excluded(&start) => start + Index::from(1),
            Bound::Unbounded => Index::from(0),
        };
        let end = match range.end_bound() {
            Bound::Included(&end) => end + Index::from(1),
            Bound::Excluded(&end) => end,
            Bound::Unbounded => Index::from(8 * std::mem::size_of::<T>() as u8),
        };
        let mask = (Self::from(1) << (end - start)) - Self::from(1);
        (self >> start) & mask
    }

    fn bit(self, index: Index) -> bool {
        self & (Self::from(1) << index) != Self::from(0)
    }
}

/// Point ROM words are 24 bits wide and signed.
pub trait SignExtend24 {
    fn sign_extend24(self) -> i32;
}

impl SignExtend24 for u32 {
    fn sign_extend24(self) -> i32 {
        ((self << 8) as i32) >> 8
    }
}

impl SignExtend24 for i32 {
    fn sign_extend24(self) -> i32 {
        (self as u32).sign_extend24()
    }
}
