//! Physically relocates a partition's data on a block device and patches the
//! partition table entry to match.

#[macro_use]
extern crate derive_new;
#[macro_use]
extern crate err_derive;
#[macro_use]
extern crate log;
extern crate table_codec;

mod eta;
mod patch;
mod slide;

pub use self::{eta::*, patch::*, slide::*};

const GIB: u64 = 1_073_741_824;

/// Defines the start and end sectors of a partition on the disk.
#[derive(new, Debug, Clone, Copy, PartialEq)]
pub struct BlockCoordinates {
    pub start: u64,
    pub end:   u64,
}

impl BlockCoordinates {
    pub fn sectors(&self) -> u64 { self.end - self.start }
}

/// Defines how many sectors to skip, how far the data moves, and how long
/// the moved span is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetCoordinates {
    pub skip:   u64,
    pub offset: i64,
    pub length: u64,
}

/// Contains the source coordinates of a partition and the start sector it is
/// moving to, along with the size in bytes of each sector.
#[derive(new, Debug, Clone, Copy)]
pub struct SlideOperation {
    pub sector_size: u64,
    pub old:         BlockCoordinates,
    pub new_start:   u64,
}

impl SlideOperation {
    /// Calculates the offsets between the two positions.
    ///
    /// A negative offset means that the partition is moving backwards.
    pub fn offset(&self) -> OffsetCoordinates {
        OffsetCoordinates {
            offset: self.new_start as i64 - self.old.start as i64,
            skip:   self.old.start,
            length: self.old.sectors(),
        }
    }

    pub fn is_noop(&self) -> bool { self.old.start == self.new_start }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_signed() {
        let op = SlideOperation::new(512, BlockCoordinates::new(2048, 206_848), 1024);
        assert_eq!(
            op.offset(),
            OffsetCoordinates { skip: 2048, offset: -1024, length: 204_800 }
        );
        assert!(!op.is_noop());

        let op = SlideOperation::new(512, BlockCoordinates::new(1024, 2048), 4096);
        assert_eq!(op.offset().offset, 3072);

        assert!(SlideOperation::new(512, BlockCoordinates::new(64, 128), 64).is_noop());
    }
}
