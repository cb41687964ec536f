//! Parsing and encoding of the on-disk structures that describe partition
//! tables: the 512-byte Master Boot Record, and the GPT header with its
//! partition entry array. Everything in this crate is a pure transformation
//! of caller-supplied byte buffers; no I/O happens here.

#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate err_derive;

mod gpt;
mod hex;
mod mbr;

pub use self::{gpt::*, hex::*, mbr::*};

/// A possible error when decoding or re-encoding a partition table structure.
///
/// Any of these is fatal to the parse that raised it: no partial result is
/// returned, and the caller must not continue processing the table.
#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error(display = "expected a {}-byte sector, found {} bytes", expected, found)]
    SectorLength { expected: usize, found: usize },
    #[error(display = "partition slot {} has illegal boot flag {:#04x}", slot, flag)]
    BootFlag { slot: usize, flag: u8 },
    #[error(display = "partition slot {} is out of range", slot)]
    SlotOutOfRange { slot: usize },
    #[error(display = "partition slot {} is empty", slot)]
    EmptySlot { slot: usize },
    #[error(display = "'{}' is not a hexadecimal byte string", input)]
    InvalidHex { input: String },
    #[error(display = "hex value '{}' exceeds 64 bits", input)]
    HexOverflow { input: String },
    #[error(display = "GPT header signature was not 'EFI PART'")]
    GptSignature,
    #[error(display = "GPT entry size {} is smaller than the fixed entry fields", size)]
    GptEntrySize { size: u32 },
    #[error(
        display = "GPT entry array was {} bytes, expected {} entries of {} bytes",
        found,
        count,
        size
    )]
    GptEntryArrayLength { found: usize, count: u32, size: u32 },
}
