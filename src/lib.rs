//! A crate for inspecting the partition layout of a block device and
//! sliding a partition's data to a new starting sector.
//!
//! The pieces fit together in the order a caller uses them: [`load_table`]
//! decodes the on-disk structures into a [`Table`], the layout model turns a
//! requested reposition into a collision-free one, and a [`Slider`] runs the
//! background job that copies the data and patches the table entry.

extern crate dirs;
extern crate failure;
#[macro_use]
extern crate failure_derive;
extern crate fern;
#[macro_use]
extern crate log;

mod errors;
mod logging;
mod scheme;
mod slider;

pub use crate::{errors::*, logging::log, scheme::*, slider::*};

pub use partslide_layout::{Layout, LayoutError, MoveRequest, Region};
pub use partslide_relocate::{
    BlockCoordinates, Eta, OffsetCoordinates, PatchError, SlideOperation, SlideProgress,
};
pub use table_codec::{
    decode_le, encode_le, to_hex, GptAttributes, GptEntry, GptHeader, Guid, Mbr,
    PartitionRecord, TableError,
};

/// Builds a layout model from a parsed table, labelling each region the way
/// the table describes it. MBR regions are labelled by their type
/// description, GPT regions by their partition name.
pub fn layout_from_table(table: &Table, handle: &DiskHandle) -> Result<Layout, SlideError> {
    let regions = match table {
        Table::Mbr(mbr) => mbr
            .records()
            .iter()
            .map(|record| {
                Region::new(
                    u64::from(record.start_lba),
                    record.end_lba(),
                    record.type_description(),
                )
            })
            .collect(),
        Table::Gpt { entries, .. } => entries
            .iter()
            .map(|entry| Region::new(entry.first_lba, entry.last_lba + 1, entry.name.clone()))
            .collect(),
    };

    Layout::new(0, handle.sectors, regions).map_err(|why| SlideError::Layout { why })
}
