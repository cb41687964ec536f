use crate::scheme::SchemeKind;
use partslide_layout::LayoutError;
use partslide_relocate::PatchError;
use std::{io, path::PathBuf};
use table_codec::TableError;

/// Defines the variety of errors that may arise from planning and running a
/// partition slide.
#[rustfmt::skip]
#[derive(Debug, Fail)]
pub enum SlideError {
    #[fail(display = "a slide operation is already in progress")]
    Busy,
    #[fail(display = "malformed partition table: {}", why)]
    Format { why: TableError },
    #[fail(display = "invalid layout: {}", why)]
    Layout { why: LayoutError },
    #[fail(display = "unable to read partition table on {:?}: {}", device, why)]
    TableRead { device: PathBuf, why: io::Error },
    #[fail(display = "partition slot {} extends beyond the declared end of the disk", slot)]
    PartitionOOB { slot: usize },
    #[fail(display = "partition slot {} was not found in the table snapshot", slot)]
    SlotNotFound { slot: usize },
    #[fail(display = "planned coordinates do not match the table snapshot for slot {}", slot)]
    StalePlan { slot: usize },
    #[fail(display = "relocated span would extend beyond the declared end of the disk")]
    SpanOOB,
    #[fail(display = "unable to patch partition table: {}", why)]
    Patch { why: PatchError },
    #[fail(display = "partition scheme {:?} is not supported for this operation", scheme)]
    UnsupportedScheme { scheme: SchemeKind },
    #[fail(display = "{}", why)]
    IO { why: io::Error },
}

impl From<io::Error> for SlideError {
    fn from(why: io::Error) -> SlideError { SlideError::IO { why } }
}

impl From<TableError> for SlideError {
    fn from(why: TableError) -> SlideError { SlideError::Format { why } }
}

impl From<LayoutError> for SlideError {
    fn from(why: LayoutError) -> SlideError { SlideError::Layout { why } }
}

impl From<PatchError> for SlideError {
    fn from(why: PatchError) -> SlideError { SlideError::Patch { why } }
}
