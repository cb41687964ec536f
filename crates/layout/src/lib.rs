//! The in-memory model of a disk's partition layout: a set of sector
//! intervals with a selection, and the collision-resolving logic that turns
//! a requested reposition into a legal one.

#[macro_use]
extern crate err_derive;
#[macro_use]
extern crate log;

mod model;
mod region;

pub use self::{model::*, region::*};

/// A possible error when constructing or manipulating a layout.
#[derive(Debug, Error, PartialEq)]
pub enum LayoutError {
    #[error(display = "disk bounds are empty")]
    EmptyDisk,
    #[error(display = "region '{}' lies outside the disk bounds", label)]
    OutOfBounds { label: String },
    #[error(display = "regions '{}' and '{}' overlap", first, second)]
    Overlap { first: String, second: String },
    #[error(display = "no region is selected")]
    NoSelection,
}
