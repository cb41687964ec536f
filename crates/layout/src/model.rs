use crate::{LayoutError, Region};

/// How the caller expresses a requested reposition of the selected region.
///
/// All three forms hold the region's size constant; `Offset` is measured
/// from the region's original position, not its current one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveRequest {
    Start(u64),
    End(u64),
    Offset(i64),
}

/// The authoritative set of regions for one disk, together with an immutable
/// snapshot of their original positions and the selection state.
///
/// Only one region may be displaced from its original position at a time:
/// selecting a different region than the last-moved one snaps the previous
/// region back to where it came from.
#[derive(Debug, Clone)]
pub struct Layout {
    disk_start: u64,
    disk_end:   u64,
    regions:    Vec<Region>,
    original:   Vec<Region>,
    selected:   Option<usize>,
    last_moved: Option<usize>,
}

impl Layout {
    /// Builds a layout from the parsed regions of a disk. The regions must
    /// be pairwise non-overlapping and lie within `[disk_start, disk_end)`;
    /// the same invariant is upheld by every later move proposal.
    pub fn new(disk_start: u64, disk_end: u64, regions: Vec<Region>) -> Result<Layout, LayoutError> {
        if disk_end <= disk_start {
            return Err(LayoutError::EmptyDisk);
        }

        for (index, region) in regions.iter().enumerate() {
            if region.start < disk_start || region.end > disk_end || region.end <= region.start {
                return Err(LayoutError::OutOfBounds { label: region.label.clone() });
            }

            for other in &regions[..index] {
                if other.overlaps(region.start, region.end) {
                    return Err(LayoutError::Overlap {
                        first:  other.label.clone(),
                        second: region.label.clone(),
                    });
                }
            }
        }

        Ok(Layout {
            disk_start,
            disk_end,
            original: regions.clone(),
            regions,
            selected: None,
            last_moved: None,
        })
    }

    pub fn disk_bounds(&self) -> (u64, u64) { (self.disk_start, self.disk_end) }

    pub fn regions(&self) -> &[Region] { &self.regions }

    /// The original (untouched) position of the region at `index`, as
    /// captured when the layout was built.
    pub fn original(&self, index: usize) -> Option<&Region> { self.original.get(index) }

    pub fn selected(&self) -> Option<usize> { self.selected }

    pub fn selected_region(&self) -> Option<&Region> {
        self.selected.and_then(|index| self.regions.get(index))
    }

    /// Signed sector displacement of the selected region from its original
    /// position.
    pub fn displacement(&self) -> Option<i64> {
        self.selected.map(|index| {
            self.regions[index].start as i64 - self.original[index].start as i64
        })
    }

    /// Selects the first region with the given label. Returns the selected
    /// index, or `None` after deselecting when no label matches.
    pub fn select_by_label(&mut self, label: &str) -> Option<usize> {
        match self.regions.iter().position(|region| region.label == label) {
            Some(index) => {
                self.snap_back_except(index);
                self.selected = Some(index);
                Some(index)
            }
            None => {
                self.selected = None;
                None
            }
        }
    }

    /// Selects the region at the given index directly. Out-of-range indexes
    /// deselect, like a miss on the other selectors.
    pub fn select(&mut self, index: usize) -> Option<usize> {
        if index < self.regions.len() {
            self.snap_back_except(index);
            self.selected = Some(index);
            Some(index)
        } else {
            self.selected = None;
            None
        }
    }

    /// Selects the region under the given position, expressed as a fraction
    /// of the disk span in `[0, 1]`. A position over empty space deselects.
    pub fn select_at(&mut self, fraction: f64) -> Option<usize> {
        let span = (self.disk_end - self.disk_start) as f64;
        let sector = self.disk_start + (span * fraction.max(0.0).min(1.0)) as u64;

        match self.regions.iter().position(|region| region.contains(sector)) {
            Some(index) => {
                self.snap_back_except(index);
                self.selected = Some(index);
                Some(index)
            }
            None => {
                self.selected = None;
                None
            }
        }
    }

    pub fn deselect(&mut self) { self.selected = None; }

    /// Resolves a requested reposition of the selected region into a legal
    /// position and applies it, returning the resolved region.
    ///
    /// The size of the region never changes. The candidate position is
    /// clamped to the disk bounds and then resolved against the other
    /// regions in a single pass, in scan order:
    ///
    /// - moving left into a neighbor snaps flush against the neighbor's
    ///   right edge, unless the request reaches past the neighbor and the
    ///   gap on its far side is large enough, in which case the region lands
    ///   flush against the neighbor's far edge instead;
    /// - moving right is symmetric;
    /// - when no legal position satisfies the request, the region reverts to
    ///   its last confirmed position.
    ///
    /// The far-gap preference is policy, not contract: ties between several
    /// candidate gaps are broken by neighbor scan order.
    pub fn propose_move(&mut self, request: MoveRequest) -> Result<Region, LayoutError> {
        let index = self.selected.ok_or(LayoutError::NoSelection)?;

        let size = self.original[index].sectors() as i64;
        let current = self.regions[index].clone();
        let disk_start = self.disk_start as i64;
        let disk_end = self.disk_end as i64;

        // The unclamped request stands in for the pointer position when
        // deciding whether to search past a blocking neighbor.
        let requested_point = match request {
            MoveRequest::Start(start) => start as i64,
            MoveRequest::End(end) => end as i64,
            MoveRequest::Offset(offset) => self.original[index].start as i64 + offset,
        };

        let mut new_start = match request {
            MoveRequest::Start(start) => start as i64,
            MoveRequest::End(end) => end as i64 - size,
            MoveRequest::Offset(offset) => self.original[index].start as i64 + offset,
        };

        new_start = clamp(new_start, disk_start, disk_end - size);
        let direction = new_start - current.start as i64;

        for (i, other) in self.regions.iter().enumerate() {
            if i == index || !other.overlaps(new_start as u64, (new_start + size) as u64) {
                continue;
            }

            let (other_start, other_end) = (other.start as i64, other.end as i64);

            if direction < 0 {
                new_start = other_end;
                if requested_point < other_start {
                    // The request reaches past this neighbor; take the gap
                    // on its left when the whole region fits there.
                    let mut available_start = disk_start;
                    for (j, check) in self.regions.iter().enumerate() {
                        if j != index && j != i && (check.end as i64) <= other_start {
                            available_start = available_start.max(check.end as i64);
                        }
                    }
                    if other_start - available_start >= size {
                        new_start = other_start - size;
                    }
                }
            } else if direction > 0 {
                new_start = other_start - size;
                if requested_point > other_end {
                    let mut available_end = disk_end;
                    for (j, check) in self.regions.iter().enumerate() {
                        if j != index && j != i && (check.start as i64) >= other_end {
                            available_end = available_end.min(check.start as i64);
                        }
                    }
                    if available_end - other_end >= size {
                        new_start = other_end;
                    }
                }
            } else {
                new_start = current.start as i64;
            }

            break;
        }

        new_start = clamp(new_start, disk_start, disk_end - size);
        let new_end = new_start + size;

        // A resolution that still collides means no open gap satisfied the
        // request; the region keeps its last confirmed position.
        let collides = self.regions.iter().enumerate().any(|(i, other)| {
            i != index && other.overlaps(new_start as u64, new_end as u64)
        });

        let resolved = if collides {
            current
        } else {
            Region::new(new_start as u64, new_end as u64, current.label)
        };

        debug!(
            "move of '{}' requested as {:?} resolved to [{}, {})",
            resolved.label, request, resolved.start, resolved.end
        );

        self.regions[index] = resolved.clone();
        self.last_moved = Some(index);
        Ok(resolved)
    }

    /// Snaps the last-moved region back to its original position when a
    /// different region takes the selection.
    fn snap_back_except(&mut self, keep: usize) {
        if let Some(moved) = self.last_moved {
            if moved != keep {
                self.regions[moved] = self.original[moved].clone();
                self.last_moved = None;
            }
        }
    }
}

fn clamp(value: i64, min: i64, max: i64) -> i64 { value.max(min).min(max) }
