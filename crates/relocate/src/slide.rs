use super::{Eta, OffsetCoordinates, GIB};
use std::{
    fs::OpenOptions,
    io::{self, Read, Seek, SeekFrom, Write},
    path::Path,
    time::Instant,
};

/// A snapshot of how far a slide has come, emitted after every chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlideProgress {
    /// Completed share of the slide, 0-100.
    pub percent: i32,
    /// Estimated remaining time at the mean throughput so far.
    pub eta:     Eta,
}

/// Performs direct reads & writes on the disk to shift a partition's data
/// either to the left or right, using the supplied offset coordinates to
/// determine where the data is, and where it should be.
///
/// Chunks are copied in an order that is safe when the source and
/// destination ranges overlap: moving towards a lower offset walks the span
/// low-to-high, moving towards a higher offset walks it high-to-low. Every
/// chunk is flushed before the next one starts, so an interruption leaves
/// only fully flushed chunks behind.
pub fn slide_partition<P: AsRef<Path>, F: FnMut(SlideProgress)>(
    path: P,
    coords: OffsetCoordinates,
    bs: u64,
    progress: F,
) -> io::Result<()> {
    // The largest multiple of the sector size that fits within a gibibyte.
    let chunk = bs * (GIB / bs);
    slide_in_chunks(path, coords, bs, chunk, progress)
}

fn slide_in_chunks<P: AsRef<Path>, F: FnMut(SlideProgress)>(
    path: P,
    coords: OffsetCoordinates,
    bs: u64,
    chunk: u64,
    mut progress: F,
) -> io::Result<()> {
    info!(
        "sliding partition on {} with {} sector size: {{ skip: {}; offset: {}; length: {} }}",
        path.as_ref().display(),
        bs,
        coords.skip,
        coords.offset,
        coords.length
    );

    if coords.offset == 0 {
        debug!("no displacement; nothing to do");
        return Ok(());
    }

    let total = coords.length * bs;
    let source = coords.skip * bs;
    let dest = (coords.skip as i64 + coords.offset) as u64 * bs;

    let mut disk = OpenOptions::new().read(true).write(true).open(&path)?;
    let mut buffer = vec![0; chunk.min(total) as usize];
    let started = Instant::now();

    let mut copy_chunk = |disk: &mut std::fs::File, at: u64, len: u64| -> io::Result<()> {
        let buffer = &mut buffer[..len as usize];
        disk.seek(SeekFrom::Start(source + at))?;
        disk.read_exact(buffer)?;
        disk.seek(SeekFrom::Start(dest + at))?;
        disk.write_all(buffer)?;
        disk.sync_data()
    };

    let mut report = |done: u64| {
        progress(SlideProgress {
            percent: ((done * 100) / total) as i32,
            eta:     Eta::estimate(done, total, started.elapsed()),
        });
    };

    if coords.offset < 0 {
        // Moving backwards: the destination window never re-enters a source
        // region that has not been read yet, so walk low-to-high.
        let mut at = 0;
        while at < total {
            let len = chunk.min(total - at);
            copy_chunk(&mut disk, at, len)?;
            at += len;
            report(at);
        }
    } else {
        // Moving forwards: walk high-to-low for the symmetric reason.
        let mut end = total;
        while end > 0 {
            let at = end.saturating_sub(chunk);
            copy_chunk(&mut disk, at, end - at)?;
            report(total - at);
            end = at;
        }
    }

    disk.sync_all()?;

    // Completion always reads as fully done, whatever the last chunk said.
    progress(SlideProgress { percent: 100, eta: Eta::zero() });
    Ok(())
}
