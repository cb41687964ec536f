use std::{
    fs::OpenOptions,
    io::{self, Read, Seek, SeekFrom, Write},
    path::Path,
};
use table_codec::{Mbr, TableError, MBR_LEN};

/// A possible error when patching the partition table after a slide.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error(display = "partition table on the device no longer matches the planning snapshot")]
    SnapshotMismatch,
    #[error(display = "unable to re-encode the table entry: {}", why)]
    Table { why: TableError },
    #[error(display = "unable to rewrite the boot sector: {}", why)]
    Io { why: io::Error },
}

impl From<io::Error> for PatchError {
    fn from(why: io::Error) -> PatchError { PatchError::Io { why } }
}

impl From<TableError> for PatchError {
    fn from(why: TableError) -> PatchError { PatchError::Table { why } }
}

/// Rewrites the starting-LBA field of one partition table slot and writes
/// the resulting sector back to offset 0 of the device.
///
/// The sector currently on the device must still byte-match the snapshot
/// that the slide was planned from; if anything else touched the table in
/// the meantime, nothing is written. The patched slot is overwritten at its
/// exact byte offset within the sector image, so no other bytes can be
/// affected even when another slot happens to hold identical content.
pub fn patch_start_lba<P: AsRef<Path>>(
    path: P,
    snapshot: &Mbr,
    slot: usize,
    new_start: u32,
) -> Result<Mbr, PatchError> {
    info!(
        "patching partition slot {} on {} to start at sector {}",
        slot,
        path.as_ref().display(),
        new_start
    );

    let mut disk = OpenOptions::new().read(true).write(true).open(&path)?;

    let mut current = [0; MBR_LEN];
    disk.seek(SeekFrom::Start(0))?;
    disk.read_exact(&mut current)?;

    if current[..] != snapshot.sector()[..] {
        return Err(PatchError::SnapshotMismatch);
    }

    let patched = snapshot.with_start_lba(slot, new_start)?;

    disk.seek(SeekFrom::Start(0))?;
    disk.write_all(patched.sector())?;
    disk.sync_all()?;

    Ok(patched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use table_codec::TABLE_OFFSET;
    use tempdir::TempDir;

    fn mbr_image(start: u32, sectors: u32) -> Vec<u8> {
        let mut raw = vec![0; MBR_LEN];
        let entry = TABLE_OFFSET;
        raw[entry] = 0x80;
        raw[entry + 4] = 0x83;
        raw[entry + 8..entry + 12].copy_from_slice(&start.to_le_bytes());
        raw[entry + 12..entry + 16].copy_from_slice(&sectors.to_le_bytes());
        raw[510] = 0x55;
        raw[511] = 0xaa;
        raw
    }

    fn write_image(dir: &TempDir, raw: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join("disk.img");
        let mut file = File::create(&path).unwrap();
        file.write_all(raw).unwrap();
        // Room for the partition data past the boot sector.
        file.write_all(&vec![0; MBR_LEN * 7]).unwrap();
        path
    }

    #[test]
    fn patches_the_requested_slot() {
        let dir = TempDir::new("patch").unwrap();
        let raw = mbr_image(2048, 100_000);
        let path = write_image(&dir, &raw);
        let snapshot = Mbr::parse(&raw).unwrap();

        let patched = patch_start_lba(&path, &snapshot, 0, 1024).unwrap();
        assert_eq!(patched.record(0).unwrap().start_lba, 1024);

        let on_disk = Mbr::parse(&fs::read(&path).unwrap()[..MBR_LEN]).unwrap();
        assert_eq!(on_disk, patched);
        let record = on_disk.record(0).unwrap();
        assert_eq!(record.start_lba, 1024);
        assert_eq!(record.sectors, 100_000);
    }

    #[test]
    fn stale_snapshot_writes_nothing() {
        let dir = TempDir::new("patch").unwrap();
        let raw = mbr_image(2048, 100_000);
        let path = write_image(&dir, &raw);

        // A snapshot from a different parse pass than the device contents.
        let stale = Mbr::parse(&mbr_image(4096, 100_000)).unwrap();

        let before = fs::read(&path).unwrap();
        match patch_start_lba(&path, &stale, 0, 1024) {
            Err(PatchError::SnapshotMismatch) => (),
            other => panic!("expected SnapshotMismatch, got {:?}", other),
        }
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn empty_slot_is_rejected_without_writing() {
        let dir = TempDir::new("patch").unwrap();
        let raw = mbr_image(2048, 100_000);
        let path = write_image(&dir, &raw);
        let snapshot = Mbr::parse(&raw).unwrap();

        let before = fs::read(&path).unwrap();
        match patch_start_lba(&path, &snapshot, 3, 1024) {
            Err(PatchError::Table { why: TableError::EmptySlot { slot: 3 } }) => (),
            other => panic!("expected EmptySlot, got {:?}", other),
        }
        assert_eq!(fs::read(&path).unwrap(), before);
    }
}
