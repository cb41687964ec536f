use crate::errors::SlideError;
use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};
use table_codec::{GptEntry, GptHeader, Mbr, GPT_HEADER_LEN, MBR_LEN};

/// Identity of a block device as supplied by the enumeration collaborator.
/// Immutable once loaded for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskHandle {
    /// The location in the file system where the block device is located.
    pub path:        PathBuf,
    /// The size of sectors on the disk, in bytes.
    pub sector_size: u64,
    /// The size of the disk in sectors.
    pub sectors:     u64,
}

impl DiskHandle {
    pub fn new<P: Into<PathBuf>>(path: P, sector_size: u64, sectors: u64) -> DiskHandle {
        DiskHandle { path: path.into(), sector_size, sectors }
    }

    /// The total capacity of the disk in bytes.
    pub fn bytes(&self) -> u64 { self.sectors * self.sector_size }
}

/// Specifies whether the partition table on the disk is **MBR** or **GPT**.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum SchemeKind {
    Mbr,
    Gpt,
}

/// A decoded partition table, tagged by scheme. Operations that mutate the
/// disk match on the tag exhaustively, so the unsupported GPT write path is
/// a visible variant rather than a string comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Table {
    Mbr(Mbr),
    Gpt { header: GptHeader, entries: Vec<GptEntry> },
}

impl Table {
    pub fn scheme(&self) -> SchemeKind {
        match *self {
            Table::Mbr(_) => SchemeKind::Mbr,
            Table::Gpt { .. } => SchemeKind::Gpt,
        }
    }
}

/// Determines which partitioning scheme the disk carries, by probing for a
/// protective MBR entry or an EFI signature at LBA 1. Anything else is
/// treated as MBR.
pub fn detect_scheme(handle: &DiskHandle) -> Result<SchemeKind, SlideError> {
    let mut disk = open(handle)?;

    let boot = read_sector(&mut disk, handle, 0, MBR_LEN)?;
    for slot in 0..table_codec::TABLE_SLOTS {
        if boot[table_codec::TABLE_OFFSET + slot * table_codec::ENTRY_LEN + 4] == 0xEE {
            return Ok(SchemeKind::Gpt);
        }
    }

    // Some disks carry a GPT without a protective entry; the header
    // signature at LBA 1 is authoritative for those.
    let mut header = [0; 8];
    let probed = disk
        .seek(SeekFrom::Start(handle.sector_size))
        .and_then(|_| disk.read_exact(&mut header));
    if probed.is_ok() && &header == b"EFI PART" {
        return Ok(SchemeKind::Gpt);
    }

    Ok(SchemeKind::Mbr)
}

/// Loads and decodes the partition table from the disk.
///
/// Every decoded MBR record is validated against the declared sector count
/// of the disk; a partition reaching past the end fails the load.
pub fn load_table(handle: &DiskHandle) -> Result<Table, SlideError> {
    info!("loading partition table from {}", handle.path.display());

    let scheme = detect_scheme(handle)?;
    let mut disk = open(handle)?;

    match scheme {
        SchemeKind::Mbr => {
            let boot = read_sector(&mut disk, handle, 0, MBR_LEN)?;
            let mbr = Mbr::parse(&boot)?;

            for record in mbr.records() {
                if !record.fits(handle.sectors) {
                    return Err(SlideError::PartitionOOB { slot: record.slot });
                }
            }

            Ok(Table::Mbr(mbr))
        }
        SchemeKind::Gpt => {
            let raw = read_sector(&mut disk, handle, handle.sector_size, GPT_HEADER_LEN)?;
            let header = GptHeader::parse(&raw)?;

            let array = read_sector(
                &mut disk,
                handle,
                header.entry_array_lba * handle.sector_size,
                header.entry_array_len(),
            )?;
            let entries = GptEntry::parse_array(&array, header.entry_size, header.entry_count)?;

            Ok(Table::Gpt { header, entries })
        }
    }
}

fn open(handle: &DiskHandle) -> Result<File, SlideError> {
    File::open(&handle.path)
        .map_err(|why| SlideError::TableRead { device: handle.path.clone(), why })
}

fn read_sector(
    disk: &mut File,
    handle: &DiskHandle,
    offset: u64,
    len: usize,
) -> Result<Vec<u8>, SlideError> {
    let mut buffer = vec![0; len];
    disk.seek(SeekFrom::Start(offset))
        .and_then(|_| disk.read_exact(&mut buffer))
        .map_err(|why| SlideError::TableRead { device: handle.path.clone(), why })?;
    Ok(buffer)
}

/// Convenience for callers which operate on disk images rather than live
/// block devices: derives the sector count from the file length.
pub fn image_handle<P: AsRef<Path>>(path: P, sector_size: u64) -> io::Result<DiskHandle> {
    let len = std::fs::metadata(&path)?.len();
    Ok(DiskHandle::new(path.as_ref(), sector_size, len / sector_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use table_codec::{ENTRY_LEN, TABLE_OFFSET};
    use tempdir::TempDir;

    fn mbr_image(entries: &[(u8, u32, u32)]) -> Vec<u8> {
        let mut raw = vec![0; MBR_LEN];
        for (slot, &(kind, start, sectors)) in entries.iter().enumerate() {
            let offset = TABLE_OFFSET + slot * ENTRY_LEN;
            raw[offset + 4] = kind;
            raw[offset + 8..offset + 12].copy_from_slice(&start.to_le_bytes());
            raw[offset + 12..offset + 16].copy_from_slice(&sectors.to_le_bytes());
        }
        raw[510] = 0x55;
        raw[511] = 0xaa;
        raw
    }

    fn write_image(dir: &TempDir, raw: &[u8], pad_to: usize) -> DiskHandle {
        let path = dir.path().join("disk.img");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(raw).unwrap();
        file.write_all(&vec![0; pad_to - raw.len()]).unwrap();
        DiskHandle::new(path, 512, (pad_to / 512) as u64)
    }

    #[test]
    fn plain_mbr_loads_as_mbr() {
        let dir = TempDir::new("scheme").unwrap();
        let handle = write_image(&dir, &mbr_image(&[(0x83, 64, 128)]), 512 * 256);

        assert_eq!(detect_scheme(&handle).unwrap(), SchemeKind::Mbr);
        match load_table(&handle).unwrap() {
            Table::Mbr(mbr) => assert_eq!(mbr.records().len(), 1),
            table => panic!("expected MBR, detected {:?}", table.scheme()),
        }
    }

    #[test]
    fn protective_entry_detects_gpt() {
        let dir = TempDir::new("scheme").unwrap();
        let handle = write_image(&dir, &mbr_image(&[(0xEE, 1, 255)]), 512 * 256);

        assert_eq!(detect_scheme(&handle).unwrap(), SchemeKind::Gpt);
    }

    #[test]
    fn partitions_must_fit_the_declared_sector_count() {
        let dir = TempDir::new("scheme").unwrap();
        let handle = write_image(&dir, &mbr_image(&[(0x83, 64, 1_000_000)]), 512 * 256);

        match load_table(&handle) {
            Err(SlideError::PartitionOOB { slot: 0 }) => (),
            other => panic!("expected PartitionOOB, got {:?}", other.map(|t| t.scheme())),
        }
    }

    #[test]
    fn image_handles_derive_their_geometry() {
        let dir = TempDir::new("scheme").unwrap();
        let handle = write_image(&dir, &mbr_image(&[]), 512 * 64);

        let derived = image_handle(&handle.path, 512).unwrap();
        assert_eq!(derived.sectors, 64);
        assert_eq!(derived.bytes(), 512 * 64);
    }
}
