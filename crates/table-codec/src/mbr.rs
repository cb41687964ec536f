use crate::TableError;

/// Length in bytes of the boot sector holding the MBR.
pub const MBR_LEN: usize = 512;
/// Byte offset of the four-slot partition table within the boot sector.
pub const TABLE_OFFSET: usize = 446;
/// Length in bytes of a single partition table slot.
pub const ENTRY_LEN: usize = 16;
/// Number of primary slots in the table.
pub const TABLE_SLOTS: usize = 4;

const SIGNATURE_OFFSET: usize = 510;
const DISK_SIGNATURE: std::ops::Range<usize> = 440..446;

/// A decoded primary partition slot from the MBR.
///
/// Records are produced fresh on every parse and never mutated in place; a
/// relocated partition is re-encoded into a new sector image instead.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionRecord {
    /// Which of the four table slots this record was read from.
    pub slot:       usize,
    /// Set when the boot flag byte was 0x80.
    pub bootable:   bool,
    /// Raw CHS address of the first sector. Decorative; LBA is authoritative.
    pub chs_start:  [u8; 3],
    /// The one-byte partition type code.
    pub type_code:  u8,
    /// Raw CHS address of the last sector.
    pub chs_end:    [u8; 3],
    /// First sector of the partition, as an offset from the disk start.
    pub start_lba:  u32,
    /// Total number of sectors in the partition.
    pub sectors:    u32,
}

impl PartitionRecord {
    /// The first sector past the end of the partition.
    pub fn end_lba(&self) -> u64 { u64::from(self.start_lba) + u64::from(self.sectors) }

    /// A human-readable description of the partition type code.
    pub fn type_description(&self) -> &'static str { type_description(self.type_code) }

    /// True if the partition lies entirely within a disk of `sectors` sectors.
    pub fn fits(&self, sectors: u64) -> bool { self.end_lba() <= sectors }

    fn parse(slot: usize, entry: &[u8]) -> Result<Option<PartitionRecord>, TableError> {
        if entry.iter().all(|&byte| byte == 0) {
            return Ok(None);
        }

        match entry[0] {
            0x00 | 0x80 => (),
            flag => return Err(TableError::BootFlag { slot, flag }),
        }

        let mut chs_start = [0; 3];
        chs_start.copy_from_slice(&entry[1..4]);
        let mut chs_end = [0; 3];
        chs_end.copy_from_slice(&entry[5..8]);

        Ok(Some(PartitionRecord {
            slot,
            bootable: entry[0] == 0x80,
            chs_start,
            type_code: entry[4],
            chs_end,
            start_lba: u32::from_le_bytes([entry[8], entry[9], entry[10], entry[11]]),
            sectors: u32::from_le_bytes([entry[12], entry[13], entry[14], entry[15]]),
        }))
    }
}

/// A parsed Master Boot Record: the full sector image plus the decoded
/// records for every non-empty slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Mbr {
    raw:     [u8; MBR_LEN],
    records: Vec<PartitionRecord>,
}

impl Mbr {
    /// Decodes a boot sector. The input must be exactly 512 bytes, and every
    /// non-empty slot must carry a legal boot flag (0x00 or 0x80); any other
    /// flag byte fails the whole table, not just the slot.
    pub fn parse(raw: &[u8]) -> Result<Mbr, TableError> {
        if raw.len() != MBR_LEN {
            return Err(TableError::SectorLength { expected: MBR_LEN, found: raw.len() });
        }

        let mut records = Vec::with_capacity(TABLE_SLOTS);
        for slot in 0..TABLE_SLOTS {
            let offset = TABLE_OFFSET + slot * ENTRY_LEN;
            if let Some(record) = PartitionRecord::parse(slot, &raw[offset..offset + ENTRY_LEN])? {
                records.push(record);
            }
        }

        let mut sector = [0; MBR_LEN];
        sector.copy_from_slice(raw);

        Ok(Mbr { raw: sector, records })
    }

    /// The full 512-byte sector image this table was parsed from.
    pub fn sector(&self) -> &[u8; MBR_LEN] { &self.raw }

    /// The six bytes preceding the partition table, holding the disk
    /// signature and its trailing reserved pair.
    pub fn disk_signature(&self) -> &[u8] { &self.raw[DISK_SIGNATURE] }

    /// The raw 64-byte partition table region.
    pub fn table_bytes(&self) -> &[u8] { &self.raw[TABLE_OFFSET..SIGNATURE_OFFSET] }

    /// The two-byte boot signature at the end of the sector.
    pub fn boot_signature(&self) -> [u8; 2] { [self.raw[510], self.raw[511]] }

    /// Whether the boot signature carries the conventional 0x55AA marker.
    /// Informational; an absent marker does not fail the parse.
    pub fn has_boot_signature(&self) -> bool { self.boot_signature() == [0x55, 0xaa] }

    /// The decoded records for every non-empty slot, in slot order.
    pub fn records(&self) -> &[PartitionRecord] { &self.records }

    /// Looks up the record occupying the given table slot.
    pub fn record(&self, slot: usize) -> Option<&PartitionRecord> {
        self.records.iter().find(|record| record.slot == slot)
    }

    /// Re-encodes the starting-LBA field of the given slot, returning a new
    /// table with the updated sector image. The four bytes are overwritten at
    /// the slot's exact offset within the image, so no other byte of the
    /// sector can be affected.
    pub fn with_start_lba(&self, slot: usize, new_start: u32) -> Result<Mbr, TableError> {
        if slot >= TABLE_SLOTS {
            return Err(TableError::SlotOutOfRange { slot });
        }
        if self.record(slot).is_none() {
            return Err(TableError::EmptySlot { slot });
        }

        let mut raw = self.raw;
        let offset = TABLE_OFFSET + slot * ENTRY_LEN + 8;
        raw[offset..offset + 4].copy_from_slice(&new_start.to_le_bytes());

        Mbr::parse(&raw)
    }
}

/// Maps an MBR partition type code to a description. Codes missing from the
/// table map to a literal "Unknown" rather than failing the parse.
pub fn type_description(code: u8) -> &'static str {
    for &(known, description) in TYPE_DESCRIPTIONS {
        if known == code {
            return description;
        }
    }
    "Unknown"
}

#[rustfmt::skip]
static TYPE_DESCRIPTIONS: &[(u8, &str)] = &[
    (0x00, "Empty or Unused"),
    (0x01, "FAT12"),
    (0x02, "XENIX root"),
    (0x03, "XENIX usr"),
    (0x04, "FAT16 (Small)"),
    (0x05, "Extended Partition"),
    (0x06, "FAT16"),
    (0x07, "NTFS / HPFS / exFAT"),
    (0x08, "AIX bootable"),
    (0x09, "AIX data"),
    (0x0A, "OS/2 Boot Manager"),
    (0x0B, "FAT32 (CHS)"),
    (0x0C, "FAT32 (LBA)"),
    (0x0E, "FAT16 (LBA)"),
    (0x0F, "Extended Partition (LBA)"),
    (0x10, "OPUS"),
    (0x11, "Hidden FAT12"),
    (0x12, "Compaq diagnostics"),
    (0x14, "FAT16 (LBA)"),
    (0x16, "Hidden FAT16"),
    (0x17, "Hidden NTFS"),
    (0x1B, "Hidden FAT32"),
    (0x1C, "Hidden FAT32 (LBA)"),
    (0x1E, "Hidden FAT16 (LBA)"),
    (0x24, "NEC DOS"),
    (0x27, "Hidden NTFS WinRE"),
    (0x39, "Plan 9"),
    (0x3C, "PartitionMagic recovery"),
    (0x40, "Venix 80286"),
    (0x41, "Linux/MINIX"),
    (0x42, "Linux Swap"),
    (0x43, "Linux Ext2/Ext3 (Old format)"),
    (0x44, "Linux Ext2/Ext3 (New format)"),
    (0x4D, "QNX4.x"),
    (0x4E, "QNX4.x 2nd part"),
    (0x4F, "QNX4.x 3rd part"),
    (0x52, "CP/M"),
    (0x63, "GNU HURD or SysV"),
    (0x64, "Novell Netware 286"),
    (0x65, "Novell Netware 386"),
    (0x75, "PC/IX"),
    (0x80, "Old MINIX"),
    (0x81, "MINIX"),
    (0x82, "Linux swap"),
    (0x83, "Linux ext FS"),
    (0x84, "Linux swap / Solaris"),
    (0x85, "Linux extended"),
    (0x86, "NTFS volume set"),
    (0x87, "NTFS volume set (striped)"),
    (0x88, "Linux plaintext"),
    (0x8E, "Linux LVM"),
    (0x93, "Amoeba"),
    (0x9F, "BSD/OS"),
    (0xA0, "IBM Thinkpad hidden"),
    (0xA5, "FreeBSD"),
    (0xA6, "OpenBSD"),
    (0xA7, "NeXTSTEP"),
    (0xA8, "Mac OS X"),
    (0xA9, "NetBSD"),
    (0xAB, "Mac OS X boot"),
    (0xAF, "Mac OS X HFS+"),
    (0xB1, "QNX Neutrino"),
    (0xB7, "BSDI"),
    (0xB8, "Boot Manager"),
    (0xBE, "Solaris Boot Partition"),
    (0xBF, "Solaris / OpenIndiana"),
    (0xC0, "NTFS Boot Partition"),
    (0xC1, "FreeBSD boot"),
    (0xC4, "TrueCrypt volume"),
    (0xC7, "Windows 7 recovery"),
    (0xD1, "OpenBSD bootstrap"),
    (0xD3, "GParted"),
    (0xD5, "FreeBSD UFS2"),
    (0xD6, "Solaris (x86) partition"),
    (0xD7, "OpenBSD partition"),
    (0xE1, "Linux RAID"),
    (0xE2, "Linux LVM2"),
    (0xE3, "Linux EVMS"),
    (0xE4, "MS-DOS 6.0"),
    (0xE5, "OpenDOS"),
    (0xE6, "OS/2 Boot Manager"),
    (0xE7, "Non-OS/2 Boot Manager"),
    (0xEB, "FAT16 (LBA) (exFAT)"),
    (0xEC, "Windows 98 SE"),
    (0xEE, "GPT Protective"),
    (0xEF, "EFI System Partition"),
    (0xF0, "Microsoft Reserved"),
    (0xF2, "Linux Swap (used by newer Linux versions)"),
    (0xF4, "Microsoft Windows recovery partition"),
    (0xF6, "HPFS/NTFS"),
    (0xF7, "HPFS/NTFS (Boot)"),
    (0xF8, "OEM proprietary"),
    (0xF9, "BSD"),
    (0xFB, "VMware VMFS"),
    (0xFC, "VMware swap"),
    (0xFD, "Linux RAID autodetect"),
    (0xFF, "XENIX bad block table"),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(boot: u8, kind: u8, start: u32, sectors: u32) -> [u8; ENTRY_LEN] {
        let mut slot = [0; ENTRY_LEN];
        slot[0] = boot;
        slot[1..4].copy_from_slice(&[1, 1, 0]);
        slot[4] = kind;
        slot[5..8].copy_from_slice(&[254, 255, 255]);
        slot[8..12].copy_from_slice(&start.to_le_bytes());
        slot[12..16].copy_from_slice(&sectors.to_le_bytes());
        slot
    }

    fn image(entries: &[[u8; ENTRY_LEN]]) -> Vec<u8> {
        let mut raw = vec![0; MBR_LEN];
        raw[440..444].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        for (slot, bytes) in entries.iter().enumerate() {
            let offset = TABLE_OFFSET + slot * ENTRY_LEN;
            raw[offset..offset + ENTRY_LEN].copy_from_slice(bytes);
        }
        raw[510] = 0x55;
        raw[511] = 0xaa;
        raw
    }

    #[test]
    fn parse_requires_full_sector() {
        assert_eq!(
            Mbr::parse(&[0; 511]),
            Err(TableError::SectorLength { expected: 512, found: 511 })
        );
        assert_eq!(
            Mbr::parse(&vec![0; 513]),
            Err(TableError::SectorLength { expected: 512, found: 513 })
        );
    }

    #[test]
    fn parse_skips_empty_slots() {
        let raw = image(&[entry(0x80, 0x83, 2048, 100_000)]);
        let mbr = Mbr::parse(&raw).unwrap();

        assert_eq!(mbr.records().len(), 1);
        let record = &mbr.records()[0];
        assert_eq!(record.slot, 0);
        assert!(record.bootable);
        assert_eq!(record.start_lba, 2048);
        assert_eq!(record.sectors, 100_000);
        assert_eq!(record.end_lba(), 102_048);
        assert_eq!(record.type_description(), "Linux ext FS");
    }

    #[test]
    fn parse_returns_every_populated_slot() {
        let raw = image(&[
            entry(0x80, 0x07, 2048, 4096),
            entry(0x00, 0x83, 8192, 4096),
            [0; ENTRY_LEN],
            entry(0x00, 0x82, 16384, 2048),
        ]);
        let mbr = Mbr::parse(&raw).unwrap();

        let slots: Vec<usize> = mbr.records().iter().map(|record| record.slot).collect();
        assert_eq!(slots, vec![0, 1, 3]);
        assert!(mbr.record(2).is_none());
    }

    #[test]
    fn illegal_boot_flag_fails_the_whole_table() {
        let raw = image(&[entry(0x80, 0x83, 2048, 4096), entry(0x42, 0x83, 8192, 4096)]);
        assert_eq!(Mbr::parse(&raw), Err(TableError::BootFlag { slot: 1, flag: 0x42 }));
    }

    #[test]
    fn accessors_expose_sector_regions() {
        let raw = image(&[entry(0x00, 0x0c, 64, 128)]);
        let mbr = Mbr::parse(&raw).unwrap();

        assert_eq!(mbr.disk_signature(), &[0xde, 0xad, 0xbe, 0xef, 0, 0]);
        assert_eq!(mbr.table_bytes().len(), 64);
        assert_eq!(mbr.boot_signature(), [0x55, 0xaa]);
        assert!(mbr.has_boot_signature());
    }

    #[test]
    fn patch_rewrites_only_the_start_lba() {
        let raw = image(&[entry(0x80, 0x83, 2048, 100_000)]);
        let mbr = Mbr::parse(&raw).unwrap();

        let patched = mbr.with_start_lba(0, 1024).unwrap();
        let record = patched.record(0).unwrap();
        assert_eq!(record.start_lba, 1024);
        assert_eq!(record.sectors, 100_000);
        assert_eq!(record.type_code, 0x83);
        assert!(record.bootable);

        // Nothing outside the four-byte LBA field may change.
        for (offset, (old, new)) in mbr.sector().iter().zip(patched.sector().iter()).enumerate() {
            if !(TABLE_OFFSET + 8..TABLE_OFFSET + 12).contains(&offset) {
                assert_eq!(old, new, "byte {} changed", offset);
            }
        }
    }

    #[test]
    fn patch_rejects_absent_slots() {
        let raw = image(&[entry(0x00, 0x83, 2048, 4096)]);
        let mbr = Mbr::parse(&raw).unwrap();

        assert_eq!(mbr.with_start_lba(2, 1024), Err(TableError::EmptySlot { slot: 2 }));
        assert_eq!(mbr.with_start_lba(4, 1024), Err(TableError::SlotOutOfRange { slot: 4 }));
    }

    #[test]
    fn unknown_type_codes_do_not_fail() {
        assert_eq!(type_description(0x7f), "Unknown");
        assert_eq!(type_description(0xee), "GPT Protective");
    }
}
