use crate::TableError;
use std::fmt;

/// Length in bytes of the sector holding the GPT header, at LBA 1.
pub const GPT_HEADER_LEN: usize = 512;

const GPT_SIGNATURE: &[u8; 8] = b"EFI PART";
const ENTRY_FIXED_LEN: usize = 56;

/// A 16-byte GUID as it appears on disk.
///
/// The wire format is mixed-endian: the first three fields are stored
/// little-endian while the last two are big-endian, and `Display` renders
/// the canonical form accordingly.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid([u8; 16]);

impl Guid {
    pub fn from_bytes(bytes: [u8; 16]) -> Guid { Guid(bytes) }

    pub fn as_bytes(&self) -> &[u8; 16] { &self.0 }

    pub fn is_zero(&self) -> bool { self.0.iter().all(|&byte| byte == 0) }

    /// A description for well-known partition type GUIDs, compared
    /// case-insensitively. Unmatched GUIDs yield `Unknown: <guid>`.
    pub fn type_description(&self) -> String {
        let canonical = self.to_string();
        for &(guid, description) in TYPE_GUIDS {
            if guid.eq_ignore_ascii_case(&canonical) {
                return description.to_owned();
            }
        }
        format!("Unknown: {}", canonical)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}{:02X}{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            b[3], b[2], b[1], b[0],
            b[5], b[4],
            b[7], b[6],
            b[8], b[9],
            b[10], b[11], b[12], b[13], b[14], b[15],
        )
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { fmt::Display::fmt(self, f) }
}

bitflags! {
    /// The attribute bits of a GPT partition entry that have assigned
    /// meanings. The remaining bits are preserved in `GptEntry::attributes`.
    pub struct GptAttributes: u64 {
        const REQUIRED_PARTITION   = 1;
        const NO_BLOCK_IO_PROTOCOL = 1 << 1;
        const LEGACY_BIOS_BOOTABLE = 1 << 2;
    }
}

/// The decoded GPT header from LBA 1. Read-only: this crate never encodes a
/// GPT structure back to bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct GptHeader {
    /// Specification revision, as (major, minor).
    pub revision:         (u16, u16),
    /// Declared size in bytes of the header structure.
    pub header_size:      u32,
    /// CRC32 of the header as stored on disk. Captured, not validated.
    pub header_crc32:     u32,
    /// LBA of this copy of the header.
    pub current_lba:      u64,
    /// LBA of the backup header at the end of the disk.
    pub backup_lba:       u64,
    /// First LBA usable for partitions.
    pub first_usable_lba: u64,
    /// Last LBA usable for partitions.
    pub last_usable_lba:  u64,
    /// GUID identifying the disk itself.
    pub disk_guid:        Guid,
    /// LBA where the partition entry array begins.
    pub entry_array_lba:  u64,
    /// Number of entries in the array.
    pub entry_count:      u32,
    /// Size in bytes of each entry.
    pub entry_size:       u32,
    /// CRC32 of the entry array as stored on disk. Captured, not validated.
    pub entry_array_crc32: u32,
}

impl GptHeader {
    /// Decodes the 512-byte header sector read from LBA 1.
    pub fn parse(raw: &[u8]) -> Result<GptHeader, TableError> {
        if raw.len() != GPT_HEADER_LEN {
            return Err(TableError::SectorLength { expected: GPT_HEADER_LEN, found: raw.len() });
        }

        if &raw[0..8] != GPT_SIGNATURE {
            return Err(TableError::GptSignature);
        }

        Ok(GptHeader {
            revision:          (read_u16(&raw[10..12]), read_u16(&raw[8..10])),
            header_size:       read_u32(&raw[12..16]),
            header_crc32:      read_u32(&raw[16..20]),
            current_lba:       read_u64(&raw[24..32]),
            backup_lba:        read_u64(&raw[32..40]),
            first_usable_lba:  read_u64(&raw[40..48]),
            last_usable_lba:   read_u64(&raw[48..56]),
            disk_guid:         read_guid(&raw[56..72]),
            entry_array_lba:   read_u64(&raw[72..80]),
            entry_count:       read_u32(&raw[80..84]),
            entry_size:        read_u32(&raw[84..88]),
            entry_array_crc32: read_u32(&raw[88..92]),
        })
    }

    /// Total byte length of the partition entry array this header declares.
    pub fn entry_array_len(&self) -> usize {
        self.entry_count as usize * self.entry_size as usize
    }
}

/// A decoded, non-empty GPT partition entry.
#[derive(Debug, Clone, PartialEq)]
pub struct GptEntry {
    /// Index of the entry within the array.
    pub index:       usize,
    /// GUID describing what the partition holds.
    pub type_guid:   Guid,
    /// GUID unique to this partition.
    pub unique_guid: Guid,
    /// First LBA of the partition.
    pub first_lba:   u64,
    /// Last LBA of the partition, inclusive.
    pub last_lba:    u64,
    /// The full 64-bit attribute field.
    pub attributes:  u64,
    /// Partition name, decoded from UTF-16LE with trailing NULs stripped.
    pub name:        String,
}

impl GptEntry {
    /// The assigned attribute bits, with undefined bits dropped.
    pub fn flags(&self) -> GptAttributes { GptAttributes::from_bits_truncate(self.attributes) }

    pub fn is_required(&self) -> bool {
        self.flags().contains(GptAttributes::REQUIRED_PARTITION)
    }

    pub fn no_block_io(&self) -> bool {
        self.flags().contains(GptAttributes::NO_BLOCK_IO_PROTOCOL)
    }

    pub fn legacy_bios_bootable(&self) -> bool {
        self.flags().contains(GptAttributes::LEGACY_BIOS_BOOTABLE)
    }

    /// A description of the partition type GUID.
    pub fn type_description(&self) -> String { self.type_guid.type_description() }

    /// Splits a raw entry array into fixed-size groups and decodes every
    /// group that is not entirely zero. The buffer length must equal
    /// `entry_size * entry_count` exactly.
    pub fn parse_array(
        raw: &[u8],
        entry_size: u32,
        entry_count: u32,
    ) -> Result<Vec<GptEntry>, TableError> {
        if (entry_size as usize) < ENTRY_FIXED_LEN {
            return Err(TableError::GptEntrySize { size: entry_size });
        }

        let expected = entry_size as usize * entry_count as usize;
        if raw.len() != expected {
            return Err(TableError::GptEntryArrayLength {
                found: raw.len(),
                count: entry_count,
                size:  entry_size,
            });
        }

        let mut entries = Vec::new();
        for (index, group) in raw.chunks(entry_size as usize).enumerate() {
            if group.iter().all(|&byte| byte == 0) {
                continue;
            }

            entries.push(GptEntry {
                index,
                type_guid: read_guid(&group[0..16]),
                unique_guid: read_guid(&group[16..32]),
                first_lba: read_u64(&group[32..40]),
                last_lba: read_u64(&group[40..48]),
                attributes: read_u64(&group[48..56]),
                name: decode_name(&group[ENTRY_FIXED_LEN..]),
            });
        }

        Ok(entries)
    }
}

fn read_u16(bytes: &[u8]) -> u16 { u16::from_le_bytes([bytes[0], bytes[1]]) }

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buffer = [0; 8];
    buffer.copy_from_slice(bytes);
    u64::from_le_bytes(buffer)
}

fn read_guid(bytes: &[u8]) -> Guid {
    let mut buffer = [0; 16];
    buffer.copy_from_slice(bytes);
    Guid::from_bytes(buffer)
}

fn decode_name(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes.chunks_exact(2).map(read_u16).collect();
    let trimmed = match units.iter().position(|&unit| unit == 0) {
        Some(end) => &units[..end],
        None => &units[..],
    };
    String::from_utf16_lossy(trimmed)
}

#[rustfmt::skip]
static TYPE_GUIDS: &[(&str, &str)] = &[
    ("00000000-0000-0000-0000-000000000000", "Unused entry"),
    ("024DEE41-33E7-11D3-9D69-0008C781F39F", "MBR partition scheme"),
    ("C12A7328-F81F-11D2-BA4B-00A0C93EC93B", "EFI System partition"),
    ("21686148-6449-6E6F-744E-656564454649", "BIOS boot partition"),
    ("D3BFE2DE-3DAF-11DF-BA40-E3A556D89593", "Intel Fast Flash (iFFS) partition (for Intel Rapid Start technology)"),
    ("F4019732-066E-4E12-8273-346C5641494F", "Sony boot partition"),
    ("BFBFAFE7-A34F-448A-9A5B-6213EB736C22", "Lenovo boot partition"),
    ("E3C9E316-0B5C-4DB8-817D-F92DF00215AE", "Microsoft Reserved Partition (MSR)"),
    ("EBD0A0A2-B9E5-4433-87C0-68B6B72699C7", "Basic data partition"),
    ("5808C8AA-7E8F-42E0-85D2-E1E90434CFB3", "Logical Disk Manager (LDM) metadata partition"),
    ("AF9B60A0-1431-4F62-BC68-3311714A69AD", "Windows Storage Spaces partition"),
    ("0FC63DAF-8483-4772-8E79-3D69D8477DE4", "Linux filesystem data"),
    ("A19D880F-05FC-4D3B-A006-743F0F84911E", "Linux RAID partition"),
    ("0657FD6D-A4AB-43C4-84E5-0933C84B4F4F", "Linux swap partition"),
    ("E6D6D379-F507-44C2-A23C-238F2A3DF928", "Linux Logical Volume Manager (LVM) partition"),
    ("933AC7E1-2EB4-4F13-B844-0E14E2AEF915", "Linux /home partition"),
    ("3B8F8425-20E0-4F3B-907F-1A25A76F98E8", "Linux /srv (server data) partition"),
    ("7FFEC5C9-2D00-49B7-8941-3EA10A5586B7", "Linux plain dm-crypt partition"),
    ("CA7D7CCB-63ED-4C53-861C-1742536059CC", "Linux LUKS partition"),
    ("8DA63339-0007-60C0-C436-083AC8230908", "Linux reserved"),
    ("A2A0D0EB-E5B9-3344-87C0-68B6B72699C7", "FreeBSD disklabel"),
    ("516E7CB4-6ECF-11D6-8FF8-00022D09712B", "FreeBSD boot partition"),
    ("516E7CB5-6ECF-11D6-8FF8-00022D09712B", "FreeBSD data partition"),
    ("516E7CB6-6ECF-11D6-8FF8-00022D09712B", "FreeBSD swap partition"),
    ("516E7CB8-6ECF-11D6-8FF8-00022D09712B", "FreeBSD UFS partition"),
    ("516E7CB7-6ECF-11D6-8FF8-00022D09712B", "FreeBSD ZFS partition"),
    ("516E7CBA-6ECF-11D6-8FF8-00022D09712B", "FreeBSD Vinum volume manager partition"),
    ("48465300-0000-11AA-AA11-00306543ECAC", "Apple HFS+ partition"),
    ("55465300-0000-11AA-AA11-00306543ECAC", "Apple UFS partition"),
    ("6A898CC3-1DD2-11B2-99A6-080020736631", "Apple ZFS partition"),
    ("52414944-0000-11AA-AA11-00306543ECAC", "Apple RAID partition"),
    ("52414944-5F4F-11AA-AA11-00306543ECAC", "Apple RAID offline partition"),
    ("426F6F74-0000-11AA-AA11-00306543ECAC", "Apple Boot partition"),
    ("4C616265-6C00-11AA-AA11-00306543ECAC", "Apple Label partition"),
    ("5265636F-7665-11AA-AA11-00306543ECAC", "Apple TV Recovery partition"),
    ("53746F72-6167-11AA-AA11-00306543ECAC", "Apple Core Storage (i.e. Lion FileVault) partition"),
    ("6A82CB45-1DD2-11B2-99A6-080020736631", "Solaris boot partition"),
    ("6A85CF4D-1DD2-11B2-99A6-080020736631", "Solaris root partition"),
    ("6A87C46F-1DD2-11B2-99A6-080020736631", "Solaris /usr partition"),
    ("6A8B642B-1DD2-11B2-99A6-080020736631", "Solaris swap partition"),
    ("6A8D2AC7-1DD2-11B2-99A6-080020736631", "Solaris backup partition"),
    ("6A8EF2E9-1DD2-11B2-99A6-080020736631", "Solaris /home partition"),
    ("6A90BA39-1DD2-11B2-99A6-080020736631", "Solaris alternate sector"),
    ("6A9283A5-1DD2-11B2-99A6-080020736631", "Solaris reserved partition"),
    ("6A945A3B-1DD2-11B2-99A6-080020736631", "Solaris root pool"),
    ("6A9630D1-1DD2-11B2-99A6-080020736631", "Solaris boot pool"),
    ("49F48D32-B10E-11DC-B99B-0019D1879648", "NetBSD swap partition"),
    ("49F48D5A-B10E-11DC-B99B-0019D1879648", "NetBSD FFS partition"),
    ("49F48D82-B10E-11DC-B99B-0019D1879648", "NetBSD LFS partition"),
    ("49F48DAA-B10E-11DC-B99B-0019D1879648", "NetBSD RAID partition"),
    ("49F48DD2-B10E-11DC-B99B-0019D1879648", "NetBSD Concatenated partition"),
    ("2DB519C4-B10F-11DC-B99B-0019D1879648", "NetBSD encrypted partition"),
    ("FE3A2A5D-4F32-41A7-B725-ACCC3285A309", "VMware VMFS partition"),
    ("AA31E02A-400F-11DB-9590-000C2911D1B8", "VMware reserved partition"),
    ("9D275380-40AD-11DB-BF97-000C2911D1B8", "VMware kcore crash partition"),
    ("11D2F81B-FD4F-459B-9ADB-9091ED7E593F", "XenServer Linux partition"),
    ("5B193300-FC78-40CD-8002-E86C45580B47", "Microsoft Basic Data partition"),
    ("0376FF8D-D1A5-11E3-8E7D-001B21B9EADD", "Ceph OSD partition"),
    ("45B0969E-9B03-4F30-B4C6-5EC00CEFF106", "Ceph disk in creation"),
    ("4FBD7E29-9D25-41B8-AFD0-062C0CEFF05D", "Ceph journal"),
    ("89C57F98-2FE5-4DC0-89C1-F3AD0CEFF2BE", "Ceph crypt"),
    ("FB3AABF9-D6F9-46D8-9F9D-D6A4E56C5E36", "Ceph block"),
    ("CAFECAFE-9B03-4F30-B4C6-5EC00CEFF106", "Ceph block DB"),
    ("30D3B3C4-9B03-4F30-B4C6-5EC00CEFF106", "Ceph block write-ahead log"),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn guid_bytes(canonical: &str) -> [u8; 16] {
        // Builds the on-disk byte order from the canonical rendering.
        let hex: Vec<u8> = canonical
            .chars()
            .filter(|c| *c != '-')
            .collect::<Vec<_>>()
            .chunks(2)
            .map(|pair| {
                u8::from_str_radix(&pair.iter().collect::<String>(), 16).unwrap()
            })
            .collect();

        let mut wire = [0; 16];
        for (i, &swap) in [3, 2, 1, 0, 5, 4, 7, 6].iter().enumerate() {
            wire[i] = hex[swap];
        }
        wire[8..].copy_from_slice(&hex[8..]);
        wire
    }

    fn header_sector() -> Vec<u8> {
        let mut raw = vec![0; GPT_HEADER_LEN];
        raw[0..8].copy_from_slice(b"EFI PART");
        raw[8..12].copy_from_slice(&[0x00, 0x00, 0x01, 0x00]); // revision 1.0
        raw[12..16].copy_from_slice(&92u32.to_le_bytes());
        raw[16..20].copy_from_slice(&0xaabbccddu32.to_le_bytes());
        raw[24..32].copy_from_slice(&1u64.to_le_bytes());
        raw[32..40].copy_from_slice(&204_799u64.to_le_bytes());
        raw[40..48].copy_from_slice(&34u64.to_le_bytes());
        raw[48..56].copy_from_slice(&204_766u64.to_le_bytes());
        raw[56..72].copy_from_slice(&guid_bytes("0FC63DAF-8483-4772-8E79-3D69D8477DE4"));
        raw[72..80].copy_from_slice(&2u64.to_le_bytes());
        raw[80..84].copy_from_slice(&128u32.to_le_bytes());
        raw[84..88].copy_from_slice(&128u32.to_le_bytes());
        raw[88..92].copy_from_slice(&0x11223344u32.to_le_bytes());
        raw
    }

    #[test]
    fn header_fields_decode() {
        let header = GptHeader::parse(&header_sector()).unwrap();

        assert_eq!(header.revision, (1, 0));
        assert_eq!(header.header_size, 92);
        assert_eq!(header.current_lba, 1);
        assert_eq!(header.backup_lba, 204_799);
        assert_eq!(header.first_usable_lba, 34);
        assert_eq!(header.last_usable_lba, 204_766);
        assert_eq!(header.disk_guid.to_string(), "0FC63DAF-8483-4772-8E79-3D69D8477DE4");
        assert_eq!(header.entry_array_lba, 2);
        assert_eq!(header.entry_count, 128);
        assert_eq!(header.entry_size, 128);
        assert_eq!(header.entry_array_len(), 128 * 128);
    }

    #[test]
    fn header_rejects_bad_signature() {
        let mut raw = header_sector();
        raw[0] = b'X';
        assert_eq!(GptHeader::parse(&raw), Err(TableError::GptSignature));
    }

    #[test]
    fn header_rejects_short_sector() {
        assert_eq!(
            GptHeader::parse(&[0; 100]),
            Err(TableError::SectorLength { expected: 512, found: 100 })
        );
    }

    fn entry_bytes(type_guid: &str, first: u64, last: u64, attributes: u64, name: &str) -> Vec<u8> {
        let mut raw = vec![0; 128];
        raw[0..16].copy_from_slice(&guid_bytes(type_guid));
        raw[16..32].copy_from_slice(&guid_bytes("11111111-2222-3333-4455-667788990011"));
        raw[32..40].copy_from_slice(&first.to_le_bytes());
        raw[40..48].copy_from_slice(&last.to_le_bytes());
        raw[48..56].copy_from_slice(&attributes.to_le_bytes());
        for (i, unit) in name.encode_utf16().enumerate() {
            raw[56 + i * 2..58 + i * 2].copy_from_slice(&unit.to_le_bytes());
        }
        raw
    }

    #[test]
    fn entry_array_skips_zero_groups() {
        let mut raw = entry_bytes(
            "C12A7328-F81F-11D2-BA4B-00A0C93EC93B",
            2048,
            206_847,
            0b101,
            "EFI system",
        );
        raw.extend_from_slice(&[0; 128]);
        raw.extend_from_slice(&entry_bytes(
            "0FC63DAF-8483-4772-8E79-3D69D8477DE4",
            206_848,
            411_647,
            0,
            "root",
        ));
        raw.extend_from_slice(&[0; 128]);

        let entries = GptEntry::parse_array(&raw, 128, 4).unwrap();
        assert_eq!(entries.len(), 2);

        let esp = &entries[0];
        assert_eq!(esp.index, 0);
        assert_eq!(esp.type_description(), "EFI System partition");
        assert_eq!(esp.first_lba, 2048);
        assert_eq!(esp.last_lba, 206_847);
        assert!(esp.is_required());
        assert!(!esp.no_block_io());
        assert!(esp.legacy_bios_bootable());
        assert_eq!(esp.name, "EFI system");

        let root = &entries[1];
        assert_eq!(root.index, 2);
        assert_eq!(root.name, "root");
        assert!(!root.is_required());
    }

    #[test]
    fn entry_array_length_must_match() {
        assert_eq!(
            GptEntry::parse_array(&[0; 100], 128, 4),
            Err(TableError::GptEntryArrayLength { found: 100, count: 4, size: 128 })
        );
        assert_eq!(
            GptEntry::parse_array(&[0; 40], 40, 1),
            Err(TableError::GptEntrySize { size: 40 })
        );
    }

    #[test]
    fn guid_descriptions_match_case_insensitively() {
        let guid = Guid::from_bytes(guid_bytes("ebd0a0a2-b9e5-4433-87c0-68b6b72699c7"));
        assert_eq!(guid.type_description(), "Basic data partition");

        let unknown = Guid::from_bytes(guid_bytes("12345678-9ABC-DEF0-1234-56789ABCDEF0"));
        assert_eq!(
            unknown.type_description(),
            "Unknown: 12345678-9ABC-DEF0-1234-56789ABCDEF0"
        );
    }
}
