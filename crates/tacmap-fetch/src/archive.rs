//! Single-entry extraction from an uncompressed, block-aligned archive.
//!
//! The container is the classic tar layout: every entry is a 512-byte header
//! (NUL-padded name, octal size) followed by its data padded to the next block
//! boundary. Extraction walks headers sequentially and stops at the first
//! name match, so the cost is proportional to the entries before the match.

use crate::ArchiveError;

/// Archive block size; headers and data are aligned to it.
pub const BLOCK_SIZE: usize = 512;

const NAME_RANGE: std::ops::Range<usize> = 0..100;
const SIZE_RANGE: std::ops::Range<usize> = 124..136;
const TYPEFLAG_OFFSET: usize = 156;
const MAGIC_RANGE: std::ops::Range<usize> = 257..262;
const PREFIX_RANGE: std::ops::Range<usize> = 345..500;

/// Header information for one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Full entry name (ustar prefix joined when present).
    pub name: String,
    /// Data size in bytes.
    pub size: usize,
    /// Offset of the entry's data within the archive.
    pub data_offset: usize,
    /// Whether the entry is a regular file.
    pub is_file: bool,
}

/// Extract the data of `entry` from `archive`.
///
/// A header matches when its name equals `entry` or ends with `/entry`.
pub fn extract_entry<'a>(archive: &'a [u8], entry: &str) -> Result<&'a [u8], ArchiveError> {
    for header in Headers::new(archive) {
        let info = header?;
        if info.is_file && name_matches(&info.name, entry) {
            return Ok(&archive[info.data_offset..info.data_offset + info.size]);
        }
    }

    Err(ArchiveError::EntryNotFound {
        entry: entry.to_string(),
    })
}

/// List every entry header in the archive.
pub fn list_entries(archive: &[u8]) -> Result<Vec<EntryInfo>, ArchiveError> {
    Headers::new(archive).collect()
}

fn name_matches(name: &str, entry: &str) -> bool {
    let entry = entry.trim_start_matches("./");
    let name = name.trim_start_matches("./");
    name == entry
        || (name.len() > entry.len()
            && name.ends_with(entry)
            && name.as_bytes()[name.len() - entry.len() - 1] == b'/')
}

/// Sequential header walker; fused after the end marker or the first error.
struct Headers<'a> {
    archive: &'a [u8],
    offset: usize,
}

impl<'a> Headers<'a> {
    fn new(archive: &'a [u8]) -> Self {
        Self { archive, offset: 0 }
    }

    fn parse(&self, header: &[u8]) -> Result<EntryInfo, ArchiveError> {
        let malformed = |reason: String| ArchiveError::MalformedArchive {
            offset: self.offset,
            reason,
        };

        let size_field = &header[SIZE_RANGE];
        let size = parse_octal(size_field).ok_or_else(|| {
            malformed(format!(
                "unparseable size field {:?}",
                String::from_utf8_lossy(size_field)
            ))
        })?;
        let size = usize::try_from(size).map_err(|_| malformed(format!("size {size} too large")))?;

        let mut name = c_string(&header[NAME_RANGE]);
        if &header[MAGIC_RANGE] == b"ustar" {
            let prefix = c_string(&header[PREFIX_RANGE]);
            if !prefix.is_empty() {
                name = format!("{prefix}/{name}");
            }
        }

        let data_offset = self.offset + BLOCK_SIZE;
        data_offset
            .checked_add(size)
            .filter(|end| *end <= self.archive.len())
            .ok_or_else(|| {
                malformed(format!(
                    "entry {name} of {size} bytes runs past the end of a {} byte archive",
                    self.archive.len()
                ))
            })?;

        let typeflag = header[TYPEFLAG_OFFSET];
        Ok(EntryInfo {
            name,
            size,
            data_offset,
            is_file: typeflag == b'0' || typeflag == 0,
        })
    }
}

impl Iterator for Headers<'_> {
    type Item = Result<EntryInfo, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        let archive = self.archive;
        let header = archive.get(self.offset..self.offset + BLOCK_SIZE)?;
        if header.iter().all(|&b| b == 0) {
            self.offset = archive.len();
            return None;
        }

        match self.parse(header) {
            Ok(info) => {
                self.offset = info.data_offset + info.size.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
                Some(Ok(info))
            }
            Err(e) => {
                self.offset = archive.len();
                Some(Err(e))
            }
        }
    }
}

/// Text up to the first NUL.
fn c_string(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Octal number terminated by NUL or space, leading spaces allowed.
fn parse_octal(field: &[u8]) -> Option<u64> {
    let text = std::str::from_utf8(field).ok()?;
    let digits = text
        .trim_start_matches(' ')
        .split(['\0', ' '])
        .next()
        .unwrap_or_default();
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 8).ok()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build an archive holding the given entries, terminated by two zero blocks.
    pub(crate) fn pack(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, data) in entries {
            let mut header = [0u8; BLOCK_SIZE];
            header[..name.len()].copy_from_slice(name.as_bytes());
            let size = format!("{:011o}\0", data.len());
            header[SIZE_RANGE].copy_from_slice(size.as_bytes());
            header[TYPEFLAG_OFFSET] = b'0';
            header[MAGIC_RANGE].copy_from_slice(b"ustar");
            out.extend_from_slice(&header);
            out.extend_from_slice(data);
            let pad = data.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE - data.len();
            out.extend(std::iter::repeat(0u8).take(pad));
        }
        out.extend(std::iter::repeat(0u8).take(BLOCK_SIZE * 2));
        out
    }

    #[test]
    fn test_extract_in_any_order() {
        let a = vec![1u8; 700];
        let b = b"second entry".to_vec();
        let archive = pack(&[("a.tif", &a), ("b.tif", &b)]);

        assert_eq!(extract_entry(&archive, "b.tif").unwrap(), &b[..]);
        assert_eq!(extract_entry(&archive, "a.tif").unwrap(), &a[..]);
    }

    #[test]
    fn test_suffix_match_on_path_boundary() {
        let archive = pack(&[("faja_3/ab.tif", b"ab"), ("faja_3/b.tif", b"b")]);
        assert_eq!(extract_entry(&archive, "b.tif").unwrap(), b"b");
        assert_eq!(extract_entry(&archive, "faja_3/ab.tif").unwrap(), b"ab");
    }

    #[test]
    fn test_missing_entry() {
        let archive = pack(&[("a.tif", b"a")]);
        assert_eq!(
            extract_entry(&archive, "c.tif"),
            Err(ArchiveError::EntryNotFound {
                entry: "c.tif".into()
            })
        );
        assert!(matches!(
            extract_entry(&[], "c.tif"),
            Err(ArchiveError::EntryNotFound { .. })
        ));
    }

    #[test]
    fn test_bad_size_field() {
        let mut archive = pack(&[("a.tif", b"a")]);
        archive[SIZE_RANGE.start..SIZE_RANGE.end].copy_from_slice(b"zz\0\0\0\0\0\0\0\0\0\0");
        assert!(matches!(
            extract_entry(&archive, "a.tif"),
            Err(ArchiveError::MalformedArchive { offset: 0, .. })
        ));
    }

    #[test]
    fn test_truncated_entry() {
        let archive = pack(&[("a.tif", &[7u8; 1000])]);
        let truncated = &archive[..BLOCK_SIZE + 100];
        assert!(matches!(
            extract_entry(truncated, "a.tif"),
            Err(ArchiveError::MalformedArchive { .. })
        ));
    }

    #[test]
    fn test_ustar_prefix_joined() {
        let mut archive = pack(&[("x.tif", b"x")]);
        archive[PREFIX_RANGE.start..PREFIX_RANGE.start + 5].copy_from_slice(b"fajas");
        let entries = list_entries(&archive).unwrap();
        assert_eq!(entries[0].name, "fajas/x.tif");
        assert_eq!(extract_entry(&archive, "x.tif").unwrap(), b"x");
    }

    #[test]
    fn test_list_entries() {
        let archive = pack(&[("a.tif", b"aaaa"), ("b.tif", &[0u8; 513])]);
        let entries = list_entries(&archive).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].data_offset, BLOCK_SIZE);
        assert_eq!(entries[1].size, 513);
        assert_eq!(entries[1].data_offset, BLOCK_SIZE * 3);
    }
}
