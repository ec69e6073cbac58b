//! # Shared Raw Layout (Query Service ↔ Catalog Builder)
//!
//! Defines the byte layout a module/symbol query service writes into the
//! caller-supplied buffer, and the helpers used on both sides of that
//! boundary. All types use `#[repr(C)]` so the layout matches the classic
//! kernel module query interface.
//!
//! ## Buffer Formats
//!
//! 1. **Module name list** - `count` NUL-terminated names, back to back
//! 2. **Symbol table** - `count` [`RawSymbol`] entries, followed by a blob of
//!    NUL-terminated names. `RawSymbol::name` is a byte offset from the start
//!    of the buffer (not from the start of the blob).
//!
//! Writers never truncate: when the buffer is too small they report the
//! number of bytes they would need, so the reader can grow and retry.
//!
//! ## Key Types
//!
//! - [`RawSymbol`] - One symbol table entry
//! - [`ModuleInfo`] - Placement of a loaded module
//! - [`LayoutError`] - Malformed buffer contents

#![no_std]

use core::fmt;

// ============================================================================
// Constants
// ============================================================================

/// Page size assumed when the host page size cannot be determined
pub const DEFAULT_PAGE_SIZE: u64 = 4096;

/// Initial buffer size for the module name list query
pub const NAMES_SEED: usize = 32;

/// Initial buffer size for a per-module symbol table query
pub const SYMBOLS_SEED: usize = 256;

/// Size in bytes of one encoded [`RawSymbol`]
pub const RAW_SYMBOL_SIZE: usize = core::mem::size_of::<RawSymbol>();

// ============================================================================
// Shared Data Structures
// ============================================================================

/// Symbol table entry as returned by the query service
///
/// **Memory Layout**: `#[repr(C)]`, two native-endian `u64` words (16 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawSymbol {
    /// Address of the symbol
    pub value: u64,

    /// Byte offset of the NUL-terminated name, measured from the buffer start
    pub name: u64,
}

impl RawSymbol {
    fn write_to(self, out: &mut [u8]) {
        out[..8].copy_from_slice(&self.value.to_ne_bytes());
        out[8..RAW_SYMBOL_SIZE].copy_from_slice(&self.name.to_ne_bytes());
    }

    fn read_from(bytes: &[u8]) -> Self {
        let mut value = [0u8; 8];
        let mut name = [0u8; 8];
        value.copy_from_slice(&bytes[..8]);
        name.copy_from_slice(&bytes[8..RAW_SYMBOL_SIZE]);
        Self { value: u64::from_ne_bytes(value), name: u64::from_ne_bytes(name) }
    }
}

/// Placement of a loaded module in kernel address space
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Load address of the module's first page
    pub base_address: u64,

    /// Extent of the module, in pages
    pub size_in_pages: u64,
}

impl ModuleInfo {
    /// Extent of the module in bytes, saturating on overflow
    #[must_use]
    pub fn size_in_bytes(&self, page_size: u64) -> u64 {
        self.size_in_pages.saturating_mul(page_size)
    }

    /// Offset of `addr` from the module base if it lies in `[base, base + size)`
    ///
    /// Compared by distance from the base, so a module reaching the top of
    /// the address space still contains `u64::MAX`.
    #[must_use]
    pub fn offset_of(&self, addr: u64, page_size: u64) -> Option<u64> {
        addr.checked_sub(self.base_address).filter(|&off| off < self.size_in_bytes(page_size))
    }

    /// Whether `addr` lies in `[base, base + size)`
    #[must_use]
    pub fn contains(&self, addr: u64, page_size: u64) -> bool {
        self.offset_of(addr, page_size).is_some()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// A buffer that does not follow the documented layout
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutError {
    /// Fewer bytes than the reported entry count requires
    Truncated,
    /// A name offset points outside the buffer
    NameOutOfBounds(u64),
    /// A name has no terminating NUL inside the buffer
    Unterminated,
    /// A name is not valid UTF-8
    InvalidUtf8,
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => f.write_str("buffer shorter than reported entry count"),
            Self::NameOutOfBounds(off) => write!(f, "name offset {off} outside buffer"),
            Self::Unterminated => f.write_str("name is not NUL-terminated"),
            Self::InvalidUtf8 => f.write_str("name is not valid UTF-8"),
        }
    }
}

// ============================================================================
// Module Name List
// ============================================================================

/// Bytes needed to encode `names` as a name list
pub fn name_list_len<'a, I>(names: I) -> usize
where
    I: IntoIterator<Item = &'a str>,
{
    names.into_iter().map(|n| n.len() + 1).sum()
}

/// Encode `names` into `buf`
///
/// Returns the number of names written, or `Err(required)` with the byte
/// count needed when `buf` is too small. Nothing meaningful is written on
/// error.
///
/// # Errors
/// `Err(required)` when `buf.len() < required`
pub fn encode_name_list<'a, I>(names: I, buf: &mut [u8]) -> Result<usize, usize>
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    let required = name_list_len(names.clone());
    if buf.len() < required {
        return Err(required);
    }

    let mut pos = 0;
    let mut count = 0;
    for name in names {
        buf[pos..pos + name.len()].copy_from_slice(name.as_bytes());
        buf[pos + name.len()] = 0;
        pos += name.len() + 1;
        count += 1;
    }
    Ok(count)
}

/// Iterate over the first `count` names of an encoded name list
#[must_use]
pub fn decode_name_list(buf: &[u8], count: usize) -> NameList<'_> {
    NameList { buf, pos: 0, remaining: count }
}

/// Iterator returned by [`decode_name_list`]
pub struct NameList<'a> {
    buf: &'a [u8],
    pos: usize,
    remaining: usize,
}

impl<'a> Iterator for NameList<'a> {
    type Item = Result<&'a str, LayoutError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        if self.pos >= self.buf.len() {
            self.remaining = 0;
            return Some(Err(LayoutError::Truncated));
        }

        match read_cstr(self.buf, self.pos) {
            Ok((name, next)) => {
                self.pos = next;
                Some(Ok(name))
            }
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

// ============================================================================
// Symbol Table
// ============================================================================

/// Bytes needed to encode `symbols` as a symbol table
pub fn symbol_table_len<'a, I>(symbols: I) -> usize
where
    I: IntoIterator<Item = (u64, &'a str)>,
{
    symbols.into_iter().map(|(_, n)| RAW_SYMBOL_SIZE + n.len() + 1).sum()
}

/// Encode `(address, name)` pairs into `buf`
///
/// Entries come first, then the name blob. Returns the number of entries
/// written, or `Err(required)` when `buf` is too small.
///
/// # Errors
/// `Err(required)` when `buf.len() < required`
pub fn encode_symbol_table<'a, I>(symbols: I, buf: &mut [u8]) -> Result<usize, usize>
where
    I: IntoIterator<Item = (u64, &'a str)> + Clone,
{
    let required = symbol_table_len(symbols.clone());
    if buf.len() < required {
        return Err(required);
    }

    let count = symbols.clone().into_iter().count();
    let mut entry_pos = 0;
    let mut name_pos = count * RAW_SYMBOL_SIZE;

    for (value, name) in symbols {
        RawSymbol { value, name: name_pos as u64 }
            .write_to(&mut buf[entry_pos..entry_pos + RAW_SYMBOL_SIZE]);
        entry_pos += RAW_SYMBOL_SIZE;

        buf[name_pos..name_pos + name.len()].copy_from_slice(name.as_bytes());
        buf[name_pos + name.len()] = 0;
        name_pos += name.len() + 1;
    }
    Ok(count)
}

/// Iterate over the first `count` entries of an encoded symbol table,
/// resolving each name offset against the same buffer
#[must_use]
pub fn decode_symbol_table(buf: &[u8], count: usize) -> SymbolTable<'_> {
    SymbolTable { buf, index: 0, count }
}

/// Iterator returned by [`decode_symbol_table`]
pub struct SymbolTable<'a> {
    buf: &'a [u8],
    index: usize,
    count: usize,
}

impl<'a> Iterator for SymbolTable<'a> {
    type Item = Result<(u64, &'a str), LayoutError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.count {
            return None;
        }
        let start = self.index * RAW_SYMBOL_SIZE;
        self.index += 1;

        let Some(entry) = self.buf.get(start..start + RAW_SYMBOL_SIZE) else {
            self.index = self.count;
            return Some(Err(LayoutError::Truncated));
        };
        let raw = RawSymbol::read_from(entry);

        let Ok(offset) = usize::try_from(raw.name) else {
            return Some(Err(LayoutError::NameOutOfBounds(raw.name)));
        };
        if offset >= self.buf.len() {
            return Some(Err(LayoutError::NameOutOfBounds(raw.name)));
        }

        Some(read_cstr(self.buf, offset).map(|(name, _)| (raw.value, name)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.count - self.index;
        (0, Some(left))
    }
}

/// Read the NUL-terminated string starting at `pos`, returning it and the
/// position just past its terminator
fn read_cstr(buf: &[u8], pos: usize) -> Result<(&str, usize), LayoutError> {
    let rest = &buf[pos..];
    let len = rest.iter().position(|&b| b == 0).ok_or(LayoutError::Unterminated)?;
    let name = core::str::from_utf8(&rest[..len]).map_err(|_| LayoutError::InvalidUtf8)?;
    Ok((name, pos + len + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_symbol_layout() {
        assert_eq!(RAW_SYMBOL_SIZE, 16);
        assert_eq!(core::mem::align_of::<RawSymbol>(), 8);
    }

    #[test]
    fn test_name_list_reports_required_capacity() {
        let names = ["usb_core", "ext4"];
        let mut small = [0u8; 8];
        assert_eq!(encode_name_list(names.iter().copied(), &mut small), Err(14));
    }

    #[test]
    fn test_name_list_decode() {
        let names = ["usb_core", "ext4", "nf_tables"];
        let mut buf = [0u8; 64];
        let count = encode_name_list(names.iter().copied(), &mut buf).unwrap();
        assert_eq!(count, 3);

        let mut it = decode_name_list(&buf, count);
        assert_eq!(it.next(), Some(Ok("usb_core")));
        assert_eq!(it.next(), Some(Ok("ext4")));
        assert_eq!(it.next(), Some(Ok("nf_tables")));
        assert_eq!(it.next(), None);
    }

    #[test]
    fn test_name_list_count_past_buffer() {
        let buf = *b"ext4\0";
        let mut it = decode_name_list(&buf, 2);
        assert_eq!(it.next(), Some(Ok("ext4")));
        assert_eq!(it.next(), Some(Err(LayoutError::Truncated)));
        assert_eq!(it.next(), None);
    }

    #[test]
    fn test_symbol_table_names_follow_entries() {
        let syms = [(0x1000, "init"), (0x1200, "probe")];
        let mut buf = [0u8; 64];
        let count = encode_symbol_table(syms.iter().copied(), &mut buf).unwrap();
        assert_eq!(count, 2);

        // first name starts right after both entries
        let first = RawSymbol::read_from(&buf[..RAW_SYMBOL_SIZE]);
        assert_eq!(first, RawSymbol { value: 0x1000, name: 32 });
        assert_eq!(&buf[32..37], b"init\0");

        let decoded: [_; 2] = [
            decode_symbol_table(&buf, count).next().unwrap(),
            decode_symbol_table(&buf, count).nth(1).unwrap(),
        ];
        assert_eq!(decoded, [Ok((0x1000, "init")), Ok((0x1200, "probe"))]);
    }

    #[test]
    fn test_symbol_table_too_small() {
        let syms = [(0x1000, "init")];
        let mut buf = [0u8; 16];
        assert_eq!(encode_symbol_table(syms.iter().copied(), &mut buf), Err(21));
    }

    #[test]
    fn test_symbol_table_bad_offset() {
        let mut buf = [0u8; 16];
        RawSymbol { value: 1, name: 999 }.write_to(&mut buf);
        let mut it = decode_symbol_table(&buf, 1);
        assert_eq!(it.next(), Some(Err(LayoutError::NameOutOfBounds(999))));
    }

    #[test]
    fn test_module_info_range() {
        let info = ModuleInfo { base_address: 0x1000, size_in_pages: 1 };
        assert!(info.contains(0x1000, DEFAULT_PAGE_SIZE));
        assert!(info.contains(0x1fff, DEFAULT_PAGE_SIZE));
        assert!(!info.contains(0x2000, DEFAULT_PAGE_SIZE));
        assert!(!info.contains(0x0fff, DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn test_module_info_top_of_address_space() {
        let info = ModuleInfo { base_address: u64::MAX - 0xfff, size_in_pages: 1 };
        assert!(info.contains(u64::MAX, DEFAULT_PAGE_SIZE));
        assert_eq!(info.offset_of(u64::MAX, DEFAULT_PAGE_SIZE), Some(0xfff));
        assert_eq!(info.offset_of(u64::MAX - 0x1000, DEFAULT_PAGE_SIZE), None);
    }

    #[test]
    fn test_module_info_size_saturates() {
        let info = ModuleInfo { base_address: 0, size_in_pages: u64::MAX };
        assert_eq!(info.size_in_bytes(DEFAULT_PAGE_SIZE), u64::MAX);
    }
}
