//! Classfile constant pool.
//!
//! Only `Utf8` and `Class` entries are materialized; the symbol extractor
//! never follows the other reference kinds, so they are decoded just far
//! enough to advance the cursor correctly. `Long` and `Double` occupy two
//! pool slots.

use crate::error::{ParseError, ParseResult};

use super::reader::Reader;

#[derive(Debug, Clone)]
enum PoolEntry {
    Utf8(String),
    Class { name_index: u16 },
    /// Any entry kind the extractor does not consume.
    Opaque(&'static str),
}

impl PoolEntry {
    fn kind(&self) -> &'static str {
        match self {
            PoolEntry::Utf8(_) => "Utf8",
            PoolEntry::Class { .. } => "Class",
            PoolEntry::Opaque(kind) => kind,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ConstantPool {
    entries: Vec<Option<PoolEntry>>,
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut Reader<'_>) -> ParseResult<Self> {
        let count = reader.read_u2()? as usize;
        if count == 0 {
            return Err(ParseError::Malformed("constant_pool_count must be >= 1"));
        }

        let mut entries: Vec<Option<PoolEntry>> = vec![None; count];
        let mut index = 1usize;
        while index < count {
            let tag = reader.read_u1()?;
            let (entry, double_slot) = match tag {
                1 => {
                    let len = reader.read_u2()? as usize;
                    let bytes = reader.read_slice(len)?;
                    (PoolEntry::Utf8(decode_modified_utf8(bytes)?), false)
                }
                7 => (
                    PoolEntry::Class {
                        name_index: reader.read_u2()?,
                    },
                    false,
                ),
                3 | 4 => {
                    reader.skip(4)?;
                    (PoolEntry::Opaque("IntegerOrFloat"), false)
                }
                5 | 6 => {
                    reader.skip(8)?;
                    (PoolEntry::Opaque("LongOrDouble"), true)
                }
                8 | 16 | 19 | 20 => {
                    reader.skip(2)?;
                    (PoolEntry::Opaque("Reference16"), false)
                }
                9 | 10 | 11 | 12 | 17 | 18 => {
                    reader.skip(4)?;
                    (PoolEntry::Opaque("Reference32"), false)
                }
                15 => {
                    reader.skip(3)?;
                    (PoolEntry::Opaque("MethodHandle"), false)
                }
                other => return Err(ParseError::InvalidConstantPoolTag(other)),
            };

            entries[index] = Some(entry);
            if double_slot {
                if index + 1 >= count {
                    return Err(ParseError::Malformed("two-slot constant at end of pool"));
                }
                index += 2;
            } else {
                index += 1;
            }
        }

        Ok(Self { entries })
    }

    fn get(&self, index: u16) -> ParseResult<&PoolEntry> {
        let idx = index as usize;
        if idx == 0 || idx >= self.entries.len() {
            return Err(ParseError::InvalidConstantPoolIndex(index));
        }
        self.entries[idx]
            .as_ref()
            .ok_or(ParseError::InvalidConstantPoolIndex(index))
    }

    pub(crate) fn utf8(&self, index: u16) -> ParseResult<&str> {
        match self.get(index)? {
            PoolEntry::Utf8(s) => Ok(s.as_str()),
            other => Err(ParseError::ConstantPoolTypeMismatch {
                index,
                expected: "Utf8",
                found: other.kind(),
            }),
        }
    }

    pub(crate) fn class_name(&self, index: u16) -> ParseResult<&str> {
        match self.get(index)? {
            PoolEntry::Class { name_index } => self.utf8(*name_index),
            other => Err(ParseError::ConstantPoolTypeMismatch {
                index,
                expected: "Class",
                found: other.kind(),
            }),
        }
    }
}

/// Decode the classfile flavor of UTF-8: NUL as `0xC0 0x80`, supplementary
/// characters as CESU-8 surrogate pairs, never 4-byte sequences.
fn decode_modified_utf8(bytes: &[u8]) -> ParseResult<String> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            _ if b & 0x80 == 0 => {
                units.push(b as u16);
                i += 1;
            }
            _ if b & 0xE0 == 0xC0 => {
                let b2 = *bytes.get(i + 1).ok_or(ParseError::InvalidModifiedUtf8)?;
                if b == 0xC0 && b2 == 0x80 {
                    units.push(0);
                } else if b2 & 0xC0 == 0x80 {
                    units.push((((b & 0x1F) as u16) << 6) | (b2 & 0x3F) as u16);
                } else {
                    return Err(ParseError::InvalidModifiedUtf8);
                }
                i += 2;
            }
            _ if b & 0xF0 == 0xE0 => {
                if i + 2 >= bytes.len() {
                    return Err(ParseError::InvalidModifiedUtf8);
                }
                let (b2, b3) = (bytes[i + 1], bytes[i + 2]);
                if b2 & 0xC0 != 0x80 || b3 & 0xC0 != 0x80 {
                    return Err(ParseError::InvalidModifiedUtf8);
                }
                units.push(
                    (((b & 0x0F) as u16) << 12)
                        | (((b2 & 0x3F) as u16) << 6)
                        | (b3 & 0x3F) as u16,
                );
                i += 3;
            }
            _ => return Err(ParseError::InvalidModifiedUtf8),
        }
    }

    // Identifiers may legally contain unpaired surrogates; decode lossily
    // rather than rejecting the whole classfile.
    Ok(String::from_utf16_lossy(&units))
}
