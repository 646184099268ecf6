//! Decoder for one compiled class unit.
//!
//! Reads just the slices of the classfile format the symbol index needs:
//! class identity and accessibility, the `SourceFile` attribute, member
//! tables, and per-method line numbers from `Code`/`LineNumberTable`. Every
//! other attribute is skipped via its length prefix, which keeps the decoder
//! tolerant of vendor-specific extensions.

mod constant_pool;
mod reader;

use crate::error::{ParseError, ParseResult};

use constant_pool::ConstantPool;
use reader::Reader;

const MAGIC: u32 = 0xCAFE_BABE;

const ACC_PUBLIC: u16 = 0x0001;
const ACC_PRIVATE: u16 = 0x0002;
const ACC_PROTECTED: u16 = 0x0004;

/// Declared accessibility. Only `Public` symbols survive extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Protected,
    Private,
    Default,
}

impl Access {
    pub fn from_flags(flags: u16) -> Self {
        if flags & ACC_PUBLIC != 0 {
            Access::Public
        } else if flags & ACC_PROTECTED != 0 {
            Access::Protected
        } else if flags & ACC_PRIVATE != 0 {
            Access::Private
        } else {
            Access::Default
        }
    }
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub name: String,
    pub descriptor: String,
    pub access: Access,
    /// First line recorded in the method's `LineNumberTable`, when present.
    pub line: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub descriptor: String,
    pub access: Access,
}

/// Structured view of one parsed class unit.
#[derive(Debug, Clone)]
pub struct ClassFile {
    /// Slash-delimited name as it appears in the constant pool,
    /// e.g. `com/acme/Widget$Inner`.
    pub internal_name: String,
    pub super_class: Option<String>,
    pub access: Access,
    /// Simple source filename from the `SourceFile` attribute.
    pub source_name: Option<String>,
    /// Earliest line observed in any method, approximating the declaration.
    pub source_line: Option<u32>,
    pub methods: Vec<MethodInfo>,
    pub fields: Vec<FieldInfo>,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> ParseResult<Self> {
        let mut reader = Reader::new(bytes);

        let magic = reader.read_u4()?;
        if magic != MAGIC {
            return Err(ParseError::InvalidMagic(magic));
        }
        reader.read_u2()?; // minor
        reader.read_u2()?; // major

        let pool = ConstantPool::parse(&mut reader)?;

        let access = Access::from_flags(reader.read_u2()?);
        let internal_name = pool.class_name(reader.read_u2()?)?.to_string();
        let super_index = reader.read_u2()?;
        let super_class = if super_index == 0 {
            None
        } else {
            Some(pool.class_name(super_index)?.to_string())
        };

        let interface_count = reader.read_u2()? as usize;
        reader.skip(interface_count * 2)?;

        let field_count = reader.read_u2()? as usize;
        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            fields.push(parse_field(&mut reader, &pool)?);
        }

        let method_count = reader.read_u2()? as usize;
        let mut methods = Vec::with_capacity(method_count);
        for _ in 0..method_count {
            methods.push(parse_method(&mut reader, &pool)?);
        }

        let source_name = parse_class_attributes(&mut reader, &pool)?;
        let source_line = methods.iter().filter_map(|m| m.line).min();

        Ok(Self {
            internal_name,
            super_class,
            access,
            source_name,
            source_line,
            methods,
            fields,
        })
    }

    pub fn is_public(&self) -> bool {
        self.access == Access::Public
    }

    /// Dotted fully qualified name, e.g. `com.acme.Widget$Inner`.
    pub fn fqn(&self) -> String {
        fqn_of(&self.internal_name)
    }

    /// Dotted package, empty for the default package.
    pub fn package(&self) -> String {
        match self.internal_name.rsplit_once('/') {
            Some((pkg, _)) => pkg.replace('/', "."),
            None => String::new(),
        }
    }
}

/// Convert an internal (slash-delimited) name to dotted FQN form.
pub fn fqn_of(internal: &str) -> String {
    internal.replace('/', ".")
}

fn parse_field(reader: &mut Reader<'_>, pool: &ConstantPool) -> ParseResult<FieldInfo> {
    let access = Access::from_flags(reader.read_u2()?);
    let name = pool.utf8(reader.read_u2()?)?.to_string();
    let descriptor = pool.utf8(reader.read_u2()?)?.to_string();
    skip_attributes(reader)?;
    Ok(FieldInfo {
        name,
        descriptor,
        access,
    })
}

fn parse_method(reader: &mut Reader<'_>, pool: &ConstantPool) -> ParseResult<MethodInfo> {
    let access = Access::from_flags(reader.read_u2()?);
    let name = pool.utf8(reader.read_u2()?)?.to_string();
    let descriptor = pool.utf8(reader.read_u2()?)?.to_string();

    let mut line = None;
    let attr_count = reader.read_u2()? as usize;
    for _ in 0..attr_count {
        let attr_name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let payload = reader.read_slice(length)?;
        if pool.utf8(attr_name_index)? == "Code" {
            line = parse_code_line(payload, pool)?;
        }
    }

    Ok(MethodInfo {
        name,
        descriptor,
        access,
        line,
    })
}

/// Walk a `Code` attribute payload to its nested attribute table and pull the
/// first `LineNumberTable` entry.
fn parse_code_line(payload: &[u8], pool: &ConstantPool) -> ParseResult<Option<u32>> {
    let mut code = Reader::new(payload);
    code.read_u2()?; // max_stack
    code.read_u2()?; // max_locals
    let code_length = code.read_u4()? as usize;
    code.skip(code_length)?;
    let exception_count = code.read_u2()? as usize;
    code.skip(exception_count * 8)?;

    let attr_count = code.read_u2()? as usize;
    for _ in 0..attr_count {
        let attr_name_index = code.read_u2()?;
        let length = code.read_u4()? as usize;
        let payload = code.read_slice(length)?;
        if pool.utf8(attr_name_index)? != "LineNumberTable" {
            continue;
        }
        let mut table = Reader::new(payload);
        let entry_count = table.read_u2()? as usize;
        if entry_count == 0 {
            continue;
        }
        table.read_u2()?; // start_pc
        return Ok(Some(table.read_u2()? as u32));
    }
    Ok(None)
}

/// Scan class-level attributes for `SourceFile`, skipping everything else.
fn parse_class_attributes(
    reader: &mut Reader<'_>,
    pool: &ConstantPool,
) -> ParseResult<Option<String>> {
    let attr_count = reader.read_u2()? as usize;
    let mut source_name = None;
    for _ in 0..attr_count {
        let attr_name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let payload = reader.read_slice(length)?;
        if pool.utf8(attr_name_index)? == "SourceFile" {
            if payload.len() != 2 {
                return Err(ParseError::MalformedAttribute("SourceFile"));
            }
            let index = u16::from_be_bytes([payload[0], payload[1]]);
            source_name = Some(pool.utf8(index)?.to_string());
        }
    }
    Ok(source_name)
}

fn skip_attributes(reader: &mut Reader<'_>) -> ParseResult<()> {
    let attr_count = reader.read_u2()? as usize;
    for _ in 0..attr_count {
        reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        reader.skip(length)?;
    }
    Ok(())
}
