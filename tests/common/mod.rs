//! Shared fixtures: a minimal classfile byte builder, jar writing, and a
//! directory-backed source resolver. The builder emits just enough of the
//! classfile format for the indexer to decode without a Java toolchain.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use classdex::SourceResolver;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_SUPER: u16 = 0x0020;

#[derive(Default)]
struct Pool {
    entries: Vec<Vec<u8>>,
    utf8: HashMap<String, u16>,
    classes: HashMap<String, u16>,
}

impl Pool {
    fn push(&mut self, bytes: Vec<u8>) -> u16 {
        self.entries.push(bytes);
        self.entries.len() as u16
    }

    fn utf8(&mut self, value: &str) -> u16 {
        if let Some(&idx) = self.utf8.get(value) {
            return idx;
        }
        let mut entry = vec![1u8];
        entry.extend_from_slice(&(value.len() as u16).to_be_bytes());
        entry.extend_from_slice(value.as_bytes());
        let idx = self.push(entry);
        self.utf8.insert(value.to_string(), idx);
        idx
    }

    fn class(&mut self, internal_name: &str) -> u16 {
        if let Some(&idx) = self.classes.get(internal_name) {
            return idx;
        }
        let name_idx = self.utf8(internal_name);
        let mut entry = vec![7u8];
        entry.extend_from_slice(&name_idx.to_be_bytes());
        let idx = self.push(entry);
        self.classes.insert(internal_name.to_string(), idx);
        idx
    }

    fn serialize(&self) -> (u16, Vec<u8>) {
        let mut bytes = Vec::new();
        for entry in &self.entries {
            bytes.extend_from_slice(entry);
        }
        ((self.entries.len() + 1) as u16, bytes)
    }
}

struct MethodSpec {
    access: u16,
    name: String,
    descriptor: String,
    line: Option<u16>,
}

struct FieldSpec {
    access: u16,
    name: String,
    descriptor: String,
}

/// Builds the bytes of one synthetic class unit.
pub struct ClassBytes {
    internal_name: String,
    access: u16,
    source_file: Option<String>,
    methods: Vec<MethodSpec>,
    fields: Vec<FieldSpec>,
    extra_class_attrs: Vec<(String, Vec<u8>)>,
}

impl ClassBytes {
    pub fn public(internal_name: &str) -> Self {
        Self::with_access(internal_name, ACC_PUBLIC | ACC_SUPER)
    }

    pub fn package_private(internal_name: &str) -> Self {
        Self::with_access(internal_name, ACC_SUPER)
    }

    pub fn with_access(internal_name: &str, access: u16) -> Self {
        Self {
            internal_name: internal_name.to_string(),
            access,
            source_file: None,
            methods: Vec::new(),
            fields: Vec::new(),
            extra_class_attrs: Vec::new(),
        }
    }

    pub fn source_file(mut self, name: &str) -> Self {
        self.source_file = Some(name.to_string());
        self
    }

    pub fn method(self, name: &str, descriptor: &str, line: Option<u16>) -> Self {
        self.method_with_access(ACC_PUBLIC, name, descriptor, line)
    }

    pub fn method_with_access(
        mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        line: Option<u16>,
    ) -> Self {
        self.methods.push(MethodSpec {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            line,
        });
        self
    }

    pub fn field(self, name: &str, descriptor: &str) -> Self {
        self.field_with_access(ACC_PUBLIC, name, descriptor)
    }

    pub fn field_with_access(mut self, access: u16, name: &str, descriptor: &str) -> Self {
        self.fields.push(FieldSpec {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        });
        self
    }

    /// Attach an arbitrary (e.g. vendor-specific) class-level attribute.
    pub fn class_attribute(mut self, name: &str, payload: Vec<u8>) -> Self {
        self.extra_class_attrs.push((name.to_string(), payload));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut pool = Pool::default();
        let this_idx = pool.class(&self.internal_name);
        let super_idx = pool.class("java/lang/Object");

        let mut body = Vec::new();
        push_u16(&mut body, self.access);
        push_u16(&mut body, this_idx);
        push_u16(&mut body, super_idx);
        push_u16(&mut body, 0); // interfaces

        push_u16(&mut body, self.fields.len() as u16);
        for field in &self.fields {
            push_u16(&mut body, field.access);
            push_u16(&mut body, pool.utf8(&field.name));
            push_u16(&mut body, pool.utf8(&field.descriptor));
            push_u16(&mut body, 0); // attributes
        }

        push_u16(&mut body, self.methods.len() as u16);
        for method in &self.methods {
            push_u16(&mut body, method.access);
            push_u16(&mut body, pool.utf8(&method.name));
            push_u16(&mut body, pool.utf8(&method.descriptor));
            match method.line {
                None => push_u16(&mut body, 0),
                Some(line) => {
                    push_u16(&mut body, 1);
                    let code_idx = pool.utf8("Code");
                    let table_idx = pool.utf8("LineNumberTable");
                    let payload = code_payload(table_idx, line);
                    push_u16(&mut body, code_idx);
                    push_u32(&mut body, payload.len() as u32);
                    body.extend_from_slice(&payload);
                }
            }
        }

        let mut class_attrs: Vec<(u16, Vec<u8>)> = Vec::new();
        if let Some(source) = &self.source_file {
            let name_idx = pool.utf8("SourceFile");
            let value_idx = pool.utf8(source);
            class_attrs.push((name_idx, value_idx.to_be_bytes().to_vec()));
        }
        for (name, payload) in &self.extra_class_attrs {
            class_attrs.push((pool.utf8(name), payload.clone()));
        }
        push_u16(&mut body, class_attrs.len() as u16);
        for (name_idx, payload) in class_attrs {
            push_u16(&mut body, name_idx);
            push_u32(&mut body, payload.len() as u32);
            body.extend_from_slice(&payload);
        }

        let (pool_count, pool_bytes) = pool.serialize();
        let mut out = Vec::new();
        push_u32(&mut out, 0xCAFE_BABE);
        push_u16(&mut out, 0); // minor
        push_u16(&mut out, 52); // major (Java 8)
        push_u16(&mut out, pool_count);
        out.extend_from_slice(&pool_bytes);
        out.extend_from_slice(&body);
        out
    }

    /// Write the class under `root` at its package path.
    pub fn write_under(self, root: &Path) -> PathBuf {
        let relative = format!("{}.class", self.internal_name.clone());
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, self.build()).unwrap();
        path
    }
}

/// One `Code` attribute with a single-entry `LineNumberTable`.
fn code_payload(table_name_idx: u16, line: u16) -> Vec<u8> {
    let mut payload = Vec::new();
    push_u16(&mut payload, 1); // max_stack
    push_u16(&mut payload, 1); // max_locals
    push_u32(&mut payload, 1); // code_length
    payload.push(0xB1); // return
    push_u16(&mut payload, 0); // exception table
    push_u16(&mut payload, 1); // nested attribute count
    push_u16(&mut payload, table_name_idx);
    push_u32(&mut payload, 6); // 2 (count) + 4 (one entry)
    push_u16(&mut payload, 1); // entries
    push_u16(&mut payload, 0); // start_pc
    push_u16(&mut payload, line);
    payload
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Write a jar containing the given entries.
pub fn write_jar(path: &Path, entries: Vec<(String, Vec<u8>)>) {
    let file = std::fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, bytes) in entries {
        writer.start_file(name, options).unwrap();
        writer.write_all(&bytes).unwrap();
    }
    writer.finish().unwrap();
}

/// Resolves `package + source filename` against a source tree on disk.
pub struct DirResolver {
    pub root: PathBuf,
}

impl SourceResolver for DirResolver {
    fn resolve(&self, package: &str, source_name: &str) -> Option<PathBuf> {
        let mut path = self.root.clone();
        for segment in package.split('.').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path.push(source_name);
        path.exists().then_some(path)
    }
}
