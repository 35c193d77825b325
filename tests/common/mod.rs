//! A tiny ZIP writer for building test archives.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;
use std::sync::Arc;

use zipspy::{MemoryObjectStore, ObjectLocator};

pub struct Member {
    pub name: String,
    pub data: Vec<u8>,
    pub method: u16,
    pub declared_size: Option<u64>,
    pub local_extra: Vec<u8>,
    pub zip64: bool,
}

impl Member {
    pub fn stored(name: &str, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.to_string(),
            data: data.into(),
            method: 0,
            declared_size: None,
            local_extra: Vec::new(),
            zip64: false,
        }
    }

    pub fn deflated(name: &str, data: impl Into<Vec<u8>>) -> Self {
        Self {
            method: 8,
            ..Self::stored(name, data)
        }
    }

    /// Store the data as-is but label it with another method id.
    pub fn labeled(mut self, method: u16) -> Self {
        self.method = method;
        self
    }

    /// Lie about the uncompressed size in the central directory.
    pub fn declaring_size(mut self, size: u64) -> Self {
        self.declared_size = Some(size);
        self
    }

    /// Pad the local header (only) with an extra field of `len` bytes.
    pub fn with_local_extra(mut self, len: usize) -> Self {
        let mut extra = Vec::with_capacity(len + 4);
        extra.extend_from_slice(&0xCAFEu16.to_le_bytes());
        extra.extend_from_slice(&(len as u16).to_le_bytes());
        extra.resize(len + 4, 0x5A);
        self.local_extra = extra;
        self
    }

    /// Put sizes and offset in a zip64 extra field.
    pub fn zip64(mut self) -> Self {
        self.zip64 = true;
        self
    }

    fn body(&self) -> Vec<u8> {
        if self.method == 8 {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&self.data).unwrap();
            encoder.finish().unwrap()
        } else {
            self.data.clone()
        }
    }
}

#[derive(Default)]
pub struct ZipWriter {
    members: Vec<Member>,
    comment: Vec<u8>,
}

impl ZipWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    pub fn finish(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut directory = Vec::new();

        for m in &self.members {
            let body = m.body();
            let offset = out.len() as u64;
            let uncompressed = m.declared_size.unwrap_or(m.data.len() as u64);

            out.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
            out.extend_from_slice(&20u16.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&m.method.to_le_bytes());
            out.extend_from_slice(&[0; 8]); // time, date, crc
            out.extend_from_slice(&(body.len() as u32).to_le_bytes());
            out.extend_from_slice(&(m.data.len() as u32).to_le_bytes());
            out.extend_from_slice(&(m.name.len() as u16).to_le_bytes());
            out.extend_from_slice(&(m.local_extra.len() as u16).to_le_bytes());
            out.extend_from_slice(m.name.as_bytes());
            out.extend_from_slice(&m.local_extra);
            out.extend_from_slice(&body);

            let (extra, sizes) = if m.zip64 {
                let mut extra = Vec::new();
                extra.extend_from_slice(&1u16.to_le_bytes());
                extra.extend_from_slice(&24u16.to_le_bytes());
                extra.extend_from_slice(&uncompressed.to_le_bytes());
                extra.extend_from_slice(&(body.len() as u64).to_le_bytes());
                extra.extend_from_slice(&offset.to_le_bytes());
                (extra, [u32::MAX; 3])
            } else {
                (
                    Vec::new(),
                    [body.len() as u32, uncompressed as u32, offset as u32],
                )
            };

            directory.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
            directory.extend_from_slice(&[20, 0, 20, 0]);
            directory.extend_from_slice(&0u16.to_le_bytes());
            directory.extend_from_slice(&m.method.to_le_bytes());
            directory.extend_from_slice(&[0; 8]);
            directory.extend_from_slice(&sizes[0].to_le_bytes());
            directory.extend_from_slice(&sizes[1].to_le_bytes());
            directory.extend_from_slice(&(m.name.len() as u16).to_le_bytes());
            directory.extend_from_slice(&(extra.len() as u16).to_le_bytes());
            directory.extend_from_slice(&0u16.to_le_bytes());
            directory.extend_from_slice(&[0; 8]);
            directory.extend_from_slice(&sizes[2].to_le_bytes());
            directory.extend_from_slice(m.name.as_bytes());
            directory.extend_from_slice(&extra);
        }

        let directory_offset = out.len() as u32;
        out.extend_from_slice(&directory);

        let count = (self.members.len() % 0x1_0000) as u16;
        out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&(directory.len() as u32).to_le_bytes());
        out.extend_from_slice(&directory_offset.to_le_bytes());
        out.extend_from_slice(&(self.comment.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.comment);
        out
    }
}

pub fn archive() -> ObjectLocator {
    ObjectLocator::new("bucket", "archive.zip")
}

pub fn store_with(data: Vec<u8>) -> Arc<MemoryObjectStore> {
    let mut store = MemoryObjectStore::new();
    store.insert(archive(), data);
    Arc::new(store)
}

/// Deterministic, poorly compressible bytes.
pub fn noise(len: usize) -> Vec<u8> {
    let mut state = 0x2545_f491_4f6c_dd1du64;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 32) as u8
        })
        .collect()
}

pub fn terms(terms: &[&str]) -> Vec<String> {
    terms.iter().map(|t| t.to_string()).collect()
}
