//! Compression method → decompressor lookup.

use flate2::read::DeflateDecoder;
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::sync::Arc;

use super::structures::CompressionMethod;

/// Wraps a reader over compressed bytes in one yielding decompressed bytes.
pub type Decompressor = Arc<dyn Fn(Box<dyn Read + Send>) -> Box<dyn Read + Send> + Send + Sync>;

fn store(compressed: Box<dyn Read + Send>) -> Box<dyn Read + Send> {
    compressed
}

fn deflate(compressed: Box<dyn Read + Send>) -> Box<dyn Read + Send> {
    Box::new(DeflateDecoder::new(compressed))
}

/// Decompressors by method.
///
/// Store and deflate are built in. Registered decompressors take precedence,
/// so they can also replace a built-in.
#[derive(Clone, Default)]
pub struct DecompressorRegistry {
    registered: HashMap<u16, Decompressor>,
}

impl DecompressorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or override the decompressor for `method`.
    pub fn register<F>(&mut self, method: u16, decompressor: F)
    where
        F: Fn(Box<dyn Read + Send>) -> Box<dyn Read + Send> + Send + Sync + 'static,
    {
        self.registered.insert(method, Arc::new(decompressor));
    }

    /// The decompressor for `method`, or `None` if there isn't one.
    pub fn get(&self, method: CompressionMethod) -> Option<Decompressor> {
        if let Some(registered) = self.registered.get(&method.as_u16()) {
            return Some(registered.clone());
        }
        let builtin: Decompressor = match method {
            CompressionMethod::Stored => Arc::new(store),
            CompressionMethod::Deflate => Arc::new(deflate),
            CompressionMethod::Unknown(_) => return None,
        };
        Some(builtin)
    }

    /// Wrap `compressed` in the decompressor for `method`.
    pub fn open(
        &self,
        method: CompressionMethod,
        compressed: Box<dyn Read + Send>,
    ) -> Option<Box<dyn Read + Send>> {
        self.get(method).map(|decompressor| decompressor(compressed))
    }
}

impl fmt::Debug for DecompressorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<_> = self.registered.keys().collect();
        methods.sort();
        f.debug_struct("DecompressorRegistry")
            .field("registered", &methods)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io;

    fn read_all(mut r: Box<dyn Read + Send>) -> Vec<u8> {
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn builtins() {
        let registry = DecompressorRegistry::new();
        let stored = registry
            .open(CompressionMethod::Stored, Box::new(&b"as is"[..]))
            .unwrap();
        assert_eq!(read_all(stored), b"as is");
        assert!(registry.get(CompressionMethod::Deflate).is_some());
        assert!(registry.get(CompressionMethod::Unknown(99)).is_none());
    }

    #[test]
    fn registrations_add_methods() {
        let mut registry = DecompressorRegistry::new();
        registry.register(99, |_| Box::new(io::repeat(b'z').take(3)));
        let out = registry
            .open(CompressionMethod::Unknown(99), Box::new(io::empty()))
            .unwrap();
        assert_eq!(read_all(out), b"zzz");
    }

    #[test]
    fn registrations_override_builtins() {
        let mut registry = DecompressorRegistry::new();
        registry.register(0, |_| Box::new(&b"overridden"[..]));
        let out = registry
            .open(CompressionMethod::Stored, Box::new(&b"original"[..]))
            .unwrap();
        assert_eq!(read_all(out), b"overridden");
        // Clones share registrations but not future ones.
        let copy = registry.clone();
        registry.register(8, |r| r);
        assert!(format!("{copy:?}").contains("[0]"));
        assert!(format!("{registry:?}").contains("[0, 8]"));
    }
}
