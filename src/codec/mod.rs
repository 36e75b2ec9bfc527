//! Whole-buffer compression codecs with self-describing container formats,
//! used to archive heap files independently of the engine's own on-disk
//! formats.
//!
//! [`huffman`] implements a two-pass Huffman coder; [`lzw`] implements
//! 12-bit LZW. Both share the bit-packing helpers in this module and the
//! same error and size-limit vocabulary.

pub mod huffman;
pub mod lzw;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Largest original length either codec will agree to decompress.
/// Guards against a forged header claiming an implausible output size.
pub const MAX_ORIGINAL_LEN: u32 = 100 * 1024 * 1024;

/// Errors raised by either compression codec.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("input is empty")]
    EmptyInput,

    #[error("bad magic bytes")]
    BadMagic,

    #[error("declared original length {declared} exceeds the {MAX_ORIGINAL_LEN}-byte limit")]
    SizeExceeded { declared: u32 },

    #[error("truncated or corrupt container: {0}")]
    Truncated(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which whole-buffer codec to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Huffman,
    Lzw,
}

impl Algorithm {
    fn extension(self) -> &'static str {
        match self {
            Algorithm::Huffman => "huff",
            Algorithm::Lzw => "lzw",
        }
    }

    fn compress(self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        match self {
            Algorithm::Huffman => huffman::compress(data),
            Algorithm::Lzw => lzw::compress(data),
        }
    }

    fn decompress(self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        match self {
            Algorithm::Huffman => huffman::decompress(data),
            Algorithm::Lzw => lzw::decompress(data),
        }
    }

    /// Identifies which codec produced `data` by its magic prefix, for
    /// `decompress_file`, which takes no algorithm hint.
    fn sniff(data: &[u8]) -> Result<Self, CodecError> {
        if data.starts_with(&huffman::MAGIC) {
            Ok(Algorithm::Huffman)
        } else if data.starts_with(&lzw::MAGIC) {
            Ok(Algorithm::Lzw)
        } else {
            Err(CodecError::BadMagic)
        }
    }
}

/// Compresses the file at `path` with `algorithm`, writing `<path>.huff`
/// or `<path>.lzw` alongside it. Returns `(output_path, original_size,
/// compressed_size)`.
pub fn compress_file(
    path: &Path,
    algorithm: Algorithm,
) -> Result<(PathBuf, u64, u64), CodecError> {
    let data = fs::read(path)?;
    let compressed = algorithm.compress(&data)?;

    let mut output_path = path.to_path_buf();
    output_path.set_extension(algorithm.extension());
    fs::write(&output_path, &compressed)?;

    Ok((output_path, data.len() as u64, compressed.len() as u64))
}

/// Decompresses `path`, sniffing the codec from its magic bytes, writing
/// the result alongside it with the codec extension stripped. Returns the
/// output path.
pub fn decompress_file(path: &Path) -> Result<PathBuf, CodecError> {
    let data = fs::read(path)?;
    let algorithm = Algorithm::sniff(&data)?;
    let original = algorithm.decompress(&data)?;

    let output_path = path.with_extension("");
    fs::write(&output_path, &original)?;
    Ok(output_path)
}

/// Reads a big-endian `u32` out of `data[offset..offset + 4]`. Callers
/// are expected to have already bounds-checked `data.len()`, but the
/// slice-to-array conversion is still routed through `Result` rather
/// than trusted, matching how a corrupt or truncated container should
/// never panic the decoder.
pub(crate) fn read_u32_be(data: &[u8], offset: usize) -> Result<u32, CodecError> {
    let bytes: [u8; 4] = match data.get(offset..offset + 4) {
        Some(slice) => match slice.try_into() {
            Ok(b) => b,
            Err(_) => {
                return Err(CodecError::Truncated(
                    "internal: slice-to-array conversion failed for u32".into(),
                ));
            }
        },
        None => {
            return Err(CodecError::Truncated(format!(
                "expected 4 bytes at offset {offset}, got {}",
                data.len().saturating_sub(offset)
            )));
        }
    };
    Ok(u32::from_be_bytes(bytes))
}

/// Packs bits MSB-first into bytes, padding the final byte with trailing
/// zero bits.
pub(crate) struct BitWriter {
    bytes: Vec<u8>,
    cur: u8,
    nbits: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        BitWriter {
            bytes: Vec::new(),
            cur: 0,
            nbits: 0,
        }
    }

    pub fn push_bit(&mut self, bit: bool) {
        self.cur = (self.cur << 1) | u8::from(bit);
        self.nbits += 1;
        if self.nbits == 8 {
            self.bytes.push(self.cur);
            self.cur = 0;
            self.nbits = 0;
        }
    }

    /// Pushes the low `width` bits of `value`, most-significant bit first.
    pub fn push_bits(&mut self, value: u32, width: u8) {
        for i in (0..width).rev() {
            self.push_bit((value >> i) & 1 == 1);
        }
    }

    pub fn finish(mut self) -> Vec<u8> {
        if self.nbits > 0 {
            self.cur <<= 8 - self.nbits;
            self.bytes.push(self.cur);
        }
        self.bytes
    }
}

/// Reads bits MSB-first from a byte slice.
pub(crate) struct BitReader<'a> {
    bytes: &'a [u8],
    byte_pos: usize,
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        BitReader {
            bytes,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    pub fn read_bit(&mut self) -> Option<bool> {
        let byte = *self.bytes.get(self.byte_pos)?;
        let bit = (byte >> (7 - self.bit_pos)) & 1 == 1;
        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
        Some(bit)
    }

    /// Reads `width` bits as a big-endian value, most-significant bit
    /// first, returning `None` once the underlying bytes are exhausted.
    pub fn read_bits(&mut self, width: u8) -> Option<u32> {
        let mut value = 0u32;
        for _ in 0..width {
            value = (value << 1) | u32::from(self.read_bit()?);
        }
        Some(value)
    }
}
