//! Two-pass Huffman coding with a self-describing frequency-table header.
//!
//! Container: `[magic:4]["HUF1"][freq:u32]×256[originalLen:u32][bitstream]`.
//! The bitstream is packed MSB-first; the final byte is padded with
//! trailing zero bits, disambiguated by `originalLen` on decode.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::trace;

use crate::codec::{BitReader, BitWriter, CodecError, MAX_ORIGINAL_LEN};

/// Container magic, distinguishing a Huffman archive from an LZW one.
pub const MAGIC: [u8; 4] = *b"HUF1";

const FREQ_TABLE_BYTES: usize = 256 * 4;
const HEADER_LEN: usize = 4 + FREQ_TABLE_BYTES + 4;

#[derive(Debug, Clone)]
enum Tree {
    Leaf(u8),
    Internal(Box<Tree>, Box<Tree>),
}

/// A heap entry ordered by `(frequency, smallest symbol in subtree, a
/// monotonic sequence number)` — lower frequency first, ties broken by
/// lower symbol id, guaranteeing the same tree shape on every build for
/// the same frequency table regardless of hash/iteration order.
struct HeapEntry {
    freq: u64,
    min_symbol: u8,
    seq: u64,
    tree: Tree,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so a max-heap (BinaryHeap) pops the smallest key first.
        other.key().cmp(&self.key())
    }
}
impl HeapEntry {
    fn key(&self) -> (u64, u8, u64) {
        (self.freq, self.min_symbol, self.seq)
    }
}

fn count_frequencies(data: &[u8]) -> [u32; 256] {
    let mut freqs = [0u32; 256];
    for &b in data {
        freqs[b as usize] += 1;
    }
    freqs
}

fn build_tree(freqs: &[u32; 256]) -> Option<Tree> {
    let mut heap = BinaryHeap::new();
    let mut seq = 0u64;
    for (symbol, &freq) in freqs.iter().enumerate() {
        if freq == 0 {
            continue;
        }
        heap.push(HeapEntry {
            freq: u64::from(freq),
            min_symbol: symbol as u8,
            seq,
            tree: Tree::Leaf(symbol as u8),
        });
        seq += 1;
    }

    if heap.is_empty() {
        return None;
    }
    if heap.len() == 1 {
        return Some(heap.pop().unwrap().tree);
    }

    while heap.len() > 1 {
        let a = heap.pop().unwrap();
        let b = heap.pop().unwrap();
        let merged = HeapEntry {
            freq: a.freq + b.freq,
            min_symbol: a.min_symbol.min(b.min_symbol),
            seq,
            tree: Tree::Internal(Box::new(a.tree), Box::new(b.tree)),
        };
        seq += 1;
        heap.push(merged);
    }
    Some(heap.pop().unwrap().tree)
}

fn assign_codes(tree: &Tree) -> [Option<Vec<bool>>; 256] {
    const NONE: Option<Vec<bool>> = None;
    let mut codes = [NONE; 256];
    fn walk(node: &Tree, path: &mut Vec<bool>, codes: &mut [Option<Vec<bool>>; 256]) {
        match node {
            Tree::Leaf(symbol) => codes[*symbol as usize] = Some(path.clone()),
            Tree::Internal(left, right) => {
                path.push(false);
                walk(left, path, codes);
                path.pop();
                path.push(true);
                walk(right, path, codes);
                path.pop();
            }
        }
    }
    let mut path = Vec::new();
    walk(tree, &mut path, &mut codes);
    codes
}

/// Compresses `data`. Fails with [`CodecError::EmptyInput`] on an empty
/// buffer.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    if data.is_empty() {
        return Err(CodecError::EmptyInput);
    }

    let freqs = count_frequencies(data);
    let tree = build_tree(&freqs).expect("non-empty input yields a non-empty frequency table");

    let mut out = Vec::with_capacity(HEADER_LEN + data.len() / 2);
    out.extend_from_slice(&MAGIC);
    for &f in &freqs {
        out.extend_from_slice(&f.to_be_bytes());
    }
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());

    // A single distinct byte needs no bitstream at all: the decoder
    // recovers the run purely from originalLen and the frequency table.
    let unique_symbols = freqs.iter().filter(|&&f| f > 0).count();
    if unique_symbols > 1 {
        let codes = assign_codes(&tree);
        let mut writer = BitWriter::new();
        for &byte in data {
            for &bit in codes[byte as usize].as_ref().unwrap() {
                writer.push_bit(bit);
            }
        }
        out.extend_from_slice(&writer.finish());
    }

    trace!(input = data.len(), output = out.len(), "huffman: compressed");
    Ok(out)
}

/// Decompresses a container produced by [`compress`]. Fails with
/// [`CodecError::BadMagic`] on a missing/incorrect prefix and
/// [`CodecError::SizeExceeded`] if the declared length exceeds
/// [`MAX_ORIGINAL_LEN`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    if data.len() < HEADER_LEN || data[..4] != MAGIC {
        return Err(CodecError::BadMagic);
    }

    let mut freqs = [0u32; 256];
    for (i, f) in freqs.iter_mut().enumerate() {
        *f = crate::codec::read_u32_be(data, 4 + i * 4)?;
    }
    let original_len = crate::codec::read_u32_be(data, 4 + FREQ_TABLE_BYTES)?;
    if original_len > MAX_ORIGINAL_LEN {
        return Err(CodecError::SizeExceeded {
            declared: original_len,
        });
    }
    if original_len == 0 {
        return Ok(Vec::new());
    }

    let unique_symbols = freqs.iter().filter(|&&f| f > 0).count();
    if unique_symbols == 1 {
        let symbol = freqs.iter().position(|&f| f > 0).unwrap() as u8;
        return Ok(vec![symbol; original_len as usize]);
    }

    let tree = build_tree(&freqs).ok_or_else(|| {
        CodecError::Truncated("frequency table declares no symbols but a bitstream follows".into())
    })?;

    let mut out = Vec::with_capacity(original_len as usize);
    let mut reader = BitReader::new(&data[HEADER_LEN..]);
    while out.len() < original_len as usize {
        let mut node = &tree;
        loop {
            match node {
                Tree::Leaf(symbol) => {
                    out.push(*symbol);
                    break;
                }
                Tree::Internal(left, right) => {
                    let bit = reader.read_bit().ok_or_else(|| {
                        CodecError::Truncated("bitstream ended before originalLen bytes decoded".into())
                    })?;
                    node = if bit { right } else { left };
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_text() {
        let input = b"the quick brown fox jumps over the lazy dog";
        let compressed = compress(input).unwrap();
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, input);
    }

    #[test]
    fn compresses_repetitive_input_well_below_original_size() {
        let input = vec![0u8; 1000];
        let compressed = compress(&input).unwrap();
        assert!(compressed.len() < 200);
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, input);
    }

    #[test]
    fn single_distinct_byte_round_trips_without_a_bitstream() {
        let input = vec![0x42u8; 37];
        let compressed = compress(&input).unwrap();
        assert_eq!(compressed.len(), HEADER_LEN);
        assert_eq!(decompress(&compressed).unwrap(), input);
    }

    #[test]
    fn compress_rejects_empty_input() {
        let err = compress(&[]).unwrap_err();
        assert!(matches!(err, CodecError::EmptyInput));
    }

    #[test]
    fn decompress_rejects_bad_magic() {
        let err = decompress(b"XXXX1234567890").unwrap_err();
        assert!(matches!(err, CodecError::BadMagic));
    }

    #[test]
    fn decompress_rejects_oversized_declared_length() {
        let mut bogus = MAGIC.to_vec();
        bogus.extend_from_slice(&[0u8; FREQ_TABLE_BYTES]);
        bogus.extend_from_slice(&(MAX_ORIGINAL_LEN + 1).to_be_bytes());
        let err = decompress(&bogus).unwrap_err();
        assert!(matches!(err, CodecError::SizeExceeded { .. }));
    }
}
