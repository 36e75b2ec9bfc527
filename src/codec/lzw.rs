//! 12-bit LZW with a dictionary seeded from the 256 one-byte strings.
//!
//! Container: `[magic:4]["LZW1"][originalLen:u32][codes, 12 bits each,
//! MSB-first, trailing zero-bit padding]`. The dictionary stops growing
//! once it reaches `2^12` entries; codes keep flowing from the frozen
//! dictionary thereafter.

use std::collections::HashMap;

use tracing::trace;

use crate::codec::{BitReader, BitWriter, CodecError, MAX_ORIGINAL_LEN};

/// Container magic, distinguishing an LZW archive from a Huffman one.
pub const MAGIC: [u8; 4] = *b"LZW1";

const CODE_WIDTH: u8 = 12;
const DICT_LIMIT: usize = 1 << CODE_WIDTH;
const HEADER_LEN: usize = 4 + 4;

/// Compresses `data`. Fails with [`CodecError::EmptyInput`] on an empty
/// buffer.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    if data.is_empty() {
        return Err(CodecError::EmptyInput);
    }

    let mut dict: HashMap<Vec<u8>, u16> =
        (0u16..256).map(|b| (vec![b as u8], b)).collect();
    let mut next_code: u16 = 256;

    let mut codes = Vec::new();
    let mut prefix: Vec<u8> = vec![data[0]];

    for &byte in &data[1..] {
        let mut candidate = prefix.clone();
        candidate.push(byte);
        if dict.contains_key(&candidate) {
            prefix = candidate;
        } else {
            codes.push(dict[&prefix]);
            if (next_code as usize) < DICT_LIMIT {
                dict.insert(candidate, next_code);
                next_code += 1;
            }
            prefix = vec![byte];
        }
    }
    codes.push(dict[&prefix]);

    let mut out = Vec::with_capacity(HEADER_LEN + codes.len() * 2);
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());

    let mut writer = BitWriter::new();
    for code in codes {
        writer.push_bits(u32::from(code), CODE_WIDTH);
    }
    out.extend_from_slice(&writer.finish());

    trace!(input = data.len(), output = out.len(), "lzw: compressed");
    Ok(out)
}

/// Decompresses a container produced by [`compress`], handling the KwKwK
/// case (a code equal to the current dictionary size) by emitting the
/// previous entry followed by its own first byte.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    if data.len() < HEADER_LEN || data[..4] != MAGIC {
        return Err(CodecError::BadMagic);
    }
    let original_len = crate::codec::read_u32_be(data, 4)?;
    if original_len > MAX_ORIGINAL_LEN {
        return Err(CodecError::SizeExceeded {
            declared: original_len,
        });
    }
    if original_len == 0 {
        return Ok(Vec::new());
    }

    let mut dict: Vec<Vec<u8>> = (0u16..256).map(|b| vec![b as u8]).collect();
    let mut reader = BitReader::new(&data[HEADER_LEN..]);

    let first_code = reader
        .read_bits(CODE_WIDTH)
        .ok_or_else(|| CodecError::Truncated("no codes in bitstream".into()))? as usize;
    let mut previous = dict
        .get(first_code)
        .cloned()
        .ok_or_else(|| CodecError::Truncated("first code outside initial dictionary".into()))?;

    let mut out = Vec::with_capacity(original_len as usize);
    out.extend_from_slice(&previous);

    while out.len() < original_len as usize {
        let Some(code) = reader.read_bits(CODE_WIDTH) else {
            break;
        };
        let code = code as usize;

        let entry = if code < dict.len() {
            dict[code].clone()
        } else if code == dict.len() {
            let mut e = previous.clone();
            e.push(previous[0]);
            e
        } else {
            return Err(CodecError::Truncated(format!(
                "code {code} exceeds dictionary size {}",
                dict.len()
            )));
        };

        out.extend_from_slice(&entry);
        if dict.len() < DICT_LIMIT {
            let mut new_entry = previous.clone();
            new_entry.push(entry[0]);
            dict.push(new_entry);
        }
        previous = entry;
    }

    if out.len() != original_len as usize {
        return Err(CodecError::Truncated(
            "bitstream ended before originalLen bytes were decoded".into(),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_text() {
        let input = b"banana banana banana banana";
        let compressed = compress(input).unwrap();
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, input);
    }

    #[test]
    fn round_trips_single_byte_input() {
        let input = b"x";
        let compressed = compress(input).unwrap();
        assert_eq!(decompress(&compressed).unwrap(), input);
    }

    #[test]
    fn handles_kwkwk_pattern() {
        // "AAAA" forces the decoder down the KwKwK branch: "A","A" builds
        // "AA" in the dictionary, then the stream immediately reuses a
        // code the encoder hasn't registered yet from the decoder's view.
        let input = b"AAAA";
        let compressed = compress(input).unwrap();
        assert_eq!(decompress(&compressed).unwrap(), input);
    }

    #[test]
    fn compress_rejects_empty_input() {
        let err = compress(&[]).unwrap_err();
        assert!(matches!(err, CodecError::EmptyInput));
    }

    #[test]
    fn decompress_rejects_bad_magic() {
        let err = decompress(b"XXXX1234").unwrap_err();
        assert!(matches!(err, CodecError::BadMagic));
    }
}
