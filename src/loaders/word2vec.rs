//! word2vec binary format
//!
//! ```text
//! <count> <dimension>\n
//! <word> <dimension little-endian f32>...
//! ```
//!
//! Entries may be separated by a newline, which belongs to neither the word
//! nor the vector.

use std::io::BufRead;

use crate::loaders::WordVectors;

/// Largest vector length accepted from a header
pub const MAX_DIMENSION: usize = 1 << 16;

pub fn read_binary<R: BufRead>(mut reader: R) -> Result<WordVectors, String> {
    let mut header = String::new();
    reader
        .read_line(&mut header)
        .map_err(|e| format!("failed to read header: {}", e))?;
    let (count, dimension) = parse_header(&header)?;

    // The header is untrusted until the entries are actually read
    let mut vectors = WordVectors::with_capacity(count.min(1 << 20));
    let mut word_bytes = Vec::new();
    let vector_len = dimension
        .checked_mul(4)
        .ok_or_else(|| format!("malformed header '{}'", header.trim_end()))?;
    let mut vector_bytes = vec![0u8; vector_len];

    for index in 0..count {
        word_bytes.clear();
        let read = reader
            .read_until(b' ', &mut word_bytes)
            .map_err(|e| format!("failed to read word {}: {}", index, e))?;
        if read == 0 || word_bytes.last() != Some(&b' ') {
            return Err(format!(
                "unexpected end of file after {} of {} words",
                index, count
            ));
        }
        word_bytes.pop();

        let start = word_bytes
            .iter()
            .position(|&b| b != b'\n' && b != b'\r')
            .unwrap_or(word_bytes.len());
        let word = String::from_utf8_lossy(&word_bytes[start..]).into_owned();

        reader
            .read_exact(&mut vector_bytes)
            .map_err(|e| format!("truncated vector for '{}': {}", word, e))?;
        let vector = vector_bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        vectors.insert(word, vector);
    }

    Ok(vectors)
}

fn parse_header(header: &str) -> Result<(usize, usize), String> {
    let mut fields = header.split_whitespace();
    let count = fields.next().and_then(|s| s.parse::<usize>().ok());
    let dimension = fields.next().and_then(|s| s.parse::<usize>().ok());

    match (count, dimension, fields.next()) {
        (Some(count), Some(dimension), None) if dimension > 0 && dimension <= MAX_DIMENSION => {
            Ok((count, dimension))
        }
        _ => Err(format!("malformed header '{}'", header.trim_end())),
    }
}
