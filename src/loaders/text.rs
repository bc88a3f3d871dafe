//! Text embedding formats
//!
//! GloVe files hold one `word v1 v2 ...` row per line. fastText `.vec` files
//! use the same rows after a `<count> <dimension>` header line.

use std::io::BufRead;

use crate::loaders::WordVectors;

pub fn read_glove<R: BufRead>(reader: R) -> Result<WordVectors, String> {
    read_rows(reader, false)
}

pub fn read_fasttext<R: BufRead>(reader: R) -> Result<WordVectors, String> {
    read_rows(reader, true)
}

fn read_rows<R: BufRead>(reader: R, has_header: bool) -> Result<WordVectors, String> {
    let mut vectors = WordVectors::new();
    let mut dimension: Option<usize> = None;
    let mut header_pending = has_header;

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|e| format!("line {}: {}", line_no, e))?;
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }

        if header_pending {
            header_pending = false;
            dimension = Some(parse_header(line).map_err(|e| format!("line {}: {}", line_no, e))?);
            continue;
        }

        // Words never contain ASCII spaces, but may contain other whitespace
        let mut fields = line.split(' ').filter(|field| !field.is_empty());
        let word = match fields.next() {
            Some(word) => word.to_string(),
            None => continue,
        };
        let vector = fields
            .map(|field| field.parse::<f32>())
            .collect::<Result<Vec<f32>, _>>()
            .map_err(|e| format!("line {}: invalid component for '{}': {}", line_no, word, e))?;

        match dimension {
            Some(expected) if expected != vector.len() => {
                return Err(format!(
                    "line {}: '{}' has {} components, expected {}",
                    line_no,
                    word,
                    vector.len(),
                    expected
                ));
            }
            Some(_) => {}
            None => dimension = Some(vector.len()),
        }

        vectors.insert(word, vector);
    }

    if header_pending {
        return Err("missing header line".to_string());
    }

    Ok(vectors)
}

fn parse_header(line: &str) -> Result<usize, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    match fields.as_slice() {
        [count, dimension] => {
            count
                .parse::<usize>()
                .map_err(|_| format!("malformed header '{}'", line))?;
            match dimension.parse::<usize>() {
                Ok(dimension) if dimension > 0 => Ok(dimension),
                _ => Err(format!("malformed header '{}'", line)),
            }
        }
        _ => Err(format!("malformed header '{}'", line)),
    }
}
