//! Binary sniffing and encoding-aware file reading.
//!
//! Text is read as strict UTF-8 first (the common case). Anything else goes
//! through BOM detection and `chardetng`, and is decoded with replacement
//! characters so a single odd byte never fails a read.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Bytes inspected when deciding whether a file is binary.
pub const SNIFF_SAMPLE_SIZE: usize = 8192;

/// Decoded file content and the encoding label that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub content: String,
    pub encoding: &'static str,
}

/// Classify a byte sample as binary.
///
/// A NUL byte is decisive. Otherwise the sample is binary when more than 30%
/// of it is control bytes other than the usual whitespace and escape
/// characters. Bytes >= 0x80 count as text so UTF-8 and legacy 8-bit
/// encodings are not misclassified.
pub fn sniff_binary(sample: &[u8]) -> bool {
    if sample.is_empty() {
        return false;
    }
    if sample.contains(&0) {
        return true;
    }

    let control = sample
        .iter()
        .filter(|&&b| (b < 0x20 && !matches!(b, 7 | 8 | 9 | 10 | 12 | 13 | 27)) || b == 0x7f)
        .count();

    (control as f64 / sample.len() as f64) > 0.30
}

/// Sniff the head of a file. Unreadable files are reported as binary.
pub fn is_binary_file(path: &Path) -> bool {
    read_sample(path, SNIFF_SAMPLE_SIZE).map(|sample| sniff_binary(&sample)).unwrap_or(true)
}

fn read_sample(path: &Path, sample_size: usize) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut sample = Vec::with_capacity(sample_size);
    file.take(sample_size as u64).read_to_end(&mut sample)?;
    Ok(sample)
}

/// Pick an encoding for raw bytes: BOM first, then UTF-8, then `chardetng`.
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }
    if std::str::from_utf8(bytes).is_ok() {
        return UTF_8;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

/// Read a file as text, detecting its encoding.
pub fn read_file_safe(path: &Path) -> io::Result<DecodedText> {
    let bytes = std::fs::read(path)?;
    Ok(decode_bytes(&bytes))
}

pub fn decode_bytes(bytes: &[u8]) -> DecodedText {
    let encoding = detect_encoding(bytes);
    let (decoded, used, _had_errors) = encoding.decode(bytes);
    DecodedText { content: decoded.into_owned(), encoding: encoding_label(used) }
}

fn encoding_label(encoding: &'static Encoding) -> &'static str {
    if encoding == UTF_8 {
        "utf-8"
    } else if encoding == UTF_16LE {
        "utf-16-le"
    } else if encoding == UTF_16BE {
        "utf-16-be"
    } else {
        encoding.name()
    }
}
