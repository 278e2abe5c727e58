//! Stream filter decode/encode
//!
//! Content streams are stored behind a filter chain (usually FlateDecode).
//! This module decodes a stream's stored bytes for scanning and re-encodes
//! modified content before serialization. Filters we cannot decode are
//! reported as errors so the caller can leave the stream untouched.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{Dictionary, Object, Stream};

use crate::error::{Error, Result};

/// Extract the filter chain from a stream dictionary as a list of names.
///
/// `/Filter` may be a single name or an array of names applied in order.
pub fn filter_chain(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(arr)) => arr
            .iter()
            .filter_map(|f| match f {
                Object::Name(name) => Some(name.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Decode a stream's stored bytes through its filter chain.
///
/// Only FlateDecode chains without decode parameters are supported; anything
/// else yields `Error::UnsupportedFilter` so the stream can be skipped.
pub fn decode(stream: &Stream) -> Result<Vec<u8>> {
    // Predictors change the byte layout after inflation; a stream carrying
    // them is not one we can rewrite safely.
    if stream.dict.get(b"DecodeParms").is_ok() || stream.dict.get(b"DP").is_ok() {
        return Err(Error::UnsupportedFilter("DecodeParms present".to_string()));
    }

    let mut data = stream.content.clone();

    for name in filter_chain(&stream.dict) {
        match name.as_slice() {
            b"FlateDecode" | b"Fl" => {
                data = flate_decode(&data)?;
            }
            other => {
                return Err(Error::UnsupportedFilter(
                    String::from_utf8_lossy(other).into_owned(),
                ));
            }
        }
    }

    Ok(data)
}

/// Inflate zlib-wrapped data.
pub fn flate_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decoded = Vec::new();
    decoder
        .read_to_end(&mut decoded)
        .map_err(|e| Error::UnsupportedFilter(format!("FlateDecode failed: {}", e)))?;
    Ok(decoded)
}

/// Deflate data for storage, zlib-wrapped as FlateDecode expects.
pub fn flate_encode(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::Stream;

    fn flate_stream(plain: &[u8]) -> Stream {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
        Stream::new(dict, flate_encode(plain).unwrap())
    }

    #[test]
    fn test_flate_round_trip() {
        let data = b"q 1 0 0 1 0 0 cm BT (hello) Tj ET Q";
        assert_eq!(flate_decode(&flate_encode(data).unwrap()).unwrap(), data);
    }

    #[test]
    fn test_decode_flate_stream() {
        let stream = flate_stream(b"0 0 100 100 re f");
        assert_eq!(decode(&stream).unwrap(), b"0 0 100 100 re f");
    }

    #[test]
    fn test_decode_unfiltered_stream() {
        let stream = Stream::new(Dictionary::new(), b"BT ET".to_vec());
        assert_eq!(decode(&stream).unwrap(), b"BT ET");
    }

    #[test]
    fn test_decode_unknown_filter() {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
        let stream = Stream::new(dict, vec![0xff, 0xd8]);
        match decode(&stream) {
            Err(Error::UnsupportedFilter(name)) => assert_eq!(name, "DCTDecode"),
            other => panic!("expected UnsupportedFilter, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_decode_rejects_predictor_params() {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
        let mut parms = Dictionary::new();
        parms.set("Predictor", Object::Integer(12));
        dict.set("DecodeParms", Object::Dictionary(parms));
        let stream = Stream::new(dict, flate_encode(b"data").unwrap());
        assert!(matches!(decode(&stream), Err(Error::UnsupportedFilter(_))));
    }

    #[test]
    fn test_filter_chain_array_form() {
        let mut dict = Dictionary::new();
        dict.set(
            "Filter",
            Object::Array(vec![
                Object::Name(b"ASCII85Decode".to_vec()),
                Object::Name(b"FlateDecode".to_vec()),
            ]),
        );
        assert_eq!(
            filter_chain(&dict),
            vec![b"ASCII85Decode".to_vec(), b"FlateDecode".to_vec()]
        );
    }
}
