use std::fmt::Display;
use std::io::{self, prelude::*};

use flate2::write::{ZlibDecoder, ZlibEncoder};
use flate2::Compression;
use thiserror::Error;

use crate::params::{ControlledVocabulary, Param, ParamCow, Unit};

pub type Bytes = Vec<u8>;

/// The kinds of data arrays written for spectra and chromatograms, governed
/// by the PSI-MS controlled vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ArrayType {
    #[default]
    MZArray,
    IntensityArray,
    TimeArray,
    SampledNoiseMZArray,
    SampledNoiseIntensityArray,
    SampledNoiseBaselineArray,
}

impl Display for ArrayType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl ArrayType {
    /// The unit the array's values are reported in
    pub const fn unit(&self) -> Unit {
        match self {
            ArrayType::MZArray | ArrayType::SampledNoiseMZArray => Unit::MZ,
            ArrayType::IntensityArray
            | ArrayType::SampledNoiseIntensityArray
            | ArrayType::SampledNoiseBaselineArray => Unit::DetectorCounts,
            ArrayType::TimeArray => Unit::Minute,
        }
    }

    pub const fn as_param_const(&self) -> ParamCow<'static> {
        const CV: ControlledVocabulary = ControlledVocabulary::MS;
        match self {
            ArrayType::MZArray => CV.const_param_ident_unit("m/z array", 1000514, self.unit()),
            ArrayType::IntensityArray => {
                CV.const_param_ident_unit("intensity array", 1000515, self.unit())
            }
            ArrayType::TimeArray => CV.const_param_ident_unit("time array", 1000595, self.unit()),
            ArrayType::SampledNoiseMZArray => {
                CV.const_param_ident_unit("sampled noise m/z array", 1002743, self.unit())
            }
            ArrayType::SampledNoiseIntensityArray => {
                CV.const_param_ident_unit("sampled noise intensity array", 1002744, self.unit())
            }
            ArrayType::SampledNoiseBaselineArray => {
                CV.const_param_ident_unit("sampled noise baseline array", 1002745, self.unit())
            }
        }
    }

    pub fn as_param(&self) -> Param {
        self.as_param_const().into()
    }
}

/// The numeric type stored in a binary array. Values read from RAW files are
/// always carried at full double precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BinaryDataArrayType {
    #[default]
    Float64,
}

impl BinaryDataArrayType {
    pub const fn size_of(&self) -> usize {
        match self {
            Self::Float64 => 8,
        }
    }

    pub const fn as_param_const(&self) -> ParamCow<'static> {
        match self {
            Self::Float64 => ControlledVocabulary::MS.const_param_ident("64-bit float", 1000523),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BinaryCompressionType {
    NoCompression,
    #[default]
    Zlib,
}

impl BinaryCompressionType {
    pub const fn as_param_const(&self) -> ParamCow<'static> {
        match self {
            Self::NoCompression => {
                ControlledVocabulary::MS.const_param_ident("no compression", 1000576)
            }
            Self::Zlib => ControlledVocabulary::MS.const_param_ident("zlib compression", 1000574),
        }
    }

    pub const fn from_flag(compress: bool) -> Self {
        if compress {
            Self::Zlib
        } else {
            Self::NoCompression
        }
    }
}

#[derive(Debug, Error)]
pub enum ArrayRetrievalError {
    #[error("Failed to decompress the byte buffer: {0}")]
    DecompressionError(#[from] io::Error),
    #[error("Failed to decode base64 text: {0}")]
    Base64Error(String),
    #[error("A byte buffer of length {0} is not a whole number of 64-bit values")]
    DataTypeSizeMismatch(usize),
}

/// Lay out `values` as consecutive little endian 64-bit floats
pub fn to_bytes(values: &[f64]) -> Bytes {
    #[cfg(target_endian = "little")]
    {
        bytemuck::cast_slice::<f64, u8>(values).to_vec()
    }
    #[cfg(not(target_endian = "little"))]
    {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }
}

fn from_bytes(bytes: &[u8]) -> Result<Vec<f64>, ArrayRetrievalError> {
    if bytes.len() % 8 != 0 {
        return Err(ArrayRetrievalError::DataTypeSizeMismatch(bytes.len()));
    }
    #[cfg(target_endian = "little")]
    {
        Ok(bytemuck::pod_collect_to_vec::<u8, f64>(bytes))
    }
    #[cfg(not(target_endian = "little"))]
    {
        Ok(bytes
            .chunks_exact(8)
            .map(|c| {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(c);
                f64::from_le_bytes(buf)
            })
            .collect())
    }
}

pub(crate) fn compress_zlib(bytestring: &[u8]) -> io::Result<Bytes> {
    let mut compressor = ZlibEncoder::new(Bytes::new(), Compression::default());
    compressor.write_all(bytestring)?;
    compressor.finish()
}

pub(crate) fn decompress_zlib(bytestring: &[u8]) -> io::Result<Bytes> {
    let mut decompressor = ZlibDecoder::new(Bytes::new());
    decompressor.write_all(bytestring)?;
    decompressor.finish()
}

/// Serialize `values` to little endian doubles, passing them through a zlib
/// compressor when requested. An empty input yields an empty buffer.
pub fn encode_f64(values: &[f64], compression: BinaryCompressionType) -> io::Result<Bytes> {
    if values.is_empty() {
        return Ok(Bytes::new());
    }
    let bytestring = to_bytes(values);
    match compression {
        BinaryCompressionType::NoCompression => Ok(bytestring),
        BinaryCompressionType::Zlib => compress_zlib(&bytestring),
    }
}

/// The number of base64 characters needed to encode `byte_count` bytes
#[inline]
pub const fn encoded_length(byte_count: usize) -> usize {
    byte_count.div_ceil(3) * 4
}

pub fn to_base64(bytes: &[u8]) -> String {
    base64_simd::STANDARD.encode_to_string(bytes)
}

pub fn from_base64(text: &[u8]) -> Result<Bytes, ArrayRetrievalError> {
    base64_simd::STANDARD
        .decode_to_vec(text)
        .map_err(|e| ArrayRetrievalError::Base64Error(e.to_string()))
}

/// Reverse [`encode_f64`] followed by [`to_base64`]
pub fn decode_f64(
    text: &[u8],
    compression: BinaryCompressionType,
) -> Result<Vec<f64>, ArrayRetrievalError> {
    let raw = from_base64(text)?;
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let bytes = match compression {
        BinaryCompressionType::NoCompression => raw,
        BinaryCompressionType::Zlib => decompress_zlib(&raw)?,
    };
    from_bytes(&bytes)
}

#[cfg(test)]
mod test {
    use super::*;

    fn round_trip(values: &[f64], compression: BinaryCompressionType) -> Vec<f64> {
        let bytes = encode_f64(values, compression).unwrap();
        let text = to_base64(&bytes);
        assert_eq!(text.len(), encoded_length(bytes.len()));
        decode_f64(text.as_bytes(), compression).unwrap()
    }

    #[test]
    fn test_round_trip_bit_exact() {
        let values = vec![
            0.1 + 0.2,
            std::f64::consts::PI,
            1e-300,
            -2.5e12,
            f64::MIN_POSITIVE,
            445.120_025_634_765_6,
        ];
        for compression in [BinaryCompressionType::Zlib, BinaryCompressionType::NoCompression] {
            let decoded = round_trip(&values, compression);
            assert_eq!(decoded.len(), values.len());
            for (a, b) in decoded.iter().zip(values.iter()) {
                assert_eq!(a.to_bits(), b.to_bits());
            }
            assert_eq!(round_trip(&[42.0], compression), vec![42.0]);
            assert!(round_trip(&[], compression).is_empty());
        }
    }

    #[test]
    fn test_empty_encodes_to_nothing() {
        assert!(encode_f64(&[], BinaryCompressionType::Zlib).unwrap().is_empty());
        assert!(encode_f64(&[], BinaryCompressionType::NoCompression)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_uncompressed_layout() {
        let bytes = encode_f64(&[1.0, 2.0], BinaryCompressionType::NoCompression).unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[..8], &1.0f64.to_le_bytes());
        let compressed = encode_f64(&[1.0, 2.0], BinaryCompressionType::Zlib).unwrap();
        assert_eq!(decompress_zlib(&compressed).unwrap(), bytes);
    }

    #[test]
    fn test_encoded_length() {
        for (n, expected) in [(0, 0), (1, 4), (2, 4), (3, 4), (4, 8), (16, 24), (24, 32)] {
            assert_eq!(encoded_length(n), expected);
            let buf = vec![7u8; n];
            assert_eq!(to_base64(&buf).len(), expected);
        }
    }

    #[test]
    fn test_bad_input() {
        assert!(matches!(
            decode_f64(b"AAAA", BinaryCompressionType::NoCompression),
            Err(ArrayRetrievalError::DataTypeSizeMismatch(3))
        ));
        assert!(decode_f64(b"!!!", BinaryCompressionType::NoCompression).is_err());
    }

    #[test]
    fn test_array_terms() {
        let p = ArrayType::IntensityArray.as_param();
        assert_eq!(p.accession, Some(1000515));
        assert_eq!(p.unit, Unit::DetectorCounts);
        assert_eq!(ArrayType::TimeArray.as_param_const().unit, Unit::Minute);
        assert_eq!(
            BinaryCompressionType::from_flag(false).as_param_const().accession,
            Some(1000576)
        );
    }
}
