//! Encoding numeric arrays into the `<binaryDataArray>` representation: little endian
//! IEEE-754 doubles, optionally zlib compressed, then base64 encoded.
mod array;
mod encodings;

pub use array::{BinaryArrayList, DataArray, EncodedArray};
pub use encodings::{
    decode_f64, encode_f64, encoded_length, from_base64, to_base64, to_bytes,
    ArrayRetrievalError, ArrayType, BinaryCompressionType, BinaryDataArrayType, Bytes,
};
