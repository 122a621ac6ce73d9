use std::io;

use crate::params::{ParamDescribed, ParamList};

use super::encodings::{
    encode_f64, encoded_length, to_base64, ArrayType, BinaryCompressionType,
    BinaryDataArrayType,
};

/// A named array of values that will become one `<binaryDataArray>`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DataArray {
    pub name: ArrayType,
    pub dtype: BinaryDataArrayType,
    pub compression: BinaryCompressionType,
    pub values: Vec<f64>,
    pub params: ParamList,
}

/// The serialized form of a [`DataArray`], ready to be written as XML text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedArray {
    /// The length of the encoded binary buffer, before base64 encoding
    pub byte_length: usize,
    /// The number of base64 characters, the value of the `encodedLength` attribute
    pub encoded_length: usize,
    pub text: String,
}

impl DataArray {
    pub fn new(name: ArrayType, values: Vec<f64>, compression: BinaryCompressionType) -> Self {
        Self {
            name,
            values,
            compression,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn encode(&self) -> io::Result<EncodedArray> {
        let bytes = encode_f64(&self.values, self.compression)?;
        let text = to_base64(&bytes);
        Ok(EncodedArray {
            byte_length: bytes.len(),
            encoded_length: encoded_length(bytes.len()),
            text,
        })
    }
}

impl ParamDescribed for DataArray {
    fn params(&self) -> &ParamList {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamList {
        &mut self.params
    }
}

/// An ordered collection of [`DataArray`]s. Empty arrays are never stored.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BinaryArrayList {
    arrays: Vec<DataArray>,
}

impl BinaryArrayList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an array, silently dropping it if it has no values
    pub fn add(&mut self, array: DataArray) {
        if array.is_empty() {
            return;
        }
        self.arrays.push(array);
    }

    pub fn get(&self, name: &ArrayType) -> Option<&DataArray> {
        self.arrays.iter().find(|a| a.name == *name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DataArray> {
        self.arrays.iter()
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// The number of entries in the primary array, which is the first one added
    pub fn default_array_length(&self) -> usize {
        self.arrays.first().map(|a| a.len()).unwrap_or_default()
    }
}

impl<'a> IntoIterator for &'a BinaryArrayList {
    type Item = &'a DataArray;
    type IntoIter = std::slice::Iter<'a, DataArray>;

    fn into_iter(self) -> Self::IntoIter {
        self.arrays.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::spectrum::bindata::decode_f64;

    #[test]
    fn test_empty_arrays_dropped() {
        let mut arrays = BinaryArrayList::new();
        arrays.add(DataArray::new(ArrayType::MZArray, vec![], BinaryCompressionType::Zlib));
        assert!(arrays.is_empty());
        assert_eq!(arrays.default_array_length(), 0);
        arrays.add(DataArray::new(
            ArrayType::MZArray,
            vec![100.0, 200.0, 300.0],
            BinaryCompressionType::Zlib,
        ));
        arrays.add(DataArray::new(
            ArrayType::IntensityArray,
            vec![1.0, 5.0, 2.0],
            BinaryCompressionType::Zlib,
        ));
        assert_eq!(arrays.len(), 2);
        assert_eq!(arrays.default_array_length(), 3);
        assert!(arrays.get(&ArrayType::TimeArray).is_none());
    }

    #[test]
    fn test_encode() {
        let array = DataArray::new(
            ArrayType::IntensityArray,
            vec![1.5, 2.5],
            BinaryCompressionType::NoCompression,
        );
        let encoded = array.encode().unwrap();
        assert_eq!(encoded.byte_length, 16);
        assert_eq!(encoded.encoded_length, 24);
        assert_eq!(encoded.text.len(), encoded.encoded_length);
        let back = decode_f64(encoded.text.as_bytes(), array.compression).unwrap();
        assert_eq!(back, array.values);
    }
}
