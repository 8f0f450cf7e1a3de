use std::error::Error;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use std::collections::BTreeMap;
use byteorder::{LittleEndian, ReadBytesExt};
use super::types::{GGUFValue, GGUFError, GGUFValueType, quantization_label};
use super::gguf_utils::{self, GGUF_MAGIC};
use tracing::debug;

/// Arrays longer than this keep only their leading elements
const ARRAY_PREVIEW: u64 = 8;

/// Header metadata of a GGUF model file.
///
/// Only the key/value section is decoded; tensor descriptors and weights
/// are left to llama.cpp.
pub struct GGUFReader {
    /// Path to the GGUF file
    pub path: PathBuf,
    /// Format version from the header
    pub version: u32,
    /// Number of tensors in the file
    pub tensor_count: u64,
    /// Metadata key-value pairs
    pub metadata: BTreeMap<String, GGUFValue>,
}

impl GGUFReader {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let mut gguf = Self::from_reader(&mut reader)?;
        gguf.path = path.to_path_buf();
        Ok(gguf)
    }

    pub fn from_reader<R: Read + Seek>(reader: &mut R) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let magic = reader.read_u32::<LittleEndian>()?;
        if magic != GGUF_MAGIC {
            return Err(Box::new(GGUFError::InvalidFormat("Invalid magic number".into())));
        }

        let version = reader.read_u32::<LittleEndian>()?;
        if version == 0 || version > 3 {
            return Err(Box::new(GGUFError::InvalidFormat(format!("Unsupported version: {}", version))));
        }

        let tensor_count = gguf_utils::read_len(reader, version)?;
        let metadata_count = gguf_utils::read_len(reader, version)?;

        debug!("Reading GGUF header: version {}, {} tensors, {} metadata entries", version, tensor_count, metadata_count);

        let mut metadata = BTreeMap::new();
        for _ in 0..metadata_count {
            let (key, value) = read_metadata_kv(reader, version)?;
            metadata.insert(key, value);
        }

        Ok(Self {
            path: PathBuf::new(),
            version,
            tensor_count,
            metadata,
        })
    }

    pub fn get(&self, key: &str) -> Option<&GGUFValue> {
        self.metadata.get(key)
    }

    pub fn architecture(&self) -> Option<&str> {
        self.get("general.architecture").and_then(GGUFValue::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.get("general.name").and_then(GGUFValue::as_str)
    }

    pub fn file_type(&self) -> Option<i64> {
        self.get("general.file_type").and_then(GGUFValue::as_int)
    }

    pub fn quantization(&self) -> Option<&'static str> {
        self.file_type().and_then(quantization_label)
    }

    /// Training context length, stored under `<architecture>.context_length`
    pub fn context_length(&self) -> Option<u64> {
        let arch = self.architecture()?;
        self.get(&format!("{}.context_length", arch))
            .and_then(GGUFValue::as_int)
            .and_then(|n| u64::try_from(n).ok())
    }

    pub fn chat_template(&self) -> Option<&str> {
        self.get("tokenizer.chat_template").and_then(GGUFValue::as_str)
    }
}

fn read_metadata_kv<R: Read + Seek>(reader: &mut R, version: u32) -> Result<(String, GGUFValue), Box<dyn Error + Send + Sync>> {
    let key = gguf_utils::read_string(reader, version, false)?;

    let value_type = GGUFValueType::try_from(reader.read_u32::<LittleEndian>()?)?;

    let value = match value_type {
        GGUFValueType::ARRAY => {
            let element_type = GGUFValueType::try_from(reader.read_u32::<LittleEndian>()?)?;
            let arr_len = gguf_utils::read_len(reader, version)?;

            let kept = arr_len.min(ARRAY_PREVIEW);
            let mut array = Vec::with_capacity(kept as usize);
            for _ in 0..kept {
                array.push(gguf_utils::read_value_by_type(reader, element_type, version)?);
            }
            // Vocabularies run to six figures; step over what we do not keep.
            for _ in kept..arr_len {
                gguf_utils::skip_value(reader, element_type, version)?;
            }

            if arr_len > kept {
                GGUFValue::TruncatedArray(array, arr_len)
            } else {
                GGUFValue::Array(array)
            }
        },
        _ => gguf_utils::read_value_by_type(reader, value_type, version)?,
    };

    Ok((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::{Cursor, Write};

    fn write_str(buf: &mut Vec<u8>, s: &str) {
        buf.write_u64::<LittleEndian>(s.len() as u64).unwrap();
        buf.write_all(s.as_bytes()).unwrap();
    }

    fn header(kv_count: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(GGUF_MAGIC).unwrap();
        buf.write_u32::<LittleEndian>(3).unwrap();
        buf.write_u64::<LittleEndian>(0).unwrap();
        buf.write_u64::<LittleEndian>(kv_count).unwrap();
        buf
    }

    fn sample_file() -> Vec<u8> {
        let mut buf = header(6);

        write_str(&mut buf, "general.architecture");
        buf.write_u32::<LittleEndian>(8).unwrap();
        write_str(&mut buf, "smollm3");

        write_str(&mut buf, "general.name");
        buf.write_u32::<LittleEndian>(8).unwrap();
        write_str(&mut buf, "SmolLM3 3B");

        write_str(&mut buf, "general.file_type");
        buf.write_u32::<LittleEndian>(4).unwrap();
        buf.write_u32::<LittleEndian>(15).unwrap();

        write_str(&mut buf, "smollm3.context_length");
        buf.write_u32::<LittleEndian>(4).unwrap();
        buf.write_u32::<LittleEndian>(65536).unwrap();

        write_str(&mut buf, "tokenizer.ggml.tokens");
        buf.write_u32::<LittleEndian>(9).unwrap();
        buf.write_u32::<LittleEndian>(8).unwrap();
        buf.write_u64::<LittleEndian>(20).unwrap();
        for i in 0..20 {
            write_str(&mut buf, &format!("tok{}", i));
        }

        write_str(&mut buf, "tokenizer.ggml.add_bos_token");
        buf.write_u32::<LittleEndian>(7).unwrap();
        buf.write_u8(0).unwrap();

        buf
    }

    #[test]
    fn test_reads_general_metadata() {
        let reader = GGUFReader::from_reader(&mut Cursor::new(sample_file())).unwrap();

        assert_eq!(reader.version, 3);
        assert_eq!(reader.architecture(), Some("smollm3"));
        assert_eq!(reader.name(), Some("SmolLM3 3B"));
        assert_eq!(reader.quantization(), Some("Q4_K_M"));
        assert_eq!(reader.context_length(), Some(65536));
        assert_eq!(reader.chat_template(), None);
    }

    #[test]
    fn test_long_arrays_are_truncated_and_skipped() {
        let reader = GGUFReader::from_reader(&mut Cursor::new(sample_file())).unwrap();

        match reader.get("tokenizer.ggml.tokens") {
            Some(GGUFValue::TruncatedArray(kept, total)) => {
                assert_eq!(kept.len(), 8);
                assert_eq!(*total, 20);
                assert_eq!(kept[0], GGUFValue::String("tok0".to_string()));
            }
            other => panic!("unexpected value: {:?}", other),
        }
        // The entry after the skipped array still decodes.
        assert_eq!(reader.get("tokenizer.ggml.add_bos_token"), Some(&GGUFValue::Bool(false)));
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut buf = sample_file();
        buf[0] = b'X';
        let err = GGUFReader::from_reader(&mut Cursor::new(buf)).err().unwrap();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_rejects_unknown_value_type() {
        let mut buf = header(1);
        write_str(&mut buf, "general.weird");
        buf.write_u32::<LittleEndian>(99).unwrap();

        assert!(GGUFReader::from_reader(&mut Cursor::new(buf)).is_err());
    }

    #[test]
    fn test_missing_keys() {
        let reader = GGUFReader::from_reader(&mut Cursor::new(header(0))).unwrap();
        assert!(reader.get("general.name").is_none());
        assert_eq!(reader.name(), None);
        assert_eq!(reader.context_length(), None);
    }

    #[test]
    fn test_oversized_string_length_is_an_error() {
        let mut buf = header(1);
        // Key claims a terabyte but only a few bytes follow
        buf.write_u64::<LittleEndian>(1 << 40).unwrap();
        buf.write_all(b"general").unwrap();

        let err = GGUFReader::from_reader(&mut Cursor::new(buf)).err().unwrap();
        assert!(err.to_string().contains("Truncated string"));
    }
}
