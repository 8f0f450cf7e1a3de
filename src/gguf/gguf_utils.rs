use std::fs::File;
use std::path::Path;
use std::io::{Read, Seek, SeekFrom};
use byteorder::{LittleEndian, ReadBytesExt};
use super::types::{GGUFValue, GGUFValueType, GGUFError};
use std::error::Error;

/// The magic number that identifies GGUF files
pub const GGUF_MAGIC: u32 = 0x46554747; // "GGUF" in ASCII

/// Read a length or count; v1 files use 32-bit fields, later versions 64-bit
pub fn read_len<R: Read>(reader: &mut R, version: u32) -> Result<u64, Box<dyn Error + Send + Sync>> {
    if version >= 2 {
        Ok(reader.read_u64::<LittleEndian>()?)
    } else {
        Ok(reader.read_u32::<LittleEndian>()? as u64)
    }
}

/// Read a string value from the reader
/// If skip_content is true, just read the length and skip the content
pub fn read_string<R: Read + Seek>(reader: &mut R, version: u32, skip_content: bool) -> Result<String, Box<dyn Error + Send + Sync>> {
    let str_len = read_len(reader, version)?;

    if skip_content {
        reader.seek(SeekFrom::Current(str_len as i64))?;
        Ok(String::new())
    } else {
        // Grow with the data actually present; the length comes from the file.
        let mut buffer = Vec::new();
        reader.by_ref().take(str_len).read_to_end(&mut buffer)?;
        if buffer.len() as u64 != str_len {
            return Err(Box::new(GGUFError::InvalidFormat(format!(
                "Truncated string: expected {} bytes, found {}",
                str_len,
                buffer.len()
            ))));
        }

        let string = String::from_utf8(buffer)
            .map_err(|e| Box::new(GGUFError::InvalidFormat(format!("Invalid UTF-8 in string: {}", e))))?;

        Ok(string)
    }
}

/// Read a scalar or string GGUF value of the specified type
pub fn read_value_by_type<R: Read + Seek>(reader: &mut R, value_type: GGUFValueType, version: u32) -> Result<GGUFValue, Box<dyn Error + Send + Sync>> {
    let value = match value_type {
        GGUFValueType::UINT8 => GGUFValue::Int(reader.read_u8()? as i64),
        GGUFValueType::INT8 => GGUFValue::Int(reader.read_i8()? as i64),
        GGUFValueType::UINT16 => GGUFValue::Int(reader.read_u16::<LittleEndian>()? as i64),
        GGUFValueType::INT16 => GGUFValue::Int(reader.read_i16::<LittleEndian>()? as i64),
        GGUFValueType::UINT32 => GGUFValue::Int(reader.read_u32::<LittleEndian>()? as i64),
        GGUFValueType::INT32 => GGUFValue::Int(reader.read_i32::<LittleEndian>()? as i64),
        GGUFValueType::FLOAT32 => GGUFValue::Float(reader.read_f32::<LittleEndian>()? as f64),
        GGUFValueType::BOOL => GGUFValue::Bool(reader.read_u8()? != 0),
        GGUFValueType::STRING => GGUFValue::String(read_string(reader, version, false)?),
        GGUFValueType::UINT64 => GGUFValue::Int(reader.read_u64::<LittleEndian>()? as i64),
        GGUFValueType::INT64 => GGUFValue::Int(reader.read_i64::<LittleEndian>()?),
        GGUFValueType::FLOAT64 => GGUFValue::Float(reader.read_f64::<LittleEndian>()?),
        GGUFValueType::ARRAY => {
            return Err(Box::new(GGUFError::InvalidFormat(
                "Nested arrays are not supported".to_string()
            )));
        }
    };
    Ok(value)
}

/// Skip one value of the given type without decoding it
pub fn skip_value<R: Read + Seek>(reader: &mut R, value_type: GGUFValueType, version: u32) -> Result<(), Box<dyn Error + Send + Sync>> {
    match value_type.fixed_size() {
        Some(size) => {
            reader.seek(SeekFrom::Current(size as i64))?;
        }
        None => {
            read_string(reader, version, true)?;
        }
    }
    Ok(())
}

/// Checks if a file at the given path is a GGUF format file by verifying its magic number.
///
/// # Arguments
///
/// * `path` - Path to the file to check
///
/// # Returns
///
/// `true` if the file exists and has a valid GGUF magic number, `false` otherwise
pub fn is_gguf_file<P: AsRef<Path>>(path: P) -> bool {
    if let Ok(mut file) = File::open(path) {
        if let Ok(magic) = file.read_u32::<LittleEndian>() {
            return magic == GGUF_MAGIC;
        }
    }
    false
}
