use std::fmt;
use std::error::Error;
use serde::{Serialize, Deserialize};

/// GGUF metadata value types that can be stored in a GGUF file
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub enum GGUFValue {
    /// String value type for text data
    String(String),
    /// Integer value type for whole numbers, stored as i64
    Int(i64),
    /// Float value type for decimal numbers, stored as f64
    Float(f64),
    /// Boolean value type for true/false values
    Bool(bool),
    /// Array value type for sequences of other GGUF values
    Array(Vec<GGUFValue>),
    /// Leading elements of an array that was too long to keep, plus its full length
    TruncatedArray(Vec<GGUFValue>, u64),
}

impl GGUFValue {
    /// Attempts to convert the value to an integer
    ///
    /// # Returns
    /// Some(i64) if the value can be converted to an integer, None otherwise
    pub fn as_int(&self) -> Option<i64> {
        match self {
            GGUFValue::Int(i) => Some(*i),
            GGUFValue::Float(f) => Some(*f as i64),
            GGUFValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GGUFValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Debug for GGUFValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GGUFValue::String(s) => write!(f, "String({:?})", s),
            GGUFValue::Int(i) => write!(f, "Int({})", i),
            GGUFValue::Float(fl) => write!(f, "Float({})", fl),
            GGUFValue::Bool(b) => write!(f, "Bool({})", b),
            GGUFValue::Array(arr) => write!(f, "Array({:?})", arr),
            GGUFValue::TruncatedArray(arr, total) => write!(f, "Array({:?} ...out of {})", arr, total),
        }
    }
}

impl fmt::Display for GGUFValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GGUFValue::String(s) => write!(f, "{}", s),
            GGUFValue::Int(i) => write!(f, "{}", i),
            GGUFValue::Float(fl) => write!(f, "{}", fl),
            GGUFValue::Bool(b) => write!(f, "{}", b),
            GGUFValue::Array(arr) => {
                write!(f, "[")?;
                for (i, value) in arr.iter().enumerate() {
                    if i > 0 { write!(f, ", ")? }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            },
            GGUFValue::TruncatedArray(arr, total) => {
                write!(f, "[")?;
                for (i, value) in arr.iter().enumerate() {
                    if i > 0 { write!(f, ", ")? }
                    write!(f, "{}", value)?;
                }
                write!(f, " ... out of {}]", total)
            }
        }
    }
}

/// Custom error types for GGUF operations
#[derive(Debug)]
pub enum GGUFError {
    /// Wraps std::io::Error for file operations
    IoError(std::io::Error),
    /// Invalid format errors with a message
    InvalidFormat(String),
}

impl fmt::Display for GGUFError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GGUFError::IoError(e) => write!(f, "I/O error: {}", e),
            GGUFError::InvalidFormat(msg) => write!(f, "Invalid GGUF format: {}", msg),
        }
    }
}

impl Error for GGUFError {}

impl From<std::io::Error> for GGUFError {
    fn from(err: std::io::Error) -> Self {
        GGUFError::IoError(err)
    }
}

/// Metadata value type identifiers from the GGUF format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GGUFValueType {
    UINT8 = 0,
    INT8 = 1,
    UINT16 = 2,
    INT16 = 3,
    UINT32 = 4,
    INT32 = 5,
    FLOAT32 = 6,
    BOOL = 7,
    STRING = 8,
    ARRAY = 9,
    UINT64 = 10,
    INT64 = 11,
    FLOAT64 = 12,
}

impl GGUFValueType {
    /// Size in bytes of a fixed-width value, `None` for strings and arrays
    pub fn fixed_size(&self) -> Option<u64> {
        match self {
            GGUFValueType::UINT8 | GGUFValueType::INT8 | GGUFValueType::BOOL => Some(1),
            GGUFValueType::UINT16 | GGUFValueType::INT16 => Some(2),
            GGUFValueType::UINT32 | GGUFValueType::INT32 | GGUFValueType::FLOAT32 => Some(4),
            GGUFValueType::UINT64 | GGUFValueType::INT64 | GGUFValueType::FLOAT64 => Some(8),
            GGUFValueType::STRING | GGUFValueType::ARRAY => None,
        }
    }
}

impl TryFrom<u32> for GGUFValueType {
    type Error = GGUFError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => GGUFValueType::UINT8,
            1 => GGUFValueType::INT8,
            2 => GGUFValueType::UINT16,
            3 => GGUFValueType::INT16,
            4 => GGUFValueType::UINT32,
            5 => GGUFValueType::INT32,
            6 => GGUFValueType::FLOAT32,
            7 => GGUFValueType::BOOL,
            8 => GGUFValueType::STRING,
            9 => GGUFValueType::ARRAY,
            10 => GGUFValueType::UINT64,
            11 => GGUFValueType::INT64,
            12 => GGUFValueType::FLOAT64,
            _ => return Err(GGUFError::InvalidFormat(format!("Unknown value type: {}", value))),
        })
    }
}

/// Maps `general.file_type` to the usual quantization label.
pub fn quantization_label(file_type: i64) -> Option<&'static str> {
    let label = match file_type {
        0 => "F32",
        1 => "F16",
        2 => "Q4_0",
        3 => "Q4_1",
        7 => "Q8_0",
        8 => "Q5_0",
        9 => "Q5_1",
        10 => "Q2_K",
        11 => "Q3_K_S",
        12 => "Q3_K_M",
        13 => "Q3_K_L",
        14 => "Q4_K_S",
        15 => "Q4_K_M",
        16 => "Q5_K_S",
        17 => "Q5_K_M",
        18 => "Q6_K",
        19 => "IQ2_XXS",
        20 => "IQ2_XS",
        21 => "Q2_K_S",
        22 => "IQ3_XS",
        23 => "IQ3_XXS",
        24 => "IQ1_S",
        25 => "IQ4_NL",
        26 => "IQ3_S",
        27 => "IQ3_M",
        28 => "IQ2_S",
        29 => "IQ2_M",
        30 => "IQ4_XS",
        31 => "IQ1_M",
        32 => "BF16",
        _ => return None,
    };
    Some(label)
}
