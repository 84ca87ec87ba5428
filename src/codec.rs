//! Response decoding: ASCII value lists and IEEE 488.2 binary blocks.
//!
//! Two reply shapes cover everything the drivers read back:
//!
//! - ASCII lists such as `"1.0e-3,2.5,7"` or the preamble answer
//!   `"0.0;4.0e-7;0.0;0.04;127;"`, decoded by [`parse_ascii_values`].
//! - Definite-length binary blocks `#<n><len><payload>` (and the indefinite
//!   `#0<payload><terminator>` form), framed by [`BlockHeader`] and decoded into
//!   samples by [`decode_samples`].
//!
//! Raw samples become physical units with [`Scaling`].

use crate::error::{AppResult, ScpiError};

/// Decode an ASCII list of numbers.
///
/// Empty fields are skipped, so trailing separators (`"1;2;"`) are accepted.
pub fn parse_ascii_values(answer: &str, separator: char) -> AppResult<Vec<f64>> {
    answer
        .trim()
        .split(separator)
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(|field| {
            field
                .parse::<f64>()
                .map_err(|e| ScpiError::parse("", answer, format!("field '{}': {}", field, e)))
        })
        .collect()
}

/// Parsed `#<n><len>` prefix of a binary block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Bytes taken by the header itself, including any leading whitespace
    pub header_len: usize,
    /// Declared payload length, `None` for an indefinite (`#0`) block
    pub payload_len: Option<usize>,
}

impl BlockHeader {
    /// Parse the header at the start of `bytes`.
    ///
    /// Returns `Ok(None)` when more bytes are needed to see the whole header.
    pub fn parse(bytes: &[u8]) -> AppResult<Option<Self>> {
        let skip = bytes
            .iter()
            .take_while(|b| b.is_ascii_whitespace())
            .count();
        let bytes = &bytes[skip..];

        let Some(&first) = bytes.first() else {
            return Ok(None);
        };
        if first != b'#' {
            return Err(ScpiError::Block(format!(
                "expected '#', found byte 0x{:02x}",
                first
            )));
        }
        let Some(&digit) = bytes.get(1) else {
            return Ok(None);
        };
        if !digit.is_ascii_digit() {
            return Err(ScpiError::Block(format!(
                "invalid length-of-length byte 0x{:02x}",
                digit
            )));
        }
        let n = usize::from(digit - b'0');
        if n == 0 {
            return Ok(Some(Self {
                header_len: skip + 2,
                payload_len: None,
            }));
        }
        let Some(len_digits) = bytes.get(2..2 + n) else {
            return Ok(None);
        };
        let len_text = std::str::from_utf8(len_digits)
            .map_err(|_| ScpiError::Block("non-ASCII length field".into()))?;
        let payload_len = len_text
            .parse::<usize>()
            .map_err(|_| ScpiError::Block(format!("invalid length field '{}'", len_text)))?;

        Ok(Some(Self {
            header_len: skip + 2 + n,
            payload_len: Some(payload_len),
        }))
    }
}

/// Extract the payload of a complete binary block response.
///
/// Bytes after a definite-length payload (the terminator) are ignored; an
/// indefinite block runs to the end with one trailing newline removed.
pub fn parse_ieee_block(bytes: &[u8]) -> AppResult<&[u8]> {
    let header = BlockHeader::parse(bytes)?
        .ok_or_else(|| ScpiError::Block(format!("truncated header ({} bytes)", bytes.len())))?;
    let body = &bytes[header.header_len..];
    match header.payload_len {
        Some(len) if body.len() < len => Err(ScpiError::Block(format!(
            "declared {} payload bytes, received {}",
            len,
            body.len()
        ))),
        Some(len) => Ok(&body[..len]),
        None => Ok(body.strip_suffix(b"\n").unwrap_or(body)),
    }
}

/// Frame `payload` as a definite-length block.
pub fn encode_ieee_block(payload: &[u8]) -> Vec<u8> {
    let len = payload.len().to_string();
    let mut out = Vec::with_capacity(2 + len.len() + payload.len());
    out.push(b'#');
    out.extend_from_slice(len.len().to_string().as_bytes());
    out.extend_from_slice(len.as_bytes());
    out.extend_from_slice(payload);
    out
}

/// Sample type inside a binary block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// Signed byte
    I8,
    /// Unsigned byte
    U8,
    /// Signed 16-bit integer
    I16,
    /// Unsigned 16-bit integer
    U16,
    /// Signed 32-bit integer
    I32,
    /// Unsigned 32-bit integer
    U32,
    /// IEEE single
    F32,
    /// IEEE double
    F64,
}

impl DataType {
    /// Bytes per sample.
    pub fn size(self) -> usize {
        match self {
            DataType::I8 | DataType::U8 => 1,
            DataType::I16 | DataType::U16 => 2,
            DataType::I32 | DataType::U32 | DataType::F32 => 4,
            DataType::F64 => 8,
        }
    }
}

/// Byte order of multi-byte samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// Most significant byte first (SCPI default)
    #[default]
    Big,
    /// Least significant byte first
    Little,
}

/// Decode a block payload into samples.
pub fn decode_samples(payload: &[u8], dtype: DataType, order: ByteOrder) -> AppResult<Vec<f64>> {
    let size = dtype.size();
    if payload.len() % size != 0 {
        return Err(ScpiError::Block(format!(
            "{} payload bytes is not a whole number of {:?} samples",
            payload.len(),
            dtype
        )));
    }

    macro_rules! decode {
        ($ty:ty) => {
            payload
                .chunks_exact(size)
                .map(|chunk| {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(chunk);
                    let v = match order {
                        ByteOrder::Big => <$ty>::from_be_bytes(raw),
                        ByteOrder::Little => <$ty>::from_le_bytes(raw),
                    };
                    f64::from(v)
                })
                .collect()
        };
    }

    Ok(match dtype {
        DataType::I8 => payload.iter().map(|b| f64::from(*b as i8)).collect(),
        DataType::U8 => payload.iter().map(|b| f64::from(*b)).collect(),
        DataType::I16 => decode!(i16),
        DataType::U16 => decode!(u16),
        DataType::I32 => decode!(i32),
        DataType::U32 => decode!(u32),
        DataType::F32 => decode!(f32),
        DataType::F64 => decode!(f64),
    })
}

/// Linear conversion from raw digitizer codes to physical units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaling {
    /// Physical value at the reference code
    pub zero: f64,
    /// Units per code
    pub scale: f64,
    /// Reference code
    pub offset: f64,
}

impl Scaling {
    /// `(raw - offset) * scale + zero`
    pub fn apply(&self, raw: f64) -> f64 {
        (raw - self.offset) * self.scale + self.zero
    }

    /// Convert a whole buffer.
    pub fn apply_all(&self, raw: &[f64]) -> Vec<f64> {
        raw.iter().map(|r| self.apply(*r)).collect()
    }
}

/// Evenly spaced axis `x_zero + i * x_increment` for `n` samples.
pub fn time_axis(x_zero: f64, x_increment: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| x_zero + i as f64 * x_increment).collect()
}
