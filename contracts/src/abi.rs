//! Contract ABI for the song stash contract
//!
//! Function selectors are the first 4 bytes of the blake3 hash of the canonical
//! signature (the same role keccak256 plays on EVM chains). Parameters are encoded
//! as a type tag followed by the payload; variable-length payloads carry a
//! big-endian `u32` length prefix.

use serde::{Deserialize, Serialize};

use crate::errors::ContractError;

/// Size of function selector in bytes (first 4 bytes of blake3 hash)
pub const SELECTOR_SIZE: usize = 4;

/// Maximum encoded size of one variable-length parameter (1 MiB)
pub const MAX_PARAM_SIZE: usize = 1 << 20;

/// Size of an account address
pub const ADDRESS_SIZE: usize = 20;

/// Width of an encoded `uint256`
const UINT_SIZE: usize = 32;

/// Ledger account address
pub type Address = [u8; ADDRESS_SIZE];

/// ABI type identifiers for encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ABIType {
    /// 256-bit unsigned integer; values above `u64::MAX` are rejected
    Uint = 0,
    /// 8-bit unsigned integer
    Uint8 = 1,
    /// Boolean value
    Bool = 2,
    /// 20-byte account address
    Address = 3,
    /// UTF-8 string
    String = 4,
    /// Variable-size bytes (ciphertexts and proofs)
    Bytes = 5,
}

impl ABIType {
    /// Convert byte to ABIType
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(ABIType::Uint),
            1 => Some(ABIType::Uint8),
            2 => Some(ABIType::Bool),
            3 => Some(ABIType::Address),
            4 => Some(ABIType::String),
            5 => Some(ABIType::Bytes),
            _ => None,
        }
    }

    /// Get canonical type string for signature
    pub fn type_string(&self) -> &'static str {
        match self {
            ABIType::Uint => "uint256",
            ABIType::Uint8 => "uint8",
            ABIType::Bool => "bool",
            ABIType::Address => "address",
            ABIType::String => "string",
            ABIType::Bytes => "bytes",
        }
    }
}

/// ABI value - typed parameter value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ABIValue {
    Uint(u64),
    Uint8(u8),
    Bool(bool),
    Address(Address),
    String(String),
    Bytes(Vec<u8>),
}

impl ABIValue {
    /// Get the type of this value
    pub fn abi_type(&self) -> ABIType {
        match self {
            ABIValue::Uint(_) => ABIType::Uint,
            ABIValue::Uint8(_) => ABIType::Uint8,
            ABIValue::Bool(_) => ABIType::Bool,
            ABIValue::Address(_) => ABIType::Address,
            ABIValue::String(_) => ABIType::String,
            ABIValue::Bytes(_) => ABIType::Bytes,
        }
    }

    fn unexpected(&self, expected: &str) -> ContractError {
        ContractError::ABIDecodingError(format!(
            "Expected {}, got {}",
            expected,
            self.abi_type().type_string()
        ))
    }

    pub fn as_uint(&self) -> Result<u64, ContractError> {
        match self {
            ABIValue::Uint(v) => Ok(*v),
            _ => Err(self.unexpected("uint256")),
        }
    }

    pub fn as_uint8(&self) -> Result<u8, ContractError> {
        match self {
            ABIValue::Uint8(v) => Ok(*v),
            _ => Err(self.unexpected("uint8")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, ContractError> {
        match self {
            ABIValue::Bool(v) => Ok(*v),
            _ => Err(self.unexpected("bool")),
        }
    }

    pub fn as_address(&self) -> Result<Address, ContractError> {
        match self {
            ABIValue::Address(v) => Ok(*v),
            _ => Err(self.unexpected("address")),
        }
    }

    pub fn as_str(&self) -> Result<&str, ContractError> {
        match self {
            ABIValue::String(v) => Ok(v),
            _ => Err(self.unexpected("string")),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8], ContractError> {
        match self {
            ABIValue::Bytes(v) => Ok(v),
            _ => Err(self.unexpected("bytes")),
        }
    }
}

/// Compute function selector from signature string
///
/// Example: "recordPlay(uint256,bytes,bytes)" -> [0x.., 0x.., 0x.., 0x..]
pub fn compute_selector(signature: &str) -> [u8; SELECTOR_SIZE] {
    let hash = blake3::hash(signature.as_bytes());
    let bytes = hash.as_bytes();
    [bytes[0], bytes[1], bytes[2], bytes[3]]
}

/// Build canonical function signature from name and parameter types
pub fn build_signature(name: &str, param_types: &[ABIType]) -> String {
    let types: Vec<&str> = param_types.iter().map(|t| t.type_string()).collect();
    format!("{}({})", name, types.join(","))
}

/// Function ABI definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionABI {
    /// Function name
    pub name: String,
    /// 4-byte function selector
    pub selector: [u8; SELECTOR_SIZE],
    /// Input parameter types
    pub inputs: Vec<ABIType>,
    /// Output parameter types
    pub outputs: Vec<ABIType>,
    /// Whether function mutates state
    pub mutates: bool,
}

impl FunctionABI {
    pub fn new(name: &str, inputs: Vec<ABIType>, outputs: Vec<ABIType>, mutates: bool) -> Self {
        let selector = compute_selector(&build_signature(name, &inputs));
        Self {
            name: name.to_string(),
            selector,
            inputs,
            outputs,
            mutates,
        }
    }

    /// Get canonical signature string
    pub fn signature(&self) -> String {
        build_signature(&self.name, &self.inputs)
    }

    /// Check if selector matches
    pub fn matches_selector(&self, selector: &[u8]) -> bool {
        selector.len() >= SELECTOR_SIZE && self.selector == selector[..SELECTOR_SIZE]
    }

    /// Validate input parameters
    pub fn validate_inputs(&self, params: &[ABIValue]) -> Result<(), ContractError> {
        validate_types(&self.inputs, params)
    }

    /// Validate return values
    pub fn validate_outputs(&self, values: &[ABIValue]) -> Result<(), ContractError> {
        validate_types(&self.outputs, values)
    }
}

fn validate_types(expected: &[ABIType], values: &[ABIValue]) -> Result<(), ContractError> {
    if values.len() != expected.len() {
        return Err(ContractError::ParameterCountMismatch {
            expected: expected.len(),
            got: values.len(),
        });
    }
    for (index, (value, expected_type)) in values.iter().zip(expected).enumerate() {
        if value.abi_type() != *expected_type {
            return Err(ContractError::InvalidParameterType {
                index,
                message: format!(
                    "expected {}, got {}",
                    expected_type.type_string(),
                    value.abi_type().type_string()
                ),
            });
        }
    }
    Ok(())
}

/// Contract ABI - collection of function ABIs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractABI {
    pub name: String,
    pub functions: Vec<FunctionABI>,
}

impl ContractABI {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            functions: Vec::new(),
        }
    }

    pub fn add_function(&mut self, function: FunctionABI) {
        self.functions.push(function);
    }

    /// Find function by selector
    pub fn get_function_by_selector(&self, selector: &[u8]) -> Option<&FunctionABI> {
        self.functions.iter().find(|f| f.matches_selector(selector))
    }

    /// Find function by name
    pub fn get_function_by_name(&self, name: &str) -> Option<&FunctionABI> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// ABI Encoder - encodes typed parameters into bytes
#[derive(Default)]
pub struct ABIEncoder {
    buffer: Vec<u8>,
}

impl ABIEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create encoder with function selector prefix
    pub fn with_selector(selector: [u8; SELECTOR_SIZE]) -> Self {
        let mut encoder = Self::new();
        encoder.buffer.extend_from_slice(&selector);
        encoder
    }

    /// Encode a value
    pub fn encode(&mut self, value: &ABIValue) -> Result<(), ContractError> {
        self.buffer.push(value.abi_type() as u8);

        match value {
            ABIValue::Uint(v) => {
                self.buffer.extend_from_slice(&[0u8; UINT_SIZE - 8]);
                self.buffer.extend_from_slice(&v.to_be_bytes());
            }
            ABIValue::Uint8(v) => self.buffer.push(*v),
            ABIValue::Bool(v) => self.buffer.push(u8::from(*v)),
            ABIValue::Address(v) => self.buffer.extend_from_slice(v),
            ABIValue::String(v) => self.put_variable(v.as_bytes())?,
            ABIValue::Bytes(v) => self.put_variable(v)?,
        }

        Ok(())
    }

    fn put_variable(&mut self, data: &[u8]) -> Result<(), ContractError> {
        if data.len() > MAX_PARAM_SIZE {
            return Err(ContractError::ABIEncodingError(format!(
                "Parameter too large: {} > {}",
                data.len(),
                MAX_PARAM_SIZE
            )));
        }
        self.buffer
            .extend_from_slice(&(data.len() as u32).to_be_bytes());
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Encode multiple values
    pub fn encode_all(&mut self, values: &[ABIValue]) -> Result<(), ContractError> {
        values.iter().try_for_each(|value| self.encode(value))
    }

    /// Get encoded bytes
    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }
}

/// ABI Decoder - decodes bytes into typed parameters
pub struct ABIDecoder<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ABIDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Read function selector
    pub fn read_selector(&mut self) -> Result<[u8; SELECTOR_SIZE], ContractError> {
        let mut selector = [0u8; SELECTOR_SIZE];
        selector.copy_from_slice(self.read_bytes(SELECTOR_SIZE)?);
        Ok(selector)
    }

    /// Decode next value
    pub fn decode(&mut self) -> Result<ABIValue, ContractError> {
        let type_tag = self.read_byte()?;
        let abi_type = ABIType::from_byte(type_tag).ok_or_else(|| {
            ContractError::ABIDecodingError(format!("Unknown type tag: {}", type_tag))
        })?;

        match abi_type {
            ABIType::Uint => {
                let bytes = self.read_bytes(UINT_SIZE)?;
                let (high, low) = bytes.split_at(UINT_SIZE - 8);
                if high.iter().any(|b| *b != 0) {
                    return Err(ContractError::ABIDecodingError(
                        "uint256 value exceeds 64 bits".to_string(),
                    ));
                }
                let mut buf = [0u8; 8];
                buf.copy_from_slice(low);
                Ok(ABIValue::Uint(u64::from_be_bytes(buf)))
            }
            ABIType::Uint8 => Ok(ABIValue::Uint8(self.read_byte()?)),
            ABIType::Bool => match self.read_byte()? {
                0 => Ok(ABIValue::Bool(false)),
                1 => Ok(ABIValue::Bool(true)),
                other => Err(ContractError::ABIDecodingError(format!(
                    "Invalid bool byte: {}",
                    other
                ))),
            },
            ABIType::Address => {
                let mut address = [0u8; ADDRESS_SIZE];
                address.copy_from_slice(self.read_bytes(ADDRESS_SIZE)?);
                Ok(ABIValue::Address(address))
            }
            ABIType::String => {
                let bytes = self.read_variable()?;
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| ContractError::ABIDecodingError(e.to_string()))?;
                Ok(ABIValue::String(text.to_string()))
            }
            ABIType::Bytes => Ok(ABIValue::Bytes(self.read_variable()?.to_vec())),
        }
    }

    /// Decode all remaining values
    pub fn decode_all(&mut self) -> Result<Vec<ABIValue>, ContractError> {
        let mut values = Vec::new();
        while !self.is_empty() {
            values.push(self.decode()?);
        }
        Ok(values)
    }

    /// Get remaining bytes count
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Check if at end
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn read_byte(&mut self) -> Result<u8, ContractError> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], ContractError> {
        if self.remaining() < n {
            return Err(ContractError::ABIDecodingError(format!(
                "Not enough data: need {}, have {}",
                n,
                self.remaining()
            )));
        }
        let bytes = &self.data[self.position..self.position + n];
        self.position += n;
        Ok(bytes)
    }

    fn read_variable(&mut self) -> Result<&'a [u8], ContractError> {
        let mut len = [0u8; 4];
        len.copy_from_slice(self.read_bytes(4)?);
        let len = u32::from_be_bytes(len) as usize;
        if len > MAX_PARAM_SIZE {
            return Err(ContractError::ABIDecodingError(format!(
                "Parameter too large: {}",
                len
            )));
        }
        self.read_bytes(len)
    }
}

/// Encode function call with selector and parameters
pub fn encode_function_call(
    function: &FunctionABI,
    params: &[ABIValue],
) -> Result<Vec<u8>, ContractError> {
    function.validate_inputs(params)?;
    let mut encoder = ABIEncoder::with_selector(function.selector);
    encoder.encode_all(params)?;
    Ok(encoder.finish())
}

/// Decode function call to extract selector and parameters
pub fn decode_function_call(
    data: &[u8],
) -> Result<([u8; SELECTOR_SIZE], Vec<ABIValue>), ContractError> {
    let mut decoder = ABIDecoder::new(data);
    let selector = decoder.read_selector()?;
    let params = decoder.decode_all()?;
    Ok((selector, params))
}

/// Encode return values
pub fn encode_return(values: &[ABIValue]) -> Result<Vec<u8>, ContractError> {
    let mut encoder = ABIEncoder::new();
    encoder.encode_all(values)?;
    Ok(encoder.finish())
}

/// Decode return values
pub fn decode_return(data: &[u8]) -> Result<Vec<ABIValue>, ContractError> {
    ABIDecoder::new(data).decode_all()
}
