//! Contract call surface
//!
//! The four functions of the song stash contract, typed call construction and
//! the `getInfo` return tuple. Argument order matches the deployed contract.

use serde::{Deserialize, Serialize};

use crate::abi::{
    decode_function_call, decode_return, encode_function_call, encode_return, ABIType, ABIValue,
    Address, ContractABI, FunctionABI, SELECTOR_SIZE,
};
use crate::errors::ContractError;

/// Contract name used in the ABI
pub const CONTRACT_NAME: &str = "SecretSongStash";

/// Functions exposed by the song stash contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SongStashFunction {
    /// `createSong(string title, string artist, string ipfsHash, uint256 royaltyRate)`
    CreateSong,
    /// `recordPlay(uint256 songId, bytes playDuration, bytes inputProof)`
    RecordPlay,
    /// `distributeRoyalties(uint256 songId, bytes totalAmount, bytes inputProof)`
    DistributeRoyalties,
    /// `getInfo(uint256 songId)`
    GetInfo,
}

impl SongStashFunction {
    pub const ALL: [SongStashFunction; 4] = [
        SongStashFunction::CreateSong,
        SongStashFunction::RecordPlay,
        SongStashFunction::DistributeRoyalties,
        SongStashFunction::GetInfo,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SongStashFunction::CreateSong => "createSong",
            SongStashFunction::RecordPlay => "recordPlay",
            SongStashFunction::DistributeRoyalties => "distributeRoyalties",
            SongStashFunction::GetInfo => "getInfo",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn inputs(&self) -> Vec<ABIType> {
        match self {
            SongStashFunction::CreateSong => vec![
                ABIType::String,
                ABIType::String,
                ABIType::String,
                ABIType::Uint,
            ],
            SongStashFunction::RecordPlay | SongStashFunction::DistributeRoyalties => {
                vec![ABIType::Uint, ABIType::Bytes, ABIType::Bytes]
            }
            SongStashFunction::GetInfo => vec![ABIType::Uint],
        }
    }

    pub fn outputs(&self) -> Vec<ABIType> {
        match self {
            SongStashFunction::GetInfo => SongInfo::OUTPUT_TYPES.to_vec(),
            _ => vec![ABIType::Uint],
        }
    }

    /// Whether the function changes contract state
    pub fn mutates(&self) -> bool {
        !matches!(self, SongStashFunction::GetInfo)
    }

    pub fn abi(&self) -> FunctionABI {
        FunctionABI::new(self.name(), self.inputs(), self.outputs(), self.mutates())
    }

    pub fn from_selector(selector: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.abi().matches_selector(selector))
    }
}

impl std::fmt::Display for SongStashFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Full ABI of the song stash contract
pub fn song_stash_abi() -> ContractABI {
    let mut abi = ContractABI::new(CONTRACT_NAME);
    for function in SongStashFunction::ALL {
        abi.add_function(function.abi());
    }
    abi
}

/// A validated call: function plus arguments in contract order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    function: SongStashFunction,
    params: Vec<ABIValue>,
}

impl ContractCall {
    /// Build a call, checking argument count and types
    pub fn new(function: SongStashFunction, params: Vec<ABIValue>) -> Result<Self, ContractError> {
        function.abi().validate_inputs(&params)?;
        Ok(Self { function, params })
    }

    pub fn create_song(title: &str, artist: &str, ipfs_hash: &str, royalty_rate: u64) -> Self {
        Self {
            function: SongStashFunction::CreateSong,
            params: vec![
                ABIValue::String(title.to_string()),
                ABIValue::String(artist.to_string()),
                ABIValue::String(ipfs_hash.to_string()),
                ABIValue::Uint(royalty_rate),
            ],
        }
    }

    pub fn record_play(song_id: u64, play_duration: Vec<u8>, input_proof: Vec<u8>) -> Self {
        Self {
            function: SongStashFunction::RecordPlay,
            params: vec![
                ABIValue::Uint(song_id),
                ABIValue::Bytes(play_duration),
                ABIValue::Bytes(input_proof),
            ],
        }
    }

    pub fn distribute_royalties(song_id: u64, total_amount: Vec<u8>, input_proof: Vec<u8>) -> Self {
        Self {
            function: SongStashFunction::DistributeRoyalties,
            params: vec![
                ABIValue::Uint(song_id),
                ABIValue::Bytes(total_amount),
                ABIValue::Bytes(input_proof),
            ],
        }
    }

    pub fn get_info(song_id: u64) -> Self {
        Self {
            function: SongStashFunction::GetInfo,
            params: vec![ABIValue::Uint(song_id)],
        }
    }

    pub fn function(&self) -> SongStashFunction {
        self.function
    }

    /// Contract function name, e.g. `recordPlay`
    pub fn name(&self) -> &'static str {
        self.function.name()
    }

    pub fn params(&self) -> &[ABIValue] {
        &self.params
    }

    /// Song id argument, for every function that takes one
    pub fn song_id(&self) -> Option<u64> {
        match self.function {
            SongStashFunction::CreateSong => None,
            _ => self.params.first().and_then(|p| p.as_uint().ok()),
        }
    }

    /// Selector-prefixed call data
    pub fn encode(&self) -> Result<Vec<u8>, ContractError> {
        encode_function_call(&self.function.abi(), &self.params)
    }

    /// Parse call data produced by [`ContractCall::encode`]
    pub fn decode(data: &[u8]) -> Result<Self, ContractError> {
        let (selector, params) = decode_function_call(data)?;
        let function = SongStashFunction::from_selector(&selector)
            .ok_or_else(|| ContractError::UnknownSelector(hex::encode(&selector[..SELECTOR_SIZE])))?;
        Self::new(function, params)
    }
}

/// Return tuple of `getInfo`
///
/// `total_plays` and `total_earnings` are opaque ciphertext bytes maintained by
/// the contract; they are empty until the first encrypted input arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongInfo {
    pub title: String,
    pub artist: String,
    pub ipfs_hash: String,
    pub total_plays: Vec<u8>,
    pub total_earnings: Vec<u8>,
    pub royalty_rate: u8,
    pub is_active: bool,
    pub is_verified: bool,
    pub owner: Address,
    pub created_at: u64,
    pub updated_at: u64,
}

impl SongInfo {
    const OUTPUT_TYPES: [ABIType; 11] = [
        ABIType::String,
        ABIType::String,
        ABIType::String,
        ABIType::Bytes,
        ABIType::Bytes,
        ABIType::Uint8,
        ABIType::Bool,
        ABIType::Bool,
        ABIType::Address,
        ABIType::Uint,
        ABIType::Uint,
    ];

    pub fn to_abi_values(&self) -> Vec<ABIValue> {
        vec![
            ABIValue::String(self.title.clone()),
            ABIValue::String(self.artist.clone()),
            ABIValue::String(self.ipfs_hash.clone()),
            ABIValue::Bytes(self.total_plays.clone()),
            ABIValue::Bytes(self.total_earnings.clone()),
            ABIValue::Uint8(self.royalty_rate),
            ABIValue::Bool(self.is_active),
            ABIValue::Bool(self.is_verified),
            ABIValue::Address(self.owner),
            ABIValue::Uint(self.created_at),
            ABIValue::Uint(self.updated_at),
        ]
    }

    pub fn from_abi_values(values: &[ABIValue]) -> Result<Self, ContractError> {
        SongStashFunction::GetInfo.abi().validate_outputs(values)?;
        Ok(Self {
            title: values[0].as_str()?.to_string(),
            artist: values[1].as_str()?.to_string(),
            ipfs_hash: values[2].as_str()?.to_string(),
            total_plays: values[3].as_bytes()?.to_vec(),
            total_earnings: values[4].as_bytes()?.to_vec(),
            royalty_rate: values[5].as_uint8()?,
            is_active: values[6].as_bool()?,
            is_verified: values[7].as_bool()?,
            owner: values[8].as_address()?,
            created_at: values[9].as_uint()?,
            updated_at: values[10].as_uint()?,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, ContractError> {
        encode_return(&self.to_abi_values())
    }

    pub fn decode(data: &[u8]) -> Result<Self, ContractError> {
        Self::from_abi_values(&decode_return(data)?)
    }
}
