//! Contract-side state of the song stash
//!
//! Encrypted inputs are verified against their range proofs and folded into
//! per-song encrypted totals homomorphically. Plaintext values never reach the
//! registry.

use std::collections::BTreeMap;

use stash_fhe::{
    EncryptedValue, FHEOps, HomomorphicOps, KeyRef, ProofValidator, PublicKey, ValueRange,
    MAX_ROYALTY_RATE,
};

use crate::abi::{ABIValue, Address};
use crate::contract::{ContractCall, SongInfo, SongStashFunction};
use crate::errors::ContractError;

/// Caller and block time of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    pub caller: Address,
    pub timestamp: u64,
}

/// Stored song record
#[derive(Debug, Clone)]
pub struct SongEntry {
    pub title: String,
    pub artist: String,
    pub ipfs_hash: String,
    pub royalty_rate: u8,
    pub owner: Address,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: u64,
    pub updated_at: u64,
    /// Key all encrypted totals of this song are kept under
    key_ref: Option<KeyRef>,
    total_plays: Option<EncryptedValue>,
    total_earnings: Option<EncryptedValue>,
    listening_time: Option<EncryptedValue>,
}

impl SongEntry {
    fn info(&self) -> SongInfo {
        let bytes = |value: &Option<EncryptedValue>| {
            value
                .as_ref()
                .map(|v| v.ciphertext().to_vec())
                .unwrap_or_default()
        };
        SongInfo {
            title: self.title.clone(),
            artist: self.artist.clone(),
            ipfs_hash: self.ipfs_hash.clone(),
            total_plays: bytes(&self.total_plays),
            total_earnings: bytes(&self.total_earnings),
            royalty_rate: self.royalty_rate,
            is_active: self.is_active,
            is_verified: self.is_verified,
            owner: self.owner,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Song registry executing contract calls
pub struct SongRegistry {
    songs: BTreeMap<u64, SongEntry>,
    next_id: u64,
    nonce: u64,
    max_play_seconds: u64,
    validator: ProofValidator,
}

impl SongRegistry {
    pub fn new(max_play_seconds: u64) -> Self {
        Self {
            songs: BTreeMap::new(),
            next_id: 1,
            nonce: 0,
            max_play_seconds,
            validator: ProofValidator::new(),
        }
    }

    /// Accept encrypted inputs produced under `public_key`
    pub fn register_key(&self, public_key: &PublicKey) {
        self.validator.register_key(public_key);
    }

    pub fn validator(&self) -> &ProofValidator {
        &self.validator
    }

    /// Accepted range for encrypted play durations
    pub fn play_duration_range(&self) -> ValueRange {
        ValueRange::play_duration(self.max_play_seconds)
    }

    pub fn song_count(&self) -> usize {
        self.songs.len()
    }

    /// Number of state-changing calls applied so far
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Execute a state-changing or read-only call
    pub fn execute(
        &mut self,
        call: &ContractCall,
        ctx: &ExecutionContext,
    ) -> Result<Vec<ABIValue>, ContractError> {
        let params = call.params();
        call.function().abi().validate_inputs(params)?;
        let result = match call.function() {
            SongStashFunction::CreateSong => self.create_song(
                params[0].as_str()?,
                params[1].as_str()?,
                params[2].as_str()?,
                params[3].as_uint()?,
                ctx,
            )?,
            SongStashFunction::RecordPlay => self.record_play(
                params[0].as_uint()?,
                params[1].as_bytes()?,
                params[2].as_bytes()?,
                ctx,
            )?,
            SongStashFunction::DistributeRoyalties => self.distribute_royalties(
                params[0].as_uint()?,
                params[1].as_bytes()?,
                params[2].as_bytes()?,
                ctx,
            )?,
            SongStashFunction::GetInfo => return self.view(call),
        };
        self.nonce += 1;
        Ok(vec![ABIValue::Uint(result)])
    }

    /// Execute a read-only call
    pub fn view(&self, call: &ContractCall) -> Result<Vec<ABIValue>, ContractError> {
        match call.function() {
            SongStashFunction::GetInfo => {
                call.function().abi().validate_inputs(call.params())?;
                let id = call.params()[0].as_uint()?;
                Ok(self.song_info(id)?.to_abi_values())
            }
            other => Err(ContractError::InvalidInput(format!(
                "{} is not a view function",
                other
            ))),
        }
    }

    /// Public record of a song, encrypted totals as opaque bytes
    pub fn song_info(&self, id: u64) -> Result<SongInfo, ContractError> {
        self.songs
            .get(&id)
            .map(SongEntry::info)
            .ok_or(ContractError::SongNotFound(id))
    }

    /// Encrypted play counter of a song
    pub fn total_plays(&self, id: u64) -> Result<Option<&EncryptedValue>, ContractError> {
        Ok(self.entry(id)?.total_plays.as_ref())
    }

    /// Encrypted royalty total of a song
    pub fn total_earnings(&self, id: u64) -> Result<Option<&EncryptedValue>, ContractError> {
        Ok(self.entry(id)?.total_earnings.as_ref())
    }

    /// Encrypted sum of all recorded play durations of a song
    pub fn listening_time(&self, id: u64) -> Result<Option<&EncryptedValue>, ContractError> {
        Ok(self.entry(id)?.listening_time.as_ref())
    }

    fn create_song(
        &mut self,
        title: &str,
        artist: &str,
        ipfs_hash: &str,
        royalty_rate: u64,
        ctx: &ExecutionContext,
    ) -> Result<u64, ContractError> {
        for (field, value) in [("title", title), ("artist", artist), ("ipfsHash", ipfs_hash)] {
            if value.trim().is_empty() {
                return Err(ContractError::InvalidInput(format!("{} is empty", field)));
            }
        }
        if royalty_rate > MAX_ROYALTY_RATE {
            return Err(ContractError::InvalidInput(format!(
                "royalty rate {} above {}",
                royalty_rate, MAX_ROYALTY_RATE
            )));
        }

        let id = self.next_id;
        self.next_id += 1;
        self.songs.insert(
            id,
            SongEntry {
                title: title.to_string(),
                artist: artist.to_string(),
                ipfs_hash: ipfs_hash.to_string(),
                royalty_rate: royalty_rate as u8,
                owner: ctx.caller,
                is_active: true,
                is_verified: false,
                created_at: ctx.timestamp,
                updated_at: ctx.timestamp,
                key_ref: None,
                total_plays: None,
                total_earnings: None,
                listening_time: None,
            },
        );
        tracing::debug!(song_id = id, owner = %hex::encode(ctx.caller), "song created");
        Ok(id)
    }

    fn record_play(
        &mut self,
        id: u64,
        play_duration: &[u8],
        input_proof: &[u8],
        ctx: &ExecutionContext,
    ) -> Result<u64, ContractError> {
        let range = self.play_duration_range();
        let (input, key) = self.verified_input(id, play_duration, input_proof, range, "playDuration")?;

        let song = self.active_entry_mut(id)?;
        let plays = match &song.total_plays {
            Some(total) => FHEOps::add_scalar(total, 1, &key)?,
            None => FHEOps::add_scalar(&FHEOps::zero(&key)?, 1, &key)?,
        };
        let listening = match &song.listening_time {
            Some(total) => total.add(&input, &key)?,
            None => input,
        };
        song.key_ref = Some(key.id());
        song.total_plays = Some(plays);
        song.listening_time = Some(listening);
        song.updated_at = ctx.timestamp;
        tracing::debug!(song_id = id, "play recorded");
        Ok(id)
    }

    fn distribute_royalties(
        &mut self,
        id: u64,
        total_amount: &[u8],
        input_proof: &[u8],
        ctx: &ExecutionContext,
    ) -> Result<u64, ContractError> {
        let (input, key) = self.verified_input(
            id,
            total_amount,
            input_proof,
            ValueRange::royalty_amount(),
            "totalAmount",
        )?;

        let song = self.active_entry_mut(id)?;
        let earnings = match &song.total_earnings {
            Some(total) => total.add(&input, &key)?,
            None => input,
        };
        song.key_ref = Some(key.id());
        song.total_earnings = Some(earnings);
        song.updated_at = ctx.timestamp;
        tracing::debug!(song_id = id, "royalties distributed");
        Ok(id)
    }

    /// Check song state and proof, returning the input as a derived value
    /// together with the key it was produced under.
    fn verified_input(
        &self,
        id: u64,
        ciphertext: &[u8],
        proof: &[u8],
        range: ValueRange,
        field: &'static str,
    ) -> Result<(EncryptedValue, PublicKey), ContractError> {
        let song = self.entry(id)?;
        if !song.is_active {
            return Err(ContractError::SongInactive(id));
        }
        if !self.validator.validate_in_range(ciphertext, proof, range) {
            tracing::warn!(song_id = id, field, "input proof rejected");
            return Err(ContractError::ProofRejected(field));
        }
        let input = EncryptedValue::from_ciphertext(ciphertext.to_vec())?;
        if let Some(expected) = song.key_ref {
            if expected != input.public_key_ref() {
                return Err(ContractError::KeyMismatch {
                    expected: expected.to_string(),
                    got: input.public_key_ref().to_string(),
                });
            }
        }
        let key = self
            .validator
            .public_key(&input.public_key_ref())
            .ok_or(ContractError::ProofRejected(field))?;
        Ok((input, key))
    }

    fn entry(&self, id: u64) -> Result<&SongEntry, ContractError> {
        self.songs.get(&id).ok_or(ContractError::SongNotFound(id))
    }

    fn active_entry_mut(&mut self, id: u64) -> Result<&mut SongEntry, ContractError> {
        match self.songs.get_mut(&id) {
            Some(song) if song.is_active => Ok(song),
            Some(_) => Err(ContractError::SongInactive(id)),
            None => Err(ContractError::SongNotFound(id)),
        }
    }
}
