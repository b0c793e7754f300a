//! Read-only contract queries
//!
//! Reads never decrypt. Ledger-side encrypted totals come back as opaque
//! [`CiphertextHandle`]s that only the key owner can open.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stash_contracts::{Address, ContractCall, SongInfo};
use stash_fhe::{ciphertext_key_ref, EncryptedValue, KeyRef};

use crate::errors::{ClientError, ClientResult};

/// Transport for read-only calls
#[async_trait::async_trait]
pub trait ContractReader: Send + Sync {
    /// Execute `call` without a transaction and return the ABI-encoded result
    async fn call(&self, call: &ContractCall) -> ClientResult<Vec<u8>>;
}

#[async_trait::async_trait]
impl<T: ContractReader + ?Sized> ContractReader for Arc<T> {
    async fn call(&self, call: &ContractCall) -> ClientResult<Vec<u8>> {
        (**self).call(call).await
    }
}

/// Opaque reference to a ciphertext held by the contract
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextHandle(Vec<u8>);

impl CiphertextHandle {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Key the ciphertext was produced under, if the header is readable
    pub fn key_ref(&self) -> Option<KeyRef> {
        ciphertext_key_ref(&self.0)
    }

    /// Reinterpret as an encrypted value for decryption by the key owner
    pub fn to_encrypted_value(&self) -> ClientResult<EncryptedValue> {
        EncryptedValue::from_ciphertext(self.0.clone())
            .map_err(|e| ClientError::Read(format!("malformed ciphertext handle: {}", e)))
    }
}

impl std::fmt::Debug for CiphertextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = &self.0[..self.0.len().min(8)];
        write!(f, "CiphertextHandle({}.., {} bytes)", hex::encode(prefix), self.0.len())
    }
}

/// Typed result of `getInfo`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongRecord {
    pub id: u64,
    pub title: String,
    pub artist: String,
    pub ipfs_hash: String,
    /// Encrypted play counter, `None` before the first play
    pub total_plays: Option<CiphertextHandle>,
    /// Encrypted earnings, `None` before the first distribution
    pub total_earnings: Option<CiphertextHandle>,
    pub royalty_rate: u8,
    pub is_active: bool,
    pub is_verified: bool,
    pub owner: Address,
    pub created_at: u64,
    pub updated_at: u64,
}

impl SongRecord {
    fn from_info(id: u64, info: SongInfo) -> Self {
        let handle = |bytes: Vec<u8>| (!bytes.is_empty()).then_some(CiphertextHandle(bytes));
        Self {
            id,
            title: info.title,
            artist: info.artist,
            ipfs_hash: info.ipfs_hash,
            total_plays: handle(info.total_plays),
            total_earnings: handle(info.total_earnings),
            royalty_rate: info.royalty_rate,
            is_active: info.is_active,
            is_verified: info.is_verified,
            owner: info.owner,
            created_at: info.created_at,
            updated_at: info.updated_at,
        }
    }
}

/// Typed read access to the song stash contract
pub struct ContractReadAdapter<R> {
    reader: R,
}

impl<R: ContractReader> ContractReadAdapter<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// `getInfo(songId)`
    pub async fn get_info(&self, song_id: u64) -> ClientResult<SongRecord> {
        let data = self.reader.call(&ContractCall::get_info(song_id)).await?;
        let info = SongInfo::decode(&data)
            .map_err(|e| ClientError::Read(format!("getInfo({}) returned bad data: {}", song_id, e)))?;
        Ok(SongRecord::from_info(song_id, info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use stash_contracts::ContractError;

    struct FixedReader {
        response: Mutex<ClientResult<Vec<u8>>>,
        calls: Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl ContractReader for FixedReader {
        async fn call(&self, call: &ContractCall) -> ClientResult<Vec<u8>> {
            assert_eq!(call.name(), "getInfo");
            *self.calls.lock() += 1;
            self.response.lock().clone()
        }
    }

    fn info() -> SongInfo {
        SongInfo {
            title: "Song".into(),
            artist: "Artist".into(),
            ipfs_hash: "Qm".into(),
            total_plays: Vec::new(),
            total_earnings: vec![1, 2, 3],
            royalty_rate: 90,
            is_active: true,
            is_verified: false,
            owner: [9; 20],
            created_at: 10,
            updated_at: 11,
        }
    }

    fn reader(response: ClientResult<Vec<u8>>) -> Arc<FixedReader> {
        Arc::new(FixedReader {
            response: Mutex::new(response),
            calls: Mutex::new(0),
        })
    }

    #[tokio::test]
    async fn test_get_info_maps_fields() {
        let adapter = ContractReadAdapter::new(reader(Ok(info().encode().unwrap())));
        let record = adapter.get_info(3).await.unwrap();
        assert_eq!(record.id, 3);
        assert_eq!(record.title, "Song");
        assert_eq!(record.royalty_rate, 90);
        assert!(record.total_plays.is_none());
        assert_eq!(record.total_earnings.as_ref().unwrap().as_bytes(), &[1, 2, 3]);
        assert!(record.total_earnings.unwrap().key_ref().is_none());
        assert_eq!(record.owner, [9; 20]);
    }

    #[tokio::test]
    async fn test_get_info_is_repeatable() {
        let source = reader(Ok(info().encode().unwrap()));
        let adapter = ContractReadAdapter::new(Arc::clone(&source));
        let first = adapter.get_info(1).await.unwrap();
        let second = adapter.get_info(1).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(*source.calls.lock(), 2);
    }

    #[tokio::test]
    async fn test_bad_return_data() {
        let adapter = ContractReadAdapter::new(reader(Ok(vec![0xff; 7])));
        assert!(matches!(adapter.get_info(1).await, Err(ClientError::Read(_))));

        let adapter = ContractReadAdapter::new(reader(Err(ContractError::SongNotFound(1).into())));
        assert!(matches!(adapter.get_info(1).await, Err(ClientError::Contract(_))));
    }
}
