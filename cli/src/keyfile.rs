//! Session key files
//!
//! A key file holds one bincode-encoded key pair. The private half is only
//! ever held in zeroizing buffers.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use stash_fhe::{KeyPair, PrivateKey};
use zeroize::Zeroizing;

const KEY_FILE_VERSION: u8 = 1;

#[derive(Serialize, Deserialize)]
struct KeyFile {
    version: u8,
    public_key: Vec<u8>,
    private_key: Vec<u8>,
}

impl Drop for KeyFile {
    fn drop(&mut self) {
        zeroize::Zeroize::zeroize(&mut self.private_key);
    }
}

/// Default key file location under `data_dir`
pub fn default_key_path(data_dir: &Path) -> PathBuf {
    data_dir.join("keys").join("session.key")
}

/// Write `pair` to `path`, readable by the owner only on unix
pub fn save(pair: &KeyPair, path: &Path) -> anyhow::Result<()> {
    let private_key = pair.private.to_bytes()?;
    let file = KeyFile {
        version: KEY_FILE_VERSION,
        public_key: pair.public.to_bytes(),
        private_key: private_key.to_vec(),
    };
    let encoded = Zeroizing::new(bincode::serialize(&file)?);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut out = options
        .open(path)
        .with_context(|| format!("creating key file {}", path.display()))?;
    // mode only applies on creation, tighten an existing file before writing
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        out.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    out.write_all(encoded.as_slice())
        .and_then(|()| out.sync_all())
        .with_context(|| format!("writing key file {}", path.display()))?;
    Ok(())
}

/// Read a key pair written by [`save`]
pub fn load(path: &Path) -> anyhow::Result<KeyPair> {
    let bytes = Zeroizing::new(
        fs::read(path).with_context(|| format!("reading key file {}", path.display()))?,
    );
    let file: KeyFile = bincode::deserialize(&bytes).context("malformed key file")?;
    if file.version != KEY_FILE_VERSION {
        anyhow::bail!("unsupported key file version {}", file.version);
    }
    let private = PrivateKey::from_bytes(&file.private_key)?;
    if private.public_key().to_bytes() != file.public_key {
        anyhow::bail!("key file public key does not match private key");
    }
    Ok(KeyPair {
        public: private.public_key().clone(),
        private,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stash_fhe::FHEConfig;
    use tempfile::tempdir;

    #[test]
    fn test_save_load_key_file() {
        let dir = tempdir().unwrap();
        let path = default_key_path(dir.path());
        let pair = KeyPair::generate(&FHEConfig::insecure_testing()).unwrap();

        save(&pair, &path).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.id(), pair.id());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_corrupt_key_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.key");
        fs::write(&path, [1u8, 2, 3]).unwrap();
        assert!(load(&path).is_err());
        assert!(load(&dir.path().join("missing.key")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_overwrite_tightens_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.key");
        fs::write(&path, b"old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let pair = KeyPair::generate(&FHEConfig::insecure_testing()).unwrap();
        save(&pair, &path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(load(&path).unwrap().id(), pair.id());
    }
}
