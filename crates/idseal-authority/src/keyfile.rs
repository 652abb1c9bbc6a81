//! Master key file persistence
//!
//! JSON on disk, key halves base64-encoded, file mode 0600. The public
//! half is not secret, but the file as a whole is treated as such — there
//! is no split-file mode.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::local::LocalAuthority;

/// Current key file format version
const KEY_FILE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MasterKeyFile {
    pub version: u32,
    /// System public parameters (base64)
    pub public_key: String,
    /// Master secret key (base64)
    pub secret_key: String,
}

impl MasterKeyFile {
    pub fn from_authority(authority: &LocalAuthority) -> Self {
        Self {
            version: KEY_FILE_VERSION,
            public_key: base64_encode(authority.public_key_bytes()),
            secret_key: base64_encode(authority.master_key_bytes()),
        }
    }

    pub fn into_authority(self) -> Result<LocalAuthority> {
        if self.version != KEY_FILE_VERSION {
            anyhow::bail!(
                "unsupported key file version {} (expected {})",
                self.version,
                KEY_FILE_VERSION
            );
        }
        let public_key = base64_decode(&self.public_key).context("decoding public key")?;
        let secret_key = base64_decode(&self.secret_key).context("decoding secret key")?;
        LocalAuthority::from_key_material(public_key, secret_key)
            .map_err(|e| anyhow::anyhow!("invalid key material: {e}"))
    }
}

/// Write an authority's key material to `path` with owner-only permissions.
pub fn save(authority: &LocalAuthority, path: &Path) -> Result<()> {
    let record = MasterKeyFile::from_authority(authority);
    let rendered = serde_json::to_string_pretty(&record).context("serializing key file")?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, rendered).with_context(|| format!("writing {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("setting permissions on {}", path.display()))?;
    }

    Ok(())
}

/// Load an authority from a key file written by [`save`].
pub fn load(path: &Path) -> Result<LocalAuthority> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading key file {}", path.display()))?;
    let record: MasterKeyFile =
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    record.into_authority()
}

fn base64_encode(data: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.encode(data)
}

fn base64_decode(s: &str) -> Result<Vec<u8>> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD
        .decode(s)
        .map_err(|e| anyhow::anyhow!("base64 decode: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("authority.key");

        let authority = LocalAuthority::generate();
        save(&authority, &path).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.public_key_bytes(), authority.public_key_bytes());
        assert_eq!(loaded.master_key_bytes(), authority.master_key_bytes());
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("authority.key");
        save(&LocalAuthority::generate(), &path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn unknown_version_rejected() {
        let authority = LocalAuthority::generate();
        let mut record = MasterKeyFile::from_authority(&authority);
        record.version = 99;
        assert!(record.into_authority().is_err());
    }

    #[test]
    fn corrupted_file_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("authority.key");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load(&path).is_err());
    }
}
