//! Per-entry write options.

use std::time::SystemTime;

use crate::codec::{CompressionLevel, CompressionMethod};
use crate::crypto::{AesStrength, EncryptionMethod, Password};
use crate::{Error, Result};

/// How entries are stored when they are added to an archive.
///
/// # Examples
///
/// ```rust
/// use zipkit::{CompressionMethod, EncryptionMethod, ZipParameters};
///
/// let params = ZipParameters::new()
///     .compression(CompressionMethod::Deflate)
///     .level(9)?
///     .encryption(EncryptionMethod::AES_256)
///     .password("secret123");
/// assert!(params.is_encrypted());
/// # Ok::<(), zipkit::Error>(())
/// ```
#[derive(Clone)]
pub struct ZipParameters {
    compression: CompressionMethod,
    level: CompressionLevel,
    encryption: EncryptionMethod,
    aes_strength: AesStrength,
    password: Option<Password>,
    file_name: Option<String>,
    root_folder: Option<String>,
    include_root_folder: bool,
    overwrite_existing: bool,
    last_modified: Option<SystemTime>,
}

impl Default for ZipParameters {
    fn default() -> Self {
        Self {
            compression: CompressionMethod::Deflate,
            level: CompressionLevel::NORMAL,
            encryption: EncryptionMethod::None,
            aes_strength: AesStrength::Aes256,
            password: None,
            file_name: None,
            root_folder: None,
            include_root_folder: true,
            overwrite_existing: true,
            last_modified: None,
        }
    }
}

impl std::fmt::Debug for ZipParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipParameters")
            .field("compression", &self.compression)
            .field("level", &self.level)
            .field("encryption", &self.encryption)
            .field("has_password", &self.password.is_some())
            .field("file_name", &self.file_name)
            .field("root_folder", &self.root_folder)
            .field("include_root_folder", &self.include_root_folder)
            .field("overwrite_existing", &self.overwrite_existing)
            .finish_non_exhaustive()
    }
}

impl ZipParameters {
    /// Creates parameters with defaults: Deflate at level 6, no encryption.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the compression method.
    #[must_use]
    pub fn compression(mut self, compression: CompressionMethod) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the compression level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCompressionLevel`] if `level` is above 9.
    pub fn level(mut self, level: u32) -> Result<Self> {
        self.level = CompressionLevel::new(level)?;
        Ok(self)
    }

    /// Sets the encryption method.
    ///
    /// An AES method also sets the key strength.
    #[must_use]
    pub fn encryption(mut self, encryption: EncryptionMethod) -> Self {
        if let EncryptionMethod::Aes(strength) = encryption {
            self.aes_strength = strength;
        }
        self.encryption = encryption;
        self
    }

    /// Sets the AES key strength used when the method is AES.
    #[must_use]
    pub fn aes_strength(mut self, strength: AesStrength) -> Self {
        self.aes_strength = strength;
        if let EncryptionMethod::Aes(_) = self.encryption {
            self.encryption = EncryptionMethod::Aes(strength);
        }
        self
    }

    /// Sets a password for these entries, overriding the archive password.
    #[must_use]
    pub fn password(mut self, password: impl Into<Password>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Stores a single file or data source under this name instead of its
    /// own.
    #[must_use]
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Places added entries under this folder inside the archive.
    #[must_use]
    pub fn root_folder(mut self, folder: impl Into<String>) -> Self {
        self.root_folder = Some(folder.into());
        self
    }

    /// Whether an added directory keeps its own name as the top folder
    /// (default), or only its contents are added.
    #[must_use]
    pub fn include_root_folder(mut self, include: bool) -> Self {
        self.include_root_folder = include;
        self
    }

    /// Whether an entry with the same name is replaced (default) or the add
    /// fails with [`Error::EntryExists`].
    #[must_use]
    pub fn overwrite_existing(mut self, overwrite: bool) -> Self {
        self.overwrite_existing = overwrite;
        self
    }

    /// Overrides the modification time stored for added entries.
    #[must_use]
    pub fn last_modified(mut self, time: SystemTime) -> Self {
        self.last_modified = Some(time);
        self
    }

    /// The compression method.
    pub fn compression_method(&self) -> CompressionMethod {
        self.compression
    }

    /// The compression level.
    pub fn compression_level(&self) -> CompressionLevel {
        self.level
    }

    /// The encryption method.
    pub fn encryption_method(&self) -> EncryptionMethod {
        self.encryption
    }

    /// Returns true if entries will be encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_encrypted()
    }

    /// The entry password override.
    pub fn entry_password(&self) -> Option<&Password> {
        self.password.as_ref()
    }

    /// The entry name override.
    pub fn name_override(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// The folder prefix.
    pub fn root_folder_name(&self) -> Option<&str> {
        self.root_folder.as_deref()
    }

    /// Whether directories keep their own name as top folder.
    pub fn includes_root_folder(&self) -> bool {
        self.include_root_folder
    }

    /// Whether existing entries are replaced.
    pub fn overwrites_existing(&self) -> bool {
        self.overwrite_existing
    }

    /// The modification time override.
    pub fn modified_override(&self) -> Option<SystemTime> {
        self.last_modified
    }

    /// Picks the password to encrypt with and checks the method is usable.
    pub(crate) fn resolve_password<'a>(&'a self, archive_password: Option<&'a Password>) -> Result<Option<&'a Password>> {
        if !self.encryption.is_encrypted() {
            return Ok(None);
        }
        if !self.encryption.is_supported() {
            return Err(Error::UnsupportedFeature {
                feature: "AES encryption (enable the `aes` feature)",
            });
        }
        match self.password.as_ref().or(archive_password) {
            Some(password) if !password.is_empty() => Ok(Some(password)),
            _ => Err(Error::InvalidParameter(format!(
                "{} encryption requested but no password is set",
                self.encryption
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = ZipParameters::default();
        assert_eq!(params.compression_method(), CompressionMethod::Deflate);
        assert_eq!(params.compression_level().level(), 6);
        assert_eq!(params.encryption_method(), EncryptionMethod::None);
        assert!(params.includes_root_folder());
        assert!(params.overwrites_existing());
    }

    #[test]
    fn test_aes_strength_follows_method() {
        let params = ZipParameters::new()
            .encryption(EncryptionMethod::AES_128)
            .aes_strength(AesStrength::Aes256);
        assert_eq!(params.encryption_method(), EncryptionMethod::AES_256);

        let plain = ZipParameters::new().aes_strength(AesStrength::Aes128);
        assert_eq!(plain.encryption_method(), EncryptionMethod::None);
    }

    #[test]
    fn test_invalid_level() {
        assert!(matches!(
            ZipParameters::new().level(10),
            Err(Error::InvalidCompressionLevel { level: 10 })
        ));
    }

    #[test]
    fn test_password_resolution() {
        let archive_pw = Password::new("archive");
        let zc = ZipParameters::new().encryption(EncryptionMethod::ZipCrypto);
        assert_eq!(zc.resolve_password(Some(&archive_pw)).unwrap().unwrap().as_str(), "archive");
        assert!(matches!(zc.resolve_password(None), Err(Error::InvalidParameter(_))));

        let own = zc.clone().password("entry");
        assert_eq!(own.resolve_password(Some(&archive_pw)).unwrap().unwrap().as_str(), "entry");

        assert!(ZipParameters::new().resolve_password(None).unwrap().is_none());
    }
}
