//! Password handling for zip encryption.

use zeroize::Zeroizing;

/// A password for entry encryption/decryption.
///
/// The bytes are wiped from memory when the last clone is dropped, and
/// `Debug` output never shows them. Zip key derivation uses the UTF-8
/// encoding of the password.
#[derive(Clone)]
pub struct Password {
    inner: Zeroizing<String>,
}

impl Password {
    /// Creates a new password from a string.
    pub fn new<S: Into<String>>(password: S) -> Self {
        Self {
            inner: Zeroizing::new(password.into()),
        }
    }

    /// Returns the bytes fed into key derivation.
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }

    /// Returns the password as a string slice.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Returns true if the password is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the length of the password in characters.
    pub fn len(&self) -> usize {
        self.inner.chars().count()
    }
}

impl PartialEq for Password {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Password {}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Password")
            .field("len", &self.inner.len())
            .finish()
    }
}

impl From<&str> for Password {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Password {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&String> for Password {
    fn from(s: &String) -> Self {
        Self::new(s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_bytes_are_utf8() {
        assert_eq!(Password::new("test").as_bytes(), b"test");
        assert_eq!(Password::new("пароль").as_bytes().len(), 12);
    }

    #[test]
    fn test_password_debug_hides_value() {
        let debug = format!("{:?}", Password::new("secret"));
        assert!(!debug.contains("secret"));
        assert!(debug.contains("len"));
    }

    #[test]
    fn test_password_conversions() {
        let a: Password = "test".into();
        let b: Password = String::from("test").into();
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
        assert!(!a.is_empty());
        assert!(Password::new("").is_empty());
    }
}
