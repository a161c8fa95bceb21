use alloy_primitives::{Address, Bytes, B256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const SHORT_CODE_DIGITS: usize = 8;
pub const IDENTIFIER_DIGITS: usize = 12;
pub const CHANNEL_MASK_DIGITS: usize = 8;
pub const COMPRESSED_KEY_DIGITS: usize = 64;
pub const PRIVATE_KEY_DIGITS: usize = 64;

/// Rejected CLI input. Carries the offending value and a description of the
/// accepted format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    Address { value: String },
    ChannelMask { value: String },
    HexBlob { value: String },
    CompressedPublicKey { value: String },
    ShortCode { value: String },
    Identifier { value: String },
    PrivateKey { value: String },
}

impl ValidationError {
    pub fn value(&self) -> &str {
        match self {
            Self::Address { value }
            | Self::ChannelMask { value }
            | Self::HexBlob { value }
            | Self::CompressedPublicKey { value }
            | Self::ShortCode { value }
            | Self::Identifier { value }
            | Self::PrivateKey { value } => value,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Address { .. } => "an address",
            Self::ChannelMask { .. } => "a valid channels value",
            Self::HexBlob { .. } => "a valid hex string",
            Self::CompressedPublicKey { .. } => "a compressed public key",
            Self::ShortCode { .. } => "a VASP code",
            Self::Identifier { .. } => "a VASP identifier",
            Self::PrivateKey { .. } => "a valid private key string",
        }
    }

    pub fn expected(&self) -> &'static str {
        match self {
            Self::Address { .. } => "20-byte hex address, EIP-55 checksummed when mixed case",
            Self::ChannelMask { .. } => "0x followed by exactly 8 hex digits",
            Self::HexBlob { .. } => "0x followed by an even number of hex digits",
            Self::CompressedPublicKey { .. } => "0x02 or 0x03 followed by exactly 64 hex digits",
            Self::ShortCode { .. } => "exactly 8 hex digits without 0x prefix",
            Self::Identifier { .. } => "exactly 12 hex digits without 0x prefix",
            Self::PrivateKey { .. } => "exactly 64 hex digits without 0x prefix",
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} is not {} (expected {})",
            self.value(),
            self.kind(),
            self.expected()
        )
    }
}

#[derive(Debug, Error)]
pub enum FileAccessError {
    #[error("File does not exist: {path}")]
    Missing { path: String },
    #[error("Failed to read file {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A value the contract engine coerces against the ABI parameter type it is
/// bound to. `string` parameters receive the text untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument(String);

impl Argument {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthAddress(Address);

impl EthAddress {
    pub fn address(&self) -> Address {
        self.0
    }
}

impl fmt::Display for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_checksum(None))
    }
}

impl From<EthAddress> for Address {
    fn from(value: EthAddress) -> Self {
        value.0
    }
}

impl From<&EthAddress> for Argument {
    fn from(value: &EthAddress) -> Self {
        Argument(format!("{:#x}", value.0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexBlob(Bytes);

impl HexBlob {
    pub fn bytes(&self) -> &Bytes {
        &self.0
    }
}

impl From<&HexBlob> for Argument {
    fn from(value: &HexBlob) -> Self {
        Argument(format_hex(value.0.as_ref()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedPublicKey(String);

impl CompressedPublicKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&CompressedPublicKey> for Argument {
    fn from(value: &CompressedPublicKey) -> Self {
        Argument(value.0.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMask(String);

impl ChannelMask {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&ChannelMask> for Argument {
    fn from(value: &ChannelMask) -> Self {
        Argument(value.0.clone())
    }
}

/// 4-byte VASP code, normalized to `0x` + 8 hex digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortCode(String);

impl ShortCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&ShortCode> for Argument {
    fn from(value: &ShortCode) -> Self {
        Argument(value.0.clone())
    }
}

/// 6-byte VASP identifier, normalized to `0x` + 12 hex digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier(String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&Identifier> for Argument {
    fn from(value: &Identifier) -> Self {
        Argument(value.0.clone())
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(B256);

impl PrivateKey {
    pub fn secret(&self) -> &B256 {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// Text of a credentials file, byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialBlob {
    path: PathBuf,
    contents: String,
}

impl CredentialBlob {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }
}

impl From<&CredentialBlob> for Argument {
    fn from(value: &CredentialBlob) -> Self {
        Argument(value.contents.clone())
    }
}

pub fn parse_address(value: &str) -> Result<EthAddress, ValidationError> {
    let invalid = || ValidationError::Address {
        value: value.to_string(),
    };
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    if digits.len() != 40 || !is_hex(digits) {
        return Err(invalid());
    }

    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    let address = if has_lower && has_upper {
        Address::parse_checksummed(format!("0x{digits}"), None).map_err(|_| invalid())?
    } else {
        Address::from_str(digits).map_err(|_| invalid())?
    };
    Ok(EthAddress(address))
}

pub fn parse_channel_mask(value: &str) -> Result<ChannelMask, ValidationError> {
    match value.strip_prefix("0x") {
        Some(digits) if digits.len() == CHANNEL_MASK_DIGITS && is_hex(digits) => {
            Ok(ChannelMask(value.to_string()))
        }
        _ => Err(ValidationError::ChannelMask {
            value: value.to_string(),
        }),
    }
}

pub fn parse_hex_blob(value: &str) -> Result<HexBlob, ValidationError> {
    let invalid = || ValidationError::HexBlob {
        value: value.to_string(),
    };
    let digits = value.strip_prefix("0x").ok_or_else(invalid)?;
    if !is_hex(digits) {
        return Err(invalid());
    }
    let bytes = hex::decode(digits).map_err(|_| invalid())?;
    Ok(HexBlob(Bytes::from(bytes)))
}

pub fn parse_compressed_public_key(value: &str) -> Result<CompressedPublicKey, ValidationError> {
    let body = value
        .strip_prefix("0x02")
        .or_else(|| value.strip_prefix("0x03"));
    match body {
        Some(digits) if digits.len() == COMPRESSED_KEY_DIGITS && is_hex(digits) => {
            Ok(CompressedPublicKey(value.to_string()))
        }
        _ => Err(ValidationError::CompressedPublicKey {
            value: value.to_string(),
        }),
    }
}

pub fn parse_short_code(value: &str) -> Result<ShortCode, ValidationError> {
    if value.len() == SHORT_CODE_DIGITS && is_hex(value) {
        return Ok(ShortCode(format!("0x{value}")));
    }
    Err(ValidationError::ShortCode {
        value: value.to_string(),
    })
}

pub fn parse_identifier(value: &str) -> Result<Identifier, ValidationError> {
    if value.len() == IDENTIFIER_DIGITS && is_hex(value) {
        return Ok(Identifier(format!("0x{value}")));
    }
    Err(ValidationError::Identifier {
        value: value.to_string(),
    })
}

pub fn parse_private_key(value: &str) -> Result<PrivateKey, ValidationError> {
    if value.len() == PRIVATE_KEY_DIGITS && is_hex(value) {
        if let Ok(key) = B256::from_str(value) {
            return Ok(PrivateKey(key));
        }
    }
    Err(ValidationError::PrivateKey {
        value: redact(value),
    })
}

pub fn parse_file_backed_blob(value: &str) -> Result<CredentialBlob, FileAccessError> {
    let path = Path::new(value);
    if !path.exists() {
        return Err(FileAccessError::Missing {
            path: value.to_string(),
        });
    }
    let contents = fs::read_to_string(path).map_err(|source| FileAccessError::Unreadable {
        path: value.to_string(),
        source,
    })?;
    Ok(CredentialBlob {
        path: path.to_path_buf(),
        contents,
    })
}

pub fn format_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn address_to_hex(value: Address) -> String {
    value.to_checksum(None)
}

fn is_hex(value: &str) -> bool {
    value.chars().all(|c| c.is_ascii_hexdigit())
}

fn redact(value: &str) -> String {
    if value.len() <= 8 {
        return "<redacted>".to_string();
    }
    let head: String = value.chars().take(4).collect();
    format!("{head}…<redacted>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CHECKSUMMED: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn address_accepts_checksummed_lower_and_upper_case() {
        assert!(parse_address(CHECKSUMMED).is_ok());
        assert!(parse_address(&CHECKSUMMED.to_lowercase()).is_ok());
        assert!(parse_address("0xF39FD6E51AAD88F6F4CE6AB8827279CFFFB92266").is_ok());
        assert!(parse_address("f39fd6e51aad88f6f4ce6ab8827279cfffb92266").is_ok());
    }

    #[test]
    fn address_accepts_upper_case_prefix() {
        let parsed = parse_address("0XF39FD6E51AAD88F6F4CE6AB8827279CFFFB92266").unwrap();
        assert_eq!(parsed.to_string(), CHECKSUMMED);
        assert!(parse_address("0X1234").is_err());
    }

    #[test]
    fn address_rejects_bad_checksum_and_shape() {
        let bad_checksum = "0xF39fd6e51aad88F6F4ce6aB8827279cffFb92266";
        let err = parse_address(bad_checksum).unwrap_err();
        assert!(err
            .to_string()
            .starts_with(&format!("{bad_checksum} is not an address (expected 20-byte hex address")));

        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("0xg39fd6e51aad88f6f4ce6ab8827279cfffb92266").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn address_display_is_checksummed() {
        let parsed = parse_address(&CHECKSUMMED.to_lowercase()).unwrap();
        assert_eq!(parsed.to_string(), CHECKSUMMED);
    }

    #[test]
    fn channel_mask_requires_prefix_and_eight_digits() {
        assert_eq!(parse_channel_mask("0x0000ffFF").unwrap().as_str(), "0x0000ffFF");
        for value in ["0000ffff", "0x0000fff", "0x0000fffff", "0x0000fffg", "0X0000ffff", ""] {
            assert!(parse_channel_mask(value).is_err(), "{value} should be rejected");
        }
    }

    #[test]
    fn hex_blob_allows_empty_and_rejects_odd_length() {
        assert!(parse_hex_blob("0x").unwrap().bytes().is_empty());
        assert_eq!(parse_hex_blob("0xdeadBEEF").unwrap().bytes().len(), 4);
        assert!(parse_hex_blob("0xabc").is_err());
        assert!(parse_hex_blob("deadbeef").is_err());
        assert!(parse_hex_blob("0xzz").is_err());
    }

    #[test]
    fn compressed_public_key_checks_prefix_and_length() {
        let body = "a".repeat(64);
        assert!(parse_compressed_public_key(&format!("0x02{body}")).is_ok());
        assert!(parse_compressed_public_key(&format!("0x03{body}")).is_ok());
        assert!(parse_compressed_public_key(&format!("0x04{body}")).is_err());
        assert!(parse_compressed_public_key(&format!("0x02{}", &body[1..])).is_err());
        assert!(parse_compressed_public_key(&format!("0x02{body}a")).is_err());
    }

    #[test]
    fn short_code_is_normalized_with_prefix() {
        assert_eq!(parse_short_code("1a2B3c4D").unwrap().as_str(), "0x1a2B3c4D");
        for value in ["0x1a2b3c4d", "1a2b3c4", "1a2b3c4d5", "1a2b3c4g"] {
            let err = parse_short_code(value).unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("{value} is not a VASP code (expected exactly 8 hex digits without 0x prefix)")
            );
        }
    }

    #[test]
    fn identifier_is_normalized_with_prefix() {
        assert_eq!(parse_identifier("0123456789ab").unwrap().as_str(), "0x0123456789ab");
        assert!(parse_identifier("0123456789a").is_err());
        assert!(parse_identifier("0x0123456789ab").is_err());
    }

    #[test]
    fn private_key_is_redacted_in_errors_and_debug() {
        let key = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
        let parsed = parse_private_key(key).unwrap();
        assert_eq!(format!("{parsed:?}"), "PrivateKey(<redacted>)");

        let err = parse_private_key(&format!("0x{key}")).unwrap_err();
        assert!(!err.to_string().contains(&key[8..]));
        assert!(parse_private_key(&key[1..]).is_err());
    }

    #[test]
    fn file_backed_blob_returns_contents_verbatim() {
        let mut file = NamedTempFile::new().unwrap();
        let contents = "  {\"ref\": \"ipfs://cred\"}\r\n\n";
        file.write_all(contents.as_bytes()).unwrap();

        let path = file.path().to_str().unwrap();
        let blob = parse_file_backed_blob(path).unwrap();
        assert_eq!(blob.contents(), contents);
        assert_eq!(Argument::from(&blob).as_str(), contents);
    }

    #[test]
    fn file_backed_blob_names_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let missing = missing.to_str().unwrap();

        let err = parse_file_backed_blob(missing).unwrap_err();
        assert_eq!(err.to_string(), format!("File does not exist: {missing}"));
    }
}
