//! Codec errors

use thiserror::Error;

/// Errors raised while decoding account records or instruction payloads.
///
/// An account whose header does not carry the oracle magic/version is not an
/// error: [`crate::decode_account`] reports it as `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("truncated payload: need {needed} bytes at offset {offset}, buffer has {len}")]
    Truncated {
        offset: usize,
        needed: usize,
        len: usize,
    },

    #[error("unknown account kind {0}")]
    UnknownAccountKind(u32),

    #[error("metadata at offset {0} is not valid UTF-8")]
    InvalidUtf8(usize),

    #[error("metadata entry `{0}` does not fit in a length byte")]
    MetadataTooLong(String),

    #[error("unknown command {0}")]
    UnknownCommand(i32),

    #[error("unsupported instruction version {0}")]
    UnsupportedVersion(u32),
}
