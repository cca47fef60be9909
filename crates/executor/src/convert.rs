//! Conversion from storage-layer errors to executor errors.

use crate::Error;
use mapkv_core::Error as CoreError;

impl From<CoreError> for Error {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Io(e) => Error::Io {
                message: e.to_string(),
            },
            CoreError::Corruption(reason) => Error::Corruption { reason },
            CoreError::StoreClosed => Error::StoreClosed,
            CoreError::Locked(reason) => Error::Locked { reason },
            CoreError::InvalidKey(reason) => Error::InvalidKey { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_mapping() {
        let err: Error = CoreError::StoreClosed.into();
        assert_eq!(err, Error::StoreClosed);

        let err: Error = CoreError::Corruption("bad magic".into()).into();
        assert_eq!(
            err,
            Error::Corruption {
                reason: "bad magic".into()
            }
        );
    }
}
