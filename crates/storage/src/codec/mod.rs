//! Region codec abstraction.
//!
//! All value payloads written to a mapped region pass through a codec.
//! The identity codec is the default; the keyed codec is selected when a
//! store is opened with a crypt key. The codec id is recorded in the
//! region header and must match on reopen.

mod identity;
mod keyed;
mod traits;

pub use identity::IdentityCodec;
pub use keyed::KeyedCodec;
pub use traits::{CodecError, RegionCodec};
