pub mod backend;
pub mod error;
pub mod hot;

pub use backend::{AddressVerifier, PinEntry, SignerBackend, UpdateOptions};
pub use error::{SignerError, SignerErrorKind};
pub use hot::HotSigner;
