// tmem-store - The concurrent Store backing the Local backend.

pub mod fingerprint;
pub mod store;

pub use fingerprint::{fingerprint, Fingerprint};
pub use store::{PutOutcome, Store};
