// tmem-backend - The backend-dispatch layer: a shared `TmemBackend` trait
// plus the five interchangeable implementations (Local, Pointer, Remote,
// Null, Sleep) the request plane drives through process-wide registration.

pub mod backend;
pub mod local;
pub mod null;
pub mod pointer;
pub mod remote;
pub mod sleep;

pub use backend::{backend, register_backend, TmemBackend};
pub use local::LocalBackend;
pub use null::NullBackend;
pub use pointer::{PointerBackend, PointerBorrow};
pub use remote::{
    AddressTranslator, ControlRegion, IdentityAddressTranslator, Request, RemoteBackend, Transport,
    CONTROL_VERSION,
};
pub use sleep::SleepBackend;
