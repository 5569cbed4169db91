// tmem-client - The Remote backend's testable transport collaborator
// (`LoopbackTransport`) plus a small named-verb facade over a request-plane
// handle, used by this workspace's own tests and benchmarks.

pub mod facade;
pub mod loopback;

pub use facade::TmemClient;
pub use loopback::LoopbackTransport;
