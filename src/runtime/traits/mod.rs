// ABOUTME: Capability traits for container runtimes.
// ABOUTME: Defines RegistryClient and its classified PullError.

mod registry;

pub use registry::{ErrorKind, PullError, RegistryClient};
