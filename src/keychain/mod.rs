//! Address derivation tracking and gap-limit discovery
//!
//! The keychain owns one derivation branch of one account (e.g. receive or
//! change): it derives addresses on demand through an injected
//! `AddressDeriver`, persists every derivation through `KeysDb` before
//! exposing it, and tracks the highest index observed in use. On top of it,
//! `AddressSources` maintains the batched watched-address window that drives
//! gap-limit discovery during synchronization.

pub mod address_sources;
pub mod deriver;
#[allow(clippy::module_inception)]
pub mod keychain;
pub mod keys_db;

pub use address_sources::AddressSources;
pub use deriver::{AddressDeriver, Blake2bAddressDeriver};
pub use keychain::Keychain;
pub use keys_db::{KeysDb, MemoryPreferences, Preferences};
