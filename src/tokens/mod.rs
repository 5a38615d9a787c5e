//! Single-use token subsystem.

pub mod store;

pub use store::{AssetDescriptor, TokenPayload, TokenStore};
