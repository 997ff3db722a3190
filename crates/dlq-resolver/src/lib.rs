#![forbid(unsafe_code)]

//! Site resolvers: the registry that dispatches a user URL to the adapter
//! able to turn it into a concrete download target, plus the built-in
//! HTTP pass-through, Webshare, and MEGA resolvers.
//!
//! The MEGA link grammar and content-key derivation live here as well
//! because both the resolver (filename metadata) and the post-download
//! payload decryptor need them.

pub mod error;
pub mod http;
pub mod link;
pub mod mega;
pub mod registry;
pub mod sites;
pub mod target;
pub mod webshare;

pub use error::ResolveError;
pub use http::HttpResolver;
pub use link::{MegaContentKey, MegaFileLink, MegaLinkError};
pub use mega::MegaResolver;
pub use registry::{ResolverRegistry, SiteResolver};
pub use sites::{is_mega_job, is_webshare_job};
pub use target::{ResolvedTarget, TargetKind};
pub use webshare::WebshareResolver;
