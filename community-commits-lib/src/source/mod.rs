//! Hosting platform clients
//!
//! The crawl engine only talks to hosting platforms through [`SourceClient`].
//! Concrete clients are built on demand by a [`ClientFactory`] and cached per
//! platform in a [`SourceClientRegistry`].

mod client;
mod error;
pub mod github;
mod kind;
mod model;
mod registry;

pub use client::{ClientFactory, PlatformClient, PlatformClientFactory, SourceClient};
pub use error::SourceError;
pub use kind::SourceKind;
pub use model::{Branch, Commit, PushEvent, Repository, WebCommit};
pub use registry::SourceClientRegistry;
