//! Release discovery and asset retrieval.
//!
//! - [`model`]: release, asset and project descriptors.
//! - [`source`]: the remote metadata seam and its GitHub implementation.
//! - [`cache`]: the bounded cache and the fetcher that owns it.
//! - [`download`]: the raw download seam and its HTTP implementation.

pub mod cache;
pub mod download;
pub mod model;
pub mod source;

pub use cache::{CacheBound, ReleaseCache, ReleaseFetcher};
pub use download::{ArtefactDownloader, DownloadError, HttpDownloader, http_agent};
pub use model::{AssetKind, Release, ReleaseAsset, ReleaseProject, ReleaseProjects};
pub use source::{GitHubReleaseSource, ReleaseError, ReleaseSource};
