//! Filesystem primitives used by the logo pipeline.

mod error;
mod local;
mod traits;

pub use error::FsError;
pub use local::LocalFileOps;
pub use traits::{CopiedFile, FileOps};
