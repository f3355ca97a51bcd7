//! Artifact sandbox: compiles untrusted React artifacts into self-contained
//! preview bundles.
//!
//! SYSTEM CONTEXT
//! ==============
//! Chat text goes through `artifact` (fenced block extraction), then
//! `compiler` drives the `toolchain` with a `plugin` that applies the
//! import `policy`, serves project files from the `vfs`, and fetches
//! pinned framework code through the `loader`. The `wrapper` bootstrap
//! mounts the user component; `preview` hosts the bundle in a document.
//! `lifecycle` and `storage` decide when to compile and where edits live.

pub mod artifact;
pub mod compiler;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod loader;
pub mod plugin;
pub mod policy;
pub mod preview;
pub mod storage;
pub mod toolchain;
pub mod vfs;
pub mod wrapper;

pub use artifact::{ArtifactLanguage, ReactArtifact, ReactArtifactCandidate, build_artifact, parse_react_artifact};
pub use compiler::{CompileError, CompileResult, Compiler};
pub use config::CompilerConfig;
pub use lifecycle::{ArtifactPanel, ChatMessage, MessageKind, MessageRole};
pub use preview::render_preview_document;
pub use storage::{FileStorage, MemoryStorage, StorageBackend, StorageKey, load_artifact, save_artifact};
pub use vfs::VirtualFileMap;
