//! Site content: file lookup, raw file caching and template compilation.
//!
//! Pages are looked up by logical request path across an ordered list of
//! base directories ([`resolve`]), read through a process-wide content cache
//! ([`SiteLoader`]) and compiled once by the [`TemplateCompiler`], which also
//! handles the not-found fallback and bulk site loading.

pub mod compiler;
pub mod loader;
pub mod locate;
pub mod report;

pub use compiler::{CompiledPage, TemplateCompiler};
pub use loader::{FileSource, Generator, SiteLoader};
pub use locate::{resolve, resolve_async};
pub use report::{ErrorReporter, TracingReporter};
