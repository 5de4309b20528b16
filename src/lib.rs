//! Go's defer for Rust.
//!
//! Defer postpones a call until the end of the enclosing [`with_defer`]
//! scope. Deferred calls are pushed onto a per-scope registry and run in
//! LIFO (last-in-first-out) order on every exit path, including `Err`
//! propagation and panics.
//!
//! ```
//! use go_defer::{defer, with_defer};
//!
//! with_defer(|_scope| {
//!     for i in 0..4 {
//!         defer(move || println!("{}", i)).expect("scope is open");
//!     }
//! });
//! // prints 3, 2, 1, 0
//! ```
//!
//! Helpers that should not depend on the ambient lookup can take the
//! [`Scope`] handle instead and register through [`Scope::defer`].

mod error;
mod registry;
mod scope;
mod sink;

pub use error::{Error, Result};
pub use registry::Origin;
pub use scope::{defer, with_defer, with_defer_reporting, Scope};
pub use sink::{CleanupSink, LogSink};

/// Statement sugar over [`defer()`]
#[macro_export]
macro_rules! defer {
    ($($body:tt)*) => {
        $crate::defer(move || { $($body)*; })
    };
}
