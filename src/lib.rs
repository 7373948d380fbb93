//! Browse the contents of GitHub Actions artifacts over HTTP, and follow stable links to the artifacts of a workflow's latest run.

pub mod archive;
pub mod cache;
pub mod config;
pub mod env;
pub mod error;
pub mod framework;
pub mod github;
pub mod latest;
pub mod logging;
pub mod server;
pub mod shutdown;
pub mod workflow;

pub use error::{Error, Result};

/// A shorthand to define a statically allocated variable using a [`std::sync::LazyLock`].
///
/// # Examples
///
/// ```rust
/// # use artifact_browser::static_lazy_lock;
/// # use std::sync::LazyLock;
/// static_lazy_lock!{
///     pub VAR_1: String = String::from("a static variable");
/// }
/// // ...equals to...
/// pub static VAR_2: LazyLock<String> = LazyLock::new(|| String::from("a static variable"));
/// ```
#[macro_export]
macro_rules! static_lazy_lock {
    ($(#[$meta:meta])* $vis:vis $name:ident: $type:ty = $expr:expr $(;)?) => {
        $(#[$meta])*
        $vis static $name: $crate::__priv_macro_use::LazyLock<$type> =
            $crate::__priv_macro_use::LazyLock::new(|| $expr);
    };
}

#[doc(hidden)]
pub mod __priv_macro_use {
    pub use std::sync::LazyLock;
}
