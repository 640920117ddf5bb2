//! Optional Tracy instrumentation for compile phases.
//!
//! Enabled through the `profiling` Cargo feature. With the feature disabled
//! every macro expands to nothing. With it enabled, [`init`] must run before
//! the first instrumented call.
//!
//! ```ignore
//! use redlilium_mesh::{profile_function, profile_scope};
//!
//! fn compile_skinning() {
//!     profile_function!();
//!     {
//!         profile_scope!("bone_table");
//!         // ...
//!     }
//! }
//! ```

#[cfg(feature = "profiling")]
pub use tracy_client::{self, span};

/// Start the Tracy client. Call once before compiling meshes you want to inspect.
#[cfg(feature = "profiling")]
pub fn init() {
    tracy_client::Client::start();
    log::info!("Tracy profiling enabled");
}

/// No-op when profiling is disabled.
#[cfg(not(feature = "profiling"))]
pub fn init() {}

/// Create a profiling span for the current scope.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Create a profiling span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Create a profiling span covering the enclosing function.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_function {
    () => {
        let _profile_span = $crate::profiling::span!();
    };
}

/// Create a function span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_function {
    () => {};
}

/// Name the current thread in Tracy.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! set_thread_name {
    ($name:expr) => {
        if let Some(client) = $crate::profiling::tracy_client::Client::running() {
            client.set_thread_name($name);
        }
    };
}

/// Name the current thread (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! set_thread_name {
    ($name:expr) => {};
}
