//! Process-wide registration of the sqlite-vec extension.
//!
//! Registration goes through `sqlite3_auto_extension`, so it only affects
//! connections opened *after* [`register_auto_extension`] returns. Callers
//! that need `vec_distance_cosine` must register before opening the store.

use std::sync::OnceLock;

/// Set to `0`, `false` or `off` to keep sqlite-vec out of new connections.
pub const AUTO_ENABLE_ENV: &str = "QUARRY_SQLITE_VEC";

static REGISTRATION: OnceLock<Result<(), String>> = OnceLock::new();

/// Register sqlite-vec for every connection opened from now on.
///
/// Idempotent: the first outcome is cached for the life of the process.
///
/// # Errors
///
/// Returns a description of the failure when registration is disabled via
/// [`AUTO_ENABLE_ENV`] or SQLite rejects the entrypoint.
pub fn register_auto_extension() -> Result<(), String> {
    if disabled_by_env(std::env::var(AUTO_ENABLE_ENV).ok().as_deref()) {
        return Err(format!(
            "sqlite-vec auto-extension disabled by {AUTO_ENABLE_ENV}"
        ));
    }

    REGISTRATION.get_or_init(register_once).clone()
}

/// Returns `true` when `vec_version()` resolves on this connection.
#[must_use]
pub fn is_loaded(conn: &rusqlite::Connection) -> bool {
    conn.query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0))
        .is_ok()
}

fn disabled_by_env(value: Option<&str>) -> bool {
    matches!(value, Some("0" | "false" | "off"))
}

fn register_once() -> Result<(), String> {
    #[allow(clippy::transmute_ptr_to_ptr)]
    let entrypoint: unsafe extern "C" fn(
        *mut rusqlite::ffi::sqlite3,
        *mut *const std::os::raw::c_char,
        *const rusqlite::ffi::sqlite3_api_routines,
    ) -> std::os::raw::c_int =
        unsafe { std::mem::transmute(sqlite_vec::sqlite3_vec_init as *const ()) };

    let rc = unsafe { rusqlite::ffi::sqlite3_auto_extension(Some(entrypoint)) };
    if rc == rusqlite::ffi::SQLITE_OK {
        tracing::debug!("sqlite-vec registered as auto extension");
        Ok(())
    } else {
        Err(format!("sqlite3_auto_extension failed with rc={rc}"))
    }
}
