use std::path::PathBuf;
#[cfg(test)]
use std::sync::{Mutex, MutexGuard, OnceLock};

pub const HOME_ENV: &str = "MARZCERT_HOME";

/// Get marzcert's home directory holding `config.toml` and `history.toml`.
///
/// `$MARZCERT_HOME` wins when set, otherwise `~/.marzcert`.
pub fn marzcert_home_dir() -> Result<PathBuf, std::io::Error> {
    if let Ok(v) = std::env::var(HOME_ENV)
        && !v.trim().is_empty()
    {
        return Ok(PathBuf::from(v));
    }

    let home = dirs::home_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine home directory",
        )
    })?;

    Ok(home.join(".marzcert"))
}

#[cfg(test)]
pub(crate) fn test_home_env_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn with_home_env<T>(value: Option<&std::ffi::OsStr>, f: impl FnOnce() -> T) -> T {
        let _lock = test_home_env_lock();
        let previous = std::env::var_os(HOME_ENV);
        match value {
            Some(v) => unsafe { std::env::set_var(HOME_ENV, v) },
            None => unsafe { std::env::remove_var(HOME_ENV) },
        }
        let result = f();
        match previous {
            Some(value) => unsafe { std::env::set_var(HOME_ENV, value) },
            None => unsafe { std::env::remove_var(HOME_ENV) },
        }
        result
    }

    #[test]
    fn home_dir_respects_env_override() {
        let temp = TempDir::new().unwrap();
        let got = with_home_env(Some(temp.path().as_os_str()), || marzcert_home_dir().unwrap());
        assert_eq!(got, temp.path());
    }

    #[test]
    fn blank_override_falls_back_to_user_home() {
        let got = with_home_env(Some(std::ffi::OsStr::new("  ")), marzcert_home_dir);
        if let Some(home) = dirs::home_dir() {
            assert_eq!(got.unwrap(), home.join(".marzcert"));
        }
    }
}
