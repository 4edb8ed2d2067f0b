use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OsKind {
    Windows,
    MacOs,
    Linux,
}

impl OsKind {
    // svn reads the piped password up to the host line ending.
    pub(crate) fn line_ending(self) -> &'static str {
        match self {
            OsKind::Windows => "\r\n",
            OsKind::MacOs | OsKind::Linux => "\n",
        }
    }
}

pub(crate) fn resolve_os_kind(cache: &Mutex<Option<OsKind>>) -> Result<OsKind, String> {
    resolve_os_kind_with(cache, detect_host_os)
}

pub(crate) fn resolve_os_kind_with(
    cache: &Mutex<Option<OsKind>>,
    detect: impl FnOnce() -> Result<OsKind, String>,
) -> Result<OsKind, String> {
    let mut cached = cache
        .lock()
        .map_err(|error| format!("Failed to acquire OS probe lock: {error}"))?;

    if let Some(kind) = *cached {
        return Ok(kind);
    }

    // A failed detection caches nothing, so the next call retries.
    let kind = detect()?;
    *cached = Some(kind);
    Ok(kind)
}

fn detect_host_os() -> Result<OsKind, String> {
    match std::env::consts::OS {
        "windows" => Ok(OsKind::Windows),
        "macos" => Ok(OsKind::MacOs),
        "linux" => Ok(OsKind::Linux),
        other => Err(format!("Unsupported host operating system: {other}.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn memoizes_after_first_successful_resolution() {
        let cache = Mutex::new(None);
        let calls = Cell::new(0u32);

        for _ in 0..3 {
            let resolved = resolve_os_kind_with(&cache, || {
                calls.set(calls.get() + 1);
                Ok(OsKind::Linux)
            })
            .unwrap();
            assert_eq!(resolved, OsKind::Linux);
        }

        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn retries_after_a_failed_resolution() {
        let cache = Mutex::new(None);

        let first = resolve_os_kind_with(&cache, || Err("probe unavailable.".to_string()));
        assert!(first.is_err());

        let second = resolve_os_kind_with(&cache, || Ok(OsKind::MacOs)).unwrap();
        assert_eq!(second, OsKind::MacOs);

        let third = resolve_os_kind_with(&cache, || {
            Err("must not be called again.".to_string())
        })
        .unwrap();
        assert_eq!(third, OsKind::MacOs);
    }

    #[test]
    fn line_endings_follow_the_host() {
        assert_eq!(OsKind::Windows.line_ending(), "\r\n");
        assert_eq!(OsKind::MacOs.line_ending(), "\n");
        assert_eq!(OsKind::Linux.line_ending(), "\n");
    }
}
