const SVN_KEYCHAIN_SERVICE: &str = "svn-desktop";

pub(crate) fn normalize_username(username: &str) -> Result<String, String> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err("username must be a non-empty string.".to_string());
    }
    Ok(trimmed.to_string())
}

fn credential_entry(username: &str) -> Result<keyring::Entry, String> {
    keyring::Entry::new(SVN_KEYCHAIN_SERVICE, username)
        .map_err(|error| format!("Failed to open keychain entry: {error}"))
}

pub(crate) fn store_password(username: &str, password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("password must be a non-empty string.".to_string());
    }
    let entry = credential_entry(username)?;
    entry
        .set_password(password)
        .map_err(|error| format!("Failed to store svn password in keychain: {error}"))
}

pub(crate) fn read_password(username: &str) -> Result<Option<String>, String> {
    let entry = credential_entry(username)?;
    match entry.get_password() {
        Ok(password) => Ok(Some(password)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(error) => Err(format!(
            "Failed to read svn password from keychain: {error}"
        )),
    }
}

pub(crate) fn delete_password(username: &str) -> Result<(), String> {
    let entry = credential_entry(username)?;
    match entry.delete_password() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(error) => Err(format!(
            "Failed to remove svn password from keychain: {error}"
        )),
    }
}
