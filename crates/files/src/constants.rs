/// Directory under the static root that holds all workspaces and archives.
pub const TEMP_FOLDER_NAME: &str = "temp";

/// File name prefix of produced archives: `archive-<kind>-<token>.zip`.
pub const ARCHIVE_PREFIX: &str = "archive";

/// Maximum number of fresh tokens tried before giving up on allocation.
pub(crate) const MAX_ALLOCATION_ATTEMPTS: usize = 5;
