//! Shared constants.

/// Team path segment used when no team context applies.
pub const FILE_TEAM_ID: &str = "noteam";

/// Content type of generated thumbnails and previews.
pub const DERIVATIVE_CONTENT_TYPE: &str = "image/jpeg";
