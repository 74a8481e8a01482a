//! Application-wide constants

/// Number of characters of body text shown in list views
pub const TEASER_LENGTH: usize = 200;
