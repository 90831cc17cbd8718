pub const FULL: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GITVERSION_DESCRIBE"),
    ")"
);

pub const COMMIT_SHA: &str = env!("GITVERSION_COMMIT_SHA");
