pub const FULL: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "+git.",
    env!("WORKLOG_GIT_SHA"),
    env!("WORKLOG_GIT_DIRTY")
);
