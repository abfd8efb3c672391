use tracing::level_filters::LevelFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub fn init() {
    init_with_level(LevelFilter::INFO);
}

pub fn init_with_level(level: LevelFilter) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_ansi(false) // generally cloud log console doesn't support color
                .with_line_number(true)
                .with_thread_ids(true)
                .with_filter(level),
        )
        .init();
}

// tracing macros require the level at compile time, this dispatches a runtime level
#[macro_export]
macro_rules! log_event {
    (level = $level:expr, $($arg:tt)+) => {{
        let level: ::tracing::Level = $level;
        if level == ::tracing::Level::ERROR {
            ::tracing::error!($($arg)+);
        } else if level == ::tracing::Level::WARN {
            ::tracing::warn!($($arg)+);
        } else if level == ::tracing::Level::INFO {
            ::tracing::info!($($arg)+);
        } else if level == ::tracing::Level::DEBUG {
            ::tracing::debug!($($arg)+);
        } else {
            ::tracing::trace!($($arg)+);
        }
    }};
}
