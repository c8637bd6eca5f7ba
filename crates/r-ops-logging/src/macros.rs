//! ---
//! ops_section: "03-observability"
//! ops_subsection: "module"
//! ops_type: "source"
//! ops_scope: "code"
//! ops_description: "Structured logging adapters and sinks."
//! ops_version: "v0.0.0-prealpha"
//! ops_owner: "tbd"
//! ---
//! Context-enriched logging macros.

#[doc(hidden)]
#[macro_export]
macro_rules! __ops_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            environment = ctx.environment.unwrap_or(""),
            region = ctx.region.unwrap_or(""),
            step = ctx.step.unwrap_or(""),
            resource = ctx.resource.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with failover context.
#[macro_export]
macro_rules! ops_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__ops_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__ops_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with failover context.
#[macro_export]
macro_rules! ops_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__ops_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__ops_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with failover context.
#[macro_export]
macro_rules! ops_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__ops_event!(tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__ops_event!(tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with failover context.
#[macro_export]
macro_rules! ops_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__ops_event!(tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__ops_event!(tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
