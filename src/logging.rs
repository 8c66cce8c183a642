//! Logging shims. With `verbose-logging` the macros forward to the `log`
//! facade; without it they only type-check their arguments.

macro_rules! plan_log {
    ($level:ident, $($arg:tt)*) => {{
        #[cfg(feature = "verbose-logging")]
        log::$level!(target: "fftplan", $($arg)*);
        #[cfg(not(feature = "verbose-logging"))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}

macro_rules! trace {
    ($($arg:tt)*) => { plan_log!(trace, $($arg)*) };
}

macro_rules! debug {
    ($($arg:tt)*) => { plan_log!(debug, $($arg)*) };
}

macro_rules! warn {
    ($($arg:tt)*) => { plan_log!(warn, $($arg)*) };
}
