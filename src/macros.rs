/// `tracing::info!` with an optional start time.
/// Given one, the event carries `elapsed_secs` measured up to now.
/// ```ignore
/// info_time!("pagina: {} de: {}", 1, 3);
/// let started = chrono::Local::now();
/// info_time!(started, "{} causas", 15);
/// ```
#[macro_export]
macro_rules! info_time {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        ::tracing::info!($fmt $(, $arg)*)
    };
    ($started:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        let elapsed_secs = (::chrono::Local::now() - $started)
            .num_milliseconds() as f64
            / 1_000.0;
        ::tracing::info!(elapsed_secs, $fmt $(, $arg)*)
    }};
}
