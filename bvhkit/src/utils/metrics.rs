use std::time::{Duration, Instant};

/// Runs `f`, logging how long it took under given label.
pub fn measure<T>(label: &str, f: impl FnOnce() -> T) -> T {
    let (val, tt) = measure_ex(f);

    #[cfg(feature = "metrics")]
    log::info!("{label}: {}", humantime::format_duration(tt));

    #[cfg(not(feature = "metrics"))]
    log::debug!("{label}: {:?}", tt);

    val
}

pub fn measure_ex<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let tt = Instant::now();
    let val = f();

    (val, tt.elapsed())
}
