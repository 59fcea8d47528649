use std::future::Future;

use tokio::runtime::{Builder, Runtime};

/// Runs `future` to completion on a fresh multi-threaded runtime, then drops
/// the runtime without joining its blocking pool.
///
/// Tokio reads stdin on a blocking thread that cannot be cancelled, so a
/// plain `#[tokio::main]` would hang on exit until the user pressed Enter.
///
/// # Errors
///
/// Returns an error if the runtime cannot be built.
pub fn block_on_detached<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = Builder::new_multi_thread().enable_all().build()?;
    Ok(finish(runtime, future))
}

fn finish<F: Future>(runtime: Runtime, future: F) -> F::Output {
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn returns_without_waiting_for_stuck_blocking_work() {
        let started = Instant::now();
        let value = block_on_detached(async {
            // Stands in for a read on a terminal nobody types into.
            drop(tokio::task::spawn_blocking(|| {
                std::thread::sleep(Duration::from_secs(30));
            }));
            tokio::task::yield_now().await;
            7
        })
        .unwrap();
        assert_eq!(value, 7);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
