//! Bounded parallel execution utilities.
//!
//! Runs work on a dedicated rayon pool so the number of items in flight never
//! exceeds the requested worker count, regardless of the global pool size.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// Resolves a requested worker count. `0` means one worker per logical CPU.
pub fn resolve_workers(requested: usize) -> usize {
    if requested > 0 {
        return requested;
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Builds a pool with exactly `resolve_workers(workers)` threads named `{name}-{index}`.
pub fn bounded_pool(workers: usize, name: &str) -> Result<ThreadPool, ThreadPoolBuildError> {
    let prefix = name.to_string();
    ThreadPoolBuilder::new()
        .num_threads(resolve_workers(workers))
        .thread_name(move |index| format!("{prefix}-{index}"))
        .build()
}

/// Maps `f` over `items` on `pool` and waits for every item to finish.
///
/// Output order matches input order. At most `pool.current_num_threads()`
/// items are processed at once, as long as `f` does not itself fork into the pool.
pub fn par_map_on<T, R, F>(pool: &ThreadPool, items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    pool.install(|| items.par_iter().map(&f).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn map_with<T: Sync, R: Send>(
        items: &[T],
        workers: usize,
        f: impl Fn(&T) -> R + Sync + Send,
    ) -> Vec<R> {
        let pool = bounded_pool(workers, "test").unwrap();
        par_map_on(&pool, items, f)
    }

    #[test]
    fn test_par_map_on_basic() {
        let items: Vec<i32> = (0..10).collect();
        let result = map_with(&items, 3, |&x| x * 2);
        assert_eq!(result, vec![0, 2, 4, 6, 8, 10, 12, 14, 16, 18]);
    }

    #[test]
    fn test_par_map_on_preserves_order() {
        let items: Vec<i32> = (0..100).collect();
        let result = map_with(&items, 4, |&x| x);
        let expected: Vec<i32> = (0..100).collect();
        assert_eq!(result, expected);
    }

    #[test]
    fn test_par_map_on_empty() {
        let items: Vec<i32> = vec![];
        assert!(map_with(&items, 3, |&x| x).is_empty());
    }

    #[test]
    fn test_zero_workers_uses_all_cpus() {
        let pool = bounded_pool(0, "all").unwrap();
        assert_eq!(pool.current_num_threads(), resolve_workers(0));
        let items: Vec<i32> = (0..7).collect();
        assert_eq!(par_map_on(&pool, &items, |&x| x + 1), vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_resolve_workers() {
        assert_eq!(resolve_workers(5), 5);
        assert!(resolve_workers(0) >= 1);
    }

    #[test]
    fn test_concurrency_cap() {
        let items: Vec<i32> = (0..24).collect();
        let in_flight = AtomicUsize::new(0);
        let max_observed = AtomicUsize::new(0);

        map_with(&items, 3, |&x| {
            let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            max_observed.fetch_max(current, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(5));
            in_flight.fetch_sub(1, Ordering::SeqCst);
            x
        });

        let max = max_observed.load(Ordering::SeqCst);
        assert!(max <= 3, "max in-flight was {max}, expected <= 3");
    }

    #[test]
    fn test_pool_thread_names() {
        let pool = bounded_pool(2, "tile").unwrap();
        let name = pool.install(|| std::thread::current().name().map(str::to_string));
        assert!(name.unwrap().starts_with("tile-"));
    }

    #[test]
    fn test_results_can_carry_errors() {
        let items: Vec<i32> = (0..6).collect();
        let result = map_with(&items, 2, |&x| {
            if x == 3 { Err(format!("bad {x}")) } else { Ok(x) }
        });
        assert_eq!(result.iter().filter(|r| r.is_err()).count(), 1);
        assert_eq!(result[3], Err("bad 3".to_string()));
    }
}
