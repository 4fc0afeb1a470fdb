//! Running one dispersion worker per tranche
//!
//! Each tranche gets a private working directory `<working_dir>/<index>`, created
//! before its worker starts. Workers run on the rayon pool and share nothing.
//! Transient resource failures are retried with exponential backoff; any other
//! failure ends that tranche immediately.

use crate::config::WorkerConfig;
use crate::core_types::record::FireRecord;
use crate::error::WorkerError;
use rayon::prelude::*;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What a worker knows about the tranche it is running
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrancheContext {
    pub index: usize,
    pub working_dir: PathBuf,
    /// 1-based
    pub attempt: u32,
}

/// Run `worker` over every tranche in parallel.
///
/// Outputs come back in tranche order. If any tranche fails, the failure with the
/// lowest tranche index is returned, wrapped in [`WorkerError::Tranche`]; the other
/// tranches still run to completion.
///
/// # Errors
/// [`WorkerError::Tranche`] around the working directory or worker failure
pub fn run_tranches<T, F>(
    tranches: Vec<Vec<FireRecord>>,
    config: &WorkerConfig,
    worker: F,
) -> Result<Vec<T>, WorkerError>
where
    T: Send,
    F: Fn(&TrancheContext, &[FireRecord]) -> Result<T, WorkerError> + Sync,
{
    info!(
        "Running {} dispersion tranches under {}",
        tranches.len(),
        config.working_dir.display()
    );

    let results: Vec<Result<T, WorkerError>> = tranches
        .into_par_iter()
        .enumerate()
        .map(|(index, records)| {
            run_one(index, &records, config, &worker).map_err(|source| WorkerError::Tranche {
                index,
                source: Box::new(source),
            })
        })
        .collect();

    // collect() keeps tranche order, so the first error is the lowest index
    results.into_iter().collect()
}

fn run_one<T, F>(
    index: usize,
    records: &[FireRecord],
    config: &WorkerConfig,
    worker: &F,
) -> Result<T, WorkerError>
where
    F: Fn(&TrancheContext, &[FireRecord]) -> Result<T, WorkerError>,
{
    let working_dir = config.working_dir.join(index.to_string());
    std::fs::create_dir_all(&working_dir)?;

    let max_attempts = config.max_attempts.max(1);
    let mut delay = Duration::from_millis(config.backoff_ms);
    let mut context = TrancheContext {
        index,
        working_dir,
        attempt: 1,
    };

    loop {
        debug!(
            "Tranche {} attempt {}/{} with {} records",
            index,
            context.attempt,
            max_attempts,
            records.len()
        );
        match worker(&context, records) {
            Ok(output) => return Ok(output),
            Err(err) if err.is_retryable() && context.attempt < max_attempts => {
                warn!(
                    "Tranche {index} attempt {} failed ({err}); retrying in {delay:?}",
                    context.attempt
                );
                std::thread::sleep(delay);
                delay = delay.saturating_mul(2);
                context.attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::geo::LatLng;
    use crate::core_types::time::parse_naive;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn record(id: &str) -> FireRecord {
        FireRecord::new(
            id,
            LatLng::new(45.0, -120.0),
            parse_naive("2015-08-04T00:00:00").unwrap(),
            parse_naive("2015-08-05T00:00:00").unwrap(),
            10.0,
        )
    }

    fn config(name: &str) -> WorkerConfig {
        WorkerConfig {
            working_dir: std::env::temp_dir()
                .join("smoke-sim-worker-tests")
                .join(format!("{name}-{}", uuid::Uuid::new_v4())),
            max_attempts: 3,
            backoff_ms: 1,
        }
    }

    #[test]
    fn test_outputs_in_tranche_order_with_private_dirs() {
        let cfg = config("order");
        let tranches = vec![vec![record("a"), record("a")], vec![record("b")], vec![]];

        let outputs = run_tranches(tranches, &cfg, |ctx, records| {
            assert!(ctx.working_dir.is_dir());
            assert_eq!(ctx.working_dir, cfg.working_dir.join(ctx.index.to_string()));
            Ok((ctx.index, records.len()))
        })
        .unwrap();

        assert_eq!(outputs, [(0, 2), (1, 1), (2, 0)]);
        let _ = std::fs::remove_dir_all(&cfg.working_dir);
    }

    #[test]
    fn test_resource_failures_are_retried() {
        let cfg = config("retry");
        let calls = AtomicU32::new(0);

        let outputs = run_tranches(vec![vec![record("a")]], &cfg, |ctx, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            if ctx.attempt < 3 {
                Err(WorkerError::Resource("no free slot".into()))
            } else {
                Ok(ctx.attempt)
            }
        })
        .unwrap();

        assert_eq!(outputs, [3]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let _ = std::fs::remove_dir_all(&cfg.working_dir);
    }

    #[test]
    fn test_retries_give_up_after_max_attempts() {
        let cfg = config("give-up");
        let calls = AtomicU32::new(0);

        let err = run_tranches(vec![vec![record("a")]], &cfg, |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(WorkerError::Resource("busy".into()))
        })
        .unwrap_err();

        assert!(matches!(err, WorkerError::Tranche { index: 0, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let _ = std::fs::remove_dir_all(&cfg.working_dir);
    }

    #[test]
    fn test_domain_failure_not_retried_and_lowest_index_reported() {
        let cfg = config("domain");
        let calls = AtomicU32::new(0);
        let tranches = vec![vec![record("a")], vec![record("b")], vec![record("c")]];

        let err = run_tranches(tranches, &cfg, |ctx, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            if ctx.index == 0 {
                Ok(())
            } else {
                Err(WorkerError::Domain(format!("bad tranche {}", ctx.index)))
            }
        })
        .unwrap_err();

        match err {
            WorkerError::Tranche { index, source } => {
                assert_eq!(index, 1);
                assert!(matches!(*source, WorkerError::Domain(ref m) if m == "bad tranche 1"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let _ = std::fs::remove_dir_all(&cfg.working_dir);
    }
}
