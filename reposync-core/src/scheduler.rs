//! C4: fans the network half of sync across projects under a concurrency
//! bound, grouped by object-dir, with an error gate (§4.4).
//!
//! Replaces the original tool's OS-fork worker pool with a `rayon` task
//! pool (§9 REDESIGN FLAGS): each task group is one `rayon` job; groups
//! sharing an object-dir are walked strictly sequentially inside that job,
//! while distinct groups run across the pool's threads.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{error, info};

use crate::fetch_times::FetchTimes;
use crate::repo_handle::{FetchHalfOptions, RepoHandle};

/// Soft fd-limit-derived job count: `min(configured, (soft_limit - 5) / 3)`,
/// floored at 1 (§5 "Resource caps").
#[cfg(unix)]
pub fn resource_capped_jobs(configured: usize) -> usize {
    let soft_limit = soft_fd_limit().unwrap_or(1024) as i64;
    let capped = ((soft_limit - 5) / 3).max(1) as usize;
    configured.min(capped).max(1)
}

#[cfg(not(unix))]
pub fn resource_capped_jobs(configured: usize) -> usize {
    configured.max(1)
}

#[cfg(unix)]
fn soft_fd_limit() -> Option<u64> {
    let mut limit = libc::rlimit { rlim_cur: 0, rlim_max: 0 };
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) };
    if rc == 0 {
        Some(limit.rlim_cur)
    } else {
        None
    }
}

pub struct SchedulerOptions {
    pub jobs: usize,
    pub force_broken: bool,
    pub fetch_opts: FetchHalfOptions,
}

pub struct SchedulerReport {
    pub fetched_gitdirs: Vec<PathBuf>,
    pub had_errors: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn resource_capped_jobs_never_exceeds_configured() {
        assert!(resource_capped_jobs(4) <= 4);
        assert!(resource_capped_jobs(4) >= 1);
    }

    #[test]
    #[cfg(unix)]
    fn resource_capped_jobs_floors_at_one() {
        assert_eq!(resource_capped_jobs(0), 1);
    }

    #[test]
    #[cfg(not(unix))]
    fn resource_capped_jobs_passes_through_on_non_unix() {
        assert_eq!(resource_capped_jobs(4), 4);
        assert_eq!(resource_capped_jobs(0), 1);
    }
}

/// Group `handles` by object-dir, sort groups by the slowest member's
/// fetch-time estimate (descending), and fetch every group's members in
/// parallel across groups, serially within a group.
pub fn run_network_half(
    handles: Vec<RepoHandle>,
    fetch_times: &Mutex<FetchTimes>,
    options: &SchedulerOptions,
) -> SchedulerReport {
    let mut groups: HashMap<PathBuf, Vec<RepoHandle>> = HashMap::new();
    for handle in handles {
        groups.entry(handle.objdir.clone()).or_default().push(handle);
    }

    let mut ordered: Vec<Vec<RepoHandle>> = groups.into_values().collect();
    {
        let times = fetch_times.lock().unwrap();
        ordered.sort_by(|a, b| {
            let slowest = |group: &Vec<RepoHandle>| {
                group.iter().map(|h| times.get(&h.name)).fold(0.0_f64, f64::max)
            };
            slowest(b).partial_cmp(&slowest(a)).unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    let error_flag = AtomicBool::new(false);
    let gc_error_flag = AtomicBool::new(false);
    let progress = AtomicUsize::new(0);
    let fetched = Mutex::new(Vec::new());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(resource_capped_jobs(options.jobs))
        .build()
        .expect("thread pool with at least one thread");

    let pack_threads = (std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        / resource_capped_jobs(options.jobs).max(1))
    .max(1);

    pool.install(|| {
        ordered.par_iter().for_each(|group| {
            if error_flag.load(Ordering::SeqCst) && !options.force_broken {
                info!("error gate set; skipping remaining task group");
                return;
            }
            for handle in group {
                if error_flag.load(Ordering::SeqCst) && !options.force_broken {
                    break;
                }
                let started = Instant::now();
                match handle.fetch_network_half(&options.fetch_opts) {
                    Ok(_) => {
                        fetched.lock().unwrap().push(handle.gitdir.clone());
                        progress.fetch_add(1, Ordering::SeqCst);
                        fetch_times.lock().unwrap().set(&handle.name, started.elapsed().as_secs_f64());
                    }
                    Err(err) => {
                        error!(project = %handle.name, %err, "network half failed");
                        error_flag.store(true, Ordering::SeqCst);
                    }
                }
            }
        });

        // GC phase: a second barrier stage, run only once every group's
        // fetches have joined above, matching the original tool's
        // `_GCProjects()` running after the whole fetch stage rather than
        // overlapping a fast group's GC with a still-fetching one (§4.4).
        ordered.par_iter().flatten().for_each(|handle| {
            if let Err(err) = handle.gc(pack_threads) {
                error!(project = %handle.name, %err, "gc failed (ignored)");
                gc_error_flag.store(true, Ordering::SeqCst);
            }
        });
    });

    SchedulerReport {
        fetched_gitdirs: fetched.into_inner().unwrap(),
        had_errors: error_flag.load(Ordering::SeqCst) || gc_error_flag.load(Ordering::SeqCst),
    }
}
