//! C3: persistent EWMA of each project's last fetch duration, used by the
//! scheduler to order work longest-first (§4.3, §4.4). Persisted as
//! `.repo_fetchtimes.json` inside the workspace metadata directory (§6).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

const DEFAULT_SECONDS: f64 = 86_400.0; // one day, per §4.3
const ALPHA: f64 = 0.5;

#[derive(Debug)]
pub struct FetchTimes {
    path: PathBuf,
    times: HashMap<String, f64>,
    observed_this_run: std::collections::HashSet<String>,
}

impl FetchTimes {
    /// Load `.repo_fetchtimes.json` from `metadata_dir`. An unreadable or
    /// malformed document is treated as empty rather than fatal — the next
    /// `save()` rewrites it from scratch.
    pub fn load(metadata_dir: impl Into<PathBuf>) -> Self {
        let path = metadata_dir.into().join(".repo_fetchtimes.json");
        let times = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str::<HashMap<String, f64>>(&raw).ok())
            .unwrap_or_default();
        FetchTimes { path, times, observed_this_run: Default::default() }
    }

    pub fn get(&self, project: &str) -> f64 {
        self.times.get(project).copied().unwrap_or(DEFAULT_SECONDS)
    }

    pub fn set(&mut self, project: &str, observed_seconds: f64) {
        self.observed_this_run.insert(project.to_owned());
        let updated = match self.times.get(project) {
            Some(prior) => ALPHA * observed_seconds + (1.0 - ALPHA) * prior,
            None => observed_seconds,
        };
        self.times.insert(project.to_owned(), updated);
    }

    /// Persist the current map, pruning every project name not observed in
    /// this run (§8's "fetch-times memory after a run contains only names
    /// observed in that run").
    pub fn save(&mut self) -> std::io::Result<()> {
        self.times.retain(|name, _| self.observed_this_run.contains(name));
        let contents = serde_json::to_string_pretty(&self.times)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_project_defaults_to_one_day() {
        let dir = tempfile::tempdir().unwrap();
        let times = FetchTimes::load(dir.path());
        assert_eq!(times.get("never-seen"), DEFAULT_SECONDS);
    }

    #[test]
    fn ewma_blends_toward_new_observation() {
        let dir = tempfile::tempdir().unwrap();
        let mut times = FetchTimes::load(dir.path());
        times.set("p", 100.0);
        assert_eq!(times.get("p"), 100.0);
        times.set("p", 200.0);
        assert_eq!(times.get("p"), 150.0);
    }

    #[test]
    fn save_prunes_unobserved_names() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut times = FetchTimes::load(dir.path());
            times.set("stale", 10.0);
            times.set("fresh", 20.0);
            times.save().unwrap();
        }
        {
            let mut times = FetchTimes::load(dir.path());
            assert_eq!(times.get("stale"), 10.0);
            times.set("fresh", 30.0);
            times.save().unwrap();
        }
        let reloaded = FetchTimes::load(dir.path());
        assert_eq!(reloaded.get("stale"), DEFAULT_SECONDS);
        assert_eq!(reloaded.get("fresh"), 30.0);
    }
}
