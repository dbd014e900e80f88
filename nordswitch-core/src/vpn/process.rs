//! OS process enumeration and lifecycle management
//!
//! Finds NordVPN client processes by name, samples their resident memory
//! for readiness detection, and closes them with graceful-then-forced
//! escalation. Enumeration shells out to the platform's native tooling
//! (`ps` on unix, `tasklist`/`taskkill` on Windows).

use std::fmt;
use std::io;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// How long a process gets to exit after a graceful termination request
pub const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Spacing between liveness re-checks while waiting for an exit
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A running process, as reported by the OS process table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
}

/// How a single matching process was dealt with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Exited within the grace window after the requested signal
    Closed,
    /// Ignored graceful termination and was force-killed
    ForceKilled,
    /// An OS-level error occurred; other processes are still handled
    Failed(String),
}

impl fmt::Display for CloseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseOutcome::Closed => write!(f, "closed"),
            CloseOutcome::ForceKilled => write!(f, "force-killed"),
            CloseOutcome::Failed(detail) => write!(f, "failed: {}", detail),
        }
    }
}

/// Per-process result of a close operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReport {
    pub pid: u32,
    pub name: String,
    pub outcome: CloseOutcome,
}

/// Enumerate running processes that match one of the target names
///
/// Matching is case-insensitive and exact on the process name.
pub fn processes_named(names: &[&str]) -> io::Result<Vec<ProcessInfo>> {
    let targets: Vec<String> = names.iter().map(|name| name.to_lowercase()).collect();
    Ok(list_processes()?
        .into_iter()
        .filter(|process| targets.contains(&process.name.to_lowercase()))
        .collect())
}

/// Resident memory of the named process in MB
///
/// When several processes share the name (GUI helpers, renderers), the
/// largest resident set wins since the main process dominates. Returns
/// `None` when no such process is running or the probe fails.
pub fn resident_memory_mb(name: &str) -> Option<f64> {
    let processes = processes_named(&[name]).ok()?;
    processes
        .iter()
        .filter_map(|process| resident_memory_of(process.pid))
        .fold(None, |best, sample| match best {
            Some(current) if current >= sample => Some(current),
            _ => Some(sample),
        })
}

/// Close every process matching one of the target names
///
/// Graceful termination first with a bounded wait, escalating to forced
/// termination exactly once on expiry; `force` skips the graceful phase.
/// Individual failures are logged and do not abort the remaining
/// processes. Zero matches is a no-op, not an error.
pub async fn close_processes(names: &[&str], force: bool) -> io::Result<Vec<CloseReport>> {
    close_processes_with_grace(names, force, CLOSE_GRACE).await
}

/// [`close_processes`] with an explicit grace window
pub async fn close_processes_with_grace(
    names: &[&str],
    force: bool,
    grace: Duration,
) -> io::Result<Vec<CloseReport>> {
    let matching = processes_named(names)?;
    if matching.is_empty() {
        info!(targets = ?names, "No matching process was running");
        return Ok(Vec::new());
    }

    let mut reports = Vec::with_capacity(matching.len());
    for process in matching {
        let outcome = close_one(&process, force, grace).await;
        match &outcome {
            CloseOutcome::Closed => info!(pid = process.pid, name = %process.name, "Process closed"),
            CloseOutcome::ForceKilled => {
                warn!(pid = process.pid, name = %process.name, "Process did not exit in time, forced close")
            }
            CloseOutcome::Failed(reason) => {
                warn!(pid = process.pid, name = %process.name, %reason, "Failed to close process")
            }
        }
        reports.push(CloseReport {
            pid: process.pid,
            name: process.name,
            outcome,
        });
    }
    Ok(reports)
}

async fn close_one(process: &ProcessInfo, force: bool, grace: Duration) -> CloseOutcome {
    let signalled = if force {
        kill_process(process.pid)
    } else {
        terminate_process(process.pid)
    };
    if let Err(e) = signalled {
        return CloseOutcome::Failed(e.to_string());
    }

    if wait_for_exit(process.pid, grace).await {
        return CloseOutcome::Closed;
    }
    if force {
        return CloseOutcome::Failed("process survived forced termination".to_string());
    }

    // Escalate once
    if let Err(e) = kill_process(process.pid) {
        return CloseOutcome::Failed(e.to_string());
    }
    wait_for_exit(process.pid, Duration::from_secs(1)).await;
    CloseOutcome::ForceKilled
}

async fn wait_for_exit(pid: u32, within: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if !is_alive(pid) {
            return true;
        }
        sleep(EXIT_POLL_INTERVAL).await;
    }
    !is_alive(pid)
}

#[cfg(unix)]
mod imp {
    use super::ProcessInfo;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    use std::io;
    use std::process::Command;

    /// Full process table via `ps`
    pub fn list_processes() -> io::Result<Vec<ProcessInfo>> {
        let output = Command::new("ps").args(["-eo", "pid=,comm="]).output()?;
        if !output.status.success() {
            return Err(io::Error::other("ps exited with a failure status"));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut processes = Vec::new();
        for line in stdout.lines() {
            let mut parts = line.trim().splitn(2, char::is_whitespace);
            let Some(pid) = parts.next().and_then(|raw| raw.trim().parse::<u32>().ok()) else {
                continue;
            };
            let Some(name) = parts.next() else { continue };
            processes.push(ProcessInfo {
                pid,
                name: name.trim().to_string(),
            });
        }
        Ok(processes)
    }

    /// Resident set size of a single process in MB
    pub fn resident_memory_of(pid: u32) -> Option<f64> {
        let output = Command::new("ps")
            .args(["-p", &pid.to_string(), "-o", "rss="])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let rss_kb: f64 = String::from_utf8_lossy(&output.stdout).trim().parse().ok()?;
        Some(rss_kb / 1024.0)
    }

    pub fn is_alive(pid: u32) -> bool {
        kill(Pid::from_raw(pid as i32), None).is_ok()
    }

    pub fn terminate_process(pid: u32) -> io::Result<()> {
        kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
            .map_err(|e| io::Error::other(format!("SIGTERM failed: {}", e)))
    }

    pub fn kill_process(pid: u32) -> io::Result<()> {
        kill(Pid::from_raw(pid as i32), Signal::SIGKILL)
            .map_err(|e| io::Error::other(format!("SIGKILL failed: {}", e)))
    }
}

#[cfg(windows)]
mod imp {
    use super::ProcessInfo;
    use std::io;
    use std::process::Command;

    /// Full process table via `tasklist` CSV output
    pub fn list_processes() -> io::Result<Vec<ProcessInfo>> {
        let output = Command::new("tasklist").args(["/FO", "CSV", "/NH"]).output()?;
        if !output.status.success() {
            return Err(io::Error::other("tasklist exited with a failure status"));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut processes = Vec::new();
        for line in stdout.lines() {
            let fields = parse_csv_line(line);
            let (Some(name), Some(pid)) = (fields.first(), fields.get(1)) else {
                continue;
            };
            let Ok(pid) = pid.trim().parse::<u32>() else {
                continue;
            };
            processes.push(ProcessInfo {
                pid,
                name: name.clone(),
            });
        }
        Ok(processes)
    }

    /// Working-set size of a single process in MB
    ///
    /// `tasklist` reports memory like `"123,456 K"`.
    pub fn resident_memory_of(pid: u32) -> Option<f64> {
        let output = Command::new("tasklist")
            .args(["/FI", &format!("PID eq {}", pid), "/FO", "CSV", "/NH"])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout.lines().next()?;
        let fields = parse_csv_line(line);
        let mem_field = fields.get(4)?;
        let digits: String = mem_field.chars().filter(char::is_ascii_digit).collect();
        let kb: f64 = digits.parse().ok()?;
        Some(kb / 1024.0)
    }

    pub fn is_alive(pid: u32) -> bool {
        resident_memory_of(pid).is_some()
    }

    pub fn terminate_process(pid: u32) -> io::Result<()> {
        run_taskkill(pid, false)
    }

    pub fn kill_process(pid: u32) -> io::Result<()> {
        run_taskkill(pid, true)
    }

    fn run_taskkill(pid: u32, force: bool) -> io::Result<()> {
        let mut command = Command::new("taskkill");
        command.args(["/PID", &pid.to_string()]);
        if force {
            command.arg("/F");
        }
        let output = command.output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!(
                "taskkill failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    fn parse_csv_line(line: &str) -> Vec<String> {
        line.trim()
            .trim_start_matches('"')
            .trim_end_matches('"')
            .split("\",\"")
            .map(|field| field.to_string())
            .collect()
    }
}

use imp::{is_alive, kill_process, resident_memory_of, terminate_process};
pub use imp::list_processes;

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Command;
    use std::thread::JoinHandle;

    /// Spawn a long-running child and reap it in the background so that a
    /// killed child leaves the process table instead of lingering as a
    /// zombie (which `is_alive` would still see).
    fn spawn_reaped(program: &str, args: &[&str]) -> (u32, JoinHandle<()>) {
        let mut child = Command::new(program)
            .args(args)
            .spawn()
            .expect("failed to spawn test child");
        let pid = child.id();
        let reaper = std::thread::spawn(move || {
            let _ = child.wait();
        });
        (pid, reaper)
    }

    #[test]
    fn test_list_processes_contains_self() {
        let pid = std::process::id();
        let processes = list_processes().unwrap();
        assert!(processes.iter().any(|process| process.pid == pid));
    }

    #[test]
    fn test_is_alive_nonexistent_pid() {
        assert!(!is_alive(99_999_999));
    }

    #[test]
    fn test_resident_memory_of_self() {
        let memory = resident_memory_of(std::process::id()).unwrap();
        assert!(memory > 0.0);
    }

    #[tokio::test]
    async fn test_close_no_matching_process_is_noop() {
        let reports = close_processes(&["nordswitch-test-no-such-proc"], false)
            .await
            .unwrap();
        assert!(reports.is_empty());
    }

    #[tokio::test]
    async fn test_close_one_graceful() {
        let (pid, reaper) = spawn_reaped("sleep", &["300"]);
        let info = ProcessInfo {
            pid,
            name: "sleep".to_string(),
        };

        let outcome = close_one(&info, false, Duration::from_secs(2)).await;
        assert_eq!(outcome, CloseOutcome::Closed);
        reaper.join().unwrap();
    }

    #[tokio::test]
    async fn test_close_one_escalates_to_kill() {
        // SIGTERM is ignored so only the SIGKILL escalation can end it
        let (pid, reaper) = spawn_reaped("sh", &["-c", "trap '' TERM; sleep 300"]);
        sleep(Duration::from_millis(300)).await;
        let info = ProcessInfo {
            pid,
            name: "sh".to_string(),
        };

        let outcome = close_one(&info, false, Duration::from_millis(600)).await;
        assert_eq!(outcome, CloseOutcome::ForceKilled);
        reaper.join().unwrap();
    }

    #[tokio::test]
    async fn test_close_one_forced_skips_grace() {
        let (pid, reaper) = spawn_reaped("sleep", &["300"]);
        let info = ProcessInfo {
            pid,
            name: "sleep".to_string(),
        };

        let outcome = close_one(&info, true, Duration::from_secs(2)).await;
        assert_eq!(outcome, CloseOutcome::Closed);
        reaper.join().unwrap();
    }
}
