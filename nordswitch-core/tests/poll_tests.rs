// Behavioral tests for the bounded polling helpers.
//
// Run under paused tokio time so interval/deadline arithmetic is exact
// and the tests finish instantly.

use nordswitch_core::error::{CliError, ConfigError, SwitchError};
use nordswitch_core::vpn::poll::{wait_for_steady_state, wait_until, ReadinessOptions};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn wait_until_succeeds_at_exact_iteration() {
    let calls = AtomicU32::new(0);

    let result = wait_until(
        "connected",
        Duration::from_secs(1),
        Duration::from_secs(45),
        || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(n == 5)
        },
    )
    .await;

    assert!(result.is_ok());
    // Satisfied on the fifth probe, never earlier
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn wait_until_times_out_after_deadline_worth_of_probes() {
    let calls = AtomicU32::new(0);

    let result = wait_until(
        "connected",
        Duration::from_secs(1),
        Duration::from_secs(5),
        || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        },
    )
    .await;

    match result {
        Err(SwitchError::Cli(CliError::StateTimeout { state, seconds })) => {
            assert_eq!(state, "connected");
            assert_eq!(seconds, 5);
        }
        other => panic!("Expected StateTimeout, got {:?}", other),
    }
    // deadline / interval probes, not more
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn wait_until_swallows_transient_errors() {
    let calls = AtomicU32::new(0);

    let result = wait_until(
        "connected",
        Duration::from_secs(1),
        Duration::from_secs(45),
        || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(SwitchError::Cli(CliError::CommandFailed {
                    command: "nordvpn status".to_string(),
                    detail: "daemon is reloading".to_string(),
                }))
            } else {
                Ok(true)
            }
        },
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn wait_until_aborts_on_terminal_error() {
    let calls = AtomicU32::new(0);

    let result = wait_until(
        "connected",
        Duration::from_secs(1),
        Duration::from_secs(45),
        || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(SwitchError::Config(ConfigError::ExecutableNotFound {
                attempted: "nordvpn".to_string(),
            }))
        },
    )
    .await;

    assert!(matches!(result, Err(SwitchError::Config(_))));
    // A configuration error will never resolve itself, so no retries
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn steady_state_times_out_when_process_never_appears() {
    let opts = ReadinessOptions {
        timeout: Duration::from_secs(3),
        interval: Duration::from_millis(500),
        ..Default::default()
    };

    let result = wait_for_steady_state("nordswitch-test-no-such-process", &opts).await;

    match result {
        Err(SwitchError::Cli(CliError::NotReady { seconds })) => assert_eq!(seconds, 3),
        other => panic!("Expected NotReady, got {:?}", other),
    }
}
