//! Skip wiremock-backed tests on hosts that forbid binding localhost.

use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

const REQUIRE_ENV: &str = "DATEFETCH_REQUIRE_SOCKET_TESTS";

/// True when `DATEFETCH_REQUIRE_SOCKET_TESTS` turns skips into failures.
#[must_use]
pub fn socket_tests_required() -> bool {
    std::env::var(REQUIRE_ENV).is_ok_and(|value| {
        ["1", "true", "yes"]
            .iter()
            .any(|accepted| value.eq_ignore_ascii_case(accepted))
    })
}

#[track_caller]
#[must_use]
pub fn should_skip_socket_bound_test() -> bool {
    let Err(bind_error) = TcpListener::bind("127.0.0.1:0") else {
        return false;
    };

    let caller = Location::caller();
    let reason = format!(
        "[socket-bound-test] {}:{} needs a localhost listener but bind failed ({bind_error})",
        caller.file(),
        caller.line()
    );
    assert!(!socket_tests_required(), "{reason}; unset {REQUIRE_ENV} to skip instead");

    eprintln!("{reason}; skipping. Set {REQUIRE_ENV}=1 to fail instead.");
    true
}

/// Starts a mock server, or returns `None` when the host cannot bind one.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if should_skip_socket_bound_test() {
        return None;
    }
    Some(MockServer::start().await)
}
