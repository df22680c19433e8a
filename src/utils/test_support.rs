/// Mock-server tests bind a localhost port; some sandboxes forbid that.
pub fn should_skip_httpmock() -> bool {
    match std::net::TcpListener::bind(("127.0.0.1", 0)) {
        Ok(_) => false,
        Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
            eprintln!("skipping mock server test: binding localhost is not permitted");
            true
        }
        Err(err) => panic!("failed to probe localhost for mock server tests: {err}"),
    }
}
