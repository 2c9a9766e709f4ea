use std::time::Duration;

use wreq::Client;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(86400);
const STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared outbound client. The overall timeout is effectively unbounded so
/// long streaming completions survive; the read timeout bounds how long an
/// idle stream may sit without producing bytes.
pub fn build_client() -> Result<Client, wreq::Error> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .read_timeout(STREAM_IDLE_TIMEOUT)
        .build()
}
