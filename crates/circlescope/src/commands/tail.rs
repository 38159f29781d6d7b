//! `tail` handler: print raw stream envelopes as they arrive.

use std::sync::Arc;
use std::time::Duration;

use circlescope_api::{Envelope, StreamClient, WsTransport, rest};
use circlescope_core::DashboardConfig;
use tokio::sync::broadcast::error::RecvError;

use crate::cli::{GlobalOpts, OutputFormat, TailArgs};
use crate::error::CliError;
use crate::output;

const LIVENESS_CHECK: Duration = Duration::from_millis(500);

pub async fn handle(
    config: &DashboardConfig,
    args: &TailArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let url = rest::stream_url(&config.origin)?;
    let transport = WsTransport::new(&config.transport())?;
    let client = StreamClient::with_transport(url, config.reconnect.clone(), Arc::new(transport));
    let mut envelopes = client.envelopes();
    client.connect();
    tracing::info!(url = %client.url(), "tailing stream");

    let mut liveness = tokio::time::interval(LIVENESS_CHECK);
    let mut printed = 0usize;
    let result = loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break Ok(()),
            _ = liveness.tick() => {
                // The run ends on its own only once the retry cap is hit.
                if !client.is_active() {
                    break Err(CliError::StreamUnavailable {
                        reason: format!(
                            "gave up after {} reconnection attempts",
                            client.reconnect_attempts()
                        ),
                    });
                }
            }
            received = envelopes.recv() => match received {
                Ok(envelope) => {
                    if !matches_filter(&envelope, &args.event) {
                        continue;
                    }
                    output::print_output(&format_envelope(&envelope, global.output)?, global.quiet);
                    printed += 1;
                    if args.count.is_some_and(|n| printed >= n) {
                        break Ok(());
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "output fell behind the stream");
                }
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    client.disconnect();
    result
}

fn matches_filter(envelope: &Envelope, events: &[String]) -> bool {
    events.is_empty() || events.iter().any(|e| e == &envelope.event)
}

/// Table output is `event data` on one line; structured formats print
/// the whole envelope.
fn format_envelope(envelope: &Arc<Envelope>, format: OutputFormat) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => Ok(format!(
            "{} {}",
            envelope.event,
            output::render_json(&envelope.data, true)?
        )),
        OutputFormat::Json | OutputFormat::JsonCompact => {
            output::render_json(envelope.as_ref(), true)
        }
        OutputFormat::Yaml => output::render_single(format, envelope.as_ref(), |_| String::new()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn envelope(event: &str) -> Arc<Envelope> {
        Arc::new(Envelope {
            event: event.into(),
            data: json!({"ok_count": 3}),
        })
    }

    #[test]
    fn empty_filter_passes_everything() {
        assert!(matches_filter(&envelope("custom_thing"), &[]));
        assert!(matches_filter(&envelope("io_status"), &["io_status".into()]));
        assert!(!matches_filter(&envelope("ping"), &["io_status".into()]));
    }

    #[test]
    fn table_line_is_event_then_compact_data() {
        let line = format_envelope(&envelope("statistics_update"), OutputFormat::Table).unwrap();
        assert_eq!(line, r#"statistics_update {"ok_count":3}"#);
    }

    #[test]
    fn json_is_one_envelope_per_line() {
        let line = format_envelope(&envelope("ping"), OutputFormat::Json).unwrap();
        assert_eq!(line, r#"{"event":"ping","data":{"ok_count":3}}"#);
    }
}
