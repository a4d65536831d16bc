//! Queue declaration over AMQP. The point of this module is what it does NOT
//! send: no `x-queue-type` argument, so the server injects the vhost's
//! default_queue_type. That injection path is where the bug lives.

use lapin::options::QueueDeclareOptions;
use lapin::types::FieldTable;
use lapin::{Connection, ConnectionProperties};

use crate::report;

#[derive(Debug)]
pub enum DeclareOutcome {
    Declared,
    /// The broker closed the channel with a precondition violation, meaning
    /// the redeclared arguments were inequivalent to the stored ones.
    Refused(String),
}

/// Declare a durable queue with an empty argument table.
///
/// A broker-side PRECONDITION_FAILED channel close is returned as
/// [`DeclareOutcome::Refused`]; any other failure (connection refused, bad
/// credentials, ...) propagates as an error.
pub async fn declare_without_type(url: &str, queue: &str) -> anyhow::Result<DeclareOutcome> {
    report::command(&format!("amqp queue_declare('{queue}', durable=true)"));
    tracing::debug!(url, queue, "connecting to broker");

    let connection = Connection::connect(url, ConnectionProperties::default()).await?;
    let channel = connection.create_channel().await?;

    let declared = channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await;

    match declared {
        Ok(_) => {
            // close errors after a successful declare are not interesting
            let _ = connection.close(200, "done").await;
            Ok(DeclareOutcome::Declared)
        }
        Err(err) => {
            let reply = err.to_string();
            if is_precondition_failed(&reply) {
                Ok(DeclareOutcome::Refused(reply))
            } else {
                Err(err.into())
            }
        }
    }
}

/// The broker's reply text for an inequivalent-argument refusal. We match on
/// the reason string rather than the reply code because the detail we care
/// about (which argument, which values) only exists in the text.
pub fn is_precondition_failed(reply: &str) -> bool {
    reply.contains("PRECONDITION_FAILED")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_precondition_refusal() {
        let reply = "PRECONDITION_FAILED - inequivalent arg 'x-queue-type' \
                     for queue 'test_queue' in vhost 'dqt_bug_repro': \
                     received 'undefined' but current is none";
        assert!(is_precondition_failed(reply));
        assert!(reply.contains("undefined"));
    }

    #[test]
    fn other_errors_are_not_refusals() {
        assert!(!is_precondition_failed("ACCESS_REFUSED - access denied"));
        assert!(!is_precondition_failed("connection refused"));
    }
}
