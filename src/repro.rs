//! The reproduction flow. Walks the broker into the broken state step by
//! step, demonstrates the resulting PRECONDITION_FAILED on redeclaration,
//! then applies the documented workaround and shows it working.
//!
//! Outline:
//!   1. create a scratch vhost, grant permissions
//!   2. declare a queue over AMQP with no x-queue-type argument
//!   3. confirm via eval that no x-queue-type was stored on the queue
//!   4. confirm the vhost has no default_queue_type metadata
//!   5. merge_metadata the literal <<"undefined">> into the vhost
//!   7. redeclare -> broker refuses with inequivalent x-queue-type
//!   8. set default_queue_type to classic
//!  10. redeclare -> succeeds

use crate::config::ReproOpts;
use crate::ctl;
use crate::declare::{self, DeclareOutcome};
use crate::report::{self, NC, YELLOW};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Success,
    PreconditionFailed,
}

pub async fn run(opts: &ReproOpts) -> anyhow::Result<()> {
    let vhost = &opts.vhost;
    let queue = opts.queue.as_str();
    let url = opts.broker.amqp_url(vhost);

    report::section("CLEANUP");
    ctl::delete_vhost(vhost).await?;

    report::section("STEP 1: Create test virtual host");
    ctl::declare_vhost(vhost).await?;
    ctl::grant_full_permissions(vhost, &opts.broker.username).await?;

    report::section("STEP 2: Create queue without an x-queue-type argument");
    println!("The client sends an empty argument table for the declare,");
    println!("simulating legacy client behavior.");
    println!();
    if !check_declare(&url, queue, Expect::Success).await {
        anyhow::bail!("initial queue declaration failed");
    }

    report::section("STEP 3: Verify that the queue has no x-queue-type argument stored");
    ctl::eval(&stored_queue_type_snippet(vhost.as_str(), queue)).await?;

    report::section("STEP 4: Check current virtual host default_queue_type metadata");
    ctl::eval(&metadata_snippet(vhost.as_str(), "Current default_queue_type")).await?;

    report::section("STEP 5: Set virtual host default_queue_type to literal string 'undefined'");
    println!("This simulates metadata that contains the literal string <<\"undefined\">>.");
    println!("It can arrive via definition import/export or API calls.");
    println!();
    ctl::eval(&merge_undefined_snippet(vhost.as_str())).await?;

    report::section("STEP 6: Verify that default_queue_type is now the literal string");
    ctl::eval(&metadata_snippet(vhost.as_str(), "default_queue_type")).await?;

    report::section("STEP 7: Redeclare queue (should fail)");
    println!("The server injects x-queue-type from the virtual host's default_queue_type.");
    println!("Since it is set to 'undefined', the redeclaration will fail.");
    println!();
    check_declare(&url, queue, Expect::PreconditionFailed).await;

    report::section("STEP 8: Work around the problem by setting the virtual host's DQT to 'classic'");
    ctl::update_vhost_metadata(vhost.as_str(), "classic").await?;

    report::section("STEP 9: Verify that the metadata was changed as expected");
    ctl::eval(&metadata_snippet(vhost.as_str(), "Fixed default_queue_type")).await?;

    report::section("STEP 10: Redeclare queue (should succeed)");
    println!("With DQT set to 'classic', the redeclaration now succeeds.");
    println!();
    check_declare(&url, queue, Expect::Success).await;

    report::section("CLEANUP");
    println!("To clean up: {YELLOW}rabbitmqctl delete_vhost {vhost}{NC}");

    Ok(())
}

/// Declare the queue and report pass/fail against the expectation. An
/// unexpected connection-layer failure is reported, not raised; this is a
/// diagnostic flow and the remaining steps still have value.
async fn check_declare(url: &str, queue: &str, expect: Expect) -> bool {
    match declare::declare_without_type(url, queue).await {
        Ok(DeclareOutcome::Declared) => {
            if expect == Expect::Success {
                report::pass("Queue declared successfully.");
                true
            } else {
                report::fail("error: queue declaration succeeded (bug not reproduced)");
                false
            }
        }
        Ok(DeclareOutcome::Refused(reply)) => {
            if expect == Expect::PreconditionFailed {
                report::pass("Success: got expected precondition_failed:");
                println!("    {reply}");
                true
            } else {
                report::fail(&format!("error: {reply}"));
                false
            }
        }
        Err(err) => {
            report::fail(&format!("error: {err:#}"));
            false
        }
    }
}

fn stored_queue_type_snippet(vhost: &str, queue: &str) -> String {
    format!(
        r#"
        QName = rabbit_misc:r(<<"{vhost}">>, queue, <<"{queue}">>),
        {{ok, Q}} = rabbit_amqqueue:lookup(QName),
        Args = amqqueue:get_arguments(Q),
        XQT = rabbit_misc:table_lookup(Args, <<"x-queue-type">>),
        io:format("Stored x-queue-type: ~p~n", [XQT]).
    "#
    )
}

fn metadata_snippet(vhost: &str, label: &str) -> String {
    format!(
        r#"
        VHost = rabbit_vhost:lookup(<<"{vhost}">>),
        Meta = vhost:get_metadata(VHost),
        DQT = maps:get(default_queue_type, Meta, not_set),
        io:format("{label}: ~p~n", [DQT]).
    "#
    )
}

fn merge_undefined_snippet(vhost: &str) -> String {
    format!(r#"rabbit_db_vhost:merge_metadata(<<"{vhost}">>, #{{default_queue_type => <<"undefined">>}})."#)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_snippet_injects_the_literal() {
        assert_eq!(
            merge_undefined_snippet("dqt_bug_repro"),
            r#"rabbit_db_vhost:merge_metadata(<<"dqt_bug_repro">>, #{default_queue_type => <<"undefined">>})."#
        );
    }

    #[test]
    fn metadata_snippet_defaults_to_not_set() {
        let code = metadata_snippet("v1", "Current default_queue_type");
        assert!(code.contains(r#"rabbit_vhost:lookup(<<"v1">>)"#));
        assert!(code.contains("maps:get(default_queue_type, Meta, not_set)"));
    }

    #[test]
    fn queue_snippet_names_the_queue_resource() {
        let code = stored_queue_type_snippet("v1", "q1");
        assert!(code.contains(r#"rabbit_misc:r(<<"v1">>, queue, <<"q1">>)"#));
        assert!(code.contains(r#"table_lookup(Args, <<"x-queue-type">>)"#));
    }
}
