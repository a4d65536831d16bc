//! Wrappers over the broker's administrative CLIs, `rabbitmqctl` and
//! `rabbitmqadmin`, run as subprocesses. Every invocation is echoed to the
//! operator and its output printed verbatim; nothing here interprets output
//! beyond exit status, except [`list_vhosts`] which parses JSON.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::config::VhostName;
use crate::report;

/// One row of `rabbitmqctl list_vhosts name default_queue_type`.
///
/// An absent `default_queue_type` means the vhost has no default, which is
/// valid. The literal string "undefined" is a concrete (corrupted) value, a
/// different thing entirely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VhostRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_queue_type: Option<String>,
}

/// Run a command, echoing it and its output. Non-zero exit is an error.
pub async fn run_checked(program: &str, args: &[&str]) -> anyhow::Result<String> {
    let out = run(program, args).await?;
    anyhow::ensure!(
        out.ok,
        "{} {} exited with failure",
        program,
        args.join(" ")
    );
    Ok(out.stdout)
}

/// Like [`run_checked`] but a non-zero exit is tolerated, for cleanup calls
/// that fail when there is nothing to clean up.
pub async fn run_unchecked(program: &str, args: &[&str]) -> anyhow::Result<()> {
    run(program, args).await?;
    Ok(())
}

struct CmdOutput {
    ok: bool,
    stdout: String,
}

async fn run(program: &str, args: &[&str]) -> anyhow::Result<CmdOutput> {
    report::command(&format!("{} {}", program, args.join(" ")));
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .with_context(|| format!("failed to spawn {program}, is it in PATH?"))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stdout.trim().is_empty() {
        println!("{}", stdout.trim_end());
    }
    if !stderr.trim().is_empty() {
        println!("{}", stderr.trim_end());
    }
    tracing::debug!(program, status = ?output.status, "subprocess finished");

    Ok(CmdOutput {
        ok: output.status.success(),
        stdout,
    })
}

pub async fn delete_vhost(vhost: &VhostName) -> anyhow::Result<()> {
    run_unchecked("rabbitmqctl", &["delete_vhost", vhost.as_str()]).await
}

pub async fn declare_vhost(vhost: &VhostName) -> anyhow::Result<()> {
    run_checked("rabbitmqadmin", &["vhosts", "declare", "--name", vhost.as_str()]).await?;
    Ok(())
}

pub async fn grant_full_permissions(vhost: &VhostName, user: &str) -> anyhow::Result<()> {
    run_checked(
        "rabbitmqadmin",
        &[
            "permissions",
            "declare",
            "--vhost",
            vhost.as_str(),
            "--user",
            user,
            "--configure",
            ".*",
            "--write",
            ".*",
            "--read",
            ".*",
        ],
    )
    .await?;
    Ok(())
}

pub async fn update_vhost_metadata(vhost: &str, queue_type: &str) -> anyhow::Result<()> {
    run_checked(
        "rabbitmqctl",
        &[
            "update_vhost_metadata",
            vhost,
            "--default-queue-type",
            queue_type,
        ],
    )
    .await?;
    Ok(())
}

/// Run `rabbitmqctl eval` with a chunk of Erlang. Used to inspect (and once,
/// to corrupt) broker-internal state the regular CLI commands do not expose.
/// The exit status is not treated as fatal; the output is what matters.
pub async fn eval(code: &str) -> anyhow::Result<()> {
    // collapse whitespace so the echoed command fits on one line
    let display: String = code.split_whitespace().collect::<Vec<_>>().join(" ");
    report::command(&format!("rabbitmqctl eval '{display}'"));
    let output = Command::new("rabbitmqctl")
        .args(["eval", code])
        .output()
        .await
        .context("failed to spawn rabbitmqctl, is it in PATH?")?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stdout.trim().is_empty() {
        println!("{}", stdout.trim_end());
    }
    if !stderr.trim().is_empty() {
        println!("{}", stderr.trim_end());
    }
    Ok(())
}

/// List every vhost with its default_queue_type metadata, as structured output.
pub async fn list_vhosts() -> anyhow::Result<Vec<VhostRecord>> {
    let stdout = run_checked(
        "rabbitmqctl",
        &["list_vhosts", "name", "default_queue_type", "--formatter", "json"],
    )
    .await?;
    parse_vhost_listing(&stdout)
}

pub fn parse_vhost_listing(json: &str) -> anyhow::Result<Vec<VhostRecord>> {
    serde_json::from_str(json).context("unexpected list_vhosts output")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_listing_distinguishes_absent_from_literal() {
        let json = r#"[
            {"name":"v1","default_queue_type":"undefined"},
            {"name":"v2","default_queue_type":"classic"},
            {"name":"v3"}
        ]"#;
        let records = parse_vhost_listing(json).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].default_queue_type.as_deref(), Some("undefined"));
        assert_eq!(records[1].default_queue_type.as_deref(), Some("classic"));
        assert_eq!(records[2].default_queue_type, None);
    }

    #[test]
    fn parse_listing_rejects_garbage() {
        assert!(parse_vhost_listing("Listing vhosts ...").is_err());
    }
}
