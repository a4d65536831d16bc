//! Operator-facing output. These tools narrate every external action they
//! take, so the formatting lives in one place.

pub const CYAN: &str = "\x1b[0;36m";
pub const YELLOW: &str = "\x1b[0;33m";
pub const GREEN: &str = "\x1b[0;32m";
pub const RED: &str = "\x1b[0;31m";
pub const NC: &str = "\x1b[0m";

const RULE: &str = "============================================================";

pub fn section(title: &str) {
    println!();
    println!("{CYAN}{RULE}{NC}");
    println!("{CYAN}  {title}{NC}");
    println!("{CYAN}{RULE}{NC}");
    println!();
}

/// Echo an external command before running it.
pub fn command(line: &str) {
    println!("  {YELLOW}$ {line}{NC}");
}

pub fn pass(msg: &str) {
    println!("  {GREEN}{msg}{NC}");
}

pub fn fail(msg: &str) {
    println!("  {RED}{msg}{NC}");
}
