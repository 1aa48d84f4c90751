use std::env;
use std::process::Command;

/// Stdout of `program args`, trimmed, when it ran successfully.
fn probe(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    Some(text.trim().to_string())
}

fn emit(key: &str, value: impl AsRef<str>) {
    println!("cargo:rustc-env=WIZARD_CORE_BUILD_{key}={}", value.as_ref());
}

fn main() {
    for watched in ["build.rs", ".git/HEAD", ".git/refs"] {
        println!("cargo:rerun-if-changed={watched}");
    }

    let hash = probe("git", &["rev-parse", "--short", "HEAD"]).filter(|hash| !hash.is_empty());
    emit("HASH", hash.as_deref().unwrap_or("unknown"));

    let status = match probe("git", &["status", "--porcelain"]) {
        Some(changes) if changes.is_empty() => "clean",
        Some(_) => "dirty",
        None => "unknown",
    };
    emit("STATUS", status);

    emit(
        "TIMESTAMP",
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    );
    emit("TARGET", env::var("TARGET").unwrap_or_else(|_| "unknown".into()));
    emit("PROFILE", env::var("PROFILE").unwrap_or_else(|_| "unknown".into()));
    emit(
        "RUSTC",
        probe("rustc", &["--version"]).unwrap_or_else(|| "unknown".into()),
    );
}
