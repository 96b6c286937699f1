use std::process::Command;

/// Runs `program` and returns its trimmed stdout, or `None` if it could not be run.
fn output_of(program: &str, args: &[&str]) -> Option<String> {
    let out = Command::new(program).args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    String::from_utf8(out.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn main() {
    println!(">>> Building version number...");

    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let rustc_version = output_of(&rustc, &["--version"]).unwrap_or_else(|| "rustc".to_string());
    println!("cargo:rustc-env=CARGO_RUSTC_VERSION={}", rustc_version);

    println!("cargo:rerun-if-env-changed=PINWARD_BUILD_TAGGED_RELEASE");
    let tagged_release = option_env!("PINWARD_BUILD_TAGGED_RELEASE") == Some("1");
    let version_string = if tagged_release {
        format!(
            "{version} [{rustc}]",
            version = env!("CARGO_PKG_VERSION"),
            rustc = rustc_version
        )
    } else {
        // Tarball builds have no git history to stamp in
        let gitrev = output_of("git", &["rev-list", "HEAD", "-1"]).unwrap_or_default();
        let abbrev = match gitrev.len() {
            0..=8 => "unknown",
            _ => &gitrev[0..9],
        };
        let commit_date = output_of("git", &["log", "-1", "--format=%as"])
            .filter(|date| !date.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        format!(
            "{version} ({gitrev} {date}) [{rustc}]",
            version = env!("CARGO_PKG_VERSION"),
            gitrev = abbrev,
            date = commit_date,
            rustc = rustc_version
        )
    };
    println!("cargo:rustc-env=PINWARD_VERSION_STRING={}", version_string);
    println!(
        "cargo:rustc-env=PINWARD_RELEASE_STRING=pinward {}",
        version_string
    );
}
