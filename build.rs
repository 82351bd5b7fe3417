use std::process::Command;

fn main() {
    // embed `git describe --always --dirty` so startup logs identify the build
    let git_hash = Command::new("git")
        .args(["describe", "--always", "--dirty"])
        .output()
        .ok()
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .unwrap_or_default();
    if git_hash.is_empty() {
        println!("cargo:rustc-env=GIT_HASH=UNKNOWN");
    } else {
        println!("cargo:rustc-env=GIT_HASH={git_hash}");
    }
}
