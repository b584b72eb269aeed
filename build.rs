
use std::error::Error;
use vergen_gitcl::{Emitter, GitclBuilder};

/// Emits VERGEN_GIT_DESCRIBE, which feeds the full version string of the CLI.
/// # Errors
/// * if `git` is not installed
/// * if there is no .git folder, e.g. when building from a source tarball
fn emit_git_describe() -> Result<(), Box<dyn Error>> {
    let gitcl = GitclBuilder::default()
        .describe(false, true, Some("ThisPatternShouldNotMatchAnythingEver"))
        .build()?;

    Emitter::default()
        .fail_on_error()
        .add_instructions(&gitcl)?
        .emit()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    if emit_git_describe().is_err() {
        // allow for user override if the data is missing, otherwise use "unknown"
        let git_desc = option_env!("KBREVIEW_GIT_DESCRIBE")
            .unwrap_or("unknown");
        println!("cargo:rustc-env=VERGEN_GIT_DESCRIBE={git_desc}");
    }

    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-changed=src");
    Ok(())
}
