use vergen_gitcl::{BuildBuilder, CargoBuilder, Emitter, GitclBuilder, RustcBuilder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut emitter = Emitter::default();
    emitter
        .add_instructions(&BuildBuilder::all_build()?)?
        .add_instructions(&CargoBuilder::all_cargo()?)?
        .add_instructions(&RustcBuilder::all_rustc()?)?;

    // Source tarballs have no .git; fall back to whatever the packager exported
    match GitclBuilder::all_git() {
        Ok(git) => {
            emitter.add_instructions(&git)?;
        }
        Err(_) => {
            for (key, fallback) in [("VERGEN_GIT_SHA", "unknown"), ("VERGEN_GIT_DIRTY", "false")] {
                println!(
                    "cargo::rustc-env={key}={}",
                    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
                );
            }
        }
    }

    emitter.emit()?;

    Ok(())
}
