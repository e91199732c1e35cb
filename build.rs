use vergen_gitcl::{Emitter, GitclBuilder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Outside a git checkout vergen emits an idempotent placeholder, which
    // `version_str()` in cli.rs detects and replaces with the Cargo version.
    let gitcl = GitclBuilder::default().describe(true, true, None).build()?;
    Emitter::default().add_instructions(&gitcl)?.emit()?;
    Ok(())
}
