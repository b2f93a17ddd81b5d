//! Templated icon output

use anyhow::{Context, Result};
use glyphsmith_gen::vector::{templated, IconRole};

pub fn run(prompt: &str, role: &str) -> Result<()> {
    let role: IconRole = role.parse()?;
    let asset = templated(prompt, role)?;
    let vector = asset
        .as_vector()
        .context("Template did not produce a vector icon")?;
    println!("{}", vector.markup);
    Ok(())
}
