//! Rounded-corner preview helper

use anyhow::{Context, Result};
use glyphsmith_gen::raster::round_corners;

pub fn run(input: &str, size: u32, output: &str) -> Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("Failed to read {}", input))?;
    let rounded = round_corners(&bytes, size)?;
    std::fs::write(output, &rounded).with_context(|| format!("Failed to write {}", output))?;
    println!("Wrote {} ({}x{})", output, size, size);
    Ok(())
}
