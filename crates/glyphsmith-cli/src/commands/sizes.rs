//! Size table listing

use anyhow::Result;
use glyphsmith_gen::raster::{matrix_filename, RasterRole};
use glyphsmith_gen::{Mode, SizeTable};

pub fn run(format: &str) -> Result<()> {
    let table = SizeTable::default();
    let roles = [RasterRole::AppIcon, RasterRole::TabBar];

    match format {
        "json" => {
            let doc: Vec<serde_json::Value> = roles
                .iter()
                .map(|&role| {
                    let files: Vec<serde_json::Value> = table
                        .plan(role)
                        .into_iter()
                        .map(|(size, density)| {
                            serde_json::json!({
                                "filename": matrix_filename(role, Some(Mode::Light), size, density),
                                "size": size,
                                "scale": density.factor(),
                                "pixels": size * density.factor(),
                            })
                        })
                        .collect();
                    serde_json::json!({ "role": role.prefix(), "files": files })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        "text" => {
            for role in roles {
                let plan = table.plan(role);
                println!("{} ({} files per appearance)", role.prefix(), plan.len());
                for (size, density) in plan {
                    println!(
                        "  {:<28} {:>5}px",
                        matrix_filename(role, Some(Mode::Light), size, density),
                        size * density.factor()
                    );
                }
            }
        }
        other => anyhow::bail!("Unknown format '{}'. Use: text, json", other),
    }
    Ok(())
}
