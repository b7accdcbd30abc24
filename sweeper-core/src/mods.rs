use std::fs;
use std::io;
use std::path::Path;

pub const MODS_DIR: &str = "Mods";

/// List the mod sandbox paths of a project: `/<name>` for every directory
/// directly under `<project_root>/Mods`, sorted.
pub fn discover_mods(project_root: &Path) -> io::Result<Vec<String>> {
    let mods_dir = project_root.join(MODS_DIR);
    let mut mods = Vec::new();

    for entry in fs::read_dir(&mods_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            mods.push(format!("/{}", name));
        }
    }

    mods.sort();
    mods.dedup();
    Ok(mods)
}
