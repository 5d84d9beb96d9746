//! Noise filter for watcher events
//!
//! Editors drop swap and backup files next to the file being edited. Those
//! are dot-prefixed, so a dot-prefixed name is treated as noise unless its
//! extension is `.cfg`.

use std::path::Path;

pub const CONFIG_EXTENSION: &str = ".cfg";

/// Extension of a file name including the leading dot, taken from the last dot.
///
/// Unlike [`Path::extension`], a bare dotfile such as `.cfg` has the extension
/// `.cfg`.
pub fn file_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) => &file_name[idx..],
        None => "",
    }
}

/// True for dot-prefixed files whose extension is not `.cfg`.
///
/// `.site.cfg` is therefore relevant while `.site.cfg.swp` is not.
pub fn is_temporary_file(path: &Path) -> bool {
    let Some(file_name) = path.file_name().map(|n| n.to_string_lossy()) else {
        return false;
    };

    file_name.starts_with('.') && file_extension(&file_name) != CONFIG_EXTENSION
}
