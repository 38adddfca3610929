//! Storage pool selection for new workspaces

use nix::sys::statvfs::statvfs;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use tracing::debug;
use ws_config::{FilesystemPolicy, SpaceSelection};
use ws_util::WsError;

/// Pick the pool a new workspace of the owner `uid`/`gid` goes to
pub fn select_pool(fs: &FilesystemPolicy, uid: u32, gid: u32) -> Result<&Path, WsError> {
    if fs.spaces.is_empty() {
        return Err(WsError::config(format!("filesystem '{}' has no spaces", fs.name)));
    }
    let n = fs.spaces.len();

    let pool: &PathBuf = match fs.space_selection {
        SpaceSelection::Random => fs
            .spaces
            .choose(&mut rand::thread_rng())
            .unwrap_or(&fs.spaces[0]),
        SpaceSelection::Uid => &fs.spaces[uid as usize % n],
        SpaceSelection::Gid => &fs.spaces[gid as usize % n],
        SpaceSelection::MostSpace => most_space(&fs.spaces),
    };

    debug!(filesystem = %fs.name, strategy = ?fs.space_selection, pool = %pool.display(), "Selected pool");
    Ok(pool.as_path())
}

/// First pool with the most free bytes; unreadable pools count as empty
fn most_space(spaces: &[PathBuf]) -> &PathBuf {
    let mut best = &spaces[0];
    let mut best_free = 0u64;
    for space in spaces {
        let free = free_bytes(space);
        if free > best_free {
            best = space;
            best_free = free;
        }
    }
    best
}

fn free_bytes(path: &Path) -> u64 {
    statvfs(path)
        .map(|st| (st.blocks_free() as u64).saturating_mul(st.fragment_size() as u64))
        .unwrap_or(0)
}
