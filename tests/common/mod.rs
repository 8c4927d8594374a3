#![allow(dead_code)]

use addon_keeper_lib::models::paths::{GameLayout, GamePathRules};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

pub const GAMEINFO: &str = r#""GameInfo"
{
	game	"Left 4 Dead 2"
	type	multiplayer_only
	nomodels 1

	FileSystem
	{
		SteamAppId	550
		ToolsAppId	211

		SearchPaths
		{
			Game	update
			Game	left4dead2_dlc3
			Game	left4dead2_dlc2
			Game	left4dead2_dlc1
			Game	|gameinfo_path|.
			Game	hl2
		}
	}
}
"#;

/// Helper to set up a fake game install with a stock gameinfo.txt and empty addon dirs.
pub fn setup_game_root() -> (TempDir, Utf8PathBuf) {
    let tmp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
    let game_root = root.join("Left 4 Dead 2");

    let rules = GamePathRules::new(&game_root);
    fs::create_dir_all(&rules.workshop).unwrap();
    fs::write(&rules.gameinfo, GAMEINFO).unwrap();
    fs::write(&rules.game_exe, "dummy").unwrap();

    (tmp, game_root)
}

pub fn layout(game_root: &Utf8Path) -> GameLayout {
    GameLayout::from_game_root(game_root)
}

/// Mock a workshop archive `<id>.vpk` in the source dir.
pub fn create_archive(layout: &GameLayout, id: &str) -> Utf8PathBuf {
    let path = layout.archive_path(id);
    fs::write(&path, format!("VPK {id}")).unwrap();
    path
}

pub fn create_content_dir(layout: &GameLayout, id: &str) -> Utf8PathBuf {
    let dir = layout.content_path(id);
    fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn config_text(layout: &GameLayout) -> String {
    fs::read_to_string(&layout.config_path).unwrap()
}

/// Mock a flat pirate-mode archive, optionally disabled.
pub fn create_loose_archive(layout: &GameLayout, stem: &str, disabled: bool) -> Utf8PathBuf {
    let name = if disabled {
        format!("{stem}.vpk.disabled")
    } else {
        format!("{stem}.vpk")
    };
    let path = layout.addons_dir.join(name);
    fs::write(&path, stem).unwrap();
    path
}
