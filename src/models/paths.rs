use camino::{Utf8Path, Utf8PathBuf};

macro_rules! define_paths {
    ($name:ident { $($field:ident : $default:expr),* $(,)? }) => {
        #[derive(Clone, Debug)]
        pub struct $name {
            $(pub $field: Utf8PathBuf,)*
        }

        impl $name {
            pub fn to_absolute(mut self, base: &Utf8Path) -> Self {
                $(self.$field = base.join(self.$field);)*
                self
            }

            pub fn new(base: &Utf8Path) -> Self {
                Self::default().to_absolute(base)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $($field: $default.into(),)*
                }
            }
        }
    };
}

define_paths!(GamePathRules {
    game_dir: "left4dead2",
    gameinfo: "left4dead2/gameinfo.txt",
    addons: "left4dead2/addons",
    workshop: "left4dead2/addons/workshop",
    game_exe: "left4dead2.exe",
});

define_paths!(DownloaderPathRules {
    workshop_content: "steamapps/workshop/content",
    workshop_downloads: "steamapps/workshop/downloads",
});

/// Archive extension for addon content.
pub const ARCHIVE_EXT: &str = "vpk";
/// Name every enabled workshop archive takes inside its content directory.
pub const CANONICAL_ARCHIVE_NAME: &str = "pak01_dir.vpk";
/// Suffix appended to a pirate-mode archive to disable it.
pub const DISABLED_SUFFIX: &str = ".disabled";
/// Prefix written in front of the id in `Game` search-path lines.
pub const DEFAULT_SEARCH_PATH_PREFIX: &str = r"left4dead2\addons\workshop";
pub const SEARCH_PATHS_ANCHOR: &str = "SearchPaths";

/// Sibling of the game config holding its pristine contents.
pub fn backup_path(config: &Utf8Path) -> Utf8PathBuf {
    config.with_extension("backup")
}

/// Resolved locations the reconciler works against.
#[derive(Clone, Debug)]
pub struct GameLayout {
    pub source_dir: Utf8PathBuf,
    pub content_dir: Utf8PathBuf,
    pub addons_dir: Utf8PathBuf,
    pub config_path: Utf8PathBuf,
    pub game_exe: Utf8PathBuf,
    pub search_path_prefix: String,
}

impl GameLayout {
    pub fn from_game_root(game_root: &Utf8Path) -> Self {
        let rules = GamePathRules::new(game_root);
        Self {
            content_dir: rules.workshop.clone(),
            source_dir: rules.workshop,
            addons_dir: rules.addons,
            config_path: rules.gameinfo,
            game_exe: rules.game_exe,
            search_path_prefix: DEFAULT_SEARCH_PATH_PREFIX.to_string(),
        }
    }

    pub fn with_content_dir(mut self, content_dir: Utf8PathBuf) -> Self {
        self.content_dir = content_dir;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.search_path_prefix = prefix.into();
        self
    }

    pub fn archive_path(&self, id: &str) -> Utf8PathBuf {
        self.source_dir.join(format!("{id}.{ARCHIVE_EXT}"))
    }

    pub fn content_path(&self, id: &str) -> Utf8PathBuf {
        self.content_dir.join(id)
    }
}
