use crate::config::LedgerConfig;
use crate::error::Result;
use crate::types::AppId;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Which flat file an id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerKind {
    Games,
    NonGames,
    Unclassified,
}

impl LedgerKind {
    pub const ALL: [LedgerKind; 3] = [
        LedgerKind::Games,
        LedgerKind::NonGames,
        LedgerKind::Unclassified,
    ];
}

#[derive(Debug, Clone)]
pub struct LedgerPaths {
    pub games: PathBuf,
    pub non_games: PathBuf,
    pub unclassified: PathBuf,
}

impl LedgerPaths {
    /// Standard file names inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::from_config(&LedgerConfig {
            data_dir: dir.to_path_buf(),
            ..LedgerConfig::default()
        })
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self {
            games: config.data_dir.join(&config.games_file),
            non_games: config.data_dir.join(&config.non_games_file),
            unclassified: config.data_dir.join(&config.unclassified_file),
        }
    }

    pub fn path(&self, kind: LedgerKind) -> &Path {
        match kind {
            LedgerKind::Games => &self.games,
            LedgerKind::NonGames => &self.non_games,
            LedgerKind::Unclassified => &self.unclassified,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerCounts {
    pub games: usize,
    pub non_games: usize,
    pub unclassified: usize,
}

/// Append-only record of classification outcomes.
///
/// Every file is read once on open; afterwards membership is answered from
/// memory and new ids are appended and synced one line at a time, so a crash
/// never loses an answer the classifier already acted on.
#[derive(Debug)]
pub struct Ledger {
    paths: LedgerPaths,
    games: HashSet<AppId>,
    non_games: HashSet<AppId>,
    unclassified: HashSet<AppId>,
}

impl Ledger {
    pub fn open(paths: LedgerPaths) -> Result<Self> {
        let games = read_ids(&paths.games)?;
        let mut non_games = read_ids(&paths.non_games)?;
        let mut unclassified = read_ids(&paths.unclassified)?;

        // Files edited by hand could overlap; games win, then non-games.
        non_games.retain(|id| !games.contains(id));
        unclassified.retain(|id| !games.contains(id) && !non_games.contains(id));

        debug!(
            "Ledger loaded: {} games, {} non-games, {} unclassified",
            games.len(),
            non_games.len(),
            unclassified.len()
        );
        Ok(Self {
            paths,
            games,
            non_games,
            unclassified,
        })
    }

    pub fn contains(&self, id: AppId, kind: LedgerKind) -> bool {
        self.set(kind).contains(&id)
    }

    /// The set `id` is recorded in, if any.
    pub fn lookup(&self, id: AppId) -> Option<LedgerKind> {
        LedgerKind::ALL
            .into_iter()
            .find(|kind| self.contains(id, *kind))
    }

    /// Records `id` under `kind`. Returns `false` without writing if the id
    /// already has a confirmed verdict, or is unclassified and `kind` is too.
    /// An unclassified id moves to the confirmed set it now belongs to.
    pub fn append(&mut self, id: AppId, kind: LedgerKind) -> Result<bool> {
        match self.lookup(id) {
            Some(LedgerKind::Unclassified) if kind != LedgerKind::Unclassified => {
                debug!("App {} was unclassified, now {:?}", id, kind);
            }
            Some(existing) => {
                if existing != kind {
                    warn!(
                        "App {} already recorded as {:?}, not adding to {:?}",
                        id, existing, kind
                    );
                }
                return Ok(false);
            }
            None => {}
        }
        append_line(self.paths.path(kind), id)?;
        // the stale line in the unclassified file is dropped on the next open
        self.unclassified.remove(&id);
        self.set_mut(kind).insert(id);
        Ok(true)
    }

    pub fn games(&self) -> impl Iterator<Item = AppId> + '_ {
        self.games.iter().copied()
    }

    pub fn counts(&self) -> LedgerCounts {
        LedgerCounts {
            games: self.games.len(),
            non_games: self.non_games.len(),
            unclassified: self.unclassified.len(),
        }
    }

    fn set(&self, kind: LedgerKind) -> &HashSet<AppId> {
        match kind {
            LedgerKind::Games => &self.games,
            LedgerKind::NonGames => &self.non_games,
            LedgerKind::Unclassified => &self.unclassified,
        }
    }

    fn set_mut(&mut self, kind: LedgerKind) -> &mut HashSet<AppId> {
        match kind {
            LedgerKind::Games => &mut self.games,
            LedgerKind::NonGames => &mut self.non_games,
            LedgerKind::Unclassified => &mut self.unclassified,
        }
    }
}

fn read_ids(path: &Path) -> Result<HashSet<AppId>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(e.into()),
    };
    let mut ids = HashSet::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.parse::<AppId>() {
            Ok(id) => {
                ids.insert(id);
            }
            Err(_) => warn!(
                "Skipping malformed line {} in {}: {:?}",
                line_no + 1,
                path.display(),
                line
            ),
        }
    }
    Ok(ids)
}

fn append_line(path: &Path, id: AppId) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", id)?;
    file.flush()?;
    file.sync_data()?;
    Ok(())
}
