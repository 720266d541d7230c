/// Endpoint and file-name constants shared across the crate.
/// Endpoints can be overridden through `config.toml`.

// Steam endpoints
pub const APP_LIST_URL: &str = "https://api.steampowered.com/ISteamApps/GetAppList/v2/";
pub const APP_DETAILS_URL: &str = "https://store.steampowered.com/api/appdetails";
pub const APP_REVIEWS_URL: &str = "https://store.steampowered.com/appreviews";

// The value of `data.type` that marks an app as a game
pub const GAME_APP_TYPE: &str = "game";

// Ledger file names, one id per line
pub const GAMES_FILE: &str = "processed_game_ids";
pub const NON_GAMES_FILE: &str = "processed_app_ids";
pub const UNCLASSIFIED_FILE: &str = "unclassified_app_ids";

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 300;

// First cursor of the review endpoint
pub const INITIAL_REVIEW_CURSOR: &str = "*";

/// Review file name for an app, e.g. `review_10.json`.
pub fn review_file_name(app_id: crate::types::AppId) -> String {
    format!("review_{}.json", app_id)
}
