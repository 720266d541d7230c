use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Identifier of a Steam application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AppId(pub u32);

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AppId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(AppId)
    }
}

impl From<u32> for AppId {
    fn from(id: u32) -> Self {
        AppId(id)
    }
}

// The catalog sends integers, but ids also show up as strings in map keys.
impl<'de> Deserialize<'de> for AppId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(u32),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Num(n) => Ok(AppId(n)),
            Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Outcome of classifying a single app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Game,
    NotGame,
    /// The store answered but carried no detail data for the app.
    Unclassified,
}

impl Verdict {
    pub fn is_game(self) -> bool {
        matches!(self, Verdict::Game)
    }
}

/// Body of `ISteamApps/GetAppList/v2`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppListResponse {
    pub applist: AppList,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppList {
    pub apps: Vec<AppListEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppListEntry {
    pub appid: AppId,
    #[serde(default)]
    pub name: String,
}

/// Body of `api/appdetails`, keyed by the requested id as a string.
pub type AppDetailsResponse = HashMap<String, AppDetailsEntry>;

#[derive(Debug, Clone, Deserialize)]
pub struct AppDetailsEntry {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<AppDetailsData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppDetailsData {
    #[serde(rename = "type", default)]
    pub app_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// What the details service said about one app, before the classifier
/// turns it into a verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailsOutcome {
    /// 2xx with a `data` object; carries the declared `type`.
    Classified { app_type: String },
    /// 2xx but no detail data for the app.
    NoData,
    /// Non-success status, the caller decides whether to retry.
    Failed { status: u16 },
}

/// One page of `appreviews/<id>`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewPage {
    #[serde(default)]
    pub success: i64,
    #[serde(default)]
    pub query_summary: Option<serde_json::Value>,
    #[serde(default)]
    pub reviews: Vec<serde_json::Value>,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// Outcome of dispatching the confirmed games to the review downloader.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub apps_downloaded: usize,
    pub reviews_stored: usize,
    pub failures: Vec<(AppId, String)>,
}
