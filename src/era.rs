use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Era {
    Pre,
    Post,
}

impl Era {
    pub const ALL: [Era; 2] = [Era::Pre, Era::Post];

    pub fn as_str(&self) -> &'static str {
        match self {
            Era::Pre => "pre",
            Era::Post => "post",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Era::Pre => 0,
            Era::Post => 1,
        }
    }
}

impl fmt::Display for Era {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn default_cutoff() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// The cutoff instant itself belongs to `Post`.
pub fn classify_era(created_at: &DateTime<Utc>, cutoff: &DateTime<Utc>) -> Era {
    if created_at < cutoff {
        Era::Pre
    } else {
        Era::Post
    }
}
