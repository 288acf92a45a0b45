use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-user preference document: the categories a user searches with, plus the
/// activity timestamp the retention sweep keys on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub user_id: String,
    #[serde(default)]
    pub engine: Vec<Category>,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_first_time_user: bool,
}

impl UserPreferences {
    /// Minimal document created as a side effect of first contact.
    pub fn blank(user_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            engine: Vec::new(),
            last_activity: at,
            created_at: at,
            updated_at: at,
            is_first_time_user: false,
        }
    }

    pub fn with_engine(user_id: impl Into<String>, engine: Vec<Category>, at: DateTime<Utc>) -> Self {
        Self {
            engine,
            is_first_time_user: true,
            ..Self::blank(user_id, at)
        }
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.engine.iter().find(|category| category.category_name == name)
    }

    pub fn category_mut(&mut self, name: &str) -> Option<&mut Category> {
        self.engine
            .iter_mut()
            .find(|category| category.category_name == name)
    }

    pub fn category_names(&self) -> Vec<String> {
        self.engine
            .iter()
            .map(|category| category.category_name.clone())
            .collect()
    }

    pub fn total_sites(&self) -> usize {
        self.engine.iter().map(|category| category.url.len()).sum()
    }

    pub fn enabled_sites(&self) -> usize {
        self.engine
            .iter()
            .map(|category| category.enabled_sites().count())
            .sum()
    }

    /// Every checked site, paired with the name of the category holding it.
    pub fn checked_sites(&self) -> Vec<(&str, &SiteEntry)> {
        self.engine
            .iter()
            .flat_map(|category| {
                category
                    .enabled_sites()
                    .map(move |site| (category.category_name.as_str(), site))
            })
            .collect()
    }

    pub fn sites_in(&self, category_name: &str) -> &[SiteEntry] {
        self.category(category_name)
            .map(|category| category.url.as_slice())
            .unwrap_or(&[])
    }

    /// Created by activity tracking alone and never given a catalogue.
    pub fn is_unseeded(&self) -> bool {
        self.engine.is_empty() && !self.is_first_time_user
    }

    /// Documents created within this window are still reported as new users.
    pub fn is_recently_created(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.created_at) < chrono::Duration::seconds(5)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub category_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: Vec<SiteEntry>,
}

impl Category {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            category_name: name.into(),
            description: description.into(),
            url: Vec::new(),
        }
    }

    pub fn site(&self, site_name: &str) -> Option<&SiteEntry> {
        self.url.iter().find(|site| site.site_name == site_name)
    }

    pub fn site_mut(&mut self, site_name: &str) -> Option<&mut SiteEntry> {
        self.url.iter_mut().find(|site| site.site_name == site_name)
    }

    pub fn enabled_sites(&self) -> impl Iterator<Item = &SiteEntry> {
        self.url.iter().filter(|site| site.is_checked)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteEntry {
    pub site_name: String,
    pub site_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Icon>,
    #[serde(default = "default_checked")]
    pub is_checked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Icon {
    pub public_id: String,
    pub url: String,
}

impl Icon {
    pub fn new(public_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            public_id: public_id.into(),
            url: url.into(),
        }
    }

    pub fn fallback() -> Self {
        Self::new("default-icon", "/temp/search.png")
    }
}

fn default_checked() -> bool {
    true
}
