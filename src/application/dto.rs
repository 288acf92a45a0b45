use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    activity::{ActivityStats, SweepReport},
    errors::DomainError,
    preferences::{Category, Icon, SiteEntry, UserPreferences},
    search::SearchLink,
};

const USER_ID_MIN: usize = 10;
const USER_ID_MAX: usize = 50;
const CATEGORY_NAME_MAX: usize = 15;
const DESCRIPTION_MAX: usize = 200;
const SITE_NAME_MAX: usize = 20;
const ICON_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "svg", "webp"];

pub fn validate_user_id(raw: &str) -> Result<String, DomainError> {
    let user_id = raw.trim();
    if user_id.is_empty() {
        return Err(DomainError::validation("userId is required"));
    }
    let length = user_id.chars().count();
    if !(USER_ID_MIN..=USER_ID_MAX).contains(&length) {
        return Err(DomainError::validation(format!(
            "userId must be between {USER_ID_MIN} and {USER_ID_MAX} characters"
        )));
    }
    Ok(user_id.to_string())
}

fn validate_category_name(raw: &str) -> Result<String, DomainError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(DomainError::validation("categoryName must not be blank"));
    }
    if name.chars().count() > CATEGORY_NAME_MAX {
        return Err(DomainError::validation(format!(
            "categoryName must be at most {CATEGORY_NAME_MAX} characters"
        )));
    }
    Ok(name.to_string())
}

fn validate_description(raw: &str) -> Result<String, DomainError> {
    let description = raw.trim();
    if description.chars().count() > DESCRIPTION_MAX {
        return Err(DomainError::validation(format!(
            "description must be at most {DESCRIPTION_MAX} characters"
        )));
    }
    Ok(description.to_string())
}

fn validate_site_name(raw: &str) -> Result<String, DomainError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(DomainError::validation("siteName must not be blank"));
    }
    if name.chars().count() > SITE_NAME_MAX {
        return Err(DomainError::validation(format!(
            "siteName must be at most {SITE_NAME_MAX} characters"
        )));
    }
    Ok(name.to_string())
}

fn validate_site_url(raw: &str) -> Result<String, DomainError> {
    let site_url = raw.trim();
    let rest = site_url
        .strip_prefix("https://")
        .or_else(|| site_url.strip_prefix("http://"));
    match rest {
        Some(rest) if !rest.is_empty() => Ok(site_url.to_string()),
        _ => Err(DomainError::validation(
            "siteUrl must be a valid HTTP/HTTPS URL",
        )),
    }
}

/// Icons are served from the frontend's `/temp` directory.
fn is_valid_icon_url(url: &str) -> bool {
    let Some(file_name) = url.strip_prefix("/temp/") else {
        return false;
    };
    let Some((stem, extension)) = file_name.rsplit_once('.') else {
        return false;
    };
    !stem.is_empty() && ICON_EXTENSIONS.contains(&extension)
}

/// Keeps a client-supplied icon only when both fields are usable.
fn accepted_icon(icon: Option<Icon>) -> Result<Option<Icon>, DomainError> {
    let Some(icon) = icon else {
        return Ok(None);
    };
    let public_id = icon.public_id.trim();
    let url = icon.url.trim();
    if public_id.is_empty() || url.is_empty() {
        return Ok(None);
    }
    if !is_valid_icon_url(url) {
        return Err(DomainError::validation(
            "icon url must be a valid image path starting with /temp/",
        ));
    }
    Ok(Some(Icon::new(public_id, url)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}

impl UserIdQuery {
    pub fn require(self) -> Result<String, DomainError> {
        validate_user_id(self.user_id.as_deref().unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub category_name: String,
    #[serde(default)]
    pub query: Option<String>,
}

impl SearchRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_user_id(&self.user_id)?;
        if self.category_name.trim().is_empty() {
            return Err(DomainError::validation("categoryName is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCategoryRequest {
    #[serde(default)]
    pub category_name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl AddCategoryRequest {
    pub fn into_category(self) -> Result<Category, DomainError> {
        let name = validate_category_name(&self.category_name)?;
        let description = validate_description(self.description.as_deref().unwrap_or_default())?;
        Ok(Category::new(name, description))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditCategoryRequest {
    #[serde(default)]
    pub new_category_name: Option<String>,
    #[serde(default)]
    pub new_description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl EditCategoryRequest {
    /// Blank fields count as "not provided".
    pub fn into_patch(self) -> Result<CategoryPatch, DomainError> {
        let name = match self.new_category_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Some(validate_category_name(name)?),
            _ => None,
        };
        let description = match self.new_description.as_deref().map(str::trim) {
            Some(description) if !description.is_empty() => {
                Some(validate_description(description)?)
            }
            _ => None,
        };

        if name.is_none() && description.is_none() {
            return Err(DomainError::validation(
                "provide newCategoryName or newDescription to update",
            ));
        }
        Ok(CategoryPatch { name, description })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSiteRequest {
    #[serde(default)]
    pub site_name: String,
    #[serde(default)]
    pub site_url: String,
    #[serde(default)]
    pub icon: Option<Icon>,
    #[serde(default)]
    pub is_checked: Option<bool>,
}

impl AddSiteRequest {
    pub fn into_site(self) -> Result<SiteEntry, DomainError> {
        Ok(SiteEntry {
            site_name: validate_site_name(&self.site_name)?,
            site_url: validate_site_url(&self.site_url)?,
            icon: Some(accepted_icon(self.icon)?.unwrap_or_else(Icon::fallback)),
            is_checked: self.is_checked.unwrap_or(true),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditSiteRequest {
    #[serde(default)]
    pub new_site_name: Option<String>,
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default)]
    pub icon: Option<Icon>,
    #[serde(default)]
    pub is_checked: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct SitePatch {
    pub name: Option<String>,
    pub site_url: Option<String>,
    pub icon: Option<Icon>,
    pub is_checked: Option<bool>,
}

impl EditSiteRequest {
    pub fn into_patch(self) -> Result<SitePatch, DomainError> {
        let name = match self.new_site_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Some(validate_site_name(name)?),
            _ => None,
        };
        let site_url = match self.site_url.as_deref().map(str::trim) {
            Some(site_url) if !site_url.is_empty() => Some(validate_site_url(site_url)?),
            _ => None,
        };
        let patch = SitePatch {
            name,
            site_url,
            icon: accepted_icon(self.icon)?,
            is_checked: self.is_checked,
        };

        if patch.name.is_none()
            && patch.site_url.is_none()
            && patch.icon.is_none()
            && patch.is_checked.is_none()
        {
            return Err(DomainError::validation("no changes provided"));
        }
        Ok(patch)
    }
}

/// Body of an import: the `engine` array of a previously exported document.
#[derive(Debug, Deserialize)]
pub struct ImportEngineRequest {
    pub engine: Vec<Category>,
}

impl ImportEngineRequest {
    pub fn into_engine(self) -> Result<Vec<Category>, DomainError> {
        let mut engine: Vec<Category> = Vec::with_capacity(self.engine.len());
        for category in self.engine {
            let name = validate_category_name(&category.category_name)?;
            if engine.iter().any(|existing| existing.category_name == name) {
                return Err(DomainError::validation(format!(
                    "duplicate category '{name}' in import"
                )));
            }

            let mut sites: Vec<SiteEntry> = Vec::with_capacity(category.url.len());
            for site in category.url {
                let site_name = validate_site_name(&site.site_name)?;
                if sites.iter().any(|existing| existing.site_name == site_name) {
                    return Err(DomainError::validation(format!(
                        "duplicate site '{site_name}' in category '{name}'"
                    )));
                }
                sites.push(SiteEntry {
                    site_name,
                    site_url: validate_site_url(&site.site_url)?,
                    icon: accepted_icon(site.icon)?,
                    is_checked: site.is_checked,
                });
            }

            engine.push(Category {
                category_name: name,
                description: validate_description(&category.description)?,
                url: sites,
            });
        }
        Ok(engine)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub categories_count: usize,
    pub total_sites: usize,
}

impl From<&UserPreferences> for UserSummary {
    fn from(value: &UserPreferences) -> Self {
        Self {
            user_id: value.user_id.clone(),
            created_at: value.created_at,
            updated_at: value.updated_at,
            categories_count: value.engine.len(),
            total_sites: value.total_sites(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub success: bool,
    pub is_new_user: bool,
    pub message: &'static str,
    pub user: UserSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryNamesResponse {
    pub success: bool,
    pub categories: Vec<String>,
    pub is_new_user: bool,
    pub total_categories: usize,
    pub user_created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub success: bool,
    pub category_data: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_categories: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_sites: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_sites: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<SearchLink>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub categories_count: usize,
    pub total_sites: usize,
    pub enabled_sites: usize,
    pub disabled_sites: usize,
}

impl From<&UserPreferences> for Profile {
    fn from(value: &UserPreferences) -> Self {
        let total_sites = value.total_sites();
        let enabled_sites = value.enabled_sites();
        Self {
            user_id: value.user_id.clone(),
            created_at: value.created_at,
            updated_at: value.updated_at,
            last_activity: value.last_activity,
            categories_count: value.engine.len(),
            total_sites,
            enabled_sites,
            disabled_sites: total_sites - enabled_sites,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub success: bool,
    pub profile: Profile,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDataResponse {
    pub success: bool,
    pub user: UserPreferences,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryListResponse {
    pub success: bool,
    pub categories: Vec<String>,
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse {
    pub success: bool,
    pub message: &'static str,
    pub category: Category,
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCategoryResponse {
    pub success: bool,
    pub message: &'static str,
    pub deleted_category: String,
    pub user_id: String,
    pub remaining_categories: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteListResponse {
    pub success: bool,
    pub urls: Vec<SiteEntry>,
    pub user_id: String,
    pub category_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteResponse {
    pub success: bool,
    pub message: &'static str,
    pub url: SiteEntry,
    pub category_name: String,
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleSiteResponse {
    pub success: bool,
    pub message: &'static str,
    pub url: SiteEntry,
    pub category_name: String,
    pub user_id: String,
    pub is_checked: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSiteResponse {
    pub success: bool,
    pub message: &'static str,
    pub site_name: String,
    pub category_name: String,
    pub user_id: String,
}

/// Returned by reset-to-default and import, which both swap the whole engine.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineReplacedResponse {
    pub success: bool,
    pub message: &'static str,
    pub user_id: String,
    pub categories_count: usize,
    pub total_sites: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub uptime_secs: u64,
    pub version: &'static str,
    pub store: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CleanupStatsResponse {
    pub success: bool,
    pub data: ActivityStats,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupStatus {
    pub is_running: bool,
    pub inactivity_days: u32,
    pub sweep_interval_ms: u64,
    pub stats: ActivityStats,
}

#[derive(Debug, Serialize)]
pub struct CleanupStatusResponse {
    pub success: bool,
    pub data: CleanupStatus,
}

#[derive(Debug, Serialize)]
pub struct SweepTriggeredResponse {
    pub success: bool,
    pub message: &'static str,
    pub data: SweepReport,
}

/// Answer to start/stop; `changed` is false when the scheduler was already
/// in the requested state.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerResponse {
    pub success: bool,
    pub message: &'static str,
    pub changed: bool,
    pub is_running: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub dashboard_url: &'static str,
    pub features: [&'static str; 4],
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub success: bool,
    pub message: &'static str,
    pub data: Dashboard,
}
