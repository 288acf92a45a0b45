use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::{
    application::dto::{
        AddCategoryRequest, AddSiteRequest, CategoryListResponse, CategoryNamesResponse,
        CategoryResponse, DeleteCategoryResponse, DeleteSiteResponse, EditCategoryRequest,
        EditSiteRequest, EngineReplacedResponse, ImportEngineRequest, Profile, ProfileResponse,
        RegisterRequest, RegisterResponse, SearchRequest, SearchResponse, SiteListResponse,
        SiteResponse, ToggleSiteResponse, UserDataResponse, UserSummary, validate_user_id,
    },
    domain::{
        defaults::{default_category_names, default_engine, default_preferences},
        errors::DomainError,
        preferences::{Category, UserPreferences},
        search::build_search_links,
    },
    infrastructure::PreferencesRepository,
};

/// Category and site management on top of the preferences store.
#[derive(Clone)]
pub struct PreferencesService {
    repository: Arc<dyn PreferencesRepository>,
}

impl PreferencesService {
    pub fn new(repository: Arc<dyn PreferencesRepository>) -> Self {
        Self { repository }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<RegisterResponse, DomainError> {
        let user_id = validate_user_id(&request.user_id)?;
        let now = Utc::now();

        if let Some(existing) = self.repository.find(&user_id).await? {
            let user = self.reseed_if_empty(existing).await?;
            let is_new_user = user.is_recently_created(now);
            return Ok(RegisterResponse {
                success: true,
                is_new_user,
                message: if is_new_user {
                    "New user created successfully"
                } else {
                    "User already exists"
                },
                user: UserSummary::from(&user),
            });
        }

        let user = match self
            .repository
            .insert(default_preferences(&user_id, now))
            .await
        {
            Ok(user) => user,
            // Another request created it between find and insert.
            Err(DomainError::Conflict(_)) => self.require(&user_id).await?,
            Err(err) => return Err(err),
        };
        info!(user_id = %user.user_id, "registered new user");

        Ok(RegisterResponse {
            success: true,
            is_new_user: true,
            message: "New user created successfully",
            user: UserSummary::from(&user),
        })
    }

    /// Category names for the search bar; creates or re-seeds the user.
    pub async fn category_names(&self, user_id: &str) -> Result<CategoryNamesResponse, DomainError> {
        let user = self.load_seeded(user_id).await?;
        let categories = user.category_names();

        Ok(CategoryNamesResponse {
            success: true,
            total_categories: categories.len(),
            categories,
            is_new_user: user.is_recently_created(Utc::now()),
            user_created_at: user.created_at,
        })
    }

    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse, DomainError> {
        request.validate()?;
        let user = self.load_or_create(&request.user_id).await?;
        let category_name = request.category_name.trim();

        let Some(category) = user.category(category_name) else {
            return Ok(SearchResponse {
                success: true,
                category_data: None,
                message: Some(format!("Category '{category_name}' not found")),
                available_categories: Some(user.category_names()),
                total_sites: None,
                enabled_sites: None,
                links: None,
            });
        };

        let query = request
            .query
            .as_deref()
            .map(str::trim)
            .filter(|query| !query.is_empty());
        let links = match query {
            Some(query) => Some(build_search_links(category, query)?),
            None => None,
        };
        let enabled = Category {
            url: category.enabled_sites().cloned().collect(),
            ..category.clone()
        };

        Ok(SearchResponse {
            success: true,
            total_sites: Some(category.url.len()),
            enabled_sites: Some(enabled.url.len()),
            category_data: Some(enabled),
            message: None,
            available_categories: None,
            links,
        })
    }

    pub async fn profile(&self, user_id: &str) -> Result<ProfileResponse, DomainError> {
        let user = self.require(user_id).await?;
        Ok(ProfileResponse {
            success: true,
            profile: Profile::from(&user),
        })
    }

    /// Full document, used by the client's export.
    pub async fn user_data(&self, user_id: &str) -> Result<UserDataResponse, DomainError> {
        let user = self.require(user_id).await?;
        Ok(UserDataResponse {
            success: true,
            user,
        })
    }

    pub async fn import_engine(
        &self,
        user_id: &str,
        request: ImportEngineRequest,
    ) -> Result<EngineReplacedResponse, DomainError> {
        let engine = request.into_engine()?;
        let user = self.replace_engine(user_id, engine).await?;
        info!(user_id = %user.user_id, categories = user.engine.len(), "imported categories");

        Ok(EngineReplacedResponse {
            success: true,
            message: "User data imported successfully",
            user_id: user.user_id.clone(),
            categories_count: user.engine.len(),
            total_sites: user.total_sites(),
        })
    }

    pub async fn reset_to_default(&self, user_id: &str) -> Result<EngineReplacedResponse, DomainError> {
        let user = self.replace_engine(user_id, default_engine()).await?;
        info!(user_id = %user.user_id, categories = user.engine.len(), "reset user to defaults");

        Ok(EngineReplacedResponse {
            success: true,
            message: "User data reset to default successfully",
            user_id: user.user_id.clone(),
            categories_count: user.engine.len(),
            total_sites: user.total_sites(),
        })
    }

    /// Category names for an id that may not exist yet; unknown users see
    /// the default catalogue and nothing is created.
    pub async fn catalogue_names(&self, user_id: &str) -> Result<Vec<String>, DomainError> {
        let user_id = validate_user_id(user_id)?;
        Ok(match self.repository.find(&user_id).await? {
            Some(user) if !user.is_unseeded() => user.category_names(),
            _ => default_category_names(),
        })
    }

    pub async fn list_categories(&self, user_id: &str) -> Result<CategoryListResponse, DomainError> {
        let user = self.load_or_create(user_id).await?;
        Ok(CategoryListResponse {
            success: true,
            categories: user.category_names(),
            user_id: user.user_id,
        })
    }

    pub async fn add_category(
        &self,
        user_id: &str,
        request: AddCategoryRequest,
    ) -> Result<CategoryResponse, DomainError> {
        let category = request.into_category()?;
        let mut user = self.load_or_create(user_id).await?;

        if user.category(&category.category_name).is_some() {
            return Err(DomainError::conflict(format!(
                "category '{}' already exists for this user",
                category.category_name
            )));
        }

        user.engine.push(category.clone());
        let user = self.repository.replace(user).await?;
        debug!(user_id = %user.user_id, category = %category.category_name, "category added");

        Ok(CategoryResponse {
            success: true,
            message: "Category added successfully",
            category,
            user_id: user.user_id,
        })
    }

    pub async fn edit_category(
        &self,
        user_id: &str,
        category_name: &str,
        request: EditCategoryRequest,
    ) -> Result<CategoryResponse, DomainError> {
        let patch = request.into_patch()?;
        let mut user = self.load_or_create(user_id).await?;

        if let Some(new_name) = patch.name.as_deref()
            && new_name != category_name
            && user.category(new_name).is_some()
        {
            return Err(DomainError::conflict(format!(
                "category '{new_name}' already exists for this user"
            )));
        }

        let category = user
            .category_mut(category_name)
            .ok_or_else(|| category_not_found(category_name))?;
        if let Some(name) = patch.name {
            category.category_name = name;
        }
        if let Some(description) = patch.description {
            category.description = description;
        }
        let category = category.clone();

        let user = self.repository.replace(user).await?;
        Ok(CategoryResponse {
            success: true,
            message: "Category updated successfully",
            category,
            user_id: user.user_id,
        })
    }

    pub async fn delete_category(
        &self,
        user_id: &str,
        category_name: &str,
    ) -> Result<DeleteCategoryResponse, DomainError> {
        let mut user = self.load_or_create(user_id).await?;
        let before = user.engine.len();
        user.engine
            .retain(|category| category.category_name != category_name);
        if user.engine.len() == before {
            return Err(category_not_found(category_name));
        }

        let user = self.repository.replace(user).await?;
        debug!(user_id = %user.user_id, category = category_name, "category deleted");

        Ok(DeleteCategoryResponse {
            success: true,
            message: "Category deleted successfully",
            deleted_category: category_name.to_string(),
            remaining_categories: user.engine.len(),
            user_id: user.user_id,
        })
    }

    pub async fn list_sites(
        &self,
        user_id: &str,
        category_name: &str,
    ) -> Result<SiteListResponse, DomainError> {
        let user = self.load_or_create(user_id).await?;
        let category = user
            .category(category_name)
            .ok_or_else(|| category_not_found(category_name))?;

        Ok(SiteListResponse {
            success: true,
            urls: category.url.clone(),
            user_id: user.user_id.clone(),
            category_name: category_name.to_string(),
        })
    }

    pub async fn add_site(
        &self,
        user_id: &str,
        category_name: &str,
        request: AddSiteRequest,
    ) -> Result<SiteResponse, DomainError> {
        let site = request.into_site()?;
        let mut user = self.load_or_create(user_id).await?;
        let category = user
            .category_mut(category_name)
            .ok_or_else(|| category_not_found(category_name))?;

        if category.site(&site.site_name).is_some() {
            return Err(DomainError::conflict(format!(
                "site '{}' already exists in category '{category_name}'",
                site.site_name
            )));
        }
        category.url.push(site.clone());

        let user = self.repository.replace(user).await?;
        Ok(SiteResponse {
            success: true,
            message: "URL added successfully",
            url: site,
            category_name: category_name.to_string(),
            user_id: user.user_id,
        })
    }

    pub async fn edit_site(
        &self,
        user_id: &str,
        category_name: &str,
        site_name: &str,
        request: EditSiteRequest,
    ) -> Result<SiteResponse, DomainError> {
        let patch = request.into_patch()?;
        let mut user = self.load_or_create(user_id).await?;
        let category = user
            .category_mut(category_name)
            .ok_or_else(|| category_not_found(category_name))?;

        if let Some(new_name) = patch.name.as_deref()
            && new_name != site_name
            && category.site(new_name).is_some()
        {
            return Err(DomainError::conflict(format!(
                "site '{new_name}' already exists in category '{category_name}'"
            )));
        }

        let site = category
            .site_mut(site_name)
            .ok_or_else(|| site_not_found(site_name))?;
        if let Some(name) = patch.name {
            site.site_name = name;
        }
        if let Some(site_url) = patch.site_url {
            site.site_url = site_url;
        }
        if let Some(icon) = patch.icon {
            site.icon = Some(icon);
        }
        if let Some(is_checked) = patch.is_checked {
            site.is_checked = is_checked;
        }
        let site = site.clone();

        let user = self.repository.replace(user).await?;
        Ok(SiteResponse {
            success: true,
            message: "URL updated successfully",
            url: site,
            category_name: category_name.to_string(),
            user_id: user.user_id,
        })
    }

    pub async fn delete_site(
        &self,
        user_id: &str,
        category_name: &str,
        site_name: &str,
    ) -> Result<DeleteSiteResponse, DomainError> {
        let mut user = self.load_or_create(user_id).await?;
        let category = user
            .category_mut(category_name)
            .ok_or_else(|| category_not_found(category_name))?;

        let before = category.url.len();
        category.url.retain(|site| site.site_name != site_name);
        if category.url.len() == before {
            return Err(site_not_found(site_name));
        }

        let user = self.repository.replace(user).await?;
        Ok(DeleteSiteResponse {
            success: true,
            message: "URL deleted successfully",
            site_name: site_name.to_string(),
            category_name: category_name.to_string(),
            user_id: user.user_id,
        })
    }

    pub async fn toggle_site(
        &self,
        user_id: &str,
        category_name: &str,
        site_name: &str,
    ) -> Result<ToggleSiteResponse, DomainError> {
        let mut user = self.load_or_create(user_id).await?;
        let site = user
            .category_mut(category_name)
            .ok_or_else(|| category_not_found(category_name))?
            .site_mut(site_name)
            .ok_or_else(|| site_not_found(site_name))?;

        site.is_checked = !site.is_checked;
        let site = site.clone();

        let user = self.repository.replace(user).await?;
        Ok(ToggleSiteResponse {
            success: true,
            message: if site.is_checked {
                "URL enabled successfully"
            } else {
                "URL disabled successfully"
            },
            is_checked: site.is_checked,
            url: site,
            category_name: category_name.to_string(),
            user_id: user.user_id,
        })
    }

    async fn require(&self, user_id: &str) -> Result<UserPreferences, DomainError> {
        let user_id = validate_user_id(user_id)?;
        self.repository
            .find(&user_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("user '{user_id}' not found")))
    }

    /// Finds the user, creating one with the default catalogue when missing
    /// or when only activity tracking has seen it so far.
    async fn load_or_create(&self, user_id: &str) -> Result<UserPreferences, DomainError> {
        let user_id = validate_user_id(user_id)?;
        if let Some(mut user) = self.repository.find(&user_id).await? {
            if !user.is_unseeded() {
                return Ok(user);
            }
            user.engine = default_engine();
            user.is_first_time_user = true;
            return self.repository.replace(user).await;
        }

        match self
            .repository
            .insert(default_preferences(&user_id, Utc::now()))
            .await
        {
            Ok(user) => {
                info!(user_id = %user.user_id, "created user with default categories");
                Ok(user)
            }
            Err(DomainError::Conflict(_)) => self.require(&user_id).await,
            Err(err) => Err(err),
        }
    }

    /// Like `load_or_create`, but also refills a document that has no
    /// categories, such as one created by activity tracking alone.
    async fn load_seeded(&self, user_id: &str) -> Result<UserPreferences, DomainError> {
        let user = self.load_or_create(user_id).await?;
        self.reseed_if_empty(user).await
    }

    async fn reseed_if_empty(&self, mut user: UserPreferences) -> Result<UserPreferences, DomainError> {
        if !user.engine.is_empty() {
            return Ok(user);
        }

        user.engine = default_engine();
        user.is_first_time_user = true;
        let user = self.repository.replace(user).await?;
        debug!(user_id = %user.user_id, "seeded empty user with default categories");
        Ok(user)
    }

    async fn replace_engine(
        &self,
        user_id: &str,
        engine: Vec<Category>,
    ) -> Result<UserPreferences, DomainError> {
        let user_id = validate_user_id(user_id)?;
        let now = Utc::now();
        let mut user = match self.repository.find(&user_id).await? {
            Some(user) => user,
            None => UserPreferences::blank(user_id, now),
        };
        user.engine = engine;
        user.is_first_time_user = true;
        user.last_activity = now;
        self.repository.replace(user).await
    }
}

fn category_not_found(category_name: &str) -> DomainError {
    DomainError::not_found(format!("category '{category_name}' not found"))
}

fn site_not_found(site_name: &str) -> DomainError {
    DomainError::not_found(format!("site '{site_name}' not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::preferences::SiteEntry,
        infrastructure::in_memory_preferences_repository::InMemoryPreferencesRepository,
    };

    const USER: &str = "user-0000000001";

    fn service() -> (PreferencesService, Arc<InMemoryPreferencesRepository>) {
        let repository = Arc::new(InMemoryPreferencesRepository::new());
        (PreferencesService::new(repository.clone()), repository)
    }

    fn add_site_request(name: &str) -> AddSiteRequest {
        AddSiteRequest {
            site_name: name.to_string(),
            site_url: format!("https://{}.example/?q={{q}}", name.to_lowercase()),
            icon: None,
            is_checked: None,
        }
    }

    #[tokio::test]
    async fn register_seeds_defaults_once() {
        let (service, _) = service();

        let first = service
            .register(RegisterRequest {
                user_id: USER.to_string(),
            })
            .await
            .expect("register should succeed");
        assert!(first.is_new_user);
        assert_eq!(first.user.categories_count, default_category_names().len());

        let second = service
            .register(RegisterRequest {
                user_id: USER.to_string(),
            })
            .await
            .expect("second register should succeed");
        assert_eq!(second.user.categories_count, first.user.categories_count);
    }

    #[tokio::test]
    async fn register_reseeds_a_document_created_by_tracking() {
        let (service, repository) = service();
        repository
            .touch(USER, Utc::now())
            .await
            .expect("touch should succeed");

        let response = service
            .register(RegisterRequest {
                user_id: USER.to_string(),
            })
            .await
            .expect("register should succeed");

        assert!(response.is_new_user);
        assert!(response.user.categories_count > 0);
    }

    #[tokio::test]
    async fn register_rejects_short_ids() {
        let (service, _) = service();
        let result = service
            .register(RegisterRequest {
                user_id: "abc".to_string(),
            })
            .await;
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn search_returns_enabled_sites_and_links() {
        let (service, _) = service();
        service
            .toggle_site(USER, "Search", "Bing")
            .await
            .expect("toggle should succeed");

        let response = service
            .search(SearchRequest {
                user_id: USER.to_string(),
                category_name: "Search".to_string(),
                query: Some("rust lang".to_string()),
            })
            .await
            .expect("search should succeed");

        let category = response.category_data.expect("category should be found");
        assert!(category.url.iter().all(|site| site.is_checked));
        assert!(category.url.iter().all(|site| site.site_name != "Bing"));
        assert_eq!(
            response.enabled_sites,
            response.total_sites.map(|total| total - 1)
        );

        let links = response.links.expect("query should produce links");
        let google = links
            .iter()
            .find(|link| link.site_name == "Google")
            .expect("google link");
        assert_eq!(google.url, "https://www.google.com/search?q=rust%20lang");
    }

    #[tokio::test]
    async fn search_for_unknown_category_lists_alternatives() {
        let (service, _) = service();
        let response = service
            .search(SearchRequest {
                user_id: USER.to_string(),
                category_name: "Cooking".to_string(),
                query: None,
            })
            .await
            .expect("search should succeed");

        assert!(response.category_data.is_none());
        assert!(
            response
                .available_categories
                .expect("alternatives listed")
                .contains(&"Search".to_string())
        );
    }

    #[tokio::test]
    async fn category_crud_round() {
        let (service, _) = service();

        service
            .add_category(
                USER,
                AddCategoryRequest {
                    category_name: "Dev".to_string(),
                    description: Some("code search".to_string()),
                },
            )
            .await
            .expect("add should succeed");

        let duplicate = service
            .add_category(
                USER,
                AddCategoryRequest {
                    category_name: "Dev".to_string(),
                    description: None,
                },
            )
            .await;
        assert!(matches!(duplicate, Err(DomainError::Conflict(_))));

        let clash = service
            .edit_category(
                USER,
                "Dev",
                EditCategoryRequest {
                    new_category_name: Some("Search".to_string()),
                    new_description: None,
                },
            )
            .await;
        assert!(matches!(clash, Err(DomainError::Conflict(_))));

        let renamed = service
            .edit_category(
                USER,
                "Dev",
                EditCategoryRequest {
                    new_category_name: Some("Code".to_string()),
                    new_description: None,
                },
            )
            .await
            .expect("rename should succeed");
        assert_eq!(renamed.category.category_name, "Code");
        assert_eq!(renamed.category.description, "code search");

        let deleted = service
            .delete_category(USER, "Code")
            .await
            .expect("delete should succeed");
        assert_eq!(deleted.remaining_categories, default_category_names().len());

        let missing = service.delete_category(USER, "Code").await;
        assert!(matches!(missing, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn site_crud_round() {
        let (service, repository) = service();

        let added = service
            .add_site(USER, "Search", add_site_request("Kagi"))
            .await
            .expect("add should succeed");
        assert_eq!(added.url.icon, Some(crate::domain::preferences::Icon::fallback()));

        let duplicate = service
            .add_site(USER, "Search", add_site_request("Kagi"))
            .await;
        assert!(matches!(duplicate, Err(DomainError::Conflict(_))));

        let edited = service
            .edit_site(
                USER,
                "Search",
                "Kagi",
                EditSiteRequest {
                    new_site_name: None,
                    site_url: Some("https://kagi.com/search?q={q}".to_string()),
                    icon: None,
                    is_checked: Some(false),
                },
            )
            .await
            .expect("edit should succeed");
        assert!(!edited.url.is_checked);

        let toggled = service
            .toggle_site(USER, "Search", "Kagi")
            .await
            .expect("toggle should succeed");
        assert!(toggled.is_checked);

        service
            .delete_site(USER, "Search", "Kagi")
            .await
            .expect("delete should succeed");

        let stored = repository
            .find(USER)
            .await
            .expect("find should succeed")
            .expect("user exists");
        let sites: &[SiteEntry] = stored.sites_in("Search");
        assert!(sites.iter().all(|site| site.site_name != "Kagi"));

        let missing = service.toggle_site(USER, "Search", "Kagi").await;
        assert!(matches!(missing, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn reset_restores_catalogue_and_refreshes_activity() {
        let (service, repository) = service();
        service
            .delete_category(USER, "Search")
            .await
            .expect("delete should succeed");

        let old = Utc::now() - chrono::Duration::days(10);
        repository
            .touch(USER, old)
            .await
            .expect("touch should succeed");

        let response = service
            .reset_to_default(USER)
            .await
            .expect("reset should succeed");
        assert_eq!(response.categories_count, default_category_names().len());

        let stored = repository
            .find(USER)
            .await
            .expect("find should succeed")
            .expect("user exists");
        assert!(stored.last_activity > old);
        assert!(stored.category("Search").is_some());
    }

    #[tokio::test]
    async fn import_replaces_engine() {
        let (service, _) = service();
        let mut dev = Category::new("Dev", "");
        dev.url.push(SiteEntry {
            site_name: "docs.rs".to_string(),
            site_url: "https://docs.rs/releases/search?query={q}".to_string(),
            icon: None,
            is_checked: true,
        });

        let response = service
            .import_engine(USER, ImportEngineRequest { engine: vec![dev] })
            .await
            .expect("import should succeed");
        assert_eq!(response.categories_count, 1);
        assert_eq!(response.total_sites, 1);

        let exported = service.user_data(USER).await.expect("export should succeed");
        assert_eq!(exported.user.category_names(), vec!["Dev"]);
    }

    #[tokio::test]
    async fn unknown_users_see_default_catalogue_without_creation() {
        let (service, repository) = service();
        let names = service
            .catalogue_names(USER)
            .await
            .expect("names should resolve");
        assert_eq!(names, default_category_names());
        assert!(
            repository
                .find(USER)
                .await
                .expect("find should succeed")
                .is_none()
        );
    }

    #[tokio::test]
    async fn tracked_only_users_get_the_default_catalogue() {
        let (service, repository) = service();
        repository
            .touch(USER, Utc::now())
            .await
            .expect("touch should succeed");

        let names = service
            .catalogue_names(USER)
            .await
            .expect("names should resolve");
        assert_eq!(names, default_category_names());

        let listed = service
            .list_categories(USER)
            .await
            .expect("list should succeed");
        assert_eq!(listed.categories, default_category_names());
    }

    #[tokio::test]
    async fn emptied_catalogue_stays_empty_in_settings() {
        let (service, _) = service();
        for name in default_category_names() {
            service
                .delete_category(USER, &name)
                .await
                .expect("delete should succeed");
        }

        let listed = service
            .list_categories(USER)
            .await
            .expect("list should succeed");
        assert!(listed.categories.is_empty());
    }

    #[tokio::test]
    async fn profile_of_missing_user_is_not_found() {
        let (service, _) = service();
        assert!(matches!(
            service.profile(USER).await,
            Err(DomainError::NotFound(_))
        ));
    }
}
