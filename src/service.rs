use std::marker::PhantomData;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    CreateItemRequest, CreateUserRequest, Item, ItemChanges, NewItem, NewUser, Pagination,
    RegisterUserRequest, UpdateItemRequest, UpdateMeRequest, UpdateUserRequest, User, UserChanges,
};
use crate::password::{dummy_hash, hash_password, validate_password_strength, verify_password};
use crate::repository::{
    Entity, ItemRepoState, ItemRepository, Page, Repository, UserRepoState, UserRepository,
};
use crate::tasks::{JobDescriptor, JobQueueState};

/// PageLimits
///
/// Pagination bounds from configuration. `limit` is clamped to `max_limit`; a missing or
/// zero limit falls back to `default_limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl PageLimits {
    pub fn resolve(&self, pagination: Pagination) -> Page {
        let limit = match pagination.limit {
            None | Some(0) => self.default_limit,
            Some(limit) => limit,
        };
        Page {
            skip: pagination.skip.unwrap_or(0),
            limit: limit.min(self.max_limit),
        }
    }
}

/// Ownership rule shared by every mutating operation: the owner or a superuser.
pub fn ensure_owner_or_superuser<T: Entity>(entity: &T, actor: &User) -> Result<(), AppError> {
    if actor.is_superuser || entity.owner_id() == actor.id {
        Ok(())
    } else {
        tracing::debug!(
            actor = %actor.id,
            entity = T::NAME,
            entity_id = %entity.id(),
            "ownership check failed"
        );
        Err(AppError::not_enough_permissions())
    }
}

/// CrudService
///
/// The generic list/get/create/update/delete layer over any [`Repository`]. Id
/// resolution failures become `NotFound`; `update` and `delete` enforce
/// [`ensure_owner_or_superuser`] before touching storage.
pub struct CrudService<T: Entity, R: Repository<T> + ?Sized> {
    repo: Arc<R>,
    limits: PageLimits,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity, R: Repository<T> + ?Sized> Clone for CrudService<T, R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            limits: self.limits,
            _entity: PhantomData,
        }
    }
}

impl<T: Entity, R: Repository<T> + ?Sized> CrudService<T, R> {
    pub fn new(repo: Arc<R>, limits: PageLimits) -> Self {
        Self {
            repo,
            limits,
            _entity: PhantomData,
        }
    }

    pub fn limits(&self) -> PageLimits {
        self.limits
    }

    pub async fn list(&self, pagination: Pagination) -> Result<Vec<T>, AppError> {
        Ok(self.repo.list(self.limits.resolve(pagination)).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<T, AppError> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found(T::NAME))
    }

    /// `get` plus the ownership rule, for reads that are private to the owner.
    pub async fn get_for(&self, id: Uuid, actor: &User) -> Result<T, AppError> {
        let entity = self.get(id).await?;
        ensure_owner_or_superuser(&entity, actor)?;
        Ok(entity)
    }

    pub async fn create(&self, data: T::Create) -> Result<T, AppError> {
        Ok(self.repo.create(data).await?)
    }

    pub async fn update(&self, id: Uuid, data: T::Update, actor: &User) -> Result<T, AppError> {
        self.get_for(id, actor).await?;
        self.repo
            .update(id, data)
            .await?
            .ok_or_else(|| AppError::not_found(T::NAME))
    }

    pub async fn delete(&self, id: Uuid, actor: &User) -> Result<T, AppError> {
        self.get_for(id, actor).await?;
        self.repo
            .delete(id)
            .await?
            .ok_or_else(|| AppError::not_found(T::NAME))
    }
}

const INCORRECT_CREDENTIALS: &str = "Incorrect email or password";

/// Minimal shape check: one `@`, non-empty local part, dotted domain, no whitespace.
pub fn validate_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(email)
    } else {
        Err(AppError::Validation(format!("Invalid email address: {email}")))
    }
}

/// UserService
///
/// Registration, authentication and account management on top of the generic CRUD
/// layer for users.
#[derive(Clone)]
pub struct UserService {
    crud: CrudService<User, dyn UserRepository>,
    repo: UserRepoState,
    jobs: JobQueueState,
}

impl UserService {
    pub fn new(repo: UserRepoState, jobs: JobQueueState, limits: PageLimits) -> Self {
        Self {
            crud: CrudService::new(repo.clone(), limits),
            repo,
            jobs,
        }
    }

    pub fn repo(&self) -> &UserRepoState {
        &self.repo
    }

    /// Public self-registration. Never creates a superuser.
    pub async fn register(&self, req: RegisterUserRequest) -> Result<User, AppError> {
        let user = self
            .create_account(NewAccount {
                email: req.email,
                password: req.password,
                first_name: req.first_name,
                last_name: req.last_name,
                is_active: true,
                is_superuser: false,
            })
            .await?;

        let name = user.first_name.clone().unwrap_or_else(|| "User".to_string());
        self.dispatch(JobDescriptor::SendWelcomeEmail {
            email: user.email.clone(),
            name,
        })
        .await;

        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Superuser-driven account creation.
    pub async fn create_user(&self, req: CreateUserRequest) -> Result<User, AppError> {
        self.create_account(NewAccount {
            email: req.email,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
            is_active: req.is_active,
            is_superuser: req.is_superuser,
        })
        .await
    }

    /// Startup seeding: creates the first superuser unless the email is already taken.
    /// Returns `None` when nothing was created.
    pub async fn ensure_superuser(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, AppError> {
        if self.repo.find_by_email(email).await?.is_some() {
            return Ok(None);
        }

        let user = self
            .create_user(CreateUserRequest {
                email: email.to_string(),
                password: password.to_string(),
                first_name: None,
                last_name: None,
                is_active: true,
                is_superuser: true,
            })
            .await?;
        tracing::info!(user_id = %user.id, "first superuser created");
        Ok(Some(user))
    }

    /// authenticate
    ///
    /// Unknown email and wrong password yield the identical error so callers cannot
    /// probe which accounts exist. Activity is not checked here.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AppError> {
        let user = self.repo.find_by_email(&email.trim().to_lowercase()).await?;

        match user {
            Some(user) if verify_password(password, &user.hashed_password) => Ok(user),
            Some(_) => Err(AppError::Unauthenticated(INCORRECT_CREDENTIALS.to_string())),
            None => {
                verify_password(password, dummy_hash());
                Err(AppError::Unauthenticated(INCORRECT_CREDENTIALS.to_string()))
            }
        }
    }

    /// Credentials first, then activity: an inactive account fails with 400.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AppError> {
        let user = self.authenticate(email, password).await?;
        if !user.is_active {
            return Err(AppError::BadRequest("Inactive user".to_string()));
        }
        Ok(user)
    }

    pub async fn list(&self, pagination: Pagination) -> Result<Vec<User>, AppError> {
        self.crud.list(pagination).await
    }

    pub async fn get(&self, id: Uuid) -> Result<User, AppError> {
        self.crud.get(id).await
    }

    /// Regular users may only read themselves; superusers may read anyone.
    pub async fn get_visible(&self, id: Uuid, actor: &User) -> Result<User, AppError> {
        if actor.id != id && !actor.is_superuser {
            return Err(AppError::not_enough_permissions());
        }
        self.crud.get(id).await
    }

    pub async fn update_me(&self, actor: &User, req: UpdateMeRequest) -> Result<User, AppError> {
        let changes = UserChanges {
            hashed_password: req.password.as_deref().map(new_password_hash).transpose()?,
            first_name: req.first_name,
            last_name: req.last_name,
            ..UserChanges::default()
        };
        self.crud.update(actor.id, changes, actor).await
    }

    /// Superuser update of any account. Email uniqueness is re-checked by storage.
    pub async fn admin_update(
        &self,
        id: Uuid,
        req: UpdateUserRequest,
        actor: &User,
    ) -> Result<User, AppError> {
        let changes = UserChanges {
            email: req.email.as_deref().map(validate_email).transpose()?,
            hashed_password: req.password.as_deref().map(new_password_hash).transpose()?,
            first_name: req.first_name,
            last_name: req.last_name,
            is_active: req.is_active,
            is_superuser: req.is_superuser,
        };
        self.crud.update(id, changes, actor).await
    }

    async fn set_active(&self, id: Uuid, is_active: bool, actor: &User) -> Result<User, AppError> {
        let changes = UserChanges {
            is_active: Some(is_active),
            ..UserChanges::default()
        };
        let user = self.crud.update(id, changes, actor).await?;
        tracing::info!(user_id = %user.id, is_active, actor = %actor.id, "user activity changed");
        Ok(user)
    }

    pub async fn activate(&self, id: Uuid, actor: &User) -> Result<User, AppError> {
        self.set_active(id, true, actor).await
    }

    pub async fn deactivate(&self, id: Uuid, actor: &User) -> Result<User, AppError> {
        self.set_active(id, false, actor).await
    }

    async fn create_account(&self, account: NewAccount) -> Result<User, AppError> {
        let email = validate_email(&account.email)?;

        if self.repo.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict(
                "The user with this email already exists in the system".to_string(),
            ));
        }

        let hashed_password = new_password_hash(&account.password)?;

        self.crud
            .create(NewUser {
                email,
                hashed_password,
                first_name: account.first_name,
                last_name: account.last_name,
                is_active: account.is_active,
                is_superuser: account.is_superuser,
            })
            .await
    }

    async fn dispatch(&self, job: JobDescriptor) {
        dispatch(&self.jobs, job).await;
    }
}

struct NewAccount {
    email: String,
    password: String,
    first_name: Option<String>,
    last_name: Option<String>,
    is_active: bool,
    is_superuser: bool,
}

fn new_password_hash(password: &str) -> Result<String, AppError> {
    validate_password_strength(password)?;
    hash_password(password)
}

/// Side-effect jobs must not fail the request that triggered them; a dispatch failure
/// is logged instead.
async fn dispatch(jobs: &JobQueueState, job: JobDescriptor) {
    let name = job.name();
    if let Err(e) = jobs.enqueue(job).await {
        tracing::warn!(job = name, "background job not dispatched: {}", e);
    }
}

/// ItemService
///
/// Item operations: creation bound to an existing owner, owner-scoped listing, and the
/// CRUD layer's ownership checks for everything else.
#[derive(Clone)]
pub struct ItemService {
    crud: CrudService<Item, dyn ItemRepository>,
    repo: ItemRepoState,
    users: UserRepoState,
    jobs: JobQueueState,
}

impl ItemService {
    pub fn new(
        repo: ItemRepoState,
        users: UserRepoState,
        jobs: JobQueueState,
        limits: PageLimits,
    ) -> Self {
        Self {
            crud: CrudService::new(repo.clone(), limits),
            repo,
            users,
            jobs,
        }
    }

    pub async fn create(&self, req: CreateItemRequest, owner: &User) -> Result<Item, AppError> {
        let title = validate_title(&req.title)?;

        // Item.owner_id must always reference an existing user.
        if self.users.get(owner.id).await?.is_none() {
            return Err(AppError::NotFound("Owner not found".to_string()));
        }

        let item = self
            .crud
            .create(NewItem {
                title,
                description: req.description,
                owner_id: owner.id,
            })
            .await?;

        dispatch(&self.jobs, JobDescriptor::ProcessItem { item_id: item.id }).await;
        tracing::info!(item_id = %item.id, owner = %owner.id, "item created");
        Ok(item)
    }

    /// Superusers see every item; everyone else only their own.
    pub async fn list_visible(
        &self,
        actor: &User,
        pagination: Pagination,
    ) -> Result<Vec<Item>, AppError> {
        if actor.is_superuser {
            return self.crud.list(pagination).await;
        }
        let page = self.crud.limits().resolve(pagination);
        Ok(self.repo.list_by_owner(actor.id, page).await?)
    }

    pub async fn get(&self, id: Uuid, actor: &User) -> Result<Item, AppError> {
        self.crud.get_for(id, actor).await
    }

    pub async fn update(
        &self,
        id: Uuid,
        req: UpdateItemRequest,
        actor: &User,
    ) -> Result<Item, AppError> {
        let changes = ItemChanges {
            title: req.title.as_deref().map(validate_title).transpose()?,
            description: req.description,
            is_active: req.is_active,
        };
        self.crud.update(id, changes, actor).await
    }

    pub async fn delete(&self, id: Uuid, actor: &User) -> Result<Item, AppError> {
        let item = self.crud.delete(id, actor).await?;
        tracing::info!(item_id = %item.id, actor = %actor.id, "item deleted");
        Ok(item)
    }
}

fn validate_title(title: &str) -> Result<String, AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Item title must not be empty".to_string()));
    }
    Ok(title.to_string())
}
