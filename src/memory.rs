use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Item, ItemChanges, NewItem, NewUser, User, UserChanges};
use crate::repository::{ItemRepository, Page, RepoError, Repository, UserRepository};

/// InMemoryRepository
///
/// A `Vec`-backed implementation of both repositories, used by the test-suite and by
/// local runs without `DATABASE_URL`. It mirrors the Postgres constraints that matter to
/// the service layer: unique email and the item owner foreign key.
#[derive(Default)]
pub struct InMemoryRepository {
    users: RwLock<Vec<User>>,
    items: RwLock<Vec<Item>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn window<T: Clone>(rows: impl Iterator<Item = T>, page: Page) -> Vec<T> {
    rows.skip(page.skip as usize)
        .take(page.limit as usize)
        .collect()
}

#[async_trait]
impl Repository<User> for InMemoryRepository {
    async fn list(&self, page: Page) -> Result<Vec<User>, RepoError> {
        Ok(window(self.users.read().await.iter().cloned(), page))
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, data: NewUser) -> Result<User, RepoError> {
        let mut users = self.users.write().await;
        let email = data.email.to_lowercase();
        if users.iter().any(|u| u.email == email) {
            return Err(RepoError::UniqueViolation("email"));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email,
            hashed_password: data.hashed_password,
            first_name: data.first_name,
            last_name: data.last_name,
            is_active: data.is_active,
            is_superuser: data.is_superuser,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn update(&self, id: Uuid, data: UserChanges) -> Result<Option<User>, RepoError> {
        let mut users = self.users.write().await;

        if let Some(email) = &data.email {
            let email = email.to_lowercase();
            if users.iter().any(|u| u.id != id && u.email == email) {
                return Err(RepoError::UniqueViolation("email"));
            }
        }

        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };

        if let Some(email) = data.email {
            user.email = email.to_lowercase();
        }
        if let Some(hash) = data.hashed_password {
            user.hashed_password = hash;
        }
        if let Some(first_name) = data.first_name {
            user.first_name = Some(first_name);
        }
        if let Some(last_name) = data.last_name {
            user.last_name = Some(last_name);
        }
        if let Some(is_active) = data.is_active {
            user.is_active = is_active;
        }
        if let Some(is_superuser) = data.is_superuser {
            user.is_superuser = is_superuser;
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    // Soft delete, same as Postgres.
    async fn delete(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let changes = UserChanges {
            is_active: Some(false),
            ..UserChanges::default()
        };
        Repository::<User>::update(self, id, changes).await
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let email = email.to_lowercase();
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }
}

#[async_trait]
impl Repository<Item> for InMemoryRepository {
    async fn list(&self, page: Page) -> Result<Vec<Item>, RepoError> {
        Ok(window(self.items.read().await.iter().cloned(), page))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Item>, RepoError> {
        Ok(self.items.read().await.iter().find(|i| i.id == id).cloned())
    }

    async fn create(&self, data: NewItem) -> Result<Item, RepoError> {
        if !self.users.read().await.iter().any(|u| u.id == data.owner_id) {
            return Err(RepoError::ForeignKeyViolation(format!(
                "owner {} does not exist",
                data.owner_id
            )));
        }

        let now = Utc::now();
        let item = Item {
            id: Uuid::new_v4(),
            title: data.title,
            description: data.description,
            owner_id: data.owner_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.items.write().await.push(item.clone());
        Ok(item)
    }

    async fn update(&self, id: Uuid, data: ItemChanges) -> Result<Option<Item>, RepoError> {
        let mut items = self.items.write().await;
        let Some(item) = items.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };

        if let Some(title) = data.title {
            item.title = title;
        }
        if let Some(description) = data.description {
            item.description = Some(description);
        }
        if let Some(is_active) = data.is_active {
            item.is_active = is_active;
        }
        item.updated_at = Utc::now();

        Ok(Some(item.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Item>, RepoError> {
        let mut items = self.items.write().await;
        Ok(items
            .iter()
            .position(|i| i.id == id)
            .map(|index| items.remove(index)))
    }
}

#[async_trait]
impl ItemRepository for InMemoryRepository {
    async fn list_by_owner(&self, owner_id: Uuid, page: Page) -> Result<Vec<Item>, RepoError> {
        let items = self.items.read().await;
        Ok(window(
            items.iter().filter(|i| i.owner_id == owner_id).cloned(),
            page,
        ))
    }
}
