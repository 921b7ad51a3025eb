use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::RepositoryError,
    models::{Folder, Note, NoteFilter, NoteRequest, User},
    repository::{RepoResult, Repository},
};

#[derive(Default)]
struct Collections {
    users: HashMap<String, User>,
    // Insertion order is kept so listings are stable when timestamps collide.
    folders: Vec<Folder>,
    notes: Vec<Note>,
}

/// InMemoryRepository
///
/// A process-local `Repository` used by the integration tests and by local runs with
/// `DATABASE_URL=memory`. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryRepository {
    inner: RwLock<Collections>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Collections {
    // Same rule as the `folders(id)` foreign key on `notes.folder_id`.
    fn check_folder(&self, folder_id: Option<Uuid>) -> RepoResult<()> {
        match folder_id {
            Some(id) if !self.folders.iter().any(|f| f.id == id) => {
                Err(RepositoryError::MissingReference(
                    "folder_id does not name one of your folders".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_user(&self, username: &str) -> RepoResult<Option<User>> {
        Ok(self.inner.read().await.users.get(username).cloned())
    }

    async fn create_user(&self, user: User) -> RepoResult<User> {
        let mut inner = self.inner.write().await;
        if inner.users.contains_key(&user.username) {
            return Err(RepositoryError::Conflict(format!(
                "Username '{}' already exists",
                user.username
            )));
        }
        inner.users.insert(user.username.clone(), user.clone());
        Ok(user)
    }

    async fn list_children(&self, parent_username: &str) -> RepoResult<Vec<String>> {
        let inner = self.inner.read().await;
        let mut children: Vec<String> = inner
            .users
            .values()
            .filter(|u| u.parent_username.as_deref() == Some(parent_username))
            .map(|u| u.username.clone())
            .collect();
        children.sort();
        Ok(children)
    }

    async fn create_folder(&self, owner_username: &str, name: &str) -> RepoResult<Folder> {
        let folder = Folder {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_username: owner_username.to_string(),
            created_at: Utc::now(),
        };
        self.inner.write().await.folders.push(folder.clone());
        Ok(folder)
    }

    async fn get_folder(&self, id: Uuid) -> RepoResult<Option<Folder>> {
        let inner = self.inner.read().await;
        Ok(inner.folders.iter().find(|f| f.id == id).cloned())
    }

    async fn list_folders(&self, owners: &[String]) -> RepoResult<Vec<Folder>> {
        let inner = self.inner.read().await;
        let mut folders: Vec<Folder> = inner
            .folders
            .iter()
            .filter(|f| owners.contains(&f.owner_username))
            .cloned()
            .collect();
        // Stable sort: equal names stay in creation order.
        folders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(folders)
    }

    async fn delete_folder(&self, id: Uuid, owner_username: &str) -> RepoResult<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.folders.len();
        inner
            .folders
            .retain(|f| !(f.id == id && f.owner_username == owner_username));
        if inner.folders.len() == before {
            return Ok(false);
        }
        for note in inner.notes.iter_mut().filter(|n| n.folder_id == Some(id)) {
            note.folder_id = None;
        }
        Ok(true)
    }

    async fn create_note(&self, owner_username: &str, req: NoteRequest) -> RepoResult<Note> {
        let mut inner = self.inner.write().await;
        inner.check_folder(req.folder_id)?;

        let now = Utc::now();
        let note = Note {
            id: Uuid::new_v4(),
            owner_username: owner_username.to_string(),
            title: req.title,
            content: req.content,
            tags: req.tags,
            checkbox_items: req.checkbox_items,
            folder_id: req.folder_id,
            created_at: now,
            updated_at: now,
        };
        inner.notes.push(note.clone());
        Ok(note)
    }

    async fn get_note(&self, id: Uuid) -> RepoResult<Option<Note>> {
        let inner = self.inner.read().await;
        Ok(inner.notes.iter().find(|n| n.id == id).cloned())
    }

    async fn list_notes(&self, owners: &[String], filter: &NoteFilter) -> RepoResult<Vec<Note>> {
        let inner = self.inner.read().await;
        Ok(inner
            .notes
            .iter()
            .rev()
            .filter(|n| owners.contains(&n.owner_username) && filter.matches(n))
            .cloned()
            .collect())
    }

    async fn update_note(
        &self,
        id: Uuid,
        owner_username: &str,
        req: NoteRequest,
    ) -> RepoResult<Option<Note>> {
        let mut inner = self.inner.write().await;
        let Some(index) = inner
            .notes
            .iter()
            .position(|n| n.id == id && n.owner_username == owner_username)
        else {
            return Ok(None);
        };
        inner.check_folder(req.folder_id)?;

        let note = &mut inner.notes[index];
        note.title = req.title;
        note.content = req.content;
        note.tags = req.tags;
        note.checkbox_items = req.checkbox_items;
        note.folder_id = req.folder_id;
        note.updated_at = Utc::now();
        Ok(Some(note.clone()))
    }

    async fn delete_note(&self, id: Uuid, owner_username: &str) -> RepoResult<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.notes.len();
        inner
            .notes
            .retain(|n| !(n.id == id && n.owner_username == owner_username));
        Ok(inner.notes.len() < before)
    }
}
