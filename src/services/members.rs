//! Member management service and the member read projection

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use super::audit::AuditUsers;
use crate::{
    error::{AppError, AppResult},
    models::{
        member::{CreateMember, Member, MemberDetails, MemberQuery, MemberView, NewMember, UpdateMember},
        PageRequest, Principal,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct MembersService {
    repository: Repository,
    read_timeout: Duration,
}

impl MembersService {
    pub fn new(repository: Repository, read_timeout: Duration) -> Self {
        Self { repository, read_timeout }
    }

    async fn view(&self, member: Member) -> AppResult<MemberView> {
        let audit = AuditUsers::load(&self.repository, [member.created_by]).await?;
        Ok(MemberView { created_by: audit.get(member.created_by), member })
    }

    /// Search members with pagination; borrow records are returned unresolved
    pub async fn search_members(
        &self,
        query: &MemberQuery,
        page: PageRequest,
    ) -> AppResult<(Vec<MemberView>, i64)> {
        let (members, total) = self.repository.members.search(query, page).await?;
        let audit = AuditUsers::load(&self.repository, members.iter().map(|m| m.created_by)).await?;
        let views = members
            .into_iter()
            .map(|member| MemberView { created_by: audit.get(member.created_by), member })
            .collect();
        Ok((views, total))
    }

    /// Member with borrow records joined to book metadata.
    ///
    /// Bounded by the read timeout. Borrow records whose book was deleted get
    /// a placeholder instead of failing the request.
    pub async fn get_member_details(&self, id: Uuid) -> AppResult<MemberDetails> {
        tokio::time::timeout(self.read_timeout, self.load_details(id))
            .await
            .map_err(|_| {
                tracing::warn!(member_id = %id, timeout = ?self.read_timeout, "Member read timed out");
                AppError::Timeout("Request timeout".to_string())
            })?
    }

    async fn load_details(&self, id: Uuid) -> AppResult<MemberDetails> {
        let member = self.repository.members.get_by_id(id).await?;

        let mut book_ids: Vec<Uuid> = member.books_borrowed.iter().map(|r| r.book_id).collect();
        book_ids.sort_unstable();
        book_ids.dedup();

        let books: HashMap<Uuid, _> = self
            .repository
            .books
            .get_summaries(&book_ids)
            .await?
            .into_iter()
            .map(|b| (b.id, b))
            .collect();

        let missing = book_ids.iter().filter(|id| !books.contains_key(id)).count();
        if missing > 0 {
            tracing::debug!(member_id = %id, missing, "Borrow records refer to deleted books");
        }

        let audit = AuditUsers::load(&self.repository, [member.created_by]).await?;
        let created_by = audit.get(member.created_by);
        Ok(MemberDetails::project(member, created_by, Utc::now(), |book_id| books.get(&book_id).cloned()))
    }

    pub async fn create_member(&self, principal: &Principal, request: CreateMember) -> AppResult<MemberView> {
        let member = NewMember::from_request(request, principal.user_id)?;
        let member = self.repository.members.create(member).await?;
        tracing::info!(member_id = %member.id, created_by = %principal.user_id, "Member created");
        self.view(member).await
    }

    pub async fn update_member(&self, id: Uuid, changes: UpdateMember) -> AppResult<MemberView> {
        let changes = changes.normalized()?;
        let member = self.repository.members.update(id, &changes).await?;
        tracing::info!(member_id = %id, "Member updated");
        self.view(member).await
    }

    /// Delete a member; refused while any borrowed book is not returned
    pub async fn delete_member(&self, id: Uuid) -> AppResult<()> {
        self.repository.members.delete(id).await?;
        tracing::info!(member_id = %id, "Member deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    use crate::models::{member::Address, user::NewUser, Role};
    use crate::repository::{memory::MemoryStore, MemberCounts, MembersRepository};

    fn admin() -> Principal {
        Principal { user_id: Uuid::new_v4(), role: Role::Admin }
    }

    fn create_request(email: &str) -> CreateMember {
        CreateMember {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: email.to_string(),
            phone: "555-0100".to_string(),
            address: Some(Address {
                city: Some("London".to_string()),
                ..Default::default()
            }),
            membership_type: None,
            is_active: None,
        }
    }

    /// Members store whose reads never finish within a test's patience
    struct StalledMembers(MemoryStore);

    #[async_trait]
    impl MembersRepository for StalledMembers {
        async fn search(&self, query: &MemberQuery, page: PageRequest) -> AppResult<(Vec<Member>, i64)> {
            MembersRepository::search(&self.0, query, page).await
        }

        async fn get_by_id(&self, id: Uuid) -> AppResult<Member> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            MembersRepository::get_by_id(&self.0, id).await
        }

        async fn create(&self, member: NewMember) -> AppResult<Member> {
            MembersRepository::create(&self.0, member).await
        }

        async fn update(&self, id: Uuid, changes: &UpdateMember) -> AppResult<Member> {
            MembersRepository::update(&self.0, id, changes).await
        }

        async fn delete(&self, id: Uuid) -> AppResult<()> {
            MembersRepository::delete(&self.0, id).await
        }

        async fn counts(&self) -> AppResult<MemberCounts> {
            MembersRepository::counts(&self.0).await
        }
    }

    #[tokio::test]
    async fn test_create_and_read_details() {
        let service = MembersService::new(Repository::in_memory(), Duration::from_secs(10));
        let principal = admin();
        let view = service.create_member(&principal, create_request("ada@example.com")).await.unwrap();
        assert_eq!(view.member.created_by, principal.user_id);
        assert_eq!(view.created_by.id, principal.user_id);

        let details = service.get_member_details(view.member.id).await.unwrap();
        assert_eq!(details.email, "ada@example.com");
        assert_eq!(details.created_by.name, "Unknown User");
        assert!(details.books_borrowed.is_empty());
    }

    #[tokio::test]
    async fn test_created_by_resolves_to_account_summary() {
        let repository = Repository::in_memory();
        let user = repository
            .users
            .create(NewUser {
                name: "Librarian".to_string(),
                email: "librarian@library.test".to_string(),
                password_hash: "hash".to_string(),
                role: Role::Admin,
            })
            .await
            .unwrap();
        let service = MembersService::new(repository, Duration::from_secs(10));
        let principal = Principal { user_id: user.id, role: Role::Admin };

        let view = service.create_member(&principal, create_request("ada@example.com")).await.unwrap();
        assert_eq!(view.created_by.name, "Librarian");

        let details = service.get_member_details(view.member.id).await.unwrap();
        assert_eq!(details.created_by.email, "librarian@library.test");

        let (members, _) = service
            .search_members(&MemberQuery::default(), PageRequest::new(None, None))
            .await
            .unwrap();
        assert_eq!(members[0].created_by.id, user.id);
    }

    #[tokio::test]
    async fn test_missing_member_is_not_found() {
        let service = MembersService::new(Repository::in_memory(), Duration::from_secs(10));
        let err = service.get_member_details(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_slow_read_times_out() {
        let mut repository = Repository::in_memory();
        repository.members = Arc::new(StalledMembers(MemoryStore::default()));
        let service = MembersService::new(repository, Duration::from_millis(50));

        let view = service.create_member(&admin(), create_request("ada@example.com")).await.unwrap();
        let err = service.get_member_details(view.member.id).await.unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_update_and_search() {
        let service = MembersService::new(Repository::in_memory(), Duration::from_secs(10));
        let ada = service.create_member(&admin(), create_request("ada@example.com")).await.unwrap().member;
        service.create_member(&admin(), create_request("charles@example.com")).await.unwrap();

        service
            .update_member(ada.id, UpdateMember { is_active: Some(false), ..Default::default() })
            .await
            .unwrap();

        let query = MemberQuery { is_active: Some(true), ..Default::default() };
        let (members, total) = service.search_members(&query, PageRequest::new(None, None)).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(members[0].member.email, "charles@example.com");

        let query = MemberQuery { search: Some("ADA@".to_string()), ..Default::default() };
        let (_, total) = service.search_members(&query, PageRequest::new(None, None)).await.unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn test_update_to_taken_email_conflicts() {
        let service = MembersService::new(Repository::in_memory(), Duration::from_secs(10));
        let ada = service.create_member(&admin(), create_request("ada@example.com")).await.unwrap().member;
        service.create_member(&admin(), create_request("charles@example.com")).await.unwrap();

        let err = service
            .update_member(
                ada.id,
                UpdateMember { email: Some("Charles@Example.com".to_string()), ..Default::default() },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
