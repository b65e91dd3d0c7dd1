//! Lending workflow: borrow and return.
//!
//! The storage backend applies the ledger change and the copy counter change
//! as one unit; this service resolves the loan period and answers with the
//! refreshed member projection.

use chrono::{Duration, Utc};
use uuid::Uuid;

use super::members::MembersService;
use crate::{
    config::LendingConfig,
    error::{AppError, AppResult},
    models::{MemberDetails, Principal},
    repository::Repository,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    members: MembersService,
    lending: LendingConfig,
}

impl LoansService {
    pub fn new(repository: Repository, members: MembersService, lending: LendingConfig) -> Self {
        Self { repository, members, lending }
    }

    /// Loan period in days, defaulting to the configured one
    fn loan_days(&self, due_days: Option<i64>) -> AppResult<i64> {
        let days = due_days.unwrap_or(self.lending.default_loan_days);
        if !(1..=self.lending.max_loan_days).contains(&days) {
            return Err(AppError::Validation(format!(
                "due_days must be between 1 and {}",
                self.lending.max_loan_days
            )));
        }
        Ok(days)
    }

    /// Lend one copy of a book to a member
    pub async fn borrow(
        &self,
        principal: &Principal,
        member_id: Uuid,
        book_id: Uuid,
        due_days: Option<i64>,
    ) -> AppResult<MemberDetails> {
        let days = self.loan_days(due_days)?;

        let now = Utc::now();
        let record = self
            .repository
            .loans
            .borrow(member_id, book_id, now, now + Duration::days(days))
            .await?;

        tracing::info!(
            member_id = %member_id,
            book_id = %book_id,
            record_id = %record.id,
            due_date = %record.due_date,
            by = %principal.user_id,
            "Book borrowed"
        );

        self.members.get_member_details(member_id).await
    }

    /// Close a borrow record and give the copy back
    pub async fn return_book(
        &self,
        principal: &Principal,
        member_id: Uuid,
        borrow_id: Uuid,
    ) -> AppResult<MemberDetails> {
        let record = self
            .repository
            .loans
            .return_record(member_id, borrow_id, Utc::now())
            .await?;

        tracing::info!(
            member_id = %member_id,
            book_id = %record.book_id,
            record_id = %record.id,
            by = %principal.user_id,
            "Book returned"
        );

        self.members.get_member_details(member_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tokio_test::{assert_err, assert_ok};

    use crate::{
        config::AppConfig,
        models::{
            book::{CreateBook, UpdateBook},
            member::{CreateMember, MemberQuery, UpdateMember},
            Genre, PageRequest, Role,
        },
        repository::MockLoansRepository,
        services::Services,
    };

    fn admin() -> Principal {
        Principal { user_id: Uuid::new_v4(), role: Role::Admin }
    }

    fn services() -> Services {
        Services::new(Repository::in_memory(), &AppConfig::default())
    }

    async fn seed(services: &Services, copies: i32) -> (Uuid, Uuid) {
        let book = services
            .catalog
            .create_book(
                &admin(),
                CreateBook {
                    title: "Dune".to_string(),
                    author: "Frank Herbert".to_string(),
                    isbn: "9780441172719".to_string(),
                    published_year: 1965,
                    genre: Genre::Fiction,
                    total_copies: copies,
                    copies_available: None,
                    description: None,
                },
            )
            .await
            .unwrap();
        let member = services
            .members
            .create_member(
                &admin(),
                CreateMember {
                    first_name: "Ada".to_string(),
                    last_name: "Lovelace".to_string(),
                    email: "ada@example.com".to_string(),
                    phone: "555-0100".to_string(),
                    address: None,
                    membership_type: None,
                    is_active: None,
                },
            )
            .await
            .unwrap();
        (member.member.id, book.book.id)
    }

    async fn available(services: &Services, book_id: Uuid) -> i32 {
        services.catalog.get_book(book_id).await.unwrap().book.copies_available
    }

    #[tokio::test]
    async fn test_borrow_then_return_restores_counter() {
        let services = services();
        let (member_id, book_id) = seed(&services, 3).await;
        let principal = admin();

        let details = services.loans.borrow(&principal, member_id, book_id, None).await.unwrap();
        assert_eq!(available(&services, book_id).await, 2);
        assert_eq!(details.books_borrowed.len(), 1);

        let loan = &details.books_borrowed[0];
        assert_eq!(loan.due_date - loan.borrowed_date, Duration::days(14));
        assert_eq!(loan.book.title, "Dune");
        assert!(!loan.returned);
        assert!(!loan.is_overdue);

        let details = services.loans.return_book(&principal, member_id, loan.id).await.unwrap();
        assert_eq!(available(&services, book_id).await, 3);
        let loan = &details.books_borrowed[0];
        assert!(loan.returned);
        assert!(loan.returned_date.is_some());
    }

    #[tokio::test]
    async fn test_borrow_without_copies_conflicts_and_appends_nothing() {
        let services = services();
        let (member_id, book_id) = seed(&services, 1).await;
        services.loans.borrow(&admin(), member_id, book_id, Some(7)).await.unwrap();

        let err = services.loans.borrow(&admin(), member_id, book_id, None).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m == "No copies available"));

        let details = services.members.get_member_details(member_id).await.unwrap();
        assert_eq!(details.books_borrowed.len(), 1);
        assert_eq!(available(&services, book_id).await, 0);
    }

    #[tokio::test]
    async fn test_second_return_conflicts_and_leaves_record_unchanged() {
        let services = services();
        let (member_id, book_id) = seed(&services, 2).await;
        let details = services.loans.borrow(&admin(), member_id, book_id, None).await.unwrap();
        let borrow_id = details.books_borrowed[0].id;

        let first = services.loans.return_book(&admin(), member_id, borrow_id).await.unwrap();
        let returned_date = first.books_borrowed[0].returned_date;

        let err = services.loans.return_book(&admin(), member_id, borrow_id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let after = services.members.get_member_details(member_id).await.unwrap();
        assert_eq!(after.books_borrowed[0].returned_date, returned_date);
        assert_eq!(available(&services, book_id).await, 2);
    }

    #[tokio::test]
    async fn test_missing_entities_are_not_found() {
        let services = services();
        let (member_id, book_id) = seed(&services, 1).await;

        let missing = [
            services.loans.borrow(&admin(), Uuid::new_v4(), book_id, None).await,
            services.loans.borrow(&admin(), member_id, Uuid::new_v4(), None).await,
            services.loans.return_book(&admin(), member_id, Uuid::new_v4()).await,
            services.loans.return_book(&admin(), Uuid::new_v4(), Uuid::new_v4()).await,
        ];
        for result in missing {
            assert!(matches!(result, Err(AppError::NotFound(_))));
        }
        assert_eq!(available(&services, book_id).await, 1);
    }

    #[tokio::test]
    async fn test_inactive_member_cannot_borrow() {
        let services = services();
        let (member_id, book_id) = seed(&services, 1).await;
        services
            .members
            .update_member(member_id, UpdateMember { is_active: Some(false), ..Default::default() })
            .await
            .unwrap();

        let err = services.loans.borrow(&admin(), member_id, book_id, None).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(available(&services, book_id).await, 1);
    }

    #[tokio::test]
    async fn test_member_with_outstanding_loan_cannot_be_deleted() {
        let services = services();
        let (member_id, book_id) = seed(&services, 1).await;
        let details = services.loans.borrow(&admin(), member_id, book_id, None).await.unwrap();

        let err = services.members.delete_member(member_id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        services
            .loans
            .return_book(&admin(), member_id, details.books_borrowed[0].id)
            .await
            .unwrap();
        assert_ok!(services.members.delete_member(member_id).await);
        assert!(matches!(
            services.members.get_member_details(member_id).await,
            Err(AppError::NotFound(_))
        ));
        let (_, total) = services
            .members
            .search_members(&MemberQuery::default(), PageRequest::new(None, None))
            .await
            .unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_deleted_book_shows_placeholder_and_return_skips_counter() {
        let services = services();
        let (member_id, book_id) = seed(&services, 1).await;
        let details = services.loans.borrow(&admin(), member_id, book_id, None).await.unwrap();
        services.catalog.delete_book(book_id).await.unwrap();

        let details_after = services.members.get_member_details(member_id).await.unwrap();
        assert_eq!(details_after.books_borrowed[0].book.title, "Unknown Book");
        assert_eq!(details_after.books_borrowed[0].book.id, book_id);

        let returned = services
            .loans
            .return_book(&admin(), member_id, details.books_borrowed[0].id)
            .await
            .unwrap();
        assert!(returned.books_borrowed[0].returned);
    }

    #[tokio::test]
    async fn test_return_never_exceeds_total_copies() {
        let services = services();
        let (member_id, book_id) = seed(&services, 2).await;
        let details = services.loans.borrow(&admin(), member_id, book_id, None).await.unwrap();

        // Shrink the inventory while the copy is out
        services
            .catalog
            .update_book(book_id, UpdateBook { total_copies: Some(1), copies_available: Some(1), ..Default::default() })
            .await
            .unwrap();

        services
            .loans
            .return_book(&admin(), member_id, details.books_borrowed[0].id)
            .await
            .unwrap();
        let book = services.catalog.get_book(book_id).await.unwrap().book;
        assert_eq!((book.total_copies, book.copies_available), (1, 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_borrows_of_last_copy() {
        let services = services();
        let (member_id, book_id) = seed(&services, 1).await;

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let services = services.clone();
                tokio::spawn(async move { services.loans.borrow(&admin(), member_id, book_id, None).await })
            })
            .collect();

        let mut succeeded = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(err) => assert!(matches!(err, AppError::Conflict(_))),
            }
        }

        assert_eq!(succeeded, 1);
        assert_eq!(available(&services, book_id).await, 0);
        let details = services.members.get_member_details(member_id).await.unwrap();
        assert_eq!(details.books_borrowed.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_loan_period_never_reaches_storage() {
        // No expectations: any call into the mock panics
        let mut repository = Repository::in_memory();
        repository.loans = Arc::new(MockLoansRepository::new());
        let services = Services::new(repository, &AppConfig::default());

        for due_days in [0, -3, 366] {
            let result = services
                .loans
                .borrow(&admin(), Uuid::new_v4(), Uuid::new_v4(), Some(due_days))
                .await;
            assert!(matches!(assert_err!(result), AppError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_custom_loan_period_sets_due_date() {
        let mut repository = Repository::in_memory();
        let mut loans = MockLoansRepository::new();
        loans
            .expect_borrow()
            .withf(|_, _, borrowed, due| *due - *borrowed == Duration::days(30))
            .times(1)
            .returning(|_, _, _, _| Err(AppError::NotFound("Member not found".to_string())));
        repository.loans = Arc::new(loans);
        let services = Services::new(repository, &AppConfig::default());

        let result = services
            .loans
            .borrow(&admin(), Uuid::new_v4(), Uuid::new_v4(), Some(30))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
