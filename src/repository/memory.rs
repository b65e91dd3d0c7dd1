//! Process-local storage backend.
//!
//! All state sits behind one async `RwLock`; every mutation holds the write
//! lock for its whole duration, which gives the same atomicity as the
//! PostgreSQL transactions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    search_term, BookCounts, BooksRepository, LoanCounts, LoansRepository, MemberCounts,
    MembersRepository, UsersRepository,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{check_counters, Book, BookQuery, BookSummary, NewBook, UpdateBook},
        member::{BorrowRecord, Member, MemberQuery, NewMember, UpdateMember},
        user::{NewUser, User, UserSummary},
        PageRequest, Role,
    },
};

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    books: HashMap<Uuid, Book>,
    members: HashMap<Uuid, Member>,
}

impl MemoryState {
    fn isbn_taken(&self, isbn: &str, except: Option<Uuid>) -> bool {
        self.books
            .values()
            .any(|b| b.isbn == isbn && Some(b.id) != except)
    }

    fn member_email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.members
            .values()
            .any(|m| m.email.eq_ignore_ascii_case(email) && Some(m.id) != except)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

/// Newest first, stable across equal timestamps
fn newest_first<T>(entries: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, Uuid)) {
    entries.sort_by(|a, b| {
        let (ta, ia) = key(a);
        let (tb, ib) = key(b);
        tb.cmp(&ta).then(ia.cmp(&ib))
    });
}

fn paginate<T>(entries: Vec<T>, page: PageRequest) -> Vec<T> {
    entries
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect()
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

#[async_trait]
impl BooksRepository for MemoryStore {
    async fn search(&self, query: &BookQuery, page: PageRequest) -> AppResult<(Vec<Book>, i64)> {
        let state = self.state.read().await;
        let needle = search_term(&query.search).map(str::to_lowercase);

        let mut books: Vec<Book> = state
            .books
            .values()
            .filter(|b| query.genre.map_or(true, |g| b.genre == g))
            .filter(|b| {
                needle.as_deref().map_or(true, |n| {
                    contains_ci(&b.title, n) || contains_ci(&b.author, n) || contains_ci(&b.isbn, n)
                })
            })
            .cloned()
            .collect();

        let total = books.len() as i64;
        newest_first(&mut books, |b| (b.created_at, b.id));
        Ok((paginate(books, page), total))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Book> {
        self.state
            .read()
            .await
            .books
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    async fn get_summaries(&self, ids: &[Uuid]) -> AppResult<Vec<BookSummary>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.books.get(id))
            .map(BookSummary::from)
            .collect())
    }

    async fn create(&self, book: NewBook) -> AppResult<Book> {
        let mut state = self.state.write().await;
        if state.isbn_taken(&book.isbn, None) {
            return Err(AppError::Conflict("ISBN already exists".to_string()));
        }

        let book = book.into_book(Uuid::new_v4(), Utc::now());
        state.books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn update(&self, id: Uuid, changes: &UpdateBook) -> AppResult<Book> {
        let mut state = self.state.write().await;
        if let Some(ref isbn) = changes.isbn {
            if state.isbn_taken(isbn, Some(id)) {
                return Err(AppError::Conflict("ISBN already exists".to_string()));
            }
        }

        let book = state
            .books
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

        let (total, available) = book.counters_after(changes);
        check_counters(total, available)?;

        if let Some(ref v) = changes.title {
            book.title = v.clone();
        }
        if let Some(ref v) = changes.author {
            book.author = v.clone();
        }
        if let Some(ref v) = changes.isbn {
            book.isbn = v.clone();
        }
        if let Some(v) = changes.published_year {
            book.published_year = v;
        }
        if let Some(v) = changes.genre {
            book.genre = v;
        }
        book.description = changes.description_after(book.description.take());
        book.total_copies = total;
        book.copies_available = available;

        Ok(book.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.state
            .write()
            .await
            .books
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    async fn counts(&self) -> AppResult<BookCounts> {
        let state = self.state.read().await;
        Ok(BookCounts {
            total_books: state.books.len() as i64,
            total_copies: state.books.values().map(|b| b.total_copies as i64).sum(),
            available_copies: state.books.values().map(|b| b.copies_available as i64).sum(),
        })
    }
}

#[async_trait]
impl MembersRepository for MemoryStore {
    async fn search(&self, query: &MemberQuery, page: PageRequest) -> AppResult<(Vec<Member>, i64)> {
        let state = self.state.read().await;
        let needle = search_term(&query.search).map(str::to_lowercase);

        let mut members: Vec<Member> = state
            .members
            .values()
            .filter(|m| query.is_active.map_or(true, |a| m.is_active == a))
            .filter(|m| {
                needle.as_deref().map_or(true, |n| {
                    contains_ci(&m.first_name, n)
                        || contains_ci(&m.last_name, n)
                        || contains_ci(&m.email, n)
                })
            })
            .cloned()
            .collect();

        let total = members.len() as i64;
        newest_first(&mut members, |m| (m.created_at, m.id));
        Ok((paginate(members, page), total))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Member> {
        self.state
            .read()
            .await
            .members
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Member not found".to_string()))
    }

    async fn create(&self, member: NewMember) -> AppResult<Member> {
        let mut state = self.state.write().await;
        if state.member_email_taken(&member.email, None) {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }

        let member = member.into_member(Uuid::new_v4(), Utc::now());
        state.members.insert(member.id, member.clone());
        Ok(member)
    }

    async fn update(&self, id: Uuid, changes: &UpdateMember) -> AppResult<Member> {
        let mut state = self.state.write().await;
        if let Some(ref email) = changes.email {
            if state.member_email_taken(email, Some(id)) {
                return Err(AppError::Conflict("Email already exists".to_string()));
            }
        }

        let member = state
            .members
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Member not found".to_string()))?;
        changes.apply(member);
        Ok(member.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        let member = state
            .members
            .get(&id)
            .ok_or_else(|| AppError::NotFound("Member not found".to_string()))?;

        if member.has_outstanding_loans() {
            return Err(AppError::Conflict(
                "Cannot delete member with borrowed books. Return all books first.".to_string(),
            ));
        }

        state.members.remove(&id);
        Ok(())
    }

    async fn counts(&self) -> AppResult<MemberCounts> {
        let state = self.state.read().await;
        Ok(MemberCounts {
            total: state.members.len() as i64,
            active: state.members.values().filter(|m| m.is_active).count() as i64,
        })
    }
}

#[async_trait]
impl LoansRepository for MemoryStore {
    async fn borrow(
        &self,
        member_id: Uuid,
        book_id: Uuid,
        borrowed_date: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> AppResult<BorrowRecord> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let member = state
            .members
            .get_mut(&member_id)
            .ok_or_else(|| AppError::NotFound("Member not found".to_string()))?;
        let book = state
            .books
            .get_mut(&book_id)
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

        if book.copies_available <= 0 {
            return Err(AppError::Conflict("No copies available".to_string()));
        }
        if !member.is_active {
            return Err(AppError::Conflict("Member is not active".to_string()));
        }

        book.copies_available -= 1;
        let record = BorrowRecord::new(book_id, borrowed_date, due_date);
        member.books_borrowed.push(record.clone());
        Ok(record)
    }

    async fn return_record(
        &self,
        member_id: Uuid,
        record_id: Uuid,
        returned_date: DateTime<Utc>,
    ) -> AppResult<BorrowRecord> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let member = state
            .members
            .get_mut(&member_id)
            .ok_or_else(|| AppError::NotFound("Member not found".to_string()))?;
        let record = member
            .books_borrowed
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| AppError::NotFound("Borrow record not found".to_string()))?;

        if record.returned {
            return Err(AppError::Conflict("Book already returned".to_string()));
        }

        record.returned = true;
        record.returned_date = Some(returned_date);

        if let Some(book) = state.books.get_mut(&record.book_id) {
            book.copies_available = (book.copies_available + 1).min(book.total_copies);
        }

        Ok(record.clone())
    }

    async fn counts(&self, now: DateTime<Utc>) -> AppResult<LoanCounts> {
        let state = self.state.read().await;
        let outstanding = state
            .members
            .values()
            .flat_map(|m| m.books_borrowed.iter())
            .filter(|r| !r.returned);

        let mut counts = LoanCounts::default();
        for record in outstanding {
            counts.active += 1;
            if record.is_overdue(now) {
                counts.overdue += 1;
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl UsersRepository for MemoryStore {
    async fn get_by_id(&self, id: Uuid) -> AppResult<User> {
        self.state
            .read()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let email = email.trim();
        Ok(self
            .state
            .read()
            .await
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_summaries(&self, ids: &[Uuid]) -> AppResult<Vec<UserSummary>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.users.get(id))
            .map(UserSummary::from)
            .collect())
    }

    async fn create(&self, user: NewUser) -> AppResult<User> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let user = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: Utc::now(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_credentials(
        &self,
        id: Uuid,
        name: &str,
        password_hash: &str,
        role: Role,
    ) -> AppResult<User> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        user.name = name.to_string();
        user.password_hash = password_hash.to_string();
        user.role = role;
        Ok(user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Genre, MembershipType};
    use chrono::Duration;

    fn new_book(isbn: &str, copies: i32) -> NewBook {
        NewBook {
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            isbn: isbn.to_string(),
            published_year: 1965,
            genre: Genre::Fiction,
            total_copies: copies,
            copies_available: copies,
            description: None,
            added_by: Uuid::new_v4(),
        }
    }

    fn new_member(email: &str) -> NewMember {
        NewMember {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: email.to_string(),
            phone: "555-0100".to_string(),
            address: None,
            membership_type: MembershipType::Regular,
            is_active: true,
            created_by: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_isbn_and_email_conflict() {
        let store = MemoryStore::default();
        BooksRepository::create(&store, new_book("9780441172719", 1)).await.unwrap();
        let err = BooksRepository::create(&store, new_book("9780441172719", 1)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        MembersRepository::create(&store, new_member("ada@example.com")).await.unwrap();
        let err = MembersRepository::create(&store, new_member("ADA@example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_borrow_and_return_move_counter() {
        let store = MemoryStore::default();
        let book = BooksRepository::create(&store, new_book("9780441172719", 2)).await.unwrap();
        let member = MembersRepository::create(&store, new_member("ada@example.com")).await.unwrap();
        let now = Utc::now();

        let record = store.borrow(member.id, book.id, now, now + Duration::days(14)).await.unwrap();
        assert_eq!(BooksRepository::get_by_id(&store, book.id).await.unwrap().copies_available, 1);

        store.return_record(member.id, record.id, now).await.unwrap();
        assert_eq!(BooksRepository::get_by_id(&store, book.id).await.unwrap().copies_available, 2);
    }

    #[tokio::test]
    async fn test_update_preserves_on_loan_count() {
        let store = MemoryStore::default();
        let book = BooksRepository::create(&store, new_book("9780441172719", 2)).await.unwrap();
        let member = MembersRepository::create(&store, new_member("ada@example.com")).await.unwrap();
        let now = Utc::now();
        store.borrow(member.id, book.id, now, now).await.unwrap();

        let changes = UpdateBook { total_copies: Some(4), ..Default::default() };
        let updated = BooksRepository::update(&store, book.id, &changes).await.unwrap();
        assert_eq!((updated.total_copies, updated.copies_available), (4, 3));

        // Available cannot exceed the new total
        let changes = UpdateBook { total_copies: Some(1), copies_available: Some(2), ..Default::default() };
        let err = BooksRepository::update(&store, book.id, &changes).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_search_filters_and_paginates() {
        let store = MemoryStore::default();
        BooksRepository::create(&store, new_book("9780441172719", 1)).await.unwrap();
        let mut other = new_book("9780140449136", 1);
        other.title = "Crime and Punishment".to_string();
        other.genre = Genre::Other;
        BooksRepository::create(&store, other).await.unwrap();

        let query = BookQuery { search: Some("crime".to_string()), ..Default::default() };
        let (books, total) = BooksRepository::search(&store, &query, PageRequest::new(None, None)).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(books[0].title, "Crime and Punishment");

        let query = BookQuery { genre: Some(Genre::Fiction), ..Default::default() };
        let (_, total) = BooksRepository::search(&store, &query, PageRequest::new(None, None)).await.unwrap();
        assert_eq!(total, 1);

        let (books, total) = BooksRepository::search(&store, &BookQuery::default(), PageRequest::new(Some(2), Some(1)))
            .await
            .unwrap();
        assert_eq!((books.len(), total), (1, 2));

        let (books, total) =
            BooksRepository::search(&store, &BookQuery::default(), PageRequest::new(Some(i64::MAX), Some(100)))
                .await
                .unwrap();
        assert_eq!((books.len(), total), (0, 2));
    }

    #[tokio::test]
    async fn test_blank_description_update_clears_stored_value() {
        let store = MemoryStore::default();
        let mut book = new_book("9780441172719", 1);
        book.description = Some("A desert planet".to_string());
        let book = BooksRepository::create(&store, book).await.unwrap();

        let changes = UpdateBook { description: Some("  ".to_string()), ..Default::default() }
            .normalized()
            .unwrap();
        let updated = BooksRepository::update(&store, book.id, &changes).await.unwrap();
        assert_eq!(updated.description, None);
    }
}
