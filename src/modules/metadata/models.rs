use serde::{Deserialize, Serialize};

/// Reference to the book a record belongs to, serialized as `{"id": ..}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRef {
    pub id: i64,
}

/// Publishing details of a book (one-to-one).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub id: i64,
    pub pages: i32,
    pub publisher: String,
    pub language: String,
    pub book: BookRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMetadata {
    pub pages: i32,
    pub publisher: String,
    pub language: String,
    pub book_id: i64,
}
