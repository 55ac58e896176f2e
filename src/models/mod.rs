mod document;
mod user;

pub use document::{AccessLevel, ContentRef, Document, DocumentAccess, DocumentType, ShareEntry};
pub use user::{PendingCode, User, UserSummary};
