//! Book catalog and Open Library metadata lookup
//!
//! ```
//! use bs_books::Catalog;
//!
//! let catalog = Catalog::default();
//! assert_eq!(catalog.filter("1984"), vec!["1984"]);
//! ```

pub mod catalog;
pub mod errors;
pub mod lookup;

pub use catalog::{Catalog, NEW_BOOK_TITLE};
pub use errors::{BooksError, Result};
pub use lookup::{BookClient, BookClientConfig, BookInfo, NOT_FOUND};
