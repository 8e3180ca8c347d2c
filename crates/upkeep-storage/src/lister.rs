//! Lazy paginated bucket listing.

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use thiserror::Error;

use upkeep_core::error::AppError;
use upkeep_core::traits::storage::{ObjectMeta, ObjectPage, ObjectStore};

/// Why a listing stopped before the last page.
#[derive(Debug, Error)]
pub enum ListingError {
    /// The very first page could not be fetched.
    #[error("storage backend unavailable: {0}")]
    BackendUnavailable(#[source] AppError),
    /// A later page failed; the keys seen so far are incomplete.
    #[error("listing interrupted after {pages} page(s): {source}")]
    Interrupted {
        /// Pages fetched successfully before the failure.
        pages: usize,
        /// Backend error.
        #[source]
        source: AppError,
    },
}

enum Cursor {
    Start,
    Next { token: String, pages: usize },
    Done,
}

/// Streams every object in a bucket, one page in memory at a time.
///
/// Each call to [`StorageLister::list`] starts a fresh listing from the
/// first page. A failed page ends the stream after yielding the error.
#[derive(Debug, Clone)]
pub struct StorageLister {
    store: Arc<dyn ObjectStore>,
    prefix: Option<String>,
    page_size: u32,
}

impl StorageLister {
    /// Create a lister over `store`.
    pub fn new(store: Arc<dyn ObjectStore>, prefix: Option<String>, page_size: u32) -> Self {
        Self {
            store,
            prefix: prefix.filter(|p| !p.is_empty()),
            page_size: page_size.max(1),
        }
    }

    /// Stream raw pages.
    pub fn pages(&self) -> BoxStream<'static, Result<ObjectPage, ListingError>> {
        let store = Arc::clone(&self.store);
        let prefix = self.prefix.clone();
        let page_size = self.page_size;

        stream::try_unfold(Cursor::Start, move |cursor| {
            let store = Arc::clone(&store);
            let prefix = prefix.clone();
            async move {
                let (token, pages) = match cursor {
                    Cursor::Done => return Ok(None),
                    Cursor::Start => (None, 0),
                    Cursor::Next { token, pages } => (Some(token), pages),
                };

                let page = store
                    .list_page(prefix.as_deref(), token.as_deref(), page_size)
                    .await
                    .map_err(|source| {
                        if pages == 0 {
                            ListingError::BackendUnavailable(source)
                        } else {
                            ListingError::Interrupted { pages, source }
                        }
                    })?;

                let next = match page.next_cursor.clone() {
                    Some(next) if token.as_deref() == Some(next.as_str()) => {
                        return Err(ListingError::Interrupted {
                            pages: pages + 1,
                            source: AppError::storage("Backend returned the same cursor twice"),
                        });
                    }
                    Some(token) => Cursor::Next {
                        token,
                        pages: pages + 1,
                    },
                    None => Cursor::Done,
                };
                Ok(Some((page, next)))
            }
        })
        .boxed()
    }

    /// Stream every object across all pages.
    pub fn list(&self) -> BoxStream<'static, Result<ObjectMeta, ListingError>> {
        self.pages()
            .map_ok(|page| stream::iter(page.objects.into_iter().map(Ok::<_, ListingError>)))
            .try_flatten()
            .boxed()
    }
}
