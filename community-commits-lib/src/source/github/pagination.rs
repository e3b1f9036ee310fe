/// Position in a bounded, page-numbered listing.
///
/// Listings start from [`Pagination::default`] and [`advance`](Self::advance)
/// towards a maximum before every request. Fetching stops once the position
/// [`is_exhausted`](Self::is_exhausted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
}

impl Pagination {
    /// Upper bound for network event listings.
    pub const NETWORK_EVENTS: Self = Self { page: 5, per_page: 100 };

    #[must_use]
    pub const fn new(page: usize, per_page: usize) -> Self {
        Self { page, per_page }
    }

    /// Move to the next page, never beyond `max`.
    #[must_use]
    pub fn advance(self, max: Self) -> Self {
        Self {
            page: if self.page < max.page { self.page + 1 } else { self.page },
            per_page: self.per_page.max(max.per_page),
        }
    }

    #[must_use]
    pub const fn is_exhausted(self, max: Self) -> bool {
        self.page >= max.page && self.per_page >= max.per_page
    }
}
