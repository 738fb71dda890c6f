/// Splits a counted result set into fixed-size pages.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    count: i64,
    per_page: usize,
}

impl Paginator {
    pub fn new(count: i64, per_page: usize) -> Self {
        Self {
            count: count.max(0),
            per_page: per_page.max(1),
        }
    }

    /// An empty result set still has one (empty) page.
    pub fn num_pages(&self) -> usize {
        let count = self.count as usize;
        if count == 0 {
            1
        } else {
            count.div_ceil(self.per_page)
        }
    }

    /// Non-integer input falls back to the first page, out-of-range input to the last.
    pub fn resolve(&self, raw: Option<&str>) -> usize {
        let number = match raw.map(str::trim).map(str::parse::<i64>) {
            None | Some(Err(_)) => return 1,
            Some(Ok(number)) => number,
        };

        let last = self.num_pages();
        if number < 1 || number as usize > last {
            last
        } else {
            number as usize
        }
    }

    pub fn offset(&self, number: usize) -> i64 {
        ((number.max(1) - 1) * self.per_page) as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }

    pub fn page<T>(&self, number: usize, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number,
            num_pages: self.num_pages(),
            total: self.count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
