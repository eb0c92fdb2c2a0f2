//! Pagination engine: page requests, sort terms, and result pages.
//!
//! The engine is agnostic to defaults. The surrounding layer decides the
//! default page size and sort; this module only insists that every request
//! is well-formed and that every sort term names a field of the schema.
//!
//! # Sort parameter grammar
//!
//! ```text
//! occurredAt,desc      one field, descending
//! subjectId            one field, ascending
//! count,notes,desc     both fields, descending
//! ```

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::models::Sighting;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }

    fn apply(&self, ord: Ordering) -> Ordering {
        match self {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(Direction::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(Direction::Desc)
        } else {
            Err(Error::InvalidSort(format!("unknown direction '{}'", s)))
        }
    }
}

/// Every sortable field of the schema. Closed so that an unknown sort key
/// can never reach a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SortField {
    Id,
    SubjectId,
    ObserverId,
    OccurredAt,
    Latitude,
    Longitude,
    Count,
    Heading,
    Notes,
}

impl SortField {
    pub const ALL: [SortField; 9] = [
        SortField::Id,
        SortField::SubjectId,
        SortField::ObserverId,
        SortField::OccurredAt,
        SortField::Latitude,
        SortField::Longitude,
        SortField::Count,
        SortField::Heading,
        SortField::Notes,
    ];

    /// Field name as it appears in JSON and in query parameters.
    pub fn name(&self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::SubjectId => "subjectId",
            SortField::ObserverId => "observerId",
            SortField::OccurredAt => "occurredAt",
            SortField::Latitude => "latitude",
            SortField::Longitude => "longitude",
            SortField::Count => "count",
            SortField::Heading => "heading",
            SortField::Notes => "notes",
        }
    }

    /// Column name in the relational layout.
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::SubjectId => "subject_id",
            SortField::ObserverId => "observer_id",
            SortField::OccurredAt => "occurred_at",
            SortField::Latitude => "latitude",
            SortField::Longitude => "longitude",
            SortField::Count => "count",
            SortField::Heading => "heading",
            SortField::Notes => "notes",
        }
    }

    /// Compare two records on this field. Unset optional values sort first.
    pub fn compare(&self, a: &Sighting, b: &Sighting) -> Ordering {
        match self {
            SortField::Id => a.id.cmp(&b.id),
            SortField::SubjectId => a.subject_id.cmp(&b.subject_id),
            SortField::ObserverId => a.observer_id.cmp(&b.observer_id),
            SortField::OccurredAt => a.occurred_at.cmp(&b.occurred_at),
            SortField::Latitude => a.latitude.total_cmp(&b.latitude),
            SortField::Longitude => a.longitude.total_cmp(&b.longitude),
            SortField::Count => a.count.cmp(&b.count),
            SortField::Heading => a
                .heading
                .map(|h| h.as_str())
                .cmp(&b.heading.map(|h| h.as_str())),
            SortField::Notes => a.notes.cmp(&b.notes),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SortField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        SortField::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(wanted) || f.column() == wanted)
            .ok_or_else(|| Error::InvalidSort(format!("no such field '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SortOrder {
    pub field: SortField,
    pub direction: Direction,
}

impl SortOrder {
    pub fn asc(field: SortField) -> Self {
        Self {
            field,
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: SortField) -> Self {
        Self {
            field,
            direction: Direction::Desc,
        }
    }

    pub fn compare(&self, a: &Sighting, b: &Sighting) -> Ordering {
        self.direction.apply(self.field.compare(a, b))
    }
}

/// Parse one `field[,field...][,asc|desc]` sort parameter.
pub fn parse_sort(param: &str) -> Result<Vec<SortOrder>> {
    let mut parts: Vec<&str> = param.split(',').map(str::trim).collect();
    let direction = match parts.last() {
        Some(last) if parts.len() > 1 => match last.parse::<Direction>() {
            Ok(dir) => {
                parts.pop();
                dir
            }
            Err(_) => Direction::Asc,
        },
        _ => Direction::Asc,
    };

    if parts.iter().any(|p| p.is_empty()) {
        return Err(Error::InvalidSort(format!("empty field in '{}'", param)));
    }

    parts
        .into_iter()
        .map(|p| {
            Ok(SortOrder {
                field: p.parse()?,
                direction,
            })
        })
        .collect()
}

/// Parse every repeated sort parameter, in order.
pub fn parse_sort_params<I, S>(params: I) -> Result<Vec<SortOrder>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut orders = Vec::new();
    for p in params {
        orders.extend(parse_sort(p.as_ref())?);
    }
    Ok(orders)
}

/// Order two records by the sort terms, falling back to `id` ascending.
pub fn compare_by(sort: &[SortOrder], a: &Sighting, b: &Sighting) -> Ordering {
    sort.iter()
        .map(|o| o.compare(a, b))
        .find(|ord| ord.is_ne())
        .unwrap_or_else(|| SortField::Id.compare(a, b))
}

/// A zero-based page request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
    pub sort: Vec<SortOrder>,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidPage("page size must be >= 1".to_string()));
        }
        Ok(Self {
            page,
            size,
            sort: Vec::new(),
        })
    }

    pub fn with_sort(mut self, sort: Vec<SortOrder>) -> Self {
        self.sort = sort;
        self
    }

    pub fn offset(&self) -> u64 {
        self.page as u64 * self.size as u64
    }

    pub fn limit(&self) -> u64 {
        self.size as u64
    }

    pub fn sorts_on(&self, field: SortField) -> bool {
        self.sort.iter().any(|o| o.field == field)
    }
}

/// One page of results plus the total number of matching elements.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: &PageRequest, total_elements: u64) -> Self {
        Self {
            content,
            page: request.page,
            size: request.size,
            total_elements,
        }
    }

    /// Slice an already ordered collection.
    pub fn from_sorted(items: Vec<T>, request: &PageRequest) -> Self {
        let total = items.len() as u64;
        let content = items
            .into_iter()
            .skip(usize::try_from(request.offset()).unwrap_or(usize::MAX))
            .take(request.size as usize)
            .collect();
        Self::new(content, request, total)
    }

    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            return 0;
        }
        self.total_elements.div_ceil(self.size as u64)
    }

    pub fn has_next(&self) -> bool {
        (self.page as u64) + 1 < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 0
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
        }
    }

    /// Navigation references in `next, prev, last, first` order.
    pub fn links(&self) -> Vec<PageLink> {
        let mut links = Vec::with_capacity(4);
        if self.has_next() {
            links.push(PageLink::new(LinkRel::Next, self.page as u64 + 1, self.size));
        }
        if self.has_previous() {
            links.push(PageLink::new(LinkRel::Prev, self.page as u64 - 1, self.size));
        }
        let last = self.total_pages().saturating_sub(1);
        links.push(PageLink::new(LinkRel::Last, last, self.size));
        links.push(PageLink::new(LinkRel::First, 0, self.size));
        links
    }

    pub fn headers(&self) -> PaginationHeaders {
        PaginationHeaders {
            total_count: self.total_elements,
            total_pages: self.total_pages(),
            links: self.links(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkRel {
    Next,
    Prev,
    Last,
    First,
}

impl LinkRel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkRel::Next => "next",
            LinkRel::Prev => "prev",
            LinkRel::Last => "last",
            LinkRel::First => "first",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageLink {
    pub rel: LinkRel,
    pub page: u64,
    pub size: u32,
}

impl PageLink {
    fn new(rel: LinkRel, page: u64, size: u32) -> Self {
        Self { rel, page, size }
    }
}

/// Header values describing a page, independent of any HTTP library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationHeaders {
    pub total_count: u64,
    pub total_pages: u64,
    pub links: Vec<PageLink>,
}

impl PaginationHeaders {
    pub const TOTAL_COUNT: &'static str = "X-Total-Count";
    pub const TOTAL_PAGES: &'static str = "X-Total-Pages";

    /// Render an RFC 8288 `Link` value; `url_for` builds the target of each
    /// link from its page number and size.
    pub fn link_header(&self, mut url_for: impl FnMut(&PageLink) -> String) -> String {
        self.links
            .iter()
            .map(|l| format!("<{}>; rel=\"{}\"", url_for(l), l.rel.as_str()))
            .collect::<Vec<_>>()
            .join(",")
    }
}
