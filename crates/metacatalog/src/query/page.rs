use crate::error::InvalidQuery;

/// A result window over path-ordered matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: u32,
    pub limit: u32,
}

impl Page {
    pub fn new(offset: u32, limit: u32) -> Self {
        Self { offset, limit }
    }

    /// Both parts or neither; a lone offset or limit is rejected.
    pub fn from_parts(offset: Option<u32>, limit: Option<u32>) -> Result<Option<Self>, InvalidQuery> {
        match (offset, limit) {
            (Some(offset), Some(limit)) => Ok(Some(Self { offset, limit })),
            (None, None) => Ok(None),
            _ => Err(InvalidQuery::PartialPagination),
        }
    }
}
