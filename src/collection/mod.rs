//! Collection descriptor cache: fetches and memoises each collection's
//! search-term schema from its OpenSearch `describe.xml` document.

mod describe;

pub use describe::{describe, CollectionDescriptor, DescribeError, SearchTermSpec};
