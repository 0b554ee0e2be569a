use crate::{error::ProtocolError, fields::to_snake_case};
use serde_json::{Map, Value};

/// A listing query: filter fields plus the pagination options.
///
/// Only `fields`, `page_token` and `page_size` reach the wire (see [`PagedQuery::wire_fields`]);
/// the remaining options drive the pagination adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct PagedQuery {
    /// Service-specific fields (`parent`, `filter`, ...), in camelCase.
    pub fields: Map<String, Value>,
    /// Opaque cursor returned by the previous page. Passed back unmodified.
    pub page_token: Option<String>,
    pub page_size: Option<u32>,
    /// Fetch every page (`true`, the default) or only one.
    pub auto_paginate: bool,
    /// Upper bound on the number of items returned.
    pub max_results: Option<usize>,
    /// Upper bound on the number of page fetches.
    pub max_api_calls: Option<usize>,
}

impl Default for PagedQuery {
    fn default() -> Self {
        Self {
            fields: Map::new(),
            page_token: None,
            page_size: None,
            auto_paginate: true,
            max_results: None,
            max_api_calls: None,
        }
    }
}

impl PagedQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a query from a caller object such as
    /// `{"filter": "...", "pageSize": 10, "autoPaginate": false, "maxResults": 25}`.
    ///
    /// Pagination options are pulled out of the object, in either naming convention; every
    /// other key is kept as a filter field. `null` options count as absent and a negative
    /// `maxResults` or `maxApiCalls` means "no limit". An option of any other type is an
    /// [`ProtocolError::InvalidOption`].
    pub fn try_from_fields(mut fields: Map<String, Value>) -> Result<Self, ProtocolError> {
        let mut take = |name: &str| {
            let value = fields.remove(name);
            let snake = fields.remove(&to_snake_case(name));
            value.or(snake).filter(|v| !v.is_null())
        };

        let page_token = take("pageToken")
            .map(|v| match v {
                Value::String(token) => Ok(token),
                _ => Err(invalid("pageToken", "a string")),
            })
            .transpose()?;
        let page_size = take("pageSize")
            .map(|v| {
                v.as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| invalid("pageSize", "a non-negative 32-bit integer"))
            })
            .transpose()?;
        let auto_paginate = take("autoPaginate")
            .map(|v| v.as_bool().ok_or_else(|| invalid("autoPaginate", "a boolean")))
            .transpose()?
            .unwrap_or(true);
        let max_results = take("maxResults")
            .map(|v| as_limit(v, "maxResults"))
            .transpose()?
            .flatten();
        let max_api_calls = take("maxApiCalls")
            .map(|v| as_limit(v, "maxApiCalls"))
            .transpose()?
            .flatten();
        take("autoPaginateVal");

        Ok(Self {
            fields,
            page_token,
            page_size,
            auto_paginate,
            max_results,
            max_api_calls,
        })
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_auto_paginate(mut self, auto_paginate: bool) -> Self {
        self.auto_paginate = auto_paginate;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn with_max_api_calls(mut self, max_api_calls: usize) -> Self {
        self.max_api_calls = Some(max_api_calls);
        self
    }

    /// The query fetching the page that starts at `token`.
    pub fn with_page_token(&self, token: impl Into<String>) -> Self {
        Self {
            page_token: Some(token.into()),
            ..self.clone()
        }
    }

    /// The fields sent to the list RPC: filters plus `pageToken` and `pageSize`.
    pub fn wire_fields(&self) -> Map<String, Value> {
        let mut fields = self.fields.clone();
        if let Some(token) = &self.page_token {
            fields.insert("pageToken".to_string(), Value::from(token.as_str()));
        }
        if let Some(size) = self.page_size {
            fields.insert("pageSize".to_string(), Value::from(size));
        }
        fields
    }
}

fn as_limit(value: Value, option: &'static str) -> Result<Option<usize>, ProtocolError> {
    match (value.as_u64(), value.as_i64()) {
        (Some(n), _) => Ok(Some(usize::try_from(n).unwrap_or(usize::MAX))),
        (None, Some(n)) if n < 0 => Ok(None),
        _ => Err(invalid(option, "an integer")),
    }
}

fn invalid(option: &'static str, expected: &'static str) -> ProtocolError {
    ProtocolError::InvalidOption { option, expected }
}
