//! Structured SOQL queries.
//!
//! Filter values stay raw inside [`Select`]; they are escaped and quoted only
//! when the query is rendered to text for the wire. The remote query parser
//! is quote-sensitive, so every interpolated value goes through
//! [`escape_markup`] and is wrapped in single quotes.

use std::fmt;

/// Errors raised while building a query.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SoqlError {
    #[error("Cannot query an undefined value (field {field})")]
    MissingValue { field: String },
}

/// Replace markup-reserved characters with their entity equivalents.
pub fn escape_markup(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

/// A `SELECT` against a single sObject with equality filters joined by `AND`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Select {
    sobject: String,
    fields: Vec<String>,
    filters: Vec<Filter>,
    order_by: Option<OrderBy>,
    limit: Option<u32>,
}

impl Select {
    pub fn from(sobject: &str) -> Self {
        Self {
            sobject: sobject.to_string(),
            fields: Vec::new(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn field(mut self, field: &str) -> Self {
        self.fields.push(field.to_string());
        self
    }

    pub fn fields<'a>(mut self, fields: impl IntoIterator<Item = &'a str>) -> Self {
        self.fields.extend(fields.into_iter().map(str::to_string));
        self
    }

    /// Add `field = 'value'`. An absent or empty value is rejected.
    pub fn where_eq<'v>(
        mut self,
        field: &str,
        value: impl Into<Option<&'v str>>,
    ) -> Result<Self, SoqlError> {
        match value.into() {
            Some(value) if !value.is_empty() => {
                self.filters.push(Filter {
                    field: field.to_string(),
                    value: value.to_string(),
                });
                Ok(self)
            }
            _ => Err(SoqlError::MissingValue {
                field: field.to_string(),
            }),
        }
    }

    pub fn order_by_desc(mut self, field: &str) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            descending: true,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn sobject(&self) -> &str {
        &self.sobject
    }

    pub fn selected_fields(&self) -> &[String] {
        &self.fields
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn ordering(&self) -> Option<&OrderBy> {
        self.order_by.as_ref()
    }

    pub fn row_limit(&self) -> Option<u32> {
        self.limit
    }

    /// Render the query text sent over the wire.
    pub fn to_soql(&self) -> String {
        let fields = if self.fields.is_empty() {
            "Id".to_string()
        } else {
            self.fields.join(", ")
        };
        let mut text = format!("SELECT {fields} FROM {}", self.sobject);

        for (idx, filter) in self.filters.iter().enumerate() {
            let keyword = if idx == 0 { "WHERE" } else { "AND" };
            text.push_str(&format!(
                " {keyword} {} = '{}'",
                filter.field,
                escape_markup(&filter.value)
            ));
        }

        if let Some(order) = &self.order_by {
            let direction = if order.descending { "DESC" } else { "ASC" };
            text.push_str(&format!(" ORDER BY {} {direction}", order.field));
        }

        if let Some(limit) = self.limit {
            text.push_str(&format!(" LIMIT {limit}"));
        }

        text
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_soql())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_every_reserved_character() {
        assert_eq!(
            escape_markup(r#"<a href="x">O'Neil & co</a>"#),
            "&lt;a href=&quot;x&quot;&gt;O&apos;Neil &amp; co&lt;/a&gt;"
        );
        assert_eq!(escape_markup("plain@example.com"), "plain@example.com");
    }

    #[test]
    fn renders_single_filter_query() {
        let query = Select::from("User")
            .field("Id")
            .where_eq("Username", "current@auth.com")
            .expect("value present");
        assert_eq!(
            query.to_soql(),
            "SELECT Id FROM User WHERE Username = 'current@auth.com'"
        );
    }

    #[test]
    fn renders_ordered_limited_query() {
        let query = Select::from("TraceFlag")
            .fields(["Id", "DebugLevelId"])
            .where_eq("LogType", "USER_DEBUG")
            .and_then(|q| q.where_eq("TracedEntityId", "005"))
            .expect("values present")
            .order_by_desc("CreatedDate")
            .limit(1);
        assert_eq!(
            query.to_string(),
            "SELECT Id, DebugLevelId FROM TraceFlag WHERE LogType = 'USER_DEBUG' \
             AND TracedEntityId = '005' ORDER BY CreatedDate DESC LIMIT 1"
        );
    }

    #[test]
    fn filter_values_are_escaped_on_render_only() {
        let query = Select::from("User")
            .where_eq("Username", "o'neil@example.com")
            .expect("value present");
        assert_eq!(query.filters()[0].value, "o'neil@example.com");
        assert_eq!(
            query.to_soql(),
            "SELECT Id FROM User WHERE Username = 'o&apos;neil@example.com'"
        );
    }

    #[test]
    fn empty_filter_value_is_missing() {
        let err = Select::from("DebugLevel")
            .where_eq("DeveloperName", "")
            .expect_err("empty value");
        assert_eq!(
            err,
            SoqlError::MissingValue {
                field: "DeveloperName".into()
            }
        );
        assert!(err.to_string().starts_with("Cannot query an undefined value"));
    }
}
