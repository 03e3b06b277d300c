pub mod record;

use crate::cli::error::{CliError, CliResult};
use crate::cli::utils::parse_fields;
use crate::db::{FindOptions, SortOrder};

/// Common pagination, sorting and projection parameters for list commands
#[derive(Debug, Default)]
pub struct PageParams<'a> {
    pub limit: Option<usize>,
    pub skip: Option<usize>,
    pub sort: Option<&'a str>,
    pub order: Option<&'a str>,
    pub fields: Option<&'a str>,
}

impl PageParams<'_> {
    pub fn to_find_options(&self) -> CliResult<FindOptions> {
        let order = match self.order {
            None => SortOrder::Asc,
            Some(o) if o.eq_ignore_ascii_case("asc") => SortOrder::Asc,
            Some(o) if o.eq_ignore_ascii_case("desc") => SortOrder::Desc,
            Some(other) => {
                return Err(CliError::InvalidArgument {
                    message: format!("unknown sort order '{}' (expected asc or desc)", other),
                });
            }
        };

        let mut options = FindOptions {
            limit: self.limit,
            skip: self.skip,
            fields: parse_fields(self.fields),
            ..FindOptions::default()
        };
        if let Some(field) = self.sort {
            options = options.sort_by(field, order);
        }
        Ok(options)
    }
}

#[cfg(test)]
#[path = "record_test.rs"]
mod record_test;
