// Header-driven column detection for reviewer spreadsheets.
// Layouts differ between review rounds, so columns are located by keyword
// rules rather than by position. The rule table is plain data; resolution is
// a pure function over the header cells.

/// Logical columns the row extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalColumn {
    Reviewer,
    Response,
    Details,
    UserName,
    UserEmail,
}

impl LogicalColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reviewer => "reviewer",
            Self::Response => "response",
            Self::Details => "details",
            Self::UserName => "user name",
            Self::UserEmail => "user email",
        }
    }
}

/// One logical column and its keyword sets, tried in order.
/// A set matches a header cell when the cell contains every keyword.
#[derive(Debug)]
pub struct ColumnRule {
    pub column: LogicalColumn,
    pub keyword_sets: &'static [&'static [&'static str]],
    pub required: bool,
}

pub const COLUMN_RULES: &[ColumnRule] = &[
    ColumnRule {
        column: LogicalColumn::Reviewer,
        keyword_sets: &[&["reviewer"], &["manager"]],
        required: true,
    },
    ColumnRule {
        column: LogicalColumn::Response,
        keyword_sets: &[&["response"]],
        required: true,
    },
    ColumnRule {
        column: LogicalColumn::Details,
        keyword_sets: &[&["details", "change"]],
        required: false,
    },
    ColumnRule {
        column: LogicalColumn::UserName,
        keyword_sets: &[&["user", "name"], &["display", "name"], &["full", "name"]],
        required: false,
    },
    ColumnRule {
        column: LogicalColumn::UserEmail,
        keyword_sets: &[&["email"], &["mail"]],
        required: false,
    },
];

/// Index of the first header cell containing all `keywords` (case-insensitive).
pub fn find_column<S: AsRef<str>>(headers: &[S], keywords: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let cell = h.as_ref().trim().to_lowercase();
        !cell.is_empty() && keywords.iter().all(|k| cell.contains(k))
    })
}

/// Resolved column positions for one header row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub reviewer: Option<usize>,
    pub response: Option<usize>,
    pub details: Option<usize>,
    pub user_name: Option<usize>,
    pub user_email: Option<usize>,
}

impl ColumnMap {
    pub fn get(&self, column: LogicalColumn) -> Option<usize> {
        match column {
            LogicalColumn::Reviewer => self.reviewer,
            LogicalColumn::Response => self.response,
            LogicalColumn::Details => self.details,
            LogicalColumn::UserName => self.user_name,
            LogicalColumn::UserEmail => self.user_email,
        }
    }

    fn set(&mut self, column: LogicalColumn, index: Option<usize>) {
        let slot = match column {
            LogicalColumn::Reviewer => &mut self.reviewer,
            LogicalColumn::Response => &mut self.response,
            LogicalColumn::Details => &mut self.details,
            LogicalColumn::UserName => &mut self.user_name,
            LogicalColumn::UserEmail => &mut self.user_email,
        };
        *slot = index;
    }

    /// Required columns that could not be located.
    pub fn missing_required(&self) -> Vec<LogicalColumn> {
        COLUMN_RULES
            .iter()
            .filter(|rule| rule.required && self.get(rule.column).is_none())
            .map(|rule| rule.column)
            .collect()
    }
}

/// Apply `COLUMN_RULES` to a header row.
pub fn resolve_columns<S: AsRef<str>>(headers: &[S]) -> ColumnMap {
    let mut map = ColumnMap::default();
    for rule in COLUMN_RULES {
        let index = rule
            .keyword_sets
            .iter()
            .find_map(|keywords| find_column(headers, keywords));
        map.set(rule.column, index);
    }
    map
}
